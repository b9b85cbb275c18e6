//! Fields of backend-native documents.

use serde::{Deserialize, Serialize};

/// How a field value is turned into terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FieldIndex {
    /// Not searchable.
    No,
    /// Run through the index analyzer.
    #[default]
    Analyzed,
    /// Indexed as a single verbatim term.
    NotAnalyzed,
}

/// A single name/value pair of a [`Document`](super::document::Document).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Field name.
    pub name: String,
    /// Field value.
    pub value: String,
    /// How the value is indexed.
    pub index: FieldIndex,
    /// Whether the value is retrievable verbatim.
    pub stored: bool,
}

impl Field {
    /// Create a new field.
    pub fn new<N: Into<String>, V: Into<String>>(
        name: N,
        value: V,
        index: FieldIndex,
        stored: bool,
    ) -> Self {
        Field {
            name: name.into(),
            value: value.into(),
            index,
            stored,
        }
    }

    /// A stored, analyzed field.
    pub fn text<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self::new(name, value, FieldIndex::Analyzed, true)
    }

    /// A stored field indexed as one verbatim term.
    pub fn keyword<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self::new(name, value, FieldIndex::NotAnalyzed, true)
    }

    /// Whether this field produces terms.
    pub fn is_indexed(&self) -> bool {
        self.index != FieldIndex::No
    }
}
