//! Keyed, multi-valued documents.

use serde::{Deserialize, Serialize};

use crate::document::PRIMARY_KEY_FIELD;
use crate::error::{LucernaError, Result};

/// One value of an [`IndexDocument`] field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexField {
    /// Field name.
    pub name: String,
    /// Field value.
    pub value: String,
    /// Whether the value is indexed.
    pub searchable: bool,
    /// Whether the value is retrievable verbatim.
    pub stored: bool,
}

/// A document identified by a primary key.
///
/// The key is fixed at construction. Handing the document to
/// [`DocumentIndex::add_document`](crate::document_index::DocumentIndex::add_document)
/// transfers it to the index; adding another document with the same key later
/// replaces it at the next flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    primary_key: String,
    fields: Vec<IndexField>,
}

impl IndexDocument {
    /// Create an empty document with the given primary key.
    pub fn new<S: Into<String>>(primary_key: S) -> Self {
        IndexDocument {
            primary_key: primary_key.into(),
            fields: Vec::new(),
        }
    }

    /// Create a builder for the given primary key.
    pub fn builder<S: Into<String>>(primary_key: S) -> IndexDocumentBuilder {
        IndexDocumentBuilder {
            document: IndexDocument::new(primary_key),
            error: None,
        }
    }

    /// The primary key.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Add a value to the field `name`.
    ///
    /// Fails if `name` is the reserved primary key field.
    pub fn add_pair<N: Into<String>, V: Into<String>>(
        &mut self,
        name: N,
        value: V,
        searchable: bool,
        stored: bool,
    ) -> Result<()> {
        let name = name.into();
        if name == PRIMARY_KEY_FIELD {
            return Err(LucernaError::invalid_argument(format!(
                "field name {PRIMARY_KEY_FIELD} is reserved for the primary key"
            )));
        }
        self.fields.push(IndexField {
            name,
            value: value.into(),
            searchable,
            stored,
        });
        Ok(())
    }

    /// First value of `name`.
    ///
    /// The primary key is returned for the reserved primary key field.
    pub fn value(&self, name: &str) -> Option<&str> {
        if name == PRIMARY_KEY_FIELD {
            return Some(&self.primary_key);
        }
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// All values of `name`, in insertion order.
    pub fn values(&self, name: &str) -> Vec<&str> {
        if name == PRIMARY_KEY_FIELD {
            return vec![&self.primary_key];
        }
        self.fields
            .iter()
            .filter(|f| f.name == name)
            .map(|f| f.value.as_str())
            .collect()
    }

    /// All field values, in insertion order.
    pub fn fields(&self) -> &[IndexField] {
        &self.fields
    }

    /// Distinct field names, in first-occurrence order.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for field in &self.fields {
            if !names.contains(&field.name.as_str()) {
                names.push(&field.name);
            }
        }
        names
    }
}

/// A builder for [`IndexDocument`]s that reports the first error on `build`.
#[derive(Debug)]
pub struct IndexDocumentBuilder {
    document: IndexDocument,
    error: Option<LucernaError>,
}

impl IndexDocumentBuilder {
    /// Add a value to the field `name`.
    pub fn pair<N: Into<String>, V: Into<String>>(
        mut self,
        name: N,
        value: V,
        searchable: bool,
        stored: bool,
    ) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.document.add_pair(name, value, searchable, stored) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Build the final document.
    pub fn build(self) -> Result<IndexDocument> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.document),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::ErrorKind;

    #[test]
    fn test_index_document_values() {
        let doc = IndexDocument::builder("a")
            .pair("name", "Foo", true, true)
            .pair("name", "Bar", true, true)
            .pair("kind", "class", false, true)
            .build()
            .unwrap();

        assert_eq!(doc.primary_key(), "a");
        assert_eq!(doc.value("name"), Some("Foo"));
        assert_eq!(doc.values("name"), vec!["Foo", "Bar"]);
        assert_eq!(doc.value("missing"), None);
        assert_eq!(doc.field_names(), vec!["name", "kind"]);
        assert_eq!(doc.value(PRIMARY_KEY_FIELD), Some("a"));
    }

    #[test]
    fn test_reserved_field_rejected() {
        let mut doc = IndexDocument::new("a");
        let err = doc.add_pair(PRIMARY_KEY_FIELD, "b", true, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let result = IndexDocument::builder("a")
            .pair(PRIMARY_KEY_FIELD, "b", true, true)
            .pair("name", "Foo", true, true)
            .build();
        assert!(result.is_err());
    }
}
