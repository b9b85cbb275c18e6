//! Terms of the index dictionary.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A term: a field name and an indexed token.
///
/// Terms order by field first, then by text, which is the order of term
/// enumeration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Term {
    /// The field the term was indexed under.
    pub field: String,
    /// The token text.
    pub text: String,
}

impl Term {
    /// Create a new term.
    pub fn new<F: Into<String>, T: Into<String>>(field: F, text: T) -> Self {
        Term {
            field: field.into(),
            text: text.into(),
        }
    }

    /// The first possible term of `field`.
    pub fn field_start<F: Into<String>>(field: F) -> Self {
        Term::new(field, "")
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.text)
    }
}

/// A term with its approximate document frequency.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TermFreq {
    /// The term.
    pub term: Term,
    /// Number of live documents containing the term. An estimate under
    /// concurrent writes.
    pub freq: u64,
}
