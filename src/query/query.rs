//! Query descriptors evaluated by index backends.

use std::fmt;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::query::term::Term;

/// How a value is matched against a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryKind {
    /// Exact term match.
    Exact,
    /// Literal prefix.
    Prefix,
    /// Literal prefix against the lower-cased companion field.
    CaseInsensitivePrefix,
    /// Camel-case abbreviation ("NPE" finds "NullPointerException").
    CamelCase,
    /// Camel-case abbreviation against the lower-cased companion field.
    CaseInsensitiveCamelCase,
    /// Regular expression over the whole term.
    Regexp,
    /// Case-insensitive regular expression against the companion field.
    CaseInsensitiveRegexp,
}

/// Caller overrides for query construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Pattern starting a new camel-case hump. Defaults to an upper-case letter.
    pub camel_case_separator: Option<String>,
    /// Pattern of the characters filling a hump. Defaults to lower-case
    /// letters, digits, `_`, `.` and `$`.
    pub camel_case_part: Option<String>,
}

impl QueryOptions {
    /// Set the camel-case separator pattern.
    pub fn with_camel_case_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.camel_case_separator = Some(separator.into());
        self
    }

    /// Set the camel-case part pattern.
    pub fn with_camel_case_part<S: Into<String>>(mut self, part: S) -> Self {
        self.camel_case_part = Some(part.into());
        self
    }
}

/// A compiled regular expression matching whole terms.
#[derive(Clone)]
pub struct TermPattern {
    source: String,
    case_sensitive: bool,
    regex: Arc<Regex>,
}

impl TermPattern {
    /// Compile `source`, anchored at both ends.
    pub fn new<S: Into<String>>(source: S, case_sensitive: bool) -> Result<Self> {
        let source = source.into();
        let regex = RegexBuilder::new(&format!("^(?:{source})$"))
            .case_insensitive(!case_sensitive)
            .build()?;
        Ok(TermPattern {
            source,
            case_sensitive,
            regex: Arc::new(regex),
        })
    }

    /// The pattern as supplied.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether matching is case sensitive.
    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Whether `text` matches the whole pattern.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl fmt::Debug for TermPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TermPattern")
            .field("source", &self.source)
            .field("case_sensitive", &self.case_sensitive)
            .finish()
    }
}

/// A backend-neutral query.
#[derive(Debug, Clone)]
pub enum Query {
    /// Documents containing exactly this term.
    Term(Term),
    /// Documents containing a term of `field` starting with `prefix`.
    /// An empty prefix matches every document having the field.
    Prefix {
        /// Field name.
        field: String,
        /// Literal prefix.
        prefix: String,
    },
    /// Documents containing a term of `field` matched by `pattern`.
    Regexp {
        /// Field name.
        field: String,
        /// Compiled pattern.
        pattern: TermPattern,
    },
}

impl Query {
    /// Exact term query.
    pub fn term<F: Into<String>, T: Into<String>>(field: F, text: T) -> Self {
        Query::Term(Term::new(field, text))
    }

    /// Prefix query.
    pub fn prefix<F: Into<String>, P: Into<String>>(field: F, prefix: P) -> Self {
        Query::Prefix {
            field: field.into(),
            prefix: prefix.into(),
        }
    }

    /// Regular expression query.
    pub fn regexp<F: Into<String>, P: Into<String>>(
        field: F,
        pattern: P,
        case_sensitive: bool,
    ) -> Result<Self> {
        Ok(Query::Regexp {
            field: field.into(),
            pattern: TermPattern::new(pattern, case_sensitive)?,
        })
    }

    /// The field this query reads.
    pub fn field(&self) -> &str {
        match self {
            Query::Term(term) => &term.field,
            Query::Prefix { field, .. } | Query::Regexp { field, .. } => field,
        }
    }

    /// First dictionary entry that can match.
    pub fn seek_term(&self) -> Term {
        match self {
            Query::Term(term) => term.clone(),
            Query::Prefix { field, prefix } => Term::new(field.as_str(), prefix.as_str()),
            Query::Regexp { field, .. } => Term::field_start(field.as_str()),
        }
    }

    /// Whether a dictionary walk started at [`seek_term`](Self::seek_term)
    /// can still find matches at `term`.
    pub fn in_range(&self, term: &Term) -> bool {
        match self {
            Query::Term(t) => t == term,
            Query::Prefix { field, prefix } => {
                term.field == *field && term.text.starts_with(prefix.as_str())
            }
            Query::Regexp { field, .. } => term.field == *field,
        }
    }

    /// Whether `term` satisfies this query.
    pub fn matches(&self, term: &Term) -> bool {
        match self {
            Query::Regexp { pattern, .. } => {
                self.in_range(term) && pattern.is_match(&term.text)
            }
            _ => self.in_range(term),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Term(term) => write!(f, "{term}"),
            Query::Prefix { field, prefix } => write!(f, "{field}:{prefix}*"),
            Query::Regexp { field, pattern } => write!(f, "{field}:/{}/", pattern.source()),
        }
    }
}
