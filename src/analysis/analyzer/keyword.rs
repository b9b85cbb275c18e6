//! Keyword analyzer that treats the entire input as a single term.
//!
//! Ideal for identifiers, tags and any field that should be matched exactly
//! as provided. This is the default analyzer of the index manager, which
//! makes exact, prefix and pattern queries operate on whole values.
//!
//! # Examples
//!
//! ```
//! use lucerna::analysis::analyzer::Analyzer;
//! use lucerna::analysis::analyzer::keyword::KeywordAnalyzer;
//!
//! let analyzer = KeywordAnalyzer::new();
//! let terms = analyzer.analyze("user-123-abc").unwrap();
//!
//! assert_eq!(terms, vec!["user-123-abc"]);
//! ```

use crate::analysis::analyzer::Analyzer;
use crate::error::Result;

/// A keyword analyzer that treats the entire input as a single term.
#[derive(Clone, Debug, Default)]
pub struct KeywordAnalyzer;

impl KeywordAnalyzer {
    /// Create a new keyword analyzer.
    pub fn new() -> Self {
        KeywordAnalyzer
    }
}

impl Analyzer for KeywordAnalyzer {
    fn analyze(&self, text: &str) -> Result<Vec<String>> {
        Ok(vec![text.to_string()])
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}
