//! Whitespace analyzer.

use crate::analysis::analyzer::Analyzer;
use crate::error::Result;

/// An analyzer that splits text on whitespace and keeps case.
#[derive(Clone, Debug, Default)]
pub struct WhitespaceAnalyzer;

impl WhitespaceAnalyzer {
    /// Create a new whitespace analyzer.
    pub fn new() -> Self {
        WhitespaceAnalyzer
    }
}

impl Analyzer for WhitespaceAnalyzer {
    fn analyze(&self, text: &str) -> Result<Vec<String>> {
        Ok(text.split_whitespace().map(str::to_string).collect())
    }

    fn name(&self) -> &'static str {
        "whitespace"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_analyzer() {
        let analyzer = WhitespaceAnalyzer::new();
        let terms = analyzer.analyze("  Hello\tWorld\nFoo ").unwrap();

        assert_eq!(terms, vec!["Hello", "World", "Foo"]);
    }
}
