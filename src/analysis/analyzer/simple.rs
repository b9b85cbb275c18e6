//! Simple analyzer: Unicode word segmentation plus lower-casing.
//!
//! Word boundaries follow UAX #29, so punctuation never ends up inside a
//! term and CJK text is split per ideograph.

use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::analyzer::Analyzer;
use crate::error::Result;

/// A simple analyzer producing lower-cased Unicode words.
#[derive(Clone, Debug, Default)]
pub struct SimpleAnalyzer;

impl SimpleAnalyzer {
    /// Create a new simple analyzer.
    pub fn new() -> Self {
        SimpleAnalyzer
    }
}

impl Analyzer for SimpleAnalyzer {
    fn analyze(&self, text: &str) -> Result<Vec<String>> {
        Ok(text.unicode_words().map(|w| w.to_lowercase()).collect())
    }

    fn name(&self) -> &'static str {
        "simple"
    }
}
