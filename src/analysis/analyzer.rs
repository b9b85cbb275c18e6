//! Core analyzer trait definition.
//!
//! # Available Implementations
//!
//! - [`KeywordAnalyzer`](keyword::KeywordAnalyzer) - Treats entire input as one term
//! - [`WhitespaceAnalyzer`](whitespace::WhitespaceAnalyzer) - Splits on whitespace
//! - [`SimpleAnalyzer`](simple::SimpleAnalyzer) - Unicode words, lower-cased
//!
//! # Examples
//!
//! ```
//! use lucerna::analysis::analyzer::Analyzer;
//! use lucerna::analysis::analyzer::simple::SimpleAnalyzer;
//!
//! let analyzer = SimpleAnalyzer::new();
//! let terms = analyzer.analyze("Hello, World").unwrap();
//!
//! assert_eq!(terms, vec!["hello", "world"]);
//! ```

pub mod keyword;
pub mod simple;
pub mod whitespace;

use std::fmt::Debug;

use crate::error::Result;

/// Trait for analyzers that turn a field value into indexed terms.
///
/// The trait requires `Send + Sync` so one analyzer can be shared by every
/// handle created for a location.
pub trait Analyzer: Send + Sync + Debug {
    /// Analyze the given text and return the terms to index, in order.
    fn analyze(&self, text: &str) -> Result<Vec<String>>;

    /// Get the name of this analyzer (for debugging and configuration).
    fn name(&self) -> &'static str;
}
