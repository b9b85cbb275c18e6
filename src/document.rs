//! Document model.
//!
//! Two document shapes live here:
//!
//! - [`document::Document`] - the backend-native document: an ordered list of
//!   [`field::Field`]s with indexing and storage flags.
//! - [`index_document::IndexDocument`] - the keyed, multi-valued document
//!   client code builds and hands to a
//!   [`DocumentIndex`](crate::document_index::DocumentIndex).
//!
//! # Examples
//!
//! ```
//! use lucerna::document::index_document::IndexDocument;
//!
//! let doc = IndexDocument::builder("src/Main.java")
//!     .pair("name", "Main", true, true)
//!     .pair("import", "java.util.List", true, false)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(doc.primary_key(), "src/Main.java");
//! assert_eq!(doc.value("name"), Some("Main"));
//! ```

pub mod document;
pub mod field;
pub mod index_document;
pub mod selector;

/// Reserved field holding the primary key of an [`index_document::IndexDocument`].
pub const PRIMARY_KEY_FIELD: &str = "_pk";

/// Suffix of the lower-cased companion field written for every searchable pair.
pub const CASE_INSENSITIVE_SUFFIX: &str = "_ci";

/// Name of the case-insensitive companion of `field`.
pub fn case_insensitive_field(field: &str) -> String {
    format!("{field}{CASE_INSENSITIVE_SUFFIX}")
}
