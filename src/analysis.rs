//! Text analysis for the reference backend.
//!
//! The index layer treats analyzers as opaque capability tokens: they are
//! handed to the backend factory together with the storage location and
//! never inspected by the document or manager layers. The implementations
//! here are deliberately small; richer tokenization belongs to the backend.

pub mod analyzer;
