//! # Lucerna
//!
//! Transactional, keyed document indexing over pluggable full-text backends.
//!
//! ## Features
//!
//! - Keyed, multi-valued documents with staged add/remove and at-least-once flushing
//! - Optional index capabilities (transactions, term frequencies) queried at runtime
//! - Backend-neutral query algebra with camel-case abbreviation matching
//! - Cooperative cancellation of long-running queries
//! - A registry of open handles and priority access for background scanners
//! - Memory and directory storage for the reference backend

pub mod analysis;
pub mod convertor;
pub mod document;
pub mod document_index;
pub mod error;
pub mod index;
pub mod manager;
pub mod query;
pub mod storage;

pub mod prelude {
    pub use crate::convertor::{Convertor, Step, StoppableConvertor};
    pub use crate::document::index_document::IndexDocument;
    pub use crate::document::selector::FieldSelector;
    pub use crate::document_index::{DocumentIndex, TransactionalDocumentIndex};
    pub use crate::error::{ErrorKind, LucernaError, Result};
    pub use crate::index::{
        Index, IndexCapabilities, IndexExt, IndexStatus, TermFrequencyIndex,
        TermFrequencyIndexExt, TransactionalIndex, TransactionalIndexExt,
    };
    pub use crate::manager::IndexManager;
    pub use crate::query::queries::Queries;
    pub use crate::query::query::{Query, QueryKind, QueryOptions};
    pub use crate::query::term::{Term, TermFreq};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
