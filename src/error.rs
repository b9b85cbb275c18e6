//! Error types for the Lucerna library.
//!
//! All fallible operations return [`LucernaError`]. The variants are fine
//! grained for diagnostics, but callers usually only care about the coarse
//! [`ErrorKind`]: storage and backend failures (including operations on a
//! closed index) are [`ErrorKind::Io`], cooperative cancellation is
//! [`ErrorKind::Interrupted`], and bad caller input is
//! [`ErrorKind::InvalidArgument`].
//!
//! # Examples
//!
//! ```
//! use lucerna::error::{ErrorKind, LucernaError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(LucernaError::interrupted("query cancelled"))
//! }
//!
//! let err = example_operation().unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::Interrupted);
//! ```

use std::io;

use thiserror::Error;

/// Coarse classification of a [`LucernaError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Backend or storage failure, including use of a closed index.
    Io,
    /// A cancellation flag was observed while the operation was running.
    Interrupted,
    /// The caller supplied an unusable value (empty camel-case query, bad regexp...).
    InvalidArgument,
}

/// The main error type for Lucerna operations.
#[derive(Error, Debug)]
pub enum LucernaError {
    /// I/O errors from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The index handle was already closed.
    #[error("Index closed: {0}")]
    IndexClosed(String),

    /// A cooperative cancellation flag was set.
    #[error("Interrupted: {0}")]
    Interrupted(String),

    /// Storage-related errors.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Persisted index data exists but cannot be decoded.
    #[error("Corrupted index: {0}")]
    Corrupted(String),

    /// Serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid caller input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not allowed in the current state.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The backend does not provide the requested capability.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Result type alias for operations that may fail with LucernaError.
pub type Result<T> = std::result::Result<T, LucernaError>;

impl LucernaError {
    /// Create a new index closed error.
    pub fn closed<S: Into<String>>(msg: S) -> Self {
        LucernaError::IndexClosed(msg.into())
    }

    /// Create a new interrupted error.
    pub fn interrupted<S: Into<String>>(msg: S) -> Self {
        LucernaError::Interrupted(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        LucernaError::Storage(msg.into())
    }

    /// Create a new corruption error.
    pub fn corrupted<S: Into<String>>(msg: S) -> Self {
        LucernaError::Corrupted(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        LucernaError::InvalidArgument(msg.into())
    }

    /// Create a new invalid operation error.
    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        LucernaError::InvalidOperation(msg.into())
    }

    /// Create a new unsupported capability error.
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        LucernaError::Unsupported(msg.into())
    }

    /// Create a permission denied I/O error.
    pub fn read_only<S: Into<String>>(msg: S) -> Self {
        LucernaError::Io(io::Error::new(io::ErrorKind::PermissionDenied, msg.into()))
    }

    /// Wrap an arbitrary foreign error as an I/O error.
    pub fn wrap<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        LucernaError::Io(io::Error::other(err))
    }

    /// Coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LucernaError::Interrupted(_) => ErrorKind::Interrupted,
            LucernaError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            LucernaError::Io(e) if e.kind() == io::ErrorKind::Interrupted => {
                ErrorKind::Interrupted
            }
            _ => ErrorKind::Io,
        }
    }

    /// Whether this error is a closed-handle error.
    pub fn is_closed(&self) -> bool {
        matches!(self, LucernaError::IndexClosed(_))
    }
}

impl From<bincode::Error> for LucernaError {
    fn from(err: bincode::Error) -> Self {
        LucernaError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for LucernaError {
    fn from(err: serde_json::Error) -> Self {
        LucernaError::Serialization(err.to_string())
    }
}

impl From<regex::Error> for LucernaError {
    fn from(err: regex::Error) -> Self {
        LucernaError::InvalidArgument(format!("invalid regular expression: {err}"))
    }
}
