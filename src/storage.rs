//! Storage abstraction layer.
//!
//! Index backends persist their state through the [`Storage`] trait, so the
//! same backend runs over a directory ([`file::FileStorage`]) or over
//! transient memory ([`memory::MemoryStorage`]).
//!
//! # Example
//!
//! ```
//! use std::io::{Read, Write};
//!
//! use lucerna::storage::{StorageConfig, StorageFactory};
//! use lucerna::storage::memory::MemoryStorageConfig;
//!
//! # fn main() -> lucerna::error::Result<()> {
//! let storage = StorageFactory::create(StorageConfig::Memory(MemoryStorageConfig::default()))?;
//!
//! let mut output = storage.create_output("index.bin")?;
//! output.write_all(b"test data")?;
//! output.close()?;
//!
//! let mut buffer = Vec::new();
//! storage.open_input("index.bin")?.read_to_end(&mut buffer)?;
//! assert_eq!(buffer, b"test data");
//! # Ok(())
//! # }
//! ```

use std::io::{Read, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{LucernaError, Result};

pub mod file;
pub mod memory;

/// A trait for storage backends that can store and retrieve named files.
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// Open an existing file for reading.
    fn open_input(&self, name: &str) -> Result<Box<dyn StorageInput>>;

    /// Create (or truncate) a file for writing. The data becomes visible
    /// when the output is closed.
    fn create_output(&self, name: &str) -> Result<Box<dyn StorageOutput>>;

    /// Check if a file exists.
    fn file_exists(&self, name: &str) -> bool;

    /// Delete a file. Deleting a missing file succeeds.
    fn delete_file(&self, name: &str) -> Result<()>;

    /// List all files, sorted by name.
    fn list_files(&self) -> Result<Vec<String>>;

    /// Get the size of a file in bytes.
    fn file_size(&self, name: &str) -> Result<u64>;

    /// Atomically replace `new_name` with `old_name`.
    fn rename_file(&self, old_name: &str, new_name: &str) -> Result<()>;

    /// Make previous writes durable.
    fn sync(&self) -> Result<()>;

    /// Close the storage. Later operations fail.
    fn close(&self) -> Result<()>;
}

/// A trait for reading data from storage.
pub trait StorageInput: Read + Send + std::fmt::Debug {
    /// Total size of the file.
    fn size(&self) -> Result<u64>;
}

/// A trait for writing data to storage.
pub trait StorageOutput: Write + Send + std::fmt::Debug {
    /// Flush and publish the written data.
    fn close(&mut self) -> Result<()>;
}

/// Configuration for storage backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StorageConfig {
    /// Directory-backed storage.
    File(file::FileStorageConfig),
    /// Transient in-memory storage.
    Memory(memory::MemoryStorageConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory(memory::MemoryStorageConfig::default())
    }
}

/// A factory for creating storage instances.
pub struct StorageFactory;

impl StorageFactory {
    /// Create the storage described by `config`.
    pub fn create(config: StorageConfig) -> Result<Arc<dyn Storage>> {
        match config {
            StorageConfig::Memory(mem_config) => {
                Ok(Arc::new(memory::MemoryStorage::new(mem_config)))
            }
            StorageConfig::File(file_config) => {
                let path = file_config.path.clone();
                Ok(Arc::new(file::FileStorage::new(&path, file_config)?))
            }
        }
    }
}

/// Error types specific to storage operations.
#[derive(Debug, Clone)]
pub enum StorageError {
    /// The file does not exist.
    FileNotFound(String),
    /// Underlying I/O failure.
    IoError(String),
    /// The storage was closed.
    StorageClosed,
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::FileNotFound(name) => write!(f, "File not found: {name}"),
            StorageError::IoError(msg) => write!(f, "I/O error: {msg}"),
            StorageError::StorageClosed => write!(f, "Storage is closed"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for LucernaError {
    fn from(err: StorageError) -> Self {
        LucernaError::storage(err.to_string())
    }
}

/// Read a whole file.
pub fn read_file(storage: &dyn Storage, name: &str) -> Result<Vec<u8>> {
    let mut input = storage.open_input(name)?;
    let mut buffer = Vec::with_capacity(input.size()? as usize);
    input.read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Write a whole file through a temporary name and rename it into place, so
/// readers never observe a partially written `name`.
pub fn write_file_atomic(storage: &dyn Storage, name: &str, data: &[u8]) -> Result<()> {
    let temp_name = format!("{name}.tmp");
    let mut output = storage.create_output(&temp_name)?;
    output.write_all(data)?;
    output.close()?;
    storage.rename_file(&temp_name, name)
}
