//! Pluggable construction of index handles.

use std::sync::Arc;

use crate::analysis::analyzer::Analyzer;
use crate::error::Result;
use crate::index::storage_index::{StorageIndex, StorageIndexConfig};
use crate::index::{Index, TransactionalIndex};
use crate::storage::Storage;

/// Builds index handles over a storage.
///
/// [`IndexManager`](crate::manager::IndexManager) goes through a factory so
/// another backend can be plugged in without touching callers.
pub trait IndexFactory: Send + Sync + std::fmt::Debug {
    /// Open a plain index.
    fn create_index(
        &self,
        storage: Arc<dyn Storage>,
        analyzer: Arc<dyn Analyzer>,
        writable: bool,
    ) -> Result<Arc<dyn Index>>;

    /// Open a transactional index.
    fn create_transactional_index(
        &self,
        storage: Arc<dyn Storage>,
        analyzer: Arc<dyn Analyzer>,
        writable: bool,
    ) -> Result<Arc<dyn TransactionalIndex>>;
}

/// Factory for [`StorageIndex`] handles.
#[derive(Debug, Clone, Default)]
pub struct StorageIndexFactory {
    config: StorageIndexConfig,
}

impl StorageIndexFactory {
    /// Create a factory passing `config` to every index.
    pub fn new(config: StorageIndexConfig) -> Self {
        StorageIndexFactory { config }
    }

    fn open(
        &self,
        storage: Arc<dyn Storage>,
        analyzer: Arc<dyn Analyzer>,
        writable: bool,
    ) -> Result<Arc<StorageIndex>> {
        Ok(Arc::new(StorageIndex::open(
            storage,
            analyzer,
            self.config.clone(),
            writable,
        )?))
    }
}

impl IndexFactory for StorageIndexFactory {
    fn create_index(
        &self,
        storage: Arc<dyn Storage>,
        analyzer: Arc<dyn Analyzer>,
        writable: bool,
    ) -> Result<Arc<dyn Index>> {
        Ok(self.open(storage, analyzer, writable)?)
    }

    fn create_transactional_index(
        &self,
        storage: Arc<dyn Storage>,
        analyzer: Arc<dyn Analyzer>,
        writable: bool,
    ) -> Result<Arc<dyn TransactionalIndex>> {
        Ok(self.open(storage, analyzer, writable)?)
    }
}
