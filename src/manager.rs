//! Creation and coordination of index handles.
//!
//! [`IndexManager`] creates index handles for storage locations, remembers the
//! open ones in a registry, wraps them in [`DocumentIndex`]es and runs
//! caller actions with background scanners suspended.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use lucerna::analysis::analyzer::keyword::KeywordAnalyzer;
//! use lucerna::document::selector::FieldSelector;
//! use lucerna::manager::IndexManager;
//! use lucerna::query::query::QueryKind;
//!
//! # fn main() -> lucerna::error::Result<()> {
//! let manager = IndexManager::builder().build();
//! let index = manager.create_memory_index(Arc::new(KeywordAnalyzer::new()))?;
//! let documents = manager.create_transactional_document_index(index, None);
//!
//! let mut doc = manager.create_document("a");
//! doc.add_pair("name", "Foo", true, true)?;
//! documents.add_document(doc)?;
//! documents.tx_store()?;
//! documents.commit()?;
//!
//! let found = manager.read_access(|| {
//!     Ok(documents.find_by_primary_key("a", QueryKind::Exact, &FieldSelector::all())?)
//! })?;
//! assert_eq!(found.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod lock;
pub mod registry;
pub mod suspend;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::analyzer::Analyzer;
use crate::document::index_document::IndexDocument;
use crate::document_index::cache::{
    DefaultDocumentIndexCache, DocumentIndexCache, DocumentIndexCacheConfig,
};
use crate::document_index::DocumentIndex;
use crate::error::{LucernaError, Result};
use crate::index::factory::{IndexFactory, StorageIndexFactory};
use crate::index::storage_index::StorageIndexConfig;
use crate::index::{Index, TransactionalIndex};
use crate::manager::lock::ReentrantRwLock;
use crate::manager::registry::{IndexHandle, Registry};
use crate::manager::suspend::{ScanSuspender, SuspendGuard};
use crate::storage::Storage;
use crate::storage::file::{FileStorage, FileStorageConfig};
use crate::storage::memory::MemoryStorage;

static GLOBAL: OnceCell<Arc<IndexManager>> = OnceCell::new();

/// Configuration for [`IndexManager`].
///
/// Fields missing from a serialized configuration take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexManagerConfig {
    /// Whether [`IndexManager::create_index`] opens indexes for writing.
    pub writable_by_default: bool,
    /// Configuration of indexes built by the default factory.
    pub index: StorageIndexConfig,
    /// Configuration of caches created when none is supplied.
    pub cache: DocumentIndexCacheConfig,
}

impl Default for IndexManagerConfig {
    fn default() -> Self {
        IndexManagerConfig {
            writable_by_default: true,
            index: StorageIndexConfig::default(),
            cache: DocumentIndexCacheConfig::default(),
        }
    }
}

impl IndexManagerConfig {
    /// Parse a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&json)?;
        debug!(path = %path.as_ref().display(), "loaded index manager configuration");
        Ok(config)
    }
}

/// Builder for [`IndexManager`].
#[derive(Debug, Default)]
pub struct IndexManagerBuilder {
    config: IndexManagerConfig,
    factory: Option<Arc<dyn IndexFactory>>,
    suspenders: Vec<Arc<dyn ScanSuspender>>,
}

impl IndexManagerBuilder {
    /// Set the configuration.
    pub fn config(mut self, config: IndexManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `factory` instead of the [`StorageIndexFactory`].
    pub fn factory(mut self, factory: Arc<dyn IndexFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Register a scanner to suspend during priority access.
    pub fn suspender(mut self, suspender: Arc<dyn ScanSuspender>) -> Self {
        self.suspenders.push(suspender);
        self
    }

    /// Build the manager.
    pub fn build(self) -> IndexManager {
        let factory: Arc<dyn IndexFactory> = match self.factory {
            Some(factory) => factory,
            None => Arc::new(StorageIndexFactory::new(self.config.index.clone())),
        };

        IndexManager {
            config: self.config,
            factory,
            suspenders: self.suspenders,
            registry: Registry::new(),
            lock: ReentrantRwLock::new(),
        }
    }
}

/// Entry point for creating and coordinating indexes.
#[derive(Debug)]
pub struct IndexManager {
    config: IndexManagerConfig,
    factory: Arc<dyn IndexFactory>,
    suspenders: Vec<Arc<dyn ScanSuspender>>,
    registry: Arc<Registry>,
    lock: ReentrantRwLock,
}

impl Default for IndexManager {
    fn default() -> Self {
        IndexManager::builder().build()
    }
}

impl IndexManager {
    /// Start building a manager.
    pub fn builder() -> IndexManagerBuilder {
        IndexManagerBuilder::default()
    }

    /// The process-wide manager, built with defaults unless
    /// [`install_global`](Self::install_global) ran first.
    pub fn global() -> Arc<IndexManager> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(IndexManager::default())))
    }

    /// Make `manager` the process-wide manager. Fails once a global manager
    /// exists.
    pub fn install_global(manager: IndexManager) -> Result<Arc<IndexManager>> {
        let manager = Arc::new(manager);
        GLOBAL.set(Arc::clone(&manager)).map_err(|_| {
            LucernaError::invalid_operation("a global index manager is already installed")
        })?;
        Ok(manager)
    }

    /// The configuration.
    pub fn config(&self) -> &IndexManagerConfig {
        &self.config
    }

    /// Open a new handle for `location` and register it.
    ///
    /// Every call returns a new handle, even for the same location.
    pub fn create_index<P: AsRef<Path>>(
        &self,
        location: P,
        analyzer: Arc<dyn Analyzer>,
    ) -> Result<IndexHandle<dyn Index>> {
        let location = location.as_ref();
        let writable = self.config.writable_by_default;
        let storage = self.open_location(location, writable)?;

        let index = self
            .factory
            .create_index(storage, Arc::clone(&analyzer), writable)?;
        debug!(location = %location.display(), writable, "created index");
        Ok(self
            .registry
            .register(location, Arc::clone(&index), index, analyzer))
    }

    /// Open a new transactional handle for `location` and register it.
    pub fn create_transactional_index<P: AsRef<Path>>(
        &self,
        location: P,
        analyzer: Arc<dyn Analyzer>,
        writable: bool,
    ) -> Result<IndexHandle<dyn TransactionalIndex>> {
        let location = location.as_ref();
        let storage = self.open_location(location, writable)?;

        let index = self
            .factory
            .create_transactional_index(storage, Arc::clone(&analyzer), writable)?;
        debug!(location = %location.display(), writable, "created transactional index");
        let as_index: Arc<dyn Index> = index.clone();
        Ok(self.registry.register(location, index, as_index, analyzer))
    }

    /// A transactional index over transient memory. Never registered.
    pub fn create_memory_index(
        &self,
        analyzer: Arc<dyn Analyzer>,
    ) -> Result<IndexHandle<dyn TransactionalIndex>> {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
        let index = self
            .factory
            .create_transactional_index(storage, analyzer, true)?;
        debug!("created memory index");
        Ok(IndexHandle::unregistered(index))
    }

    /// Wrap `index` in a [`DocumentIndex`]. Without `cache` a default cache
    /// is created from the configuration.
    pub fn create_document_index<I: Index + ?Sized>(
        &self,
        index: IndexHandle<I>,
        cache: Option<Box<dyn DocumentIndexCache>>,
    ) -> DocumentIndex<I> {
        DocumentIndex::new(index, cache.unwrap_or_else(|| self.default_cache()))
    }

    /// Wrap a transactional `index` in a [`DocumentIndex`].
    pub fn create_transactional_document_index<I: TransactionalIndex + ?Sized>(
        &self,
        index: IndexHandle<I>,
        cache: Option<Box<dyn DocumentIndexCache>>,
    ) -> DocumentIndex<I> {
        DocumentIndex::new_transactional(index, cache.unwrap_or_else(|| self.default_cache()))
    }

    /// An empty document with primary key `primary_key`.
    pub fn create_document<S: Into<String>>(&self, primary_key: S) -> IndexDocument {
        IndexDocument::new(primary_key)
    }

    /// Registered indexes that are not closed.
    pub fn open_indexes(&self) -> HashMap<PathBuf, Arc<dyn Index>> {
        self.registry.open_indexes()
    }

    /// Run `action` with every scan suspender paused.
    ///
    /// The suspenders are resumed whether the action succeeds, fails or
    /// panics. Errors that are not [`LucernaError`]s are wrapped as I/O
    /// errors.
    pub fn priority_access<R, F>(&self, action: F) -> Result<R>
    where
        F: FnOnce() -> anyhow::Result<R>,
    {
        let _suspended = SuspendGuard::suspend(&self.suspenders);
        action().map_err(into_lucerna_error)
    }

    /// [`priority_access`](Self::priority_access) under the write lock.
    pub fn write_access<R, F>(&self, action: F) -> Result<R>
    where
        F: FnOnce() -> anyhow::Result<R>,
    {
        let _write = self.lock.write()?;
        self.priority_access(action)
    }

    /// [`priority_access`](Self::priority_access) under the read lock.
    pub fn read_access<R, F>(&self, action: F) -> Result<R>
    where
        F: FnOnce() -> anyhow::Result<R>,
    {
        let _read = self.lock.read();
        self.priority_access(action)
    }

    /// Whether the calling thread holds the write lock.
    pub fn holds_write_lock(&self) -> bool {
        self.lock.holds_write_lock()
    }

    fn default_cache(&self) -> Box<dyn DocumentIndexCache> {
        Box::new(DefaultDocumentIndexCache::new(self.config.cache.clone()))
    }

    fn open_location(&self, location: &Path, writable: bool) -> Result<Arc<dyn Storage>> {
        check_location(location, writable)?;
        let storage = FileStorage::new(location, FileStorageConfig::new(location))?;
        Ok(Arc::new(storage))
    }
}

/// Fail unless `location` can back an index: an existing readable directory,
/// additionally writable when `writable`. A missing directory is acceptable
/// for writable indexes and created on demand.
fn check_location(location: &Path, writable: bool) -> Result<()> {
    match fs::metadata(location) {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(LucernaError::storage(format!(
                    "not a directory: {}",
                    location.display()
                )));
            }
            fs::read_dir(location)?;
            if writable && metadata.permissions().readonly() {
                return Err(LucernaError::read_only(format!(
                    "location is not writable: {}",
                    location.display()
                )));
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && writable => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn into_lucerna_error(err: anyhow::Error) -> LucernaError {
    let err = match err.downcast::<LucernaError>() {
        Ok(err) => return err,
        Err(err) => err,
    };
    match err.downcast::<std::io::Error>() {
        Ok(err) => LucernaError::Io(err),
        Err(err) => LucernaError::wrap(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::analysis::analyzer::keyword::KeywordAnalyzer;
    use crate::error::ErrorKind;

    use tempfile::TempDir;

    fn analyzer() -> Arc<dyn Analyzer> {
        Arc::new(KeywordAnalyzer::new())
    }

    #[test]
    fn test_config_defaults() {
        let config = IndexManagerConfig::default();
        assert!(config.writable_by_default);
        assert_eq!(config.cache.max_pending_documents, 10_000);

        let json = serde_json::to_string(&config).unwrap();
        let back: IndexManagerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.index.data_file, config.index.data_file);
    }

    #[test]
    fn test_config_from_json() {
        let config = IndexManagerConfig::from_json(
            r#"{"writable_by_default": false, "cache": {"max_pending_documents": 5}}"#,
        )
        .unwrap();
        assert!(!config.writable_by_default);
        assert_eq!(config.cache.max_pending_documents, 5);
        assert_eq!(config.index.data_file, StorageIndexConfig::default().data_file);

        let err = IndexManagerConfig::from_json("{").unwrap_err();
        assert!(matches!(err, LucernaError::Serialization(_)));

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lucerna.json");
        fs::write(&path, r#"{"index": {"data_file": "custom.lcnx"}}"#).unwrap();
        let config = IndexManagerConfig::load(&path).unwrap();
        assert!(config.writable_by_default);
        assert_eq!(config.index.data_file, "custom.lcnx");

        let err = IndexManagerConfig::load(dir.path().join("missing.json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_registry_follows_handles() {
        let dir = TempDir::new().unwrap();
        let manager = IndexManager::default();

        let first = manager.create_index(dir.path(), analyzer()).unwrap();
        let second = manager.create_index(dir.path(), analyzer()).unwrap();
        assert!(!Arc::ptr_eq(first.index(), second.index()));
        assert_eq!(manager.open_indexes().len(), 1);

        drop(first);
        assert_eq!(manager.open_indexes().len(), 1);
        drop(second);
        assert!(manager.open_indexes().is_empty());
    }

    #[test]
    fn test_memory_index_is_not_registered() {
        let manager = IndexManager::default();
        let index = manager.create_memory_index(analyzer()).unwrap();
        assert!(index.location().is_none());
        assert!(manager.open_indexes().is_empty());
    }

    #[test]
    fn test_read_only_location_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        let manager = IndexManager::default();

        let err = manager
            .create_transactional_index(&missing, analyzer(), false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);

        let index = manager
            .create_transactional_index(&missing, analyzer(), true)
            .unwrap();
        assert!(missing.is_dir());
        assert_eq!(index.location(), Some(missing.as_path()));
    }

    #[test]
    fn test_error_wrapping() {
        let manager = IndexManager::default();

        let err = manager
            .priority_access(|| -> anyhow::Result<()> {
                Err(LucernaError::interrupted("stop").into())
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Interrupted);

        let err = manager
            .priority_access(|| -> anyhow::Result<()> { Err(anyhow::anyhow!("boom")) })
            .unwrap_err();
        assert!(matches!(err, LucernaError::Io(_)));
        assert!(err.to_string().contains("boom"));

        let value = manager.priority_access(|| Ok(42)).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_write_access_reentry() {
        let manager = IndexManager::default();
        assert!(!manager.holds_write_lock());

        let nested = manager
            .write_access(|| {
                assert!(manager.holds_write_lock());
                let inner = manager.write_access(|| Ok(manager.holds_write_lock()))?;
                let read = manager.read_access(|| Ok(1))?;
                Ok(inner && read == 1)
            })
            .unwrap();
        assert!(nested);
        assert!(!manager.holds_write_lock());

        let err = manager
            .read_access(|| Ok(manager.write_access(|| Ok(()))?))
            .unwrap_err();
        assert!(matches!(err, LucernaError::InvalidOperation(_)));
    }

    #[test]
    fn test_global_manager() {
        let global = IndexManager::global();
        assert!(Arc::ptr_eq(&global, &IndexManager::global()));
        assert!(IndexManager::install_global(IndexManager::default()).is_err());
    }
}
