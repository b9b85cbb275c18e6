//! Integration tests for the index manager.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use lucerna::analysis::analyzer::Analyzer;
use lucerna::analysis::analyzer::keyword::KeywordAnalyzer;
use lucerna::analysis::analyzer::simple::SimpleAnalyzer;
use lucerna::document::selector::FieldSelector;
use lucerna::document_index::cache::{DefaultDocumentIndexCache, DocumentIndexCacheConfig};
use lucerna::error::{ErrorKind, LucernaError, Result};
use lucerna::index::factory::IndexFactory;
use lucerna::index::storage_index::StorageIndexConfig;
use lucerna::index::{Index, IndexStatus, TransactionalIndex};
use lucerna::manager::suspend::ScanSuspender;
use lucerna::manager::{IndexManager, IndexManagerConfig};
use lucerna::query::query::QueryKind;
use lucerna::storage::Storage;
use tempfile::TempDir;

#[derive(Debug, Default)]
struct CountingSuspender {
    active: AtomicUsize,
    suspended: AtomicUsize,
    resumed: AtomicUsize,
}

impl ScanSuspender for CountingSuspender {
    fn suspend(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
        self.suspended.fetch_add(1, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.resumed.fetch_add(1, Ordering::SeqCst);
    }
}

/// A factory that counts how many indexes it built.
#[derive(Debug, Default)]
struct CountingFactory {
    inner: lucerna::index::factory::StorageIndexFactory,
    created: AtomicUsize,
}

impl IndexFactory for CountingFactory {
    fn create_index(
        &self,
        storage: Arc<dyn Storage>,
        analyzer: Arc<dyn Analyzer>,
        writable: bool,
    ) -> Result<Arc<dyn Index>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.inner.create_index(storage, analyzer, writable)
    }

    fn create_transactional_index(
        &self,
        storage: Arc<dyn Storage>,
        analyzer: Arc<dyn Analyzer>,
        writable: bool,
    ) -> Result<Arc<dyn TransactionalIndex>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.inner
            .create_transactional_index(storage, analyzer, writable)
    }
}

fn keyword() -> Arc<dyn Analyzer> {
    Arc::new(KeywordAnalyzer::new())
}

#[test]
fn test_end_to_end_transactional_memory_index() -> Result<()> {
    let manager = IndexManager::builder().build();
    let index = manager.create_memory_index(keyword())?;
    let documents = manager.create_transactional_document_index(index, None);
    let all = FieldSelector::all();

    let mut doc = manager.create_document("a");
    doc.add_pair("name", "Foo", true, true)?;
    documents.add_document(doc)?;
    documents.tx_store()?;
    assert!(documents.find_by_primary_key("a", QueryKind::Exact, &all)?.is_empty());

    documents.commit()?;
    let found = documents.find_by_primary_key("a", QueryKind::Exact, &all)?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].value("name"), Some("Foo"));

    documents.remove_document("a")?;
    documents.store(false)?;
    assert!(documents.find_by_primary_key("a", QueryKind::Exact, &all)?.is_empty());
    Ok(())
}

#[test]
fn test_persistent_index_reopens() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let manager = IndexManager::default();
    let all = FieldSelector::all();

    {
        let index = manager.create_index(dir.path(), Arc::new(SimpleAnalyzer::new()))?;
        let documents = manager.create_document_index(index, None);
        assert_eq!(documents.status()?, IndexStatus::Empty);

        let mut doc = manager.create_document("readme");
        doc.add_pair("body", "Hello Lucerna World", true, true)?;
        documents.add_document(doc)?;
        documents.close()?;
    }
    assert!(manager.open_indexes().is_empty());

    let index = manager.create_transactional_index(dir.path(), Arc::new(SimpleAnalyzer::new()), false)?;
    let documents = manager.create_transactional_document_index(index, None);
    assert_eq!(documents.status()?, IndexStatus::Valid);

    let found = documents.query("body", "Hello Lucerna World", QueryKind::Exact, &all)?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].primary_key(), "readme");
    assert!(documents.query("body", "lucerna", QueryKind::Exact, &all)?.is_empty());
    assert_eq!(
        documents
            .query("body", "hello lu", QueryKind::CaseInsensitivePrefix, &all)?
            .len(),
        1
    );

    documents.add_document(manager.create_document("other"))?;
    let err = documents.store(false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(documents.pending_changes(), (1, 1));
    Ok(())
}

#[test]
fn test_open_indexes_tracks_handles() -> Result<()> {
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();
    let manager = IndexManager::default();

    let first = manager.create_index(first_dir.path(), keyword())?;
    let second = manager.create_transactional_index(second_dir.path(), keyword(), true)?;
    let open = manager.open_indexes();
    assert_eq!(open.len(), 2);
    assert!(open.contains_key(first_dir.path()));

    second.close()?;
    assert_eq!(manager.open_indexes().len(), 1);

    let documents = manager.create_document_index(first, None);
    assert_eq!(manager.open_indexes().len(), 1);
    drop(documents);
    assert!(manager.open_indexes().is_empty());
    drop(second);
    Ok(())
}

#[test]
fn test_custom_factory_and_config() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let factory = Arc::new(CountingFactory::default());
    let config = IndexManagerConfig {
        writable_by_default: false,
        index: StorageIndexConfig {
            data_file: "custom.idx".to_string(),
            ..StorageIndexConfig::default()
        },
        cache: DocumentIndexCacheConfig {
            max_pending_documents: 1,
        },
    };
    let manager = IndexManager::builder()
        .config(config)
        .factory(factory.clone())
        .build();

    let index = manager.create_index(dir.path(), keyword())?;
    assert!(index.store(vec![], vec![], false).is_err());
    let _memory = manager.create_memory_index(keyword())?;
    assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    assert!(!manager.config().writable_by_default);
    Ok(())
}

#[test]
fn test_plain_document_index_overflow_is_stored() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let config = IndexManagerConfig {
        cache: DocumentIndexCacheConfig {
            max_pending_documents: 2,
        },
        ..IndexManagerConfig::default()
    };
    let manager = IndexManager::builder().config(config).build();
    let all = FieldSelector::all();

    {
        let index = manager.create_index(dir.path(), keyword())?;
        let documents = manager.create_document_index(index, None);
        documents.add_document(manager.create_document("a"))?;
        documents.add_document(manager.create_document("b"))?;
        documents.store(false)?;

        assert!(!documents.index().as_transactional().is_some_and(|tx| tx.in_transaction()));
        assert_eq!(documents.find_by_primary_key("a", QueryKind::Exact, &all)?.len(), 1);
        assert_eq!(documents.find_by_primary_key("b", QueryKind::Exact, &all)?.len(), 1);
        documents.close()?;
    }

    let index = manager.create_index(dir.path(), keyword())?;
    let documents = manager.create_document_index(index, None);
    assert_eq!(documents.find_by_primary_key("a", QueryKind::Exact, &all)?.len(), 1);
    assert_eq!(documents.find_by_primary_key("b", QueryKind::Exact, &all)?.len(), 1);
    Ok(())
}

#[test]
fn test_explicit_cache_overflow_flushes() -> Result<()> {
    let manager = IndexManager::default();
    let index = manager.create_memory_index(keyword())?;
    let cache = DefaultDocumentIndexCache::new(DocumentIndexCacheConfig {
        max_pending_documents: 2,
    });
    let documents = manager.create_transactional_document_index(index, Some(Box::new(cache)));
    let all = FieldSelector::all();

    for key in ["a", "b", "c"] {
        documents.add_document(manager.create_document(key))?;
        assert_eq!(documents.pending_changes(), (0, 0));
    }
    assert!(documents.index().in_transaction());
    assert!(documents.find_by_primary_key("c", QueryKind::Exact, &all)?.is_empty());

    documents.commit()?;
    for key in ["a", "b", "c"] {
        assert_eq!(documents.find_by_primary_key(key, QueryKind::Exact, &all)?.len(), 1);
    }
    Ok(())
}

#[test]
fn test_priority_access_pairs_suspend_and_resume() -> Result<()> {
    let first = Arc::new(CountingSuspender::default());
    let second = Arc::new(CountingSuspender::default());
    let manager = IndexManager::builder()
        .suspender(first.clone())
        .suspender(second.clone())
        .build();

    let seen = manager.priority_access(|| {
        Ok((
            first.active.load(Ordering::SeqCst),
            second.active.load(Ordering::SeqCst),
        ))
    })?;
    assert_eq!(seen, (1, 1));

    let err = manager
        .write_access(|| -> anyhow::Result<()> { anyhow::bail!("action failed") })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);

    let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
        let _ = manager.read_access(|| -> anyhow::Result<()> { panic!("action panicked") });
    }));
    assert!(unwound.is_err());

    for suspender in [&first, &second] {
        assert_eq!(suspender.active.load(Ordering::SeqCst), 0);
        assert_eq!(suspender.suspended.load(Ordering::SeqCst), 3);
        assert_eq!(suspender.resumed.load(Ordering::SeqCst), 3);
    }
    assert!(!manager.holds_write_lock());
    Ok(())
}

#[test]
fn test_access_errors_pass_through() -> Result<()> {
    let manager = IndexManager::default();
    let index = manager.create_memory_index(keyword())?;
    index.close()?;

    let err = manager
        .read_access(|| Ok(index.status(false)?))
        .unwrap_err();
    assert!(err.is_closed());

    let err = manager
        .write_access(|| -> anyhow::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Interrupted, "stopped").into())
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Interrupted);

    let err = manager
        .priority_access(|| -> anyhow::Result<()> {
            Err(LucernaError::invalid_argument("bad").into())
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    Ok(())
}
