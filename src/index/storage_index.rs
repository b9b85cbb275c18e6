//! Reference index backend persisted through a [`Storage`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::AHashMap;
use bit_vec::BitVec;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::analysis::analyzer::Analyzer;
use crate::document::document::Document;
use crate::document::selector::FieldSelector;
use crate::error::{LucernaError, Result};
use crate::index::snapshot::{HEADER_LEN, Snapshot, SnapshotHeader};
use crate::index::{
    DocumentSink, Index, IndexStatus, TermFreqVisitor, TermFrequencyIndex, TermVisitor,
    TransactionalIndex, check_cancelled,
};
use crate::query::query::Query;
use crate::query::term::{Term, TermFreq};
use crate::storage::memory::MemoryStorage;
use crate::storage::{Storage, read_file, write_file_atomic};

/// Configuration for [`StorageIndex`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageIndexConfig {
    /// Name of the snapshot file.
    pub data_file: String,
    /// Name of the marker file present while a writer holds the index.
    pub lock_file: String,
    /// Whether every store is followed by a storage sync.
    pub sync_on_store: bool,
}

impl Default for StorageIndexConfig {
    fn default() -> Self {
        StorageIndexConfig {
            data_file: "index.lcnx".to_string(),
            lock_file: "write.lock".to_string(),
            sync_on_store: false,
        }
    }
}

#[derive(Debug, Default)]
struct WriteState {
    /// Staged state of the open transaction.
    staged: Option<Snapshot>,
}

/// An index holding its whole state in an immutable [`Snapshot`].
///
/// Readers clone the published `Arc<Snapshot>` and never wait for writers.
/// Writers are serialized; each builds a new snapshot, persists it and only
/// then publishes it.
#[derive(Debug)]
pub struct StorageIndex {
    id: Uuid,
    storage: Arc<dyn Storage>,
    analyzer: Arc<dyn Analyzer>,
    config: StorageIndexConfig,
    writable: bool,
    current: RwLock<Arc<Snapshot>>,
    write: Mutex<WriteState>,
    closed: AtomicBool,
}

impl StorageIndex {
    /// Open the index kept in `storage`, starting empty if there is none.
    ///
    /// Undecodable data is logged and ignored; [`Index::status`] keeps
    /// reporting it as invalid until the next store replaces it.
    pub fn open(
        storage: Arc<dyn Storage>,
        analyzer: Arc<dyn Analyzer>,
        config: StorageIndexConfig,
        writable: bool,
    ) -> Result<Self> {
        let id = Uuid::new_v4();

        let snapshot = if storage.file_exists(&config.data_file) {
            let bytes = read_file(storage.as_ref(), &config.data_file)?;
            match Snapshot::decode(&bytes) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(index = %id, error = %e, "ignoring undecodable index data");
                    Snapshot::new()
                }
            }
        } else {
            Snapshot::new()
        };

        debug!(
            index = %id,
            docs = snapshot.live_docs(),
            analyzer = analyzer.name(),
            writable,
            "opened index"
        );

        Ok(StorageIndex {
            id,
            storage,
            analyzer,
            config,
            writable,
            current: RwLock::new(Arc::new(snapshot)),
            write: Mutex::new(WriteState::default()),
            closed: AtomicBool::new(false),
        })
    }

    /// A writable index over fresh memory storage.
    pub fn memory(analyzer: Arc<dyn Analyzer>) -> Result<Self> {
        Self::open(
            Arc::new(MemoryStorage::new_default()),
            analyzer,
            StorageIndexConfig::default(),
            true,
        )
    }

    /// Unique id of this handle.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether writes are allowed.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Number of live documents in the published snapshot.
    pub fn doc_count(&self) -> usize {
        self.current.read().live_docs()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(LucernaError::closed(format!("index {}", self.id)))
        } else {
            Ok(())
        }
    }

    fn check_writable(&self) -> Result<()> {
        self.check_open()?;
        if self.writable {
            Ok(())
        } else {
            Err(LucernaError::read_only(format!("index {} is read-only", self.id)))
        }
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    fn apply(
        &self,
        snapshot: &mut Snapshot,
        to_add: &[Document],
        to_delete: &[Query],
    ) -> Result<()> {
        let mut deleted = 0;
        for query in to_delete {
            deleted += snapshot.delete_matching(query)?;
        }
        for doc in to_add {
            snapshot.add_document(doc, self.analyzer.as_ref())?;
        }
        trace!(index = %self.id, added = to_add.len(), deleted, "applied batch");
        Ok(())
    }

    fn create_lock_marker(&self) -> Result<()> {
        let mut output = self.storage.create_output(&self.config.lock_file)?;
        output.close()
    }

    fn remove_lock_marker(&self) -> Result<()> {
        self.storage.delete_file(&self.config.lock_file)
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        let bytes = snapshot.encode()?;
        write_file_atomic(self.storage.as_ref(), &self.config.data_file, &bytes)?;
        if self.config.sync_on_store {
            self.storage.sync()?;
        }
        Ok(())
    }

    /// Persist outside a transaction, holding the lock marker meanwhile.
    ///
    /// Persisted data is published even if the marker cannot be removed
    /// afterwards, so memory never lags behind storage.
    fn persist_and_publish(&self, snapshot: Snapshot) -> Result<()> {
        self.create_lock_marker()?;
        let persisted = self.persist(&snapshot);
        if persisted.is_ok() {
            self.publish(snapshot);
        }
        let unlocked = self.remove_lock_marker();
        persisted.and(unlocked)
    }

    fn publish(&self, snapshot: Snapshot) {
        *self.current.write() = Arc::new(snapshot);
    }

    fn cheap_status(&self) -> Result<IndexStatus> {
        if self.storage.file_exists(&self.config.lock_file) {
            return Ok(IndexStatus::Writing);
        }
        if !self.storage.file_exists(&self.config.data_file) {
            return Ok(IndexStatus::Empty);
        }

        let size = self.storage.file_size(&self.config.data_file)?;
        if size < HEADER_LEN as u64 {
            return Ok(IndexStatus::Invalid);
        }
        let mut input = self.storage.open_input(&self.config.data_file)?;
        Ok(match SnapshotHeader::read_from(&mut input) {
            Ok(header) if header.file_len() == size => IndexStatus::Valid,
            Ok(_) | Err(LucernaError::Corrupted(_)) => IndexStatus::Invalid,
            Err(e) => return Err(e),
        })
    }

    fn full_status(&self) -> Result<IndexStatus> {
        if !self.storage.file_exists(&self.config.data_file) {
            return Ok(IndexStatus::Empty);
        }
        let bytes = read_file(self.storage.as_ref(), &self.config.data_file)?;
        Ok(match Snapshot::decode(&bytes) {
            Ok(_) => IndexStatus::Valid,
            Err(LucernaError::Corrupted(_)) => IndexStatus::Invalid,
            Err(e) => return Err(e),
        })
    }
}

impl Index for StorageIndex {
    fn as_transactional(&self) -> Option<&dyn TransactionalIndex> {
        Some(self)
    }

    fn as_term_frequencies(&self) -> Option<&dyn TermFrequencyIndex> {
        Some(self)
    }

    fn status(&self, try_open: bool) -> Result<IndexStatus> {
        self.check_open()?;
        if try_open {
            self.full_status()
        } else {
            self.cheap_status()
        }
    }

    fn search(
        &self,
        queries: &[Query],
        selector: &FieldSelector,
        cancel: Option<&AtomicBool>,
        collect_terms: bool,
        sink: &mut DocumentSink<'_>,
    ) -> Result<()> {
        self.check_open()?;
        let snapshot = self.snapshot();

        let mut matched = BitVec::from_elem(snapshot.max_doc(), false);
        let mut terms: AHashMap<u32, Vec<Term>> = AHashMap::new();
        for query in queries {
            trace!(index = %self.id, %query, "evaluating query");
            snapshot.for_each_match(query, cancel, |term, ids| {
                for &doc_id in ids {
                    matched.set(doc_id as usize, true);
                    if collect_terms {
                        terms.entry(doc_id).or_default().push(term.clone());
                    }
                }
            })?;
        }

        for doc_id in 0..snapshot.max_doc() as u32 {
            if !matched.get(doc_id as usize).unwrap_or(false) {
                continue;
            }
            let Some(doc) = snapshot.document(doc_id) else {
                continue;
            };
            check_cancelled(cancel)?;
            let doc_terms = terms.remove(&doc_id).unwrap_or_default();
            sink(doc.select(selector), doc_terms)?;
        }
        Ok(())
    }

    fn visit_terms(
        &self,
        start: Option<&Term>,
        cancel: Option<&AtomicBool>,
        visitor: &mut TermVisitor<'_>,
    ) -> Result<()> {
        self.check_open()?;
        self.snapshot()
            .visit_terms(start, cancel, |term, _| visitor(term))
    }

    fn store(&self, to_add: Vec<Document>, to_delete: Vec<Query>, optimize: bool) -> Result<()> {
        self.check_writable()?;
        let state = self.write.lock();
        if state.staged.is_some() {
            return Err(LucernaError::invalid_operation(
                "store while a transaction is open; use tx_store",
            ));
        }

        let mut snapshot = (*self.snapshot()).clone();
        self.apply(&mut snapshot, &to_add, &to_delete)?;
        if optimize {
            snapshot.compact();
        }
        let docs = snapshot.live_docs();
        self.persist_and_publish(snapshot)?;

        debug!(
            index = %self.id,
            added = to_add.len(),
            deletes = to_delete.len(),
            optimize,
            docs,
            "stored batch"
        );
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.check_writable()?;
        let mut state = self.write.lock();
        if state.staged.take().is_some() {
            warn!(index = %self.id, "clear discarded an open transaction");
        }

        self.storage.delete_file(&self.config.data_file)?;
        self.remove_lock_marker()?;
        self.publish(Snapshot::new());
        debug!(index = %self.id, "cleared index");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut state = self.write.lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if state.staged.take().is_some() {
            warn!(index = %self.id, "closing index with an open transaction; rolling back");
            if self.writable {
                self.remove_lock_marker()?;
            }
        }
        self.storage.close()?;
        debug!(index = %self.id, "closed index");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl TransactionalIndex for StorageIndex {
    fn tx_store(&self, to_add: Vec<Document>, to_delete: Vec<Query>) -> Result<()> {
        self.check_writable()?;
        let mut state = self.write.lock();

        let mut staged = match state.staged.take() {
            Some(staged) => staged,
            None => {
                self.create_lock_marker()?;
                debug!(index = %self.id, "began transaction");
                (*self.snapshot()).clone()
            }
        };

        // A failed batch leaves the earlier staged batches intact.
        let before = staged.clone();
        match self.apply(&mut staged, &to_add, &to_delete) {
            Ok(()) => {
                state.staged = Some(staged);
                Ok(())
            }
            Err(e) => {
                state.staged = Some(before);
                Err(e)
            }
        }
    }

    fn commit(&self) -> Result<()> {
        self.check_writable()?;
        let mut state = self.write.lock();
        let Some(staged) = state.staged.take() else {
            return Ok(());
        };

        if let Err(e) = self.persist(&staged) {
            state.staged = Some(staged);
            return Err(e);
        }

        debug!(index = %self.id, docs = staged.live_docs(), "committed transaction");
        self.publish(staged);
        self.remove_lock_marker()
    }

    fn rollback(&self) -> Result<()> {
        self.check_open()?;
        let mut state = self.write.lock();
        if state.staged.take().is_some() {
            self.remove_lock_marker()?;
            debug!(index = %self.id, "rolled back transaction");
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.write.lock().staged.is_some()
    }
}

impl TermFrequencyIndex for StorageIndex {
    fn visit_term_frequencies(
        &self,
        start: Option<&Term>,
        cancel: Option<&AtomicBool>,
        visitor: &mut TermFreqVisitor<'_>,
    ) -> Result<()> {
        self.check_open()?;
        self.snapshot().visit_terms(start, cancel, |term, freq| {
            visitor(&TermFreq {
                term: term.clone(),
                freq,
            })
        })
    }
}
