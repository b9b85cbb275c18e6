//! Keyed document storage on top of an [`Index`].
//!
//! A [`DocumentIndex`] buffers additions and removals of [`IndexDocument`]s in
//! a [`DocumentIndexCache`] and flushes them to the index in one batch:
//! removed keys become primary-key deletes, added documents are converted to
//! backend [`Document`]s. The cache is cleared only after the index accepted
//! the batch, so a failed flush can simply be retried.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use lucerna::analysis::analyzer::keyword::KeywordAnalyzer;
//! use lucerna::document::index_document::IndexDocument;
//! use lucerna::document::selector::FieldSelector;
//! use lucerna::document_index::DocumentIndex;
//! use lucerna::document_index::cache::DefaultDocumentIndexCache;
//! use lucerna::index::storage_index::StorageIndex;
//! use lucerna::manager::registry::IndexHandle;
//! use lucerna::query::query::QueryKind;
//!
//! # fn main() -> lucerna::error::Result<()> {
//! let index = Arc::new(StorageIndex::memory(Arc::new(KeywordAnalyzer::new()))?);
//! let documents = DocumentIndex::new(
//!     IndexHandle::unregistered(index),
//!     Box::new(DefaultDocumentIndexCache::default()),
//! );
//!
//! let doc = IndexDocument::builder("a").pair("name", "Foo", true, true).build()?;
//! documents.add_document(doc)?;
//! documents.store(false)?;
//!
//! let found = documents.find_by_primary_key("a", QueryKind::Exact, &FieldSelector::all())?;
//! assert_eq!(found[0].value("name"), Some("Foo"));
//! # Ok(())
//! # }
//! ```

pub mod cache;

use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::document::document::Document;
use crate::document::field::{Field, FieldIndex};
use crate::document::index_document::IndexDocument;
use crate::document::selector::FieldSelector;
use crate::document::{PRIMARY_KEY_FIELD, case_insensitive_field};
use crate::document_index::cache::DocumentIndexCache;
use crate::error::{LucernaError, Result};
use crate::index::{
    Index, IndexExt, IndexStatus, TransactionalIndex, TransactionalIndexExt,
};
use crate::manager::registry::IndexHandle;
use crate::query::queries::Queries;
use crate::query::query::{Query, QueryKind, QueryOptions};

/// Convert a keyed document into the backend representation.
///
/// The key is indexed verbatim under [`PRIMARY_KEY_FIELD`]. A searchable
/// value is indexed as one verbatim term under its own name and as the same
/// term lower-cased under the case-insensitive companion field, so the
/// case-sensitive and case-insensitive query kinds see the same terms.
pub fn to_backend_document(doc: IndexDocument) -> Result<Document> {
    let mut backend = Document::new();
    backend.add(
        PRIMARY_KEY_FIELD,
        doc.primary_key(),
        FieldIndex::NotAnalyzed,
        true,
    );
    backend.add(
        case_insensitive_field(PRIMARY_KEY_FIELD),
        doc.primary_key().to_lowercase(),
        FieldIndex::NotAnalyzed,
        false,
    );

    for field in doc.fields() {
        let index = if field.searchable {
            FieldIndex::NotAnalyzed
        } else {
            FieldIndex::No
        };
        backend.add_field(Field::new(
            field.name.as_str(),
            field.value.as_str(),
            index,
            field.stored,
        ));
        if field.searchable {
            backend.add(
                case_insensitive_field(&field.name),
                field.value.to_lowercase(),
                FieldIndex::NotAnalyzed,
                false,
            );
        }
    }
    Ok(backend)
}

/// Rebuild a keyed document from the stored fields of a backend document.
pub fn from_backend_document(doc: Document) -> Result<IndexDocument> {
    let key = doc
        .get(PRIMARY_KEY_FIELD)
        .ok_or_else(|| LucernaError::corrupted("stored document has no primary key"))?;

    let mut result = IndexDocument::new(key);
    for field in doc.fields() {
        if field.stored && field.name != PRIMARY_KEY_FIELD {
            result.add_pair(
                field.name.as_str(),
                field.value.as_str(),
                field.is_indexed(),
                true,
            )?;
        }
    }
    Ok(result)
}

fn key_query(key: String) -> Result<Query> {
    Ok(Query::term(PRIMARY_KEY_FIELD, key))
}

enum Flush {
    Store { optimize: bool },
    Staged,
}

/// Keyed documents over an index handle.
///
/// All methods take `&self`; the cache and the dirty keys are guarded
/// internally, so one instance can be shared between threads.
#[derive(Debug)]
pub struct DocumentIndex<I: Index + ?Sized = dyn Index> {
    index: IndexHandle<I>,
    cache: Mutex<Box<dyn DocumentIndexCache>>,
    dirty_keys: Mutex<BTreeSet<String>>,
    transactional: bool,
}

/// A [`DocumentIndex`] whose index supports transactions.
pub type TransactionalDocumentIndex = DocumentIndex<dyn TransactionalIndex>;

impl<I: Index + ?Sized> DocumentIndex<I> {
    /// Wrap `index`, staging changes in `cache`.
    ///
    /// Overflow flushes go through [`Index::store`] and become visible
    /// immediately, even when the index supports transactions.
    pub fn new(index: IndexHandle<I>, cache: Box<dyn DocumentIndexCache>) -> Self {
        DocumentIndex {
            index,
            cache: Mutex::new(cache),
            dirty_keys: Mutex::new(BTreeSet::new()),
            transactional: false,
        }
    }

    /// The underlying index handle.
    pub fn index(&self) -> &IndexHandle<I> {
        &self.index
    }

    /// Stage `doc`, replacing any document with the same key at the next
    /// flush.
    ///
    /// The cache may be flushed eagerly when it grows too large; callers must
    /// not rely on when that happens.
    pub fn add_document(&self, doc: IndexDocument) -> Result<()> {
        let mut cache = self.cache.lock();
        if cache.add_document(doc) {
            self.flush_eagerly(cache.as_mut())?;
        }
        Ok(())
    }

    /// Stage the removal of the document with key `key`.
    pub fn remove_document(&self, key: &str) -> Result<()> {
        let mut cache = self.cache.lock();
        if cache.remove_document(key) {
            self.flush_eagerly(cache.as_mut())?;
        }
        Ok(())
    }

    /// `(added, removed)` counts of the staged changes.
    pub fn pending_changes(&self) -> (usize, usize) {
        let cache = self.cache.lock();
        (cache.added_documents().len(), cache.removed_keys().len())
    }

    /// Cheap health check: `Empty` and `Invalid` are reported as such,
    /// everything else as `Valid`.
    pub fn status(&self) -> Result<IndexStatus> {
        Ok(match self.index.status(false)? {
            IndexStatus::Empty => IndexStatus::Empty,
            IndexStatus::Invalid => IndexStatus::Invalid,
            IndexStatus::Valid | IndexStatus::Writing => IndexStatus::Valid,
        })
    }

    /// Flush the staged changes with [`Index::store`].
    ///
    /// On failure the staged changes are kept for a retry.
    pub fn store(&self, optimize: bool) -> Result<()> {
        let mut cache = self.cache.lock();
        self.flush(cache.as_mut(), Flush::Store { optimize })
    }

    /// Flush the staged changes, then close the index.
    ///
    /// If a transaction is open the changes are staged into it before the
    /// index rolls it back. Nothing is closed when the flush fails.
    pub fn close(&self) -> Result<()> {
        if !self.index.is_closed() {
            let mut cache = self.cache.lock();
            let in_transaction = self
                .index
                .as_transactional()
                .is_some_and(|tx| tx.in_transaction());
            let mode = if in_transaction {
                Flush::Staged
            } else {
                Flush::Store { optimize: false }
            };
            self.flush(cache.as_mut(), mode)?;
        }
        self.index.close()
    }

    /// Documents whose `field` matches `value` according to `kind`.
    ///
    /// Case-insensitive kinds read the companion field written for
    /// searchable pairs.
    pub fn query(
        &self,
        field: &str,
        value: &str,
        kind: QueryKind,
        selector: &FieldSelector,
    ) -> Result<Vec<IndexDocument>> {
        self.query_with(
            field,
            &case_insensitive_field(field),
            value,
            kind,
            &QueryOptions::default(),
            selector,
        )
    }

    /// Like [`query`](Self::query) with an explicit case-insensitive field
    /// and camel-case options.
    pub fn query_with(
        &self,
        field: &str,
        ci_field: &str,
        value: &str,
        kind: QueryKind,
        options: &QueryOptions,
        selector: &FieldSelector,
    ) -> Result<Vec<IndexDocument>> {
        let query = Queries::create_query(field, ci_field, value, kind, options)?;
        self.search(&[query], selector, None)
    }

    /// Documents matching any of `queries`. `cancel` is polled per
    /// document.
    pub fn search(
        &self,
        queries: &[Query],
        selector: &FieldSelector,
        cancel: Option<&AtomicBool>,
    ) -> Result<Vec<IndexDocument>> {
        let mut results = Vec::new();
        self.index
            .query(&mut results, &from_backend_document, selector, cancel, queries)?;
        trace!(queries = queries.len(), found = results.len(), "document query");
        Ok(results)
    }

    /// Documents whose primary key matches `value` according to `kind`.
    pub fn find_by_primary_key(
        &self,
        value: &str,
        kind: QueryKind,
        selector: &FieldSelector,
    ) -> Result<Vec<IndexDocument>> {
        self.query(PRIMARY_KEY_FIELD, value, kind, selector)
    }

    /// Flag `key` as possibly stale.
    pub fn mark_key_dirty<S: Into<String>>(&self, key: S) {
        self.dirty_keys.lock().insert(key.into());
    }

    /// Unflag `keys`.
    pub fn remove_dirty_keys<K, S>(&self, keys: K)
    where
        K: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut dirty = self.dirty_keys.lock();
        for key in keys {
            dirty.remove(key.as_ref());
        }
    }

    /// Flagged keys, sorted.
    pub fn dirty_keys(&self) -> Vec<String> {
        self.dirty_keys.lock().iter().cloned().collect()
    }

    /// Delete all index data, the staged changes and the dirty keys.
    pub fn clear(&self) -> Result<()> {
        let mut cache = self.cache.lock();
        self.index.clear()?;
        cache.clear();
        self.dirty_keys.lock().clear();
        debug!("cleared document index");
        Ok(())
    }

    fn flush_eagerly(&self, cache: &mut dyn DocumentIndexCache) -> Result<()> {
        self.flush(cache, self.pending_flush_mode())
    }

    /// Stage into the transaction when one is open or this instance was
    /// built as transactional. Otherwise store directly.
    fn pending_flush_mode(&self) -> Flush {
        let in_transaction = self
            .index
            .as_transactional()
            .is_some_and(|tx| tx.in_transaction());
        if in_transaction || (self.transactional && self.index.as_transactional().is_some()) {
            Flush::Staged
        } else {
            Flush::Store { optimize: false }
        }
    }

    fn flush(&self, cache: &mut dyn DocumentIndexCache, mode: Flush) -> Result<()> {
        let optimize = matches!(mode, Flush::Store { optimize: true });
        if cache.is_empty() && !optimize {
            return Ok(());
        }

        let to_add = cache.added_documents().to_vec();
        let to_delete = cache.removed_keys().to_vec();
        let (added, removed) = (to_add.len(), to_delete.len());

        match mode {
            Flush::Store { optimize } => self.index.store_with(
                to_add,
                to_delete,
                &to_backend_document,
                &key_query,
                optimize,
            )?,
            Flush::Staged => {
                let tx = self.index.as_transactional().ok_or_else(|| {
                    LucernaError::unsupported("index does not support transactions")
                })?;
                tx.tx_store_with(to_add, to_delete, &to_backend_document, &key_query)?
            }
        }

        cache.clear();
        debug!(added, removed, "flushed document cache");
        Ok(())
    }
}

impl<I: TransactionalIndex + ?Sized> DocumentIndex<I> {
    /// Wrap a transactional `index`. Overflow flushes are staged into a
    /// transaction and only become visible at [`commit`](Self::commit).
    pub fn new_transactional(index: IndexHandle<I>, cache: Box<dyn DocumentIndexCache>) -> Self {
        DocumentIndex {
            transactional: true,
            ..DocumentIndex::new(index, cache)
        }
    }

    /// Flush the staged changes into the open transaction.
    ///
    /// On failure the staged changes are kept for a retry.
    pub fn tx_store(&self) -> Result<()> {
        let mut cache = self.cache.lock();
        self.flush(cache.as_mut(), Flush::Staged)
    }

    /// Publish the open transaction.
    pub fn commit(&self) -> Result<()> {
        self.index.commit()
    }

    /// Discard the open transaction.
    pub fn rollback(&self) -> Result<()> {
        self.index.rollback()
    }
}
