//! Pending mutations of a [`DocumentIndex`](super::DocumentIndex).

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::document::index_document::IndexDocument;

/// Configuration for [`DefaultDocumentIndexCache`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentIndexCacheConfig {
    /// Pending additions plus removals after which the cache asks to be
    /// flushed.
    pub max_pending_documents: usize,
}

impl Default for DocumentIndexCacheConfig {
    fn default() -> Self {
        DocumentIndexCacheConfig {
            max_pending_documents: 10_000,
        }
    }
}

/// Staged additions and removals, applied together at flush time.
///
/// Removals are applied before additions, so a key present in both ends up
/// holding exactly the added version.
pub trait DocumentIndexCache: Send + std::fmt::Debug {
    /// Stage `doc`, replacing any stored or pending document with the same
    /// key. Returns `true` when the cache should be flushed.
    fn add_document(&mut self, doc: IndexDocument) -> bool;

    /// Stage the removal of `key`, dropping pending additions of it.
    /// Returns `true` when the cache should be flushed.
    fn remove_document(&mut self, key: &str) -> bool;

    /// Pending additions, in staging order.
    fn added_documents(&self) -> &[IndexDocument];

    /// Pending removals, in staging order.
    fn removed_keys(&self) -> &[String];

    /// Drop everything staged.
    fn clear(&mut self);

    /// Whether nothing is staged.
    fn is_empty(&self) -> bool {
        self.added_documents().is_empty() && self.removed_keys().is_empty()
    }
}

/// The default cache: insertion-ordered lists bounded by
/// [`DocumentIndexCacheConfig::max_pending_documents`].
#[derive(Debug, Default)]
pub struct DefaultDocumentIndexCache {
    config: DocumentIndexCacheConfig,
    added: Vec<IndexDocument>,
    removed: Vec<String>,
    removed_set: AHashSet<String>,
}

impl DefaultDocumentIndexCache {
    /// Create a cache with the given configuration.
    pub fn new(config: DocumentIndexCacheConfig) -> Self {
        DefaultDocumentIndexCache {
            config,
            added: Vec::new(),
            removed: Vec::new(),
            removed_set: AHashSet::new(),
        }
    }

    fn record_removal(&mut self, key: &str) {
        if self.removed_set.insert(key.to_string()) {
            self.removed.push(key.to_string());
        }
    }

    fn overflowing(&self) -> bool {
        self.added.len() + self.removed.len() >= self.config.max_pending_documents
    }
}

impl DocumentIndexCache for DefaultDocumentIndexCache {
    fn add_document(&mut self, doc: IndexDocument) -> bool {
        self.added.retain(|pending| pending.primary_key() != doc.primary_key());
        self.record_removal(doc.primary_key());
        self.added.push(doc);
        self.overflowing()
    }

    fn remove_document(&mut self, key: &str) -> bool {
        self.added.retain(|doc| doc.primary_key() != key);
        self.record_removal(key);
        self.overflowing()
    }

    fn added_documents(&self) -> &[IndexDocument] {
        &self.added
    }

    fn removed_keys(&self) -> &[String] {
        &self.removed
    }

    fn clear(&mut self) {
        self.added.clear();
        self.removed.clear();
        self.removed_set.clear();
    }
}
