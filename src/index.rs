//! Index handles and their optional capabilities.
//!
//! [`Index`] is the object-safe core every backend implements. Optional
//! features are advertised through [`IndexCapabilities`] and reached through
//! [`Index::as_transactional`] / [`Index::as_term_frequencies`], so callers
//! never need to downcast.
//!
//! The convertor-based entry points (`query`, `query_doc_terms`,
//! `query_terms`, `store_with`) are generic and live on the [`IndexExt`]
//! family of extension traits, which are implemented for every index,
//! including `dyn Index`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use lucerna::analysis::analyzer::keyword::KeywordAnalyzer;
//! use lucerna::document::document::Document;
//! use lucerna::document::selector::FieldSelector;
//! use lucerna::index::storage_index::StorageIndex;
//! use lucerna::index::{Index, IndexExt};
//! use lucerna::query::query::Query;
//!
//! # fn main() -> lucerna::error::Result<()> {
//! let index = StorageIndex::memory(Arc::new(KeywordAnalyzer::new()))?;
//!
//! let doc = Document::builder().add_keyword("name", "Foo").build();
//! index.store(vec![doc], vec![], false)?;
//!
//! let mut names = Vec::new();
//! let to_name = |doc: Document| -> lucerna::error::Result<String> {
//!     Ok(doc.get("name").unwrap_or_default().to_string())
//! };
//! index.query(
//!     &mut names,
//!     &to_name,
//!     &FieldSelector::all(),
//!     None,
//!     &[Query::prefix("name", "F")],
//! )?;
//! assert_eq!(names, vec!["Foo".to_string()]);
//! # Ok(())
//! # }
//! ```

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::convertor::{Convertor, Step, StoppableConvertor};
use crate::document::document::Document;
use crate::document::selector::FieldSelector;
use crate::error::{LucernaError, Result};
use crate::query::query::Query;
use crate::query::term::{Term, TermFreq};

pub mod factory;
pub mod snapshot;
pub mod storage_index;

/// Receives each matching document and, when requested, the terms that
/// caused the match.
pub type DocumentSink<'a> = dyn FnMut(Document, Vec<Term>) -> Result<()> + 'a;

/// Receives dictionary terms in ascending order.
pub type TermVisitor<'a> = dyn FnMut(&Term) -> Result<ControlFlow<()>> + 'a;

/// Receives dictionary terms with their document frequency.
pub type TermFreqVisitor<'a> = dyn FnMut(&TermFreq) -> Result<ControlFlow<()>> + 'a;

/// Health of the data backing an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexStatus {
    /// No index data exists yet.
    Empty,
    /// Data exists but cannot be used.
    Invalid,
    /// Data is usable.
    Valid,
    /// A writer currently holds the index.
    Writing,
}

/// Optional features an index provides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexCapabilities {
    /// Staged writes with explicit commit and rollback.
    pub transactional: bool,
    /// Document frequencies in term enumeration.
    pub term_frequencies: bool,
}

/// A handle on one full-text index.
///
/// Implementations synchronize internally: every method takes `&self` and
/// may be called from many threads at once.
pub trait Index: Send + Sync + std::fmt::Debug {
    /// The features this index provides.
    fn capabilities(&self) -> IndexCapabilities {
        IndexCapabilities {
            transactional: self.as_transactional().is_some(),
            term_frequencies: self.as_term_frequencies().is_some(),
        }
    }

    /// This index as a transactional index, if it is one.
    fn as_transactional(&self) -> Option<&dyn TransactionalIndex> {
        None
    }

    /// This index as a term-frequency index, if it is one.
    fn as_term_frequencies(&self) -> Option<&dyn TermFrequencyIndex> {
        None
    }

    /// Report the state of the backing data.
    ///
    /// With `try_open == false` only a cheap check is made; with
    /// `try_open == true` the data is fully decoded and verified.
    fn status(&self, try_open: bool) -> Result<IndexStatus>;

    /// Evaluate `queries` and hand every matching document to `sink`.
    ///
    /// Documents matching several queries are reported once, in ascending
    /// document order. Only stored fields accepted by `selector` are loaded.
    /// `cancel` is polled before every document.
    fn search(
        &self,
        queries: &[Query],
        selector: &FieldSelector,
        cancel: Option<&AtomicBool>,
        collect_terms: bool,
        sink: &mut DocumentSink<'_>,
    ) -> Result<()>;

    /// Walk the term dictionary in ascending order starting at `start`
    /// (inclusive), or at the first term.
    fn visit_terms(
        &self,
        start: Option<&Term>,
        cancel: Option<&AtomicBool>,
        visitor: &mut TermVisitor<'_>,
    ) -> Result<()>;

    /// Delete every document matching one of `to_delete`, then add `to_add`.
    ///
    /// Either the whole batch becomes visible or nothing does.
    fn store(&self, to_add: Vec<Document>, to_delete: Vec<Query>, optimize: bool) -> Result<()>;

    /// Irreversibly delete all data of this index.
    fn clear(&self) -> Result<()>;

    /// Release the index. Later operations fail with an index-closed error.
    fn close(&self) -> Result<()>;

    /// Whether [`close`](Self::close) was called.
    fn is_closed(&self) -> bool;
}

/// An index whose writes can be staged and published atomically.
pub trait TransactionalIndex: Index {
    /// Stage a batch. Staged batches are invisible to readers until
    /// [`commit`](Self::commit).
    fn tx_store(&self, to_add: Vec<Document>, to_delete: Vec<Query>) -> Result<()>;

    /// Publish the staged batches. Does nothing without a transaction.
    fn commit(&self) -> Result<()>;

    /// Discard the staged batches. Does nothing without a transaction.
    fn rollback(&self) -> Result<()>;

    /// Whether a transaction is open.
    fn in_transaction(&self) -> bool;
}

/// An index that reports how many documents contain each term.
pub trait TermFrequencyIndex: Index {
    /// Like [`Index::visit_terms`] but with document frequencies.
    fn visit_term_frequencies(
        &self,
        start: Option<&Term>,
        cancel: Option<&AtomicBool>,
        visitor: &mut TermFreqVisitor<'_>,
    ) -> Result<()>;
}

/// Fail with an interrupted error when `cancel` is set.
pub fn check_cancelled(cancel: Option<&AtomicBool>) -> Result<()> {
    match cancel {
        Some(flag) if flag.load(Ordering::Relaxed) => {
            Err(LucernaError::interrupted("operation cancelled"))
        }
        _ => Ok(()),
    }
}

/// Convertor-based operations for every [`Index`].
pub trait IndexExt: Index {
    /// Append the converted matching documents to `results`.
    fn query<T, C>(
        &self,
        results: &mut Vec<T>,
        convertor: &C,
        selector: &FieldSelector,
        cancel: Option<&AtomicBool>,
        queries: &[Query],
    ) -> Result<()>
    where
        C: Convertor<Document, T> + ?Sized,
    {
        self.search(queries, selector, cancel, false, &mut |doc, _| {
            results.push(convertor.convert(doc)?);
            Ok(())
        })
    }

    /// Append the converted matching documents together with the converted
    /// terms that caused each match.
    fn query_doc_terms<T, S, C, D>(
        &self,
        results: &mut Vec<(T, Vec<S>)>,
        doc_convertor: &C,
        term_convertor: &D,
        selector: &FieldSelector,
        cancel: Option<&AtomicBool>,
        queries: &[Query],
    ) -> Result<()>
    where
        C: Convertor<Document, T> + ?Sized,
        D: Convertor<Term, S> + ?Sized,
    {
        self.search(queries, selector, cancel, true, &mut |doc, terms| {
            let doc = doc_convertor.convert(doc)?;
            let terms = terms
                .into_iter()
                .map(|term| term_convertor.convert(term))
                .collect::<Result<Vec<_>>>()?;
            results.push((doc, terms));
            Ok(())
        })
    }

    /// Append the dictionary terms accepted by `filter`, starting at
    /// `start`. [`Step::Stop`] ends the walk.
    fn query_terms<T, F>(
        &self,
        results: &mut Vec<T>,
        start: Option<&Term>,
        filter: &F,
        cancel: Option<&AtomicBool>,
    ) -> Result<()>
    where
        F: StoppableConvertor<Term, T> + ?Sized,
    {
        self.visit_terms(start, cancel, &mut |term| {
            Ok(match filter.step(term.clone())? {
                Step::Emit(value) => {
                    results.push(value);
                    ControlFlow::Continue(())
                }
                Step::Skip => ControlFlow::Continue(()),
                Step::Stop => ControlFlow::Break(()),
            })
        })
    }

    /// Convert the batch, then [`store`](Index::store) it. A failing
    /// convertor stores nothing.
    fn store_with<D, Q, C, V>(
        &self,
        to_add: Vec<D>,
        to_delete: Vec<Q>,
        doc_convertor: &C,
        query_convertor: &V,
        optimize: bool,
    ) -> Result<()>
    where
        C: Convertor<D, Document> + ?Sized,
        V: Convertor<Q, Query> + ?Sized,
    {
        let (to_add, to_delete) = convert_batch(to_add, to_delete, doc_convertor, query_convertor)?;
        self.store(to_add, to_delete, optimize)
    }
}

impl<I: Index + ?Sized> IndexExt for I {}

/// Convertor-based operations for every [`TransactionalIndex`].
pub trait TransactionalIndexExt: TransactionalIndex {
    /// Convert the batch, then [`tx_store`](TransactionalIndex::tx_store) it.
    fn tx_store_with<D, Q, C, V>(
        &self,
        to_add: Vec<D>,
        to_delete: Vec<Q>,
        doc_convertor: &C,
        query_convertor: &V,
    ) -> Result<()>
    where
        C: Convertor<D, Document> + ?Sized,
        V: Convertor<Q, Query> + ?Sized,
    {
        let (to_add, to_delete) = convert_batch(to_add, to_delete, doc_convertor, query_convertor)?;
        self.tx_store(to_add, to_delete)
    }
}

impl<I: TransactionalIndex + ?Sized> TransactionalIndexExt for I {}

/// Convertor-based operations for every [`TermFrequencyIndex`].
pub trait TermFrequencyIndexExt: TermFrequencyIndex {
    /// Append the `(term, frequency)` entries accepted by `filter`.
    fn query_term_frequencies<T, F>(
        &self,
        results: &mut Vec<T>,
        start: Option<&Term>,
        filter: &F,
        cancel: Option<&AtomicBool>,
    ) -> Result<()>
    where
        F: StoppableConvertor<TermFreq, T> + ?Sized,
    {
        self.visit_term_frequencies(start, cancel, &mut |entry| {
            Ok(match filter.step(entry.clone())? {
                Step::Emit(value) => {
                    results.push(value);
                    ControlFlow::Continue(())
                }
                Step::Skip => ControlFlow::Continue(()),
                Step::Stop => ControlFlow::Break(()),
            })
        })
    }
}

impl<I: TermFrequencyIndex + ?Sized> TermFrequencyIndexExt for I {}

fn convert_batch<D, Q, C, V>(
    to_add: Vec<D>,
    to_delete: Vec<Q>,
    doc_convertor: &C,
    query_convertor: &V,
) -> Result<(Vec<Document>, Vec<Query>)>
where
    C: Convertor<D, Document> + ?Sized,
    V: Convertor<Q, Query> + ?Sized,
{
    let to_add = to_add
        .into_iter()
        .map(|doc| doc_convertor.convert(doc))
        .collect::<Result<Vec<_>>>()?;
    let to_delete = to_delete
        .into_iter()
        .map(|query| query_convertor.convert(query))
        .collect::<Result<Vec<_>>>()?;
    Ok((to_add, to_delete))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::analysis::analyzer::keyword::KeywordAnalyzer;
    use crate::error::ErrorKind;
    use crate::index::storage_index::StorageIndex;

    fn index_with(names: &[&str]) -> StorageIndex {
        let index = StorageIndex::memory(Arc::new(KeywordAnalyzer::new())).unwrap();
        let docs = names
            .iter()
            .map(|name| Document::builder().add_keyword("name", *name).build())
            .collect();
        index.store(docs, vec![], false).unwrap();
        index
    }

    fn name_of(doc: Document) -> Result<String> {
        Ok(doc.get("name").unwrap_or_default().to_string())
    }

    #[test]
    fn test_capabilities() {
        let index = index_with(&[]);
        let caps = index.capabilities();
        assert!(caps.transactional);
        assert!(caps.term_frequencies);
        assert!(index.as_transactional().is_some());
    }

    #[test]
    fn test_query_with_convertor() {
        let index = index_with(&["Foo", "Bar", "Foobar"]);

        let mut results = Vec::new();
        index
            .query(
                &mut results,
                &name_of,
                &FieldSelector::all(),
                None,
                &[Query::prefix("name", "Foo"), Query::term("name", "Foo")],
            )
            .unwrap();
        assert_eq!(results, vec!["Foo".to_string(), "Foobar".to_string()]);
    }

    #[test]
    fn test_query_doc_terms() {
        let index = index_with(&["Foo", "Bar"]);

        let mut results = Vec::new();
        let term_text = |term: Term| -> Result<String> { Ok(term.text) };
        index
            .query_doc_terms(
                &mut results,
                &name_of,
                &term_text,
                &FieldSelector::all(),
                None,
                &[Query::regexp("name", "B.*", true).unwrap()],
            )
            .unwrap();
        assert_eq!(results, vec![("Bar".to_string(), vec!["Bar".to_string()])]);
    }

    #[test]
    fn test_query_terms_stop_and_skip() {
        let index = index_with(&["a", "b", "c", "d"]);

        let mut results = Vec::new();
        let filter = |term: Term| -> Result<Step<String>> {
            Ok(match term.text.as_str() {
                "b" => Step::Skip,
                "d" => Step::Stop,
                _ if term.field != "name" => Step::Skip,
                _ => Step::Emit(term.text),
            })
        };
        index
            .query_terms(&mut results, Some(&Term::field_start("name")), &filter, None)
            .unwrap();
        assert_eq!(results, vec!["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_query_term_frequencies() {
        let index = index_with(&["a", "a", "b"]);

        let mut results = Vec::new();
        let filter = |entry: TermFreq| -> Result<Step<(String, u64)>> {
            if entry.term.field != "name" {
                return Ok(Step::Stop);
            }
            Ok(Step::Emit((entry.term.text, entry.freq)))
        };
        index
            .query_term_frequencies(&mut results, Some(&Term::field_start("name")), &filter, None)
            .unwrap();
        assert_eq!(results, vec![("a".to_string(), 2), ("b".to_string(), 1)]);
    }

    #[test]
    fn test_store_with_failing_convertor_stores_nothing() {
        let index = index_with(&[]);

        let to_doc = |name: &str| -> Result<Document> {
            if name.is_empty() {
                return Err(LucernaError::invalid_argument("empty name"));
            }
            Ok(Document::builder().add_keyword("name", name).build())
        };
        let to_query = |key: &str| -> Result<Query> { Ok(Query::term("name", key)) };

        let err = index
            .store_with(vec!["Foo", ""], Vec::<&str>::new(), &to_doc, &to_query, false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let mut results = Vec::new();
        index
            .query(
                &mut results,
                &name_of,
                &FieldSelector::all(),
                None,
                &[Query::prefix("name", "")],
            )
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_check_cancelled() {
        let flag = AtomicBool::new(false);
        assert!(check_cancelled(Some(&flag)).is_ok());
        flag.store(true, Ordering::Relaxed);
        assert_eq!(
            check_cancelled(Some(&flag)).unwrap_err().kind(),
            ErrorKind::Interrupted
        );
        assert!(check_cancelled(None).is_ok());
    }
}
