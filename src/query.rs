//! Backend-neutral query descriptors and the query algebra.
//!
//! - [`term::Term`] / [`term::TermFreq`] - dictionary entries
//! - [`query::Query`] - what an [`Index`](crate::index::Index) evaluates
//! - [`queries::Queries`] - builds queries from a field, a value and a
//!   [`query::QueryKind`], including the camel-case compiler

pub mod queries;
#[allow(clippy::module_inception)]
pub mod query;
pub mod term;
