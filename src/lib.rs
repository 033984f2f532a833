//! # searchset
//!
//! A chainable, lazily-evaluated client abstraction over a remote full-text
//! search engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        ResultSet                            │
//! │  • Chainable facade: search / filter / sort / facet / mlt  │
//! │  • Sparse result cache keyed by absolute rank              │
//! │  • Lazy: nothing executes until results are accessed       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       QueryBuilder                          │
//! │  • Accumulates QueryState parameters                       │
//! │  • Pure build(): state → engine JSON DSL                   │
//! │  • Caches hits, totals, facets, suggestions per execution  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 SearchBackend (trait)                       │
//! │  • search / mlt / suggest / get / index / delete           │
//! │  • index administration (create, mappings, settings, ...)  │
//! │  • MemoryBackend: in-process engine for tests              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use searchset::{Criteria, MemoryBackend, ResultSet};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), searchset::SearchError> {
//!     let backend = Arc::new(MemoryBackend::new());
//!
//!     let mut results = ResultSet::new(backend, "content", Some("item"))
//!         .search("red shoes", Some(&["title", "category"]))
//!         .filter_and(Criteria::from([
//!             ("price__lt", json!(100)),
//!             ("category__in", json!(["sneakers", "boots"])),
//!         ]))?
//!         .sort(&["-price"])
//!         .facet("brand");
//!
//!     // Nothing has hit the network yet; iteration executes lazily.
//!     while let Some(hit) = results.try_next().await? {
//!         println!("{:?}", hit);
//!     }
//!     println!("total: {}", results.count().await?);
//!     println!("brands: {:?}", results.facet_counts().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Chainable refinement**: each chain call returns a new value; cloned
//!   branches never observe each other's mutations
//! - **Sparse caching**: an access touching unfilled positions fetches only
//!   the unfilled span; filled slots are never re-fetched
//! - **Operator-suffix filters**: `field__gte`, `field__in`, plain equality,
//!   and `ids`; unknown operators fail fast
//! - **Facets and suggestions**: post-processed into plain maps, riding on
//!   the same request as the search
//! - **Similarity mode**: more-like-this against a seed document
//! - **Schema + reindex**: declarative index schemas and a worker-pool bulk
//!   reindexer
//!
//! ## Modules
//!
//! - [`results`]: the chainable [`ResultSet`] and hit conversion
//! - [`query`]: [`QueryBuilder`] and the criteria mini-language
//! - [`backend`]: the [`SearchBackend`] trait and the in-memory engine
//! - [`schema`]: declarative index schemas
//! - [`reindex`]: worker-pool bulk indexing

pub mod backend;
pub mod config;
pub mod error;
pub mod query;
pub mod reindex;
pub mod results;
pub mod schema;

pub use backend::{BackendError, MemoryBackend, SearchBackend, SearchCall};
pub use config::{FilterMode, SearchConfig};
pub use error::SearchError;
pub use query::{Criteria, QueryBuilder, QueryState, SuggestMode};
pub use reindex::{DateRange, DocumentSource, ReindexStats, Reindexer, SourceDocument};
pub use results::{RankedResult, RecordMode, ResultRecord, ResultSet, RESERVED_FIELDS};
pub use schema::{FieldMapping, IndexSchema};
