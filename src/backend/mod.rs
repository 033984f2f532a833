//! Search engine backend seam.
//!
//! The engine wire client is an external collaborator: anything that can
//! execute `search` / `mlt` / `suggest` / document writes / index-admin calls
//! and speak the engine's JSON envelopes can sit behind [`SearchBackend`].
//! The crate ships [`MemoryBackend`], an in-process implementation that
//! executes the rendered DSL against an in-memory document store - useful for
//! tests and for exercising the client without a running engine.

pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use memory::{MemoryBackend, SearchCall};

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("index not found: {0}")]
    IndexNotFound(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("engine error: {0}")]
    Engine(String),
}

/// Wire client contract for the remote search engine.
///
/// All bodies and responses are JSON-like mappings in the engine's native
/// shapes: queries render to the DSL described in the crate docs, search
/// responses carry `hits.hits` / `hits.total` plus optional `facets` and
/// `suggest` sections. `params` are top-level request parameters transmitted
/// alongside the body (`from`, `size`, `fields`, `suggest_*`).
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Execute a search request against an index.
    async fn search(
        &self,
        index: &str,
        doc_type: Option<&str>,
        body: &Value,
        params: &Map<String, Value>,
    ) -> Result<Value, BackendError>;

    /// Execute a more-like-this request seeded by a document id.
    async fn mlt(
        &self,
        index: &str,
        doc_type: Option<&str>,
        doc_id: &str,
        fields: &[String],
        body: &Value,
        options: &Map<String, Value>,
    ) -> Result<Value, BackendError>;

    /// Execute a standalone suggest request (completion-style).
    async fn suggest(&self, body: &Value) -> Result<Value, BackendError>;

    /// Fetch a single document by id. `fields` restricts the returned payload
    /// to a projection; `None` returns the full source.
    async fn get(
        &self,
        index: &str,
        doc_type: Option<&str>,
        doc_id: &str,
        fields: Option<&[String]>,
    ) -> Result<Value, BackendError>;

    /// Create or update a document.
    async fn index(
        &self,
        index: &str,
        doc_type: Option<&str>,
        doc_id: &str,
        body: &Value,
    ) -> Result<Value, BackendError>;

    /// Delete a document.
    async fn delete(
        &self,
        index: &str,
        doc_type: Option<&str>,
        doc_id: &str,
    ) -> Result<Value, BackendError>;

    // Index administration.

    async fn create_index(&self, index: &str, schema: &Value) -> Result<Value, BackendError>;

    async fn delete_index(&self, index: &str) -> Result<Value, BackendError>;

    async fn index_exists(&self, index: &str) -> Result<bool, BackendError>;

    async fn get_mapping(
        &self,
        index: &str,
        doc_type: Option<&str>,
    ) -> Result<Value, BackendError>;

    async fn get_settings(&self, index: &str) -> Result<Value, BackendError>;

    async fn put_settings(&self, index: &str, body: &Value) -> Result<Value, BackendError>;

    async fn refresh(&self, index: &str) -> Result<Value, BackendError>;

    async fn stats(&self, index: &str) -> Result<Value, BackendError>;
}
