//! Client-layer error taxonomy.
//!
//! Input validation fails synchronously before any network call; backend
//! failures propagate unchanged except on the soft-fail read paths
//! (`ResultSet::get` / `ResultSet::remove`), which collapse them into an
//! absent result. There is no retry policy at this layer - retries belong to
//! the backend connection or the caller.

use thiserror::Error;

use crate::backend::BackendError;

#[derive(Error, Debug)]
pub enum SearchError {
    /// Inverted range access, rejected before any backend call.
    #[error("invalid range: start {start} is past stop {stop}")]
    InvalidRange { start: usize, stop: usize },

    /// Unrecognized `field__operator` suffix in a filter criterion.
    #[error("unsupported filter operator '{operator}' on field '{field}'")]
    UnsupportedOperator { field: String, operator: String },

    /// Error propagated from the search engine client.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The engine answered, but the response envelope was not the expected
    /// `hits.hits` / `hits.total` shape.
    #[error("malformed backend response: {0}")]
    Response(String),
}
