//! Client configuration.
//!
//! # Example
//!
//! ```
//! use searchset::{FilterMode, SearchConfig};
//!
//! // Defaults
//! let config = SearchConfig::default();
//! assert_eq!(config.fetch_window, 20);
//!
//! // Full config
//! let config = SearchConfig {
//!     fetch_window: 50,
//!     default_filter: FilterMode::Or,
//! };
//! ```

use serde::Deserialize;

/// Which combinator the generic `filter` chain call uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Criteria accumulate under the required (`must`) combinator.
    #[default]
    And,
    /// Criteria accumulate under the optional (`should`) combinator.
    Or,
}

/// Configuration for result sets created against a backend.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Number of result positions fetched per round trip when an access
    /// leaves the stop unspecified, and the default query window size.
    #[serde(default = "default_fetch_window")]
    pub fetch_window: usize,

    /// Combinator used by the generic `filter` chain call.
    #[serde(default)]
    pub default_filter: FilterMode,
}

fn default_fetch_window() -> usize {
    20
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            fetch_window: default_fetch_window(),
            default_filter: FilterMode::default(),
        }
    }
}
