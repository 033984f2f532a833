// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Result handling.
//!
//! [`ResultSet`] is the chainable facade over a backend: it accumulates query
//! parameters, executes lazily, and caches converted hits sparsely by
//! absolute rank. [`ResultRecord`] is one converted hit; facet and suggestion
//! post-processing lives in [`facets`](self::facets).

pub(crate) mod facets;
pub(crate) mod record;
mod set;

pub use record::{RankedResult, RecordMode, ResultRecord, RESERVED_FIELDS};
pub use set::ResultSet;
