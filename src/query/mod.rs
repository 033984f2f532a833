// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Query DSL building.
//!
//! [`QueryState`] accumulates search / filter / sort / facet / suggestion /
//! similarity parameters; [`QueryBuilder`] owns a state, renders it into the
//! engine's JSON DSL with a pure `build()`, and caches execution results.
//! [`Criteria`] carries filter criteria whose keys use the
//! `field__operator` suffix convention.

mod builder;
mod criteria;
mod state;

pub use builder::QueryBuilder;
pub use criteria::Criteria;
pub use state::{MltState, QueryState, SuggestMode};
