// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Accumulated query parameters.
//!
//! `QueryState` is a plain value object: `Clone` is a deep copy, which is
//! what gives chained result sets true branch isolation. Rendering lives in
//! the builder; nothing here touches the network.

use serde_json::{Map, Value};

/// Suggest mode transmitted with the suggestion request parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuggestMode {
    /// Only suggest for terms missing from the index.
    #[default]
    Missing,
    /// Suggest more popular alternatives even for terms that exist.
    Popular,
    /// Always suggest.
    Always,
}

impl SuggestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestMode::Missing => "missing",
            SuggestMode::Popular => "popular",
            SuggestMode::Always => "always",
        }
    }
}

/// Similarity-query (more-like-this) parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MltState {
    /// Seed document id.
    pub doc_id: String,
    /// Fields to match on; empty means all.
    pub fields: Vec<String>,
    /// Extra options merged into the MLT request's option bag.
    pub options: Map<String, Value>,
}

/// Everything the builder has accumulated so far.
///
/// Invariant: when `raw_query` is set, every other body-affecting field is
/// ignored at render time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryState {
    /// Free-text query fragment (a `match` or `multi_match` node).
    pub search_terms: Option<Value>,
    /// AND filter fragments, accumulated under the `must` combinator.
    pub filter_and: Vec<Value>,
    /// OR filter fragments, accumulated under the `should` combinator.
    pub filter_or: Vec<Value>,
    /// Top-level request parameters (`fields`, `suggest_*`).
    pub params: Map<String, Value>,
    /// Function-score envelope contents (scoring functions, boost modes).
    pub function_score: Option<Map<String, Value>>,
    /// Facet requests in registration order: facet name -> aggregation spec.
    pub facets: Vec<(String, Value)>,
    /// Rendered sort spec (field names or `{field: "desc"}` objects).
    pub sort: Option<Vec<Value>>,
    /// Full body override; wins over everything else.
    pub raw_query: Option<Value>,
    /// Top-level overrides shallow-merged into the rendered body last.
    pub raw_params: Option<Map<String, Value>>,
    /// Pagination window.
    pub offset: usize,
    pub size: usize,
    /// Similarity mode, when set execution goes through the MLT endpoint.
    pub mlt: Option<MltState>,
    /// Field the suggestion request was registered against.
    pub suggest_field: Option<String>,
}

impl QueryState {
    pub fn new(default_size: usize) -> Self {
        Self {
            size: default_size,
            ..Default::default()
        }
    }

    /// Look up a registered facet spec by name.
    pub fn facet_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.facets
            .iter_mut()
            .find(|(name, _)| name == field)
            .map(|(_, spec)| spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clone_is_deep() {
        let mut state = QueryState::new(20);
        state.filter_and.push(json!({"term": {"a": 1}}));

        let mut branch = state.clone();
        branch.filter_and.push(json!({"term": {"b": 2}}));

        assert_eq!(state.filter_and.len(), 1);
        assert_eq!(branch.filter_and.len(), 2);
    }

    #[test]
    fn test_suggest_mode_wire_values() {
        assert_eq!(SuggestMode::Missing.as_str(), "missing");
        assert_eq!(SuggestMode::Popular.as_str(), "popular");
        assert_eq!(SuggestMode::Always.as_str(), "always");
    }
}
