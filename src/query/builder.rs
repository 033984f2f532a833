// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Query builder - accumulates [`QueryState`] and renders the engine DSL.
//!
//! `build()` is a pure function of the accumulated state; executing the
//! query caches the raw hits, total count and post-processed facet and
//! suggestion structures until `reset_execution()` discards them. Resetting
//! execution never touches the accumulated parameters.
//!
//! # Rendered shape
//!
//! ```text
//! {
//!   "query":  <match_all | match | multi_match | function_score envelope>,
//!   "filter": {"bool": {"must": [...], "should": [...]}},
//!   "facets": {field: {"terms": {...}, "facet_filter": {"and": [...]}}},
//!   "sort":   ["title", {"price": "desc"}],
//!   ...raw top-level params merged last
//! }
//! ```
//!
//! With a function score, the filters move inside an explicit
//! `function_score.query.filtered.{query,filter}` envelope that the renderer
//! builds itself, so the nested shape is structurally guaranteed rather than
//! positionally assumed. A raw query override short-circuits everything.

use std::collections::HashMap;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::backend::SearchBackend;
use crate::error::SearchError;
use crate::query::criteria::{parse_criteria, Criteria};
use crate::query::state::{MltState, QueryState, SuggestMode};
use crate::results::facets::{process_facets, process_suggestions};

/// Cached results of the last execution.
#[derive(Debug, Clone, Default)]
struct ExecState {
    hits: Option<Vec<Value>>,
    total: Option<usize>,
    facet_counts: Option<HashMap<String, Vec<(String, u64)>>>,
    suggestions: Option<HashMap<String, Option<String>>>,
}

/// Renders and executes queries against one index / doc type pair.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    index: String,
    doc_type: Option<String>,
    state: QueryState,
    exec: ExecState,
}

impl QueryBuilder {
    pub fn new(index: impl Into<String>, doc_type: Option<String>, default_size: usize) -> Self {
        Self {
            index: index.into(),
            doc_type,
            state: QueryState::new(default_size),
            exec: ExecState::default(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn doc_type(&self) -> Option<&str> {
        self.doc_type.as_deref()
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    // ── Mutation ────────────────────────────────────────────────────────────

    /// Set the free-text query. With `fields` this renders a multi-field
    /// match with lenient type coercion, otherwise a match against the
    /// engine's all-fields pseudo-field.
    pub fn add_search_query(&mut self, text: &str, fields: Option<&[&str]>) {
        self.state.search_terms = Some(match fields {
            Some(fields) => json!({
                "multi_match": {"query": text, "fields": fields, "lenient": true}
            }),
            None => json!({"match": {"_all": text}}),
        });
    }

    /// Accumulate AND criteria under the `must` combinator.
    pub fn add_filter_and(&mut self, criteria: &Criteria) -> Result<(), SearchError> {
        let fragments = parse_criteria(criteria)?;
        self.state.filter_and.extend(fragments);
        Ok(())
    }

    /// Accumulate OR criteria under the `should` combinator.
    pub fn add_filter_or(&mut self, criteria: &Criteria) -> Result<(), SearchError> {
        let fragments = parse_criteria(criteria)?;
        self.state.filter_or.extend(fragments);
        Ok(())
    }

    /// Restrict which source fields come back (projection).
    pub fn add_fields(&mut self, fields: &[&str]) {
        self.state
            .params
            .insert("fields".to_string(), json!(fields));
    }

    /// Ordered sort spec; a `-` prefix sorts that field descending. Argument
    /// order is the tie-break order.
    pub fn add_sort(&mut self, fields: &[&str]) {
        let sort = fields
            .iter()
            .map(|field| match field.strip_prefix('-') {
                Some(name) => json!({ name: "desc" }),
                None => json!(field),
            })
            .collect();
        self.state.sort = Some(sort);
    }

    /// Register a terms aggregation on `field`; extra option keys are merged
    /// into the aggregation's parameters.
    pub fn add_term_facet(&mut self, field: &str, opts: &Map<String, Value>) {
        let mut terms = Map::new();
        terms.insert("field".to_string(), json!(field));
        for (key, val) in opts {
            terms.insert(key.clone(), val.clone());
        }
        let spec = json!({ "terms": terms });

        match self.state.facet_mut(field) {
            Some(existing) => *existing = spec,
            None => self.state.facets.push((field.to_string(), spec)),
        }
    }

    /// Attach a filter to an existing (or auto-created) facet. Criteria use
    /// the same operator-suffix rule as filters and AND together within the
    /// facet's own filter.
    pub fn add_term_facet_filter(
        &mut self,
        field: &str,
        criteria: &Criteria,
    ) -> Result<(), SearchError> {
        let fragments = parse_criteria(criteria)?;

        if self.state.facet_mut(field).is_none() {
            self.add_term_facet(field, &Map::new());
        }
        if let Some(obj) = self.state.facet_mut(field).and_then(Value::as_object_mut) {
            let filter = obj
                .entry("facet_filter".to_string())
                .or_insert_with(|| json!({"and": []}));
            if let Some(and) = filter.get_mut("and").and_then(Value::as_array_mut) {
                and.extend(fragments);
            }
        }
        Ok(())
    }

    /// Wrap the eventual base query in a scoring-function envelope.
    pub fn add_function_score(&mut self, spec: Map<String, Value>) {
        self.state.function_score = Some(spec);
    }

    /// Full body override: wins over every other accumulated parameter.
    pub fn add_raw_query(&mut self, dsl: Value) {
        self.state.raw_query = Some(dsl);
    }

    /// Top-level overrides shallow-merged into the rendered body last; can
    /// add or replace any top-level key.
    pub fn add_raw_params(&mut self, params: Map<String, Value>) {
        self.state.raw_params = Some(params);
    }

    /// Register a suggestion request riding alongside the search.
    pub fn add_suggestion(&mut self, text: &str, field: &str, mode: SuggestMode, size: usize) {
        let params = &mut self.state.params;
        params.insert("suggest_text".to_string(), json!(text));
        params.insert("suggest_field".to_string(), json!(field));
        params.insert("suggest_mode".to_string(), json!(mode.as_str()));
        params.insert("suggest_size".to_string(), json!(size));
        self.state.suggest_field = Some(field.to_string());
    }

    /// Switch into similarity mode keyed by a seed document id.
    pub fn set_mlt(&mut self, doc_id: &str, fields: &[&str], options: Map<String, Value>) {
        self.state.mlt = Some(MltState {
            doc_id: doc_id.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            options,
        });
    }

    /// Restrict the pagination window to `[start, stop)`.
    pub fn set_limits(&mut self, start: usize, stop: usize) {
        self.state.offset = start;
        self.state.size = stop.saturating_sub(start);
    }

    // ── Rendering ───────────────────────────────────────────────────────────

    /// Render the accumulated state into the engine DSL. Pure: calling this
    /// twice without mutation yields an identical structure.
    pub fn build(&self) -> Value {
        if let Some(raw) = &self.state.raw_query {
            return raw.clone();
        }

        let base = self
            .state
            .search_terms
            .clone()
            .unwrap_or_else(|| json!({"match_all": {}}));

        let mut bool_block = Map::new();
        if !self.state.filter_and.is_empty() {
            bool_block.insert("must".to_string(), json!(self.state.filter_and));
        }
        if !self.state.filter_or.is_empty() {
            bool_block.insert("should".to_string(), json!(self.state.filter_or));
        }

        let mut body = Map::new();
        match &self.state.function_score {
            Some(score_spec) => {
                // Explicit filtered envelope: filters go inside the wrapped
                // query, and the shape exists whether or not filters do.
                let mut filtered = Map::new();
                filtered.insert("query".to_string(), base);
                if !bool_block.is_empty() {
                    filtered.insert("filter".to_string(), json!({ "bool": bool_block }));
                }
                let mut envelope = Map::new();
                envelope.insert("query".to_string(), json!({ "filtered": filtered }));
                for (key, val) in score_spec {
                    envelope.insert(key.clone(), val.clone());
                }
                body.insert("query".to_string(), json!({ "function_score": envelope }));
            }
            None => {
                body.insert("query".to_string(), base);
                if !bool_block.is_empty() {
                    body.insert("filter".to_string(), json!({ "bool": bool_block }));
                }
            }
        }

        if !self.state.facets.is_empty() {
            let mut facets = Map::new();
            for (name, spec) in &self.state.facets {
                facets.insert(name.clone(), spec.clone());
            }
            body.insert("facets".to_string(), Value::Object(facets));
        }

        if let Some(sort) = &self.state.sort {
            body.insert("sort".to_string(), json!(sort));
        }

        if let Some(raw_params) = &self.state.raw_params {
            for (key, val) in raw_params {
                body.insert(key.clone(), val.clone());
            }
        }

        Value::Object(body)
    }

    // ── Execution ───────────────────────────────────────────────────────────

    /// Whether the query has executed since the last reset.
    pub fn has_run(&self) -> bool {
        self.exec.total.is_some()
    }

    /// Discard cached execution results (hits, total, facet counts,
    /// suggestions). Accumulated query parameters are untouched.
    pub fn reset_execution(&mut self) {
        self.exec = ExecState::default();
    }

    /// Execute if not yet run, dispatching to the similarity endpoint when
    /// MLT mode is active.
    pub async fn ensure_executed(
        &mut self,
        backend: &dyn SearchBackend,
    ) -> Result<(), SearchError> {
        if self.has_run() {
            return Ok(());
        }
        if self.state.mlt.is_some() {
            self.run_mlt(backend).await
        } else {
            self.run(backend).await
        }
    }

    /// Execute the standard search request.
    pub async fn run(&mut self, backend: &dyn SearchBackend) -> Result<(), SearchError> {
        let body = self.build();
        let mut params = self.state.params.clone();
        params.insert("from".to_string(), json!(self.state.offset));
        params.insert("size".to_string(), json!(self.state.size));

        debug!(
            index = %self.index,
            from = self.state.offset,
            size = self.state.size,
            "executing search"
        );
        let response = backend
            .search(&self.index, self.doc_type.as_deref(), &body, &params)
            .await?;
        self.capture(response)
    }

    /// Execute the similarity (more-like-this) request. Pagination rides in
    /// the MLT option bag under its own parameter names.
    pub async fn run_mlt(&mut self, backend: &dyn SearchBackend) -> Result<(), SearchError> {
        let mlt = self
            .state
            .mlt
            .clone()
            .ok_or_else(|| SearchError::Response("similarity mode not configured".to_string()))?;

        let body = self.build();
        let mut options = mlt.options.clone();
        options.insert("search_from".to_string(), json!(self.state.offset));
        options.insert("search_size".to_string(), json!(self.state.size));

        debug!(index = %self.index, doc_id = %mlt.doc_id, "executing more-like-this");
        let response = backend
            .mlt(
                &self.index,
                self.doc_type.as_deref(),
                &mlt.doc_id,
                &mlt.fields,
                &body,
                &options,
            )
            .await?;
        self.capture(response)
    }

    fn capture(&mut self, response: Value) -> Result<(), SearchError> {
        let hits = response
            .get("hits")
            .and_then(|h| h.get("hits"))
            .and_then(Value::as_array)
            .ok_or_else(|| SearchError::Response("missing hits.hits".to_string()))?
            .clone();

        let total = response.get("hits").and_then(|h| h.get("total"));
        let total = total
            .and_then(Value::as_u64)
            .or_else(|| total.and_then(|t| t.get("value")).and_then(Value::as_u64))
            .ok_or_else(|| SearchError::Response("missing hits.total".to_string()))?;

        self.exec.facet_counts = Some(process_facets(response.get("facets")));
        self.exec.suggestions = process_suggestions(
            response.get("suggest"),
            self.state.suggest_field.as_deref(),
        );
        self.exec.hits = Some(hits);
        self.exec.total = Some(total as usize);
        Ok(())
    }

    // ── Cached result access ────────────────────────────────────────────────

    /// Raw hits from the last execution (empty when not run).
    pub fn hits(&self) -> &[Value] {
        self.exec.hits.as_deref().unwrap_or(&[])
    }

    /// Total hit count from the last execution.
    pub fn total_hits(&self) -> Option<usize> {
        self.exec.total
    }

    /// Post-processed facet counts from the last execution.
    pub fn facet_counts(&self) -> Option<&HashMap<String, Vec<(String, u64)>>> {
        self.exec.facet_counts.as_ref()
    }

    /// Post-processed suggestions from the last execution; `None` per term
    /// marks "no suggestion".
    pub fn suggestions(&self) -> Option<&HashMap<String, Option<String>>> {
        self.exec.suggestions.as_ref()
    }
}
