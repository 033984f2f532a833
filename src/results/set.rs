// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Chainable, lazily-evaluated result set.
//!
//! A [`ResultSet`] owns a sparse cache of converted hits indexed by absolute
//! rank and a [`QueryBuilder`] it drives on demand. Chain calls consume the
//! set and return a new one; `Clone` deep-copies the query state with a
//! fresh cache, so branches diverging from a common ancestor never observe
//! each other's mutations.
//!
//! # Cache invariants
//!
//! - The cache length is fixed at the total hit count once known; slots only
//!   ever go unfilled -> filled.
//! - An access touching an unfilled slot triggers exactly one fetch covering
//!   the unfilled span inside the requested window; filled slots are reused.
//! - "Full" means the query has executed at least once and no sentinel
//!   remains (or the total is zero).
//!
//! # Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use serde_json::json;
//! # use searchset::{Criteria, MemoryBackend, ResultSet};
//! # async fn example() -> Result<(), searchset::SearchError> {
//! let backend = Arc::new(MemoryBackend::new());
//! let mut results = ResultSet::new(backend, "content", Some("item"))
//!     .search("shoes", Some(&["title", "category"]))
//!     .filter_and(Criteria::from([("price__lt", json!(100))]))?
//!     .sort(&["-price"]);
//!
//! while let Some(hit) = results.try_next().await? {
//!     println!("{:?}", hit);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::backend::SearchBackend;
use crate::config::{FilterMode, SearchConfig};
use crate::error::SearchError;
use crate::query::{Criteria, QueryBuilder, SuggestMode};
use crate::results::record::{convert_hit, RankedResult, RecordMode};

pub struct ResultSet {
    backend: Arc<dyn SearchBackend>,
    config: SearchConfig,
    mode: RecordMode,
    query: QueryBuilder,
    /// Sparse cache: one slot per absolute rank, `None` = not yet fetched.
    cache: Vec<Option<RankedResult>>,
    /// Lowest index that might still be unfilled; advances lazily.
    lowest_unfilled: usize,
    /// Traversal position for `try_next`.
    cursor: usize,
    exhausted: bool,
}

impl fmt::Debug for ResultSet {
    // The backend is a trait object without Debug; everything else prints.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("index", &self.query.index())
            .field("doc_type", &self.query.doc_type())
            .field("mode", &self.mode)
            .field("query", &self.query)
            .field("cached", &self.cache.len())
            .field("cursor", &self.cursor)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl Clone for ResultSet {
    /// Deep-copies the accumulated query parameters and starts with an empty
    /// cache: a cloned branch shares nothing mutable with its ancestor.
    fn clone(&self) -> Self {
        let mut query = self.query.clone();
        query.reset_execution();
        Self {
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
            mode: self.mode,
            query,
            cache: Vec::new(),
            lowest_unfilled: 0,
            cursor: 0,
            exhausted: false,
        }
    }
}

impl ResultSet {
    pub fn new(backend: Arc<dyn SearchBackend>, index: &str, doc_type: Option<&str>) -> Self {
        Self::with_config(backend, index, doc_type, SearchConfig::default())
    }

    pub fn with_config(
        backend: Arc<dyn SearchBackend>,
        index: &str,
        doc_type: Option<&str>,
        config: SearchConfig,
    ) -> Self {
        let query = QueryBuilder::new(index, doc_type.map(String::from), config.fetch_window);
        Self {
            backend,
            config,
            mode: RecordMode::default(),
            query,
            cache: Vec::new(),
            lowest_unfilled: 0,
            cursor: 0,
            exhausted: false,
        }
    }

    /// Select how hits are converted when filling the cache. Fixed per
    /// instance; set it at construction time, before any access.
    pub fn record_mode(mut self, mode: RecordMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn index_name(&self) -> &str {
        self.query.index()
    }

    pub fn doc_type(&self) -> Option<&str> {
        self.query.doc_type()
    }

    /// The DSL the accumulated parameters currently render to.
    pub fn show_query(&self) -> Value {
        self.query.build()
    }

    // ── Chain operations ────────────────────────────────────────────────────
    //
    // Each consumes the set, mutates the owned query state and discards any
    // stale execution results, so a mutated facade can never serve results
    // rendered from an older query.

    /// Set the free-text query; `fields` switches to a multi-field match.
    pub fn search(mut self, text: &str, fields: Option<&[&str]>) -> Self {
        self.query.add_search_query(text, fields);
        self.discard_results();
        self
    }

    /// Add filter criteria under the configured default combinator.
    pub fn filter(self, criteria: impl Into<Criteria>) -> Result<Self, SearchError> {
        match self.config.default_filter {
            FilterMode::And => self.filter_and(criteria),
            FilterMode::Or => self.filter_or(criteria),
        }
    }

    /// Add AND filter criteria (`must` combinator).
    pub fn filter_and(mut self, criteria: impl Into<Criteria>) -> Result<Self, SearchError> {
        self.query.add_filter_and(&criteria.into())?;
        self.discard_results();
        Ok(self)
    }

    /// Add OR filter criteria (`should` combinator).
    pub fn filter_or(mut self, criteria: impl Into<Criteria>) -> Result<Self, SearchError> {
        self.query.add_filter_or(&criteria.into())?;
        self.discard_results();
        Ok(self)
    }

    /// Restrict which source fields come back.
    pub fn only(mut self, fields: &[&str]) -> Self {
        self.query.add_fields(fields);
        self.discard_results();
        self
    }

    /// Ordered sort; `-` prefix sorts descending, argument order is the
    /// tie-break order.
    pub fn sort(mut self, fields: &[&str]) -> Self {
        self.query.add_sort(fields);
        self.discard_results();
        self
    }

    /// Full body override; wins over every accumulated parameter.
    pub fn raw_query(mut self, dsl: Value) -> Self {
        self.query.add_raw_query(dsl);
        self.discard_results();
        self
    }

    /// Top-level request overrides, shallow-merged into the body last.
    pub fn raw_params(mut self, params: Map<String, Value>) -> Self {
        self.query.add_raw_params(params);
        self.discard_results();
        self
    }

    /// Wrap the base query in a scoring-function envelope.
    pub fn function_score(mut self, spec: Map<String, Value>) -> Self {
        self.query.add_function_score(spec);
        self.discard_results();
        self
    }

    /// Register a terms facet on `field`.
    pub fn facet(self, field: &str) -> Self {
        self.facet_with(field, Map::new())
    }

    /// Register a terms facet with extra aggregation options.
    pub fn facet_with(mut self, field: &str, opts: Map<String, Value>) -> Self {
        self.query.add_term_facet(field, &opts);
        self.discard_results();
        self
    }

    /// Attach filter criteria to a facet, auto-creating it if needed.
    pub fn facet_filter(
        mut self,
        field: &str,
        criteria: impl Into<Criteria>,
    ) -> Result<Self, SearchError> {
        self.query.add_term_facet_filter(field, &criteria.into())?;
        self.discard_results();
        Ok(self)
    }

    /// Ride a suggestion request along with the search (mode `missing`,
    /// one candidate per term).
    pub fn suggest(self, text: &str, field: &str) -> Self {
        self.suggest_with(text, field, SuggestMode::Missing, 1)
    }

    pub fn suggest_with(mut self, text: &str, field: &str, mode: SuggestMode, size: usize) -> Self {
        self.query.add_suggestion(text, field, mode, size);
        self.discard_results();
        self
    }

    /// Switch into similarity mode: documents similar to `doc_id`, matched
    /// on `fields` (all fields when empty).
    pub fn mlt(mut self, doc_id: &str, fields: &[&str], options: Map<String, Value>) -> Self {
        self.query.set_mlt(doc_id, fields, options);
        self.discard_results();
        self
    }

    // ── Lazy access ─────────────────────────────────────────────────────────

    /// Total hit count. Triggers execution on first access.
    pub async fn count(&mut self) -> Result<usize, SearchError> {
        if let Some(total) = self.query.total_hits() {
            return Ok(total);
        }
        self.fill_cache(0, self.config.fetch_window).await?;
        self.query
            .total_hits()
            .ok_or_else(|| SearchError::Response("query did not report a total".to_string()))
    }

    /// Fetch the record at one absolute position; `None` past the end.
    pub async fn at(&mut self, position: usize) -> Result<Option<RankedResult>, SearchError> {
        let mut window = self.fetch(position, Some(position + 1)).await?;
        Ok(if window.is_empty() {
            None
        } else {
            Some(window.swap_remove(0))
        })
    }

    /// Fetch the half-open range `[start, stop)`; an unspecified stop
    /// defaults to one fetch window past `start`. Touching an unfilled slot
    /// triggers exactly one backend fetch covering the unfilled span inside
    /// the window; already-filled slots are served from cache.
    pub async fn fetch(
        &mut self,
        start: usize,
        stop: Option<usize>,
    ) -> Result<Vec<RankedResult>, SearchError> {
        let stop = stop.unwrap_or_else(|| start + self.config.fetch_window);
        if stop < start {
            return Err(SearchError::InvalidRange { start, stop });
        }

        // An empty cache with a known total means zero hits; a cache can only
        // be empty otherwise while the total is still unknown.
        if self.cache.is_empty() && self.query.total_hits().is_none() {
            self.fill_cache(start, stop).await?;
        } else if let Some((gap_start, gap_stop)) = self.unfilled_span(start, stop) {
            self.fill_cache(gap_start, gap_stop).await?;
        }

        let lo = start.min(self.cache.len());
        let hi = stop.min(self.cache.len());
        Ok(self.cache[lo..hi].iter().flatten().cloned().collect())
    }

    /// Next record in rank order. Replays from cache when possible,
    /// otherwise fetches the next window. After the sequence is exhausted it
    /// stays exhausted until [`reset`](Self::reset).
    pub async fn try_next(&mut self) -> Result<Option<RankedResult>, SearchError> {
        if self.exhausted {
            return Ok(None);
        }
        loop {
            if self.cursor < self.cache.len() {
                if let Some(item) = self.cache[self.cursor].clone() {
                    self.cursor += 1;
                    return Ok(Some(item));
                }
            }
            if self.cache_is_full() {
                self.exhausted = true;
                return Ok(None);
            }
            let start = self.cursor;
            if !self.fill_cache(start, start + self.config.fetch_window).await? {
                // Nothing more available even though the bound is higher.
                self.exhausted = true;
                return Ok(None);
            }
        }
    }

    /// Drain the remaining traversal into a vector.
    pub async fn to_vec(&mut self) -> Result<Vec<RankedResult>, SearchError> {
        let mut all = Vec::new();
        while let Some(item) = self.try_next().await? {
            all.push(item);
        }
        Ok(all)
    }

    /// Discard the cache and execution results for a fresh hit; accumulated
    /// query parameters survive.
    pub fn reset(&mut self) {
        self.query.reset_execution();
        self.discard_results();
    }

    /// Facet counts, keyed by facet field, buckets in engine order.
    /// Triggers execution on first access; the hits that rode along are
    /// absorbed into the cache so a later record access reuses them.
    pub async fn facet_counts(
        &mut self,
    ) -> Result<HashMap<String, Vec<(String, u64)>>, SearchError> {
        self.query.ensure_executed(&*self.backend).await?;
        self.absorb_hits()?;
        Ok(self.query.facet_counts().cloned().unwrap_or_default())
    }

    /// Suggestions keyed by original term; `None` marks "no suggestion".
    /// Triggers execution on first access; the hits that rode along are
    /// absorbed into the cache so a later record access reuses them.
    pub async fn get_suggestions(
        &mut self,
    ) -> Result<HashMap<String, Option<String>>, SearchError> {
        self.query.ensure_executed(&*self.backend).await?;
        self.absorb_hits()?;
        Ok(self.query.suggestions().cloned().unwrap_or_default())
    }

    /// Completion-style autocomplete. Independent of the accumulated query;
    /// always issues a fresh network call, never cached.
    pub async fn autocomplete(
        &self,
        text: &str,
        field: &str,
        size: usize,
    ) -> Result<Value, SearchError> {
        let body = json!({
            "suggest": {
                "text": text,
                "completion": {"field": field, "fuzzy": true, "size": size}
            }
        });
        Ok(self.backend.suggest(&body).await?)
    }

    // ── Document operations ─────────────────────────────────────────────────

    /// Create or update a document. Backend errors propagate.
    pub async fn index(&self, doc_id: &str, body: &Value) -> Result<Value, SearchError> {
        Ok(self
            .backend
            .index(self.query.index(), self.query.doc_type(), doc_id, body)
            .await?)
    }

    /// Delete a document. Backend errors are swallowed: `None` stands in for
    /// both "deleted nothing" and "backend failed".
    pub async fn remove(&self, doc_id: &str) -> Option<Value> {
        match self
            .backend
            .delete(self.query.index(), self.query.doc_type(), doc_id)
            .await
        {
            Ok(response) => Some(response),
            Err(err) => {
                debug!(index = %self.query.index(), doc_id, %err, "remove swallowed backend error");
                None
            }
        }
    }

    /// Fetch a single document. Absence and backend failure both collapse to
    /// `None`.
    pub async fn get(&self, doc_id: &str, fields: Option<&[String]>) -> Option<RankedResult> {
        match self
            .backend
            .get(self.query.index(), self.query.doc_type(), doc_id, fields)
            .await
        {
            Ok(hit) => convert_hit(self.query.index(), &hit, self.mode).ok(),
            Err(err) => {
                debug!(index = %self.query.index(), doc_id, %err, "get collapsed to absent");
                None
            }
        }
    }

    // ── Index administration ────────────────────────────────────────────────
    //
    // Thin pass-throughs; backend errors propagate.

    pub async fn create_index(&self, schema: &Value) -> Result<Value, SearchError> {
        Ok(self.backend.create_index(self.query.index(), schema).await?)
    }

    pub async fn delete_index(&self) -> Result<Value, SearchError> {
        Ok(self.backend.delete_index(self.query.index()).await?)
    }

    pub async fn check_index(&self) -> Result<bool, SearchError> {
        Ok(self.backend.index_exists(self.query.index()).await?)
    }

    pub async fn get_mapping(&self) -> Result<Value, SearchError> {
        Ok(self
            .backend
            .get_mapping(self.query.index(), self.query.doc_type())
            .await?)
    }

    pub async fn get_settings(&self) -> Result<Value, SearchError> {
        Ok(self.backend.get_settings(self.query.index()).await?)
    }

    pub async fn update_settings(&self, body: &Value) -> Result<Value, SearchError> {
        Ok(self.backend.put_settings(self.query.index(), body).await?)
    }

    pub async fn refresh_index(&self) -> Result<Value, SearchError> {
        Ok(self.backend.refresh(self.query.index()).await?)
    }

    pub async fn get_stats(&self) -> Result<Value, SearchError> {
        Ok(self.backend.stats(self.query.index()).await?)
    }

    // ── Cache internals ─────────────────────────────────────────────────────

    fn discard_results(&mut self) {
        self.query.reset_execution();
        self.cache.clear();
        self.lowest_unfilled = 0;
        self.cursor = 0;
        self.exhausted = false;
    }

    /// First index that might be unfilled; exact, advances lazily.
    fn first_gap(&mut self) -> usize {
        while self.lowest_unfilled < self.cache.len()
            && self.cache[self.lowest_unfilled].is_some()
        {
            self.lowest_unfilled += 1;
        }
        self.lowest_unfilled
    }

    /// Full ⇔ executed at least once and no sentinel remains (or total 0).
    fn cache_is_full(&mut self) -> bool {
        if !self.query.has_run() {
            return false;
        }
        match self.query.total_hits() {
            Some(0) => true,
            _ => !self.cache.is_empty() && self.first_gap() == self.cache.len(),
        }
    }

    /// The minimal span covering the unfilled slots within `[start, stop)`,
    /// or `None` when the whole window is already served from cache.
    fn unfilled_span(&self, start: usize, stop: usize) -> Option<(usize, usize)> {
        if self.cache.is_empty() {
            return None;
        }
        let hi = stop.min(self.cache.len());
        let mut gaps = (start..hi).filter(|&i| self.cache[i].is_none());
        let first = gaps.next()?;
        let last = gaps.last().unwrap_or(first);
        Some((first, last + 1))
    }

    /// Fetch the window `[start, end)` from the backend and absorb the hits.
    /// Returns false when the backend had nothing more to give for this
    /// window.
    async fn fill_cache(&mut self, start: usize, end: usize) -> Result<bool, SearchError> {
        self.query.reset_execution();
        self.query.set_limits(start, end);
        self.query.ensure_executed(&*self.backend).await?;

        let filled = self.absorb_hits()?;
        if !filled {
            debug!(
                index = %self.query.index(),
                start,
                end,
                "window fetch returned nothing"
            );
        }
        Ok(filled)
    }

    /// Write the last execution's hits into the cache at their absolute
    /// positions, allocating it to the full total the first time the total is
    /// known. Idempotent: filled slots are never overwritten. Returns false
    /// when the execution carried no hits. Every execution path flows through
    /// here, so hits are never fetched and then lost.
    fn absorb_hits(&mut self) -> Result<bool, SearchError> {
        if self.cache.is_empty() {
            let total = self.query.total_hits().unwrap_or(0);
            self.cache = vec![None; total];
            self.lowest_unfilled = 0;
        }

        let hits = self.query.hits().to_vec();
        if hits.is_empty() {
            return Ok(false);
        }

        let start = self.query.state().offset;
        debug!(
            index = %self.query.index(),
            start,
            fetched = hits.len(),
            cached = self.cache.len(),
            "filling cache window"
        );
        for (offset, hit) in hits.iter().enumerate() {
            let pos = start + offset;
            if pos >= self.cache.len() {
                break;
            }
            if self.cache[pos].is_none() {
                self.cache[pos] = Some(convert_hit(self.query.index(), hit, self.mode)?);
            }
        }
        Ok(true)
    }
}
