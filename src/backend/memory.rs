// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-memory search backend.
//!
//! Executes the rendered query DSL against an in-process document store.
//! Supports the full surface the client renders: match-all, `match` /
//! `multi_match` free text, `ids` / `term` / `terms` / `range` filters under
//! `bool.must` / `bool.should`, the function-score envelope, sort specs,
//! `from`/`size` windows, terms facets with facet filters, field projection,
//! preloaded spell suggestions, more-like-this and completion suggest.
//!
//! Every search call is recorded with its pagination window so tests can
//! assert how many round trips a cache actually made, and `fail_backend`
//! turns every subsequent call into a transport error to exercise the
//! soft-fail paths.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Map, Value};

use super::{BackendError, SearchBackend};

/// One recorded `search` round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCall {
    pub index: String,
    pub from: usize,
    pub size: usize,
}

#[derive(Debug, Clone)]
struct StoredDoc {
    id: String,
    doc_type: String,
    body: Map<String, Value>,
}

#[derive(Default)]
struct IndexData {
    schema: Value,
    docs: Vec<StoredDoc>,
}

pub struct MemoryBackend {
    indices: RwLock<HashMap<String, IndexData>>,
    /// Preloaded spell corrections: misspelled term -> ranked candidates.
    suggestions: RwLock<HashMap<String, Vec<String>>>,
    calls: Mutex<Vec<SearchCall>>,
    failing: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            indices: RwLock::new(HashMap::new()),
            suggestions: RwLock::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Seed a document without going through the client.
    pub fn seed(&self, index: &str, doc_type: &str, id: &str, body: Value) {
        let Value::Object(body) = body else {
            panic!("seeded documents must be JSON objects");
        };
        let mut indices = self.indices.write();
        let data = indices.entry(index.to_string()).or_default();
        data.docs.push(StoredDoc {
            id: id.to_string(),
            doc_type: doc_type.to_string(),
            body,
        });
    }

    /// Preload a spell correction used by the suggest section of search
    /// responses: `term` maps to `candidates` ranked best-first.
    pub fn seed_suggestion(&self, term: &str, candidates: Vec<String>) {
        self.suggestions
            .write()
            .insert(term.to_string(), candidates);
    }

    /// Make every subsequent call fail with a transport error.
    pub fn fail_backend(&self, failing: bool) {
        self.failing.store(failing, AtomicOrdering::SeqCst);
    }

    /// Recorded search round trips, in call order.
    pub fn search_calls(&self) -> Vec<SearchCall> {
        self.calls.lock().clone()
    }

    pub fn doc_count(&self, index: &str) -> usize {
        self.indices
            .read()
            .get(index)
            .map(|d| d.docs.len())
            .unwrap_or(0)
    }

    fn check_failing(&self) -> Result<(), BackendError> {
        if self.failing.load(AtomicOrdering::SeqCst) {
            return Err(BackendError::Transport("backend unavailable".to_string()));
        }
        Ok(())
    }

    fn record_call(&self, index: &str, from: usize, size: usize) {
        self.calls.lock().push(SearchCall {
            index: index.to_string(),
            from,
            size,
        });
    }

    /// Pull the effective query and filter out of a rendered body, unwrapping
    /// the function-score envelope when present.
    fn effective_query(body: &Value) -> (Value, Value) {
        let query = body.get("query").cloned().unwrap_or(json!({"match_all": {}}));

        if let Some(envelope) = query.get("function_score") {
            let filtered = envelope
                .get("query")
                .and_then(|q| q.get("filtered"))
                .cloned()
                .unwrap_or(json!({}));
            let inner = filtered
                .get("query")
                .cloned()
                .unwrap_or(json!({"match_all": {}}));
            let filter = filtered.get("filter").cloned().unwrap_or(Value::Null);
            return (inner, filter);
        }

        let filter = body.get("filter").cloned().unwrap_or(Value::Null);
        (query, filter)
    }

    fn matches(doc: &StoredDoc, query: &Value, filter: &Value) -> bool {
        if !eval_query(doc, query) {
            return false;
        }
        match filter.get("bool") {
            Some(bool_block) => eval_bool(doc, bool_block),
            None => true,
        }
    }

    fn matched_docs(
        data: &IndexData,
        doc_type: Option<&str>,
        query: &Value,
        filter: &Value,
    ) -> Vec<StoredDoc> {
        data.docs
            .iter()
            .filter(|doc| doc_type.map_or(true, |dt| doc.doc_type == dt))
            .filter(|doc| Self::matches(doc, query, filter))
            .cloned()
            .collect()
    }

    fn to_hit(doc: &StoredDoc, index: &str, projection: Option<&[String]>) -> Value {
        let mut hit = json!({
            "_index": index,
            "_type": doc.doc_type,
            "_id": doc.id,
            "_score": 1.0,
        });
        match projection {
            Some(fields) => {
                let mut projected = Map::new();
                for field in fields {
                    if let Some(val) = doc.body.get(field) {
                        projected.insert(field.clone(), val.clone());
                    }
                }
                hit["fields"] = Value::Object(projected);
            }
            None => {
                hit["_source"] = Value::Object(doc.body.clone());
            }
        }
        hit
    }

    fn facet_section(facets: &Value, matched: &[StoredDoc]) -> Value {
        let mut section = Map::new();
        let Some(requested) = facets.as_object() else {
            return Value::Object(section);
        };

        for (facet_name, spec) in requested {
            let field = spec
                .get("terms")
                .and_then(|t| t.get("field"))
                .and_then(Value::as_str)
                .unwrap_or(facet_name);

            let facet_filter = spec.get("facet_filter").and_then(|f| f.get("and"));

            // Count term frequencies, preserving first-seen order for ties.
            let mut counts: Vec<(String, u64)> = Vec::new();
            for doc in matched {
                if let Some(fragments) = facet_filter.and_then(Value::as_array) {
                    if !fragments.iter().all(|frag| eval_fragment(doc, frag)) {
                        continue;
                    }
                }
                let Some(val) = doc.body.get(field) else { continue };
                let terms: Vec<String> = match val {
                    Value::Array(items) => items.iter().map(value_as_term).collect(),
                    other => vec![value_as_term(other)],
                };
                for term in terms {
                    match counts.iter_mut().find(|(t, _)| *t == term) {
                        Some((_, c)) => *c += 1,
                        None => counts.push((term, 1)),
                    }
                }
            }
            counts.sort_by(|a, b| b.1.cmp(&a.1));

            let buckets: Vec<Value> = counts
                .into_iter()
                .map(|(term, count)| json!({"term": term, "count": count}))
                .collect();
            section.insert(facet_name.clone(), json!({"terms": buckets}));
        }

        Value::Object(section)
    }

    fn suggest_section(&self, params: &Map<String, Value>) -> Option<(String, Value)> {
        let field = params.get("suggest_field")?.as_str()?.to_string();
        let text = params.get("suggest_text")?.as_str()?.to_string();
        let size = params
            .get("suggest_size")
            .and_then(Value::as_u64)
            .unwrap_or(1) as usize;

        let known = self.suggestions.read();
        let entries: Vec<Value> = text
            .split_whitespace()
            .map(|term| {
                let options: Vec<Value> = known
                    .get(term)
                    .map(|candidates| {
                        candidates
                            .iter()
                            .take(size)
                            .map(|c| json!({"text": c}))
                            .collect()
                    })
                    .unwrap_or_default();
                json!({"text": term, "options": options})
            })
            .collect();

        Some((field, Value::Array(entries)))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    async fn search(
        &self,
        index: &str,
        doc_type: Option<&str>,
        body: &Value,
        params: &Map<String, Value>,
    ) -> Result<Value, BackendError> {
        self.check_failing()?;

        let from = params.get("from").and_then(Value::as_u64).unwrap_or(0) as usize;
        let size = params.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;
        self.record_call(index, from, size);

        let indices = self.indices.read();
        let data = indices
            .get(index)
            .ok_or_else(|| BackendError::IndexNotFound(index.to_string()))?;

        let (query, filter) = Self::effective_query(body);
        let mut matched = Self::matched_docs(data, doc_type, &query, &filter);

        if let Some(sort_spec) = body.get("sort").and_then(Value::as_array) {
            sort_docs(&mut matched, sort_spec);
        }

        let total = matched.len();

        let projection: Option<Vec<String>> = params
            .get("fields")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect());

        let hits: Vec<Value> = matched
            .iter()
            .skip(from)
            .take(size)
            .map(|doc| Self::to_hit(doc, index, projection.as_deref()))
            .collect();

        let mut response = json!({
            "hits": {"total": total, "hits": hits}
        });

        if let Some(facets) = body.get("facets") {
            response["facets"] = Self::facet_section(facets, &matched);
        }

        if let Some((field, entries)) = self.suggest_section(params) {
            response["suggest"] = json!({ field: entries });
        }

        Ok(response)
    }

    async fn mlt(
        &self,
        index: &str,
        doc_type: Option<&str>,
        doc_id: &str,
        fields: &[String],
        _body: &Value,
        options: &Map<String, Value>,
    ) -> Result<Value, BackendError> {
        self.check_failing()?;

        let from = options
            .get("search_from")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        let size = options
            .get("search_size")
            .and_then(Value::as_u64)
            .unwrap_or(10) as usize;
        self.record_call(index, from, size);

        let indices = self.indices.read();
        let data = indices
            .get(index)
            .ok_or_else(|| BackendError::IndexNotFound(index.to_string()))?;

        let seed = data
            .docs
            .iter()
            .find(|d| d.id == doc_id)
            .ok_or_else(|| BackendError::NotFound(doc_id.to_string()))?
            .clone();

        let seed_terms = doc_terms(&seed, fields);
        let matched: Vec<&StoredDoc> = data
            .docs
            .iter()
            .filter(|doc| doc.id != seed.id)
            .filter(|doc| doc_type.map_or(true, |dt| doc.doc_type == dt))
            .filter(|doc| doc_terms(doc, fields).iter().any(|t| seed_terms.contains(t)))
            .collect();

        let total = matched.len();
        let hits: Vec<Value> = matched
            .iter()
            .skip(from)
            .take(size)
            .map(|doc| Self::to_hit(doc, index, None))
            .collect();

        Ok(json!({"hits": {"total": total, "hits": hits}}))
    }

    async fn suggest(&self, body: &Value) -> Result<Value, BackendError> {
        self.check_failing()?;

        let suggest = body.get("suggest").cloned().unwrap_or(Value::Null);
        let text = suggest
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();
        let completion = suggest.get("completion").cloned().unwrap_or(json!({}));
        let field = completion
            .get("field")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let size = completion.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;

        // Prefix completion over every stored document's field value.
        let indices = self.indices.read();
        let mut options: Vec<Value> = Vec::new();
        'indices: for data in indices.values() {
            for doc in &data.docs {
                if let Some(val) = doc.body.get(&field).and_then(Value::as_str) {
                    if val.to_lowercase().starts_with(&text) {
                        options.push(json!({"text": val, "score": 1.0}));
                        if options.len() >= size {
                            break 'indices;
                        }
                    }
                }
            }
        }

        Ok(json!({"suggest": [{"text": text, "options": options}]}))
    }

    async fn get(
        &self,
        index: &str,
        doc_type: Option<&str>,
        doc_id: &str,
        fields: Option<&[String]>,
    ) -> Result<Value, BackendError> {
        self.check_failing()?;

        let indices = self.indices.read();
        let data = indices
            .get(index)
            .ok_or_else(|| BackendError::IndexNotFound(index.to_string()))?;

        let doc = data
            .docs
            .iter()
            .filter(|d| doc_type.map_or(true, |dt| d.doc_type == dt))
            .find(|d| d.id == doc_id)
            .ok_or_else(|| BackendError::NotFound(doc_id.to_string()))?;

        let mut hit = Self::to_hit(doc, index, fields);
        hit["found"] = Value::Bool(true);
        Ok(hit)
    }

    async fn index(
        &self,
        index: &str,
        doc_type: Option<&str>,
        doc_id: &str,
        body: &Value,
    ) -> Result<Value, BackendError> {
        self.check_failing()?;

        let Value::Object(body) = body.clone() else {
            return Err(BackendError::Engine(
                "document body must be a JSON object".to_string(),
            ));
        };
        let doc_type = doc_type.unwrap_or("_doc").to_string();

        let mut indices = self.indices.write();
        let data = indices.entry(index.to_string()).or_default();

        let existing = data
            .docs
            .iter_mut()
            .find(|d| d.id == doc_id && d.doc_type == doc_type);
        let result = match existing {
            Some(doc) => {
                doc.body = body;
                "updated"
            }
            None => {
                data.docs.push(StoredDoc {
                    id: doc_id.to_string(),
                    doc_type,
                    body,
                });
                "created"
            }
        };

        Ok(json!({"_id": doc_id, "result": result}))
    }

    async fn delete(
        &self,
        index: &str,
        doc_type: Option<&str>,
        doc_id: &str,
    ) -> Result<Value, BackendError> {
        self.check_failing()?;

        let mut indices = self.indices.write();
        let data = indices
            .get_mut(index)
            .ok_or_else(|| BackendError::IndexNotFound(index.to_string()))?;

        let before = data.docs.len();
        data.docs
            .retain(|d| !(d.id == doc_id && doc_type.map_or(true, |dt| d.doc_type == dt)));

        if data.docs.len() == before {
            return Err(BackendError::NotFound(doc_id.to_string()));
        }
        Ok(json!({"_id": doc_id, "result": "deleted"}))
    }

    async fn create_index(&self, index: &str, schema: &Value) -> Result<Value, BackendError> {
        self.check_failing()?;

        let mut indices = self.indices.write();
        if indices.contains_key(index) {
            return Err(BackendError::Engine(format!(
                "index already exists: {index}"
            )));
        }
        indices.insert(
            index.to_string(),
            IndexData {
                schema: schema.clone(),
                docs: Vec::new(),
            },
        );
        Ok(json!({"acknowledged": true}))
    }

    async fn delete_index(&self, index: &str) -> Result<Value, BackendError> {
        self.check_failing()?;

        let mut indices = self.indices.write();
        indices
            .remove(index)
            .ok_or_else(|| BackendError::IndexNotFound(index.to_string()))?;
        Ok(json!({"acknowledged": true}))
    }

    async fn index_exists(&self, index: &str) -> Result<bool, BackendError> {
        self.check_failing()?;
        Ok(self.indices.read().contains_key(index))
    }

    async fn get_mapping(
        &self,
        index: &str,
        doc_type: Option<&str>,
    ) -> Result<Value, BackendError> {
        self.check_failing()?;

        let indices = self.indices.read();
        let data = indices
            .get(index)
            .ok_or_else(|| BackendError::IndexNotFound(index.to_string()))?;

        let mappings = data.schema.get("mappings").cloned().unwrap_or(json!({}));
        match doc_type {
            Some(dt) => Ok(json!({ dt: mappings.get(dt).cloned().unwrap_or(json!({})) })),
            None => Ok(mappings),
        }
    }

    async fn get_settings(&self, index: &str) -> Result<Value, BackendError> {
        self.check_failing()?;

        let indices = self.indices.read();
        let data = indices
            .get(index)
            .ok_or_else(|| BackendError::IndexNotFound(index.to_string()))?;
        Ok(data.schema.get("settings").cloned().unwrap_or(json!({})))
    }

    async fn put_settings(&self, index: &str, body: &Value) -> Result<Value, BackendError> {
        self.check_failing()?;

        let mut indices = self.indices.write();
        let data = indices
            .get_mut(index)
            .ok_or_else(|| BackendError::IndexNotFound(index.to_string()))?;

        if data.schema.get("settings").is_none() {
            data.schema["settings"] = json!({});
        }
        if let (Some(settings), Some(updates)) =
            (data.schema["settings"].as_object_mut(), body.as_object())
        {
            for (key, val) in updates {
                settings.insert(key.clone(), val.clone());
            }
        }
        Ok(json!({"acknowledged": true}))
    }

    async fn refresh(&self, index: &str) -> Result<Value, BackendError> {
        self.check_failing()?;
        if !self.indices.read().contains_key(index) {
            return Err(BackendError::IndexNotFound(index.to_string()));
        }
        Ok(json!({"_shards": {"successful": 1, "failed": 0}}))
    }

    async fn stats(&self, index: &str) -> Result<Value, BackendError> {
        self.check_failing()?;

        let indices = self.indices.read();
        let data = indices
            .get(index)
            .ok_or_else(|| BackendError::IndexNotFound(index.to_string()))?;
        Ok(json!({"indices": {index: {"docs": {"count": data.docs.len()}}}}))
    }
}

// Query evaluation helpers.

fn eval_query(doc: &StoredDoc, query: &Value) -> bool {
    if query.get("match_all").is_some() {
        return true;
    }
    if let Some(m) = query.get("match").and_then(Value::as_object) {
        return m.iter().all(|(field, text)| {
            let text = text.as_str().unwrap_or_default();
            if field == "_all" {
                doc.body.values().any(|v| value_contains(v, text))
            } else {
                doc.body.get(field).is_some_and(|v| value_contains(v, text))
            }
        });
    }
    if let Some(mm) = query.get("multi_match") {
        let text = mm.get("query").and_then(Value::as_str).unwrap_or_default();
        let fields = mm.get("fields").and_then(Value::as_array);
        return fields.is_some_and(|fields| {
            fields.iter().filter_map(Value::as_str).any(|field| {
                doc.body.get(field).is_some_and(|v| value_contains(v, text))
            })
        });
    }
    // Term-level nodes (ids/term/terms/range) are legal in query position too.
    eval_fragment(doc, query)
}

fn eval_bool(doc: &StoredDoc, bool_block: &Value) -> bool {
    let must_ok = match bool_block.get("must").and_then(Value::as_array) {
        Some(fragments) => fragments.iter().all(|f| eval_fragment(doc, f)),
        None => true,
    };
    let should_ok = match bool_block.get("should").and_then(Value::as_array) {
        Some(fragments) if !fragments.is_empty() => {
            fragments.iter().any(|f| eval_fragment(doc, f))
        }
        _ => true,
    };
    must_ok && should_ok
}

fn eval_fragment(doc: &StoredDoc, fragment: &Value) -> bool {
    if let Some(ids) = fragment.get("ids") {
        return ids
            .get("values")
            .and_then(Value::as_array)
            .is_some_and(|vals| vals.iter().any(|v| v.as_str() == Some(doc.id.as_str())));
    }
    if let Some(term) = fragment.get("term").and_then(Value::as_object) {
        return term
            .iter()
            .all(|(field, val)| doc.body.get(field).is_some_and(|dv| values_eq(dv, val)));
    }
    if let Some(terms) = fragment.get("terms").and_then(Value::as_object) {
        return terms.iter().all(|(field, vals)| {
            let Some(candidates) = vals.as_array() else { return false };
            doc.body
                .get(field)
                .is_some_and(|dv| candidates.iter().any(|c| values_eq(dv, c)))
        });
    }
    if let Some(range) = fragment.get("range").and_then(Value::as_object) {
        return range.iter().all(|(field, bounds)| {
            let Some(dv) = doc.body.get(field) else { return false };
            let Some(bounds) = bounds.as_object() else { return false };
            bounds.iter().all(|(op, bound)| {
                let ord = cmp_values(dv, bound);
                match op.as_str() {
                    "gt" => ord == Ordering::Greater,
                    "gte" => ord != Ordering::Less,
                    "lt" => ord == Ordering::Less,
                    "lte" => ord != Ordering::Greater,
                    _ => false,
                }
            })
        });
    }
    false
}

fn value_contains(value: &Value, text: &str) -> bool {
    let needle = text.to_lowercase();
    match value {
        Value::String(s) => s.to_lowercase().contains(&needle),
        Value::Array(items) => items.iter().any(|v| value_contains(v, text)),
        other => value_as_term(other).to_lowercase().contains(&needle),
    }
}

fn value_as_term(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn values_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => match (a.as_str(), b.as_str()) {
            (Some(x), Some(y)) => x.cmp(y),
            _ => Ordering::Equal,
        },
    }
}

fn sort_docs(docs: &mut [StoredDoc], sort_spec: &[Value]) {
    docs.sort_by(|a, b| {
        for key in sort_spec {
            let (field, descending) = match key {
                Value::String(f) => (f.as_str(), false),
                Value::Object(m) => match m.iter().next() {
                    Some((f, dir)) => (f.as_str(), dir.as_str() == Some("desc")),
                    None => continue,
                },
                _ => continue,
            };
            let av = a.body.get(field).unwrap_or(&Value::Null);
            let bv = b.body.get(field).unwrap_or(&Value::Null);
            let ord = cmp_values(av, bv);
            let ord = if descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn doc_terms(doc: &StoredDoc, fields: &[String]) -> Vec<String> {
    let mut terms = Vec::new();
    for (field, value) in &doc.body {
        if !fields.is_empty() && !fields.iter().any(|f| f == field) {
            continue;
        }
        if let Value::String(s) = value {
            terms.extend(s.to_lowercase().split_whitespace().map(String::from));
        }
    }
    terms
}
