// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Index schema declaration.
//!
//! [`IndexSchema`] assembles the settings-and-mappings document an index is
//! created with: shard and replica counts, named analyzers (a tokenizer plus
//! an ordered filter chain), and per-doc-type field mappings built from
//! [`FieldMapping`] values.
//!
//! # Example
//!
//! ```
//! use searchset::{FieldMapping, IndexSchema};
//!
//! let schema = IndexSchema::new("content")
//!     .shards(1)
//!     .replicas(1)
//!     .analyzer("folded", "standard", &["standard", "lowercase", "stop", "porter_stem"])
//!     .mapping("item", [
//!         ("title", FieldMapping::text().store().analyzer("folded").boost(8.0)),
//!         ("url", FieldMapping::text().store().not_indexed()),
//!         ("price", FieldMapping::new("float").store()),
//!     ]);
//!
//! let body = schema.build();
//! assert_eq!(body["settings"]["number_of_shards"], 1);
//! assert_eq!(body["mappings"]["item"]["properties"]["title"]["boost"], 8.0);
//! ```

use serde_json::{json, Map, Value};

/// One field's mapping entry.
#[derive(Debug, Clone, Default)]
pub struct FieldMapping {
    field_type: String,
    store: bool,
    indexed: bool,
    analyzer: Option<String>,
    boost: Option<f64>,
}

impl FieldMapping {
    pub fn new(field_type: impl Into<String>) -> Self {
        Self {
            field_type: field_type.into(),
            store: false,
            indexed: true,
            analyzer: None,
            boost: None,
        }
    }

    /// Shorthand for the full-text string type.
    pub fn text() -> Self {
        Self::new("string")
    }

    /// Store the field value so projections can return it directly.
    pub fn store(mut self) -> Self {
        self.store = true;
        self
    }

    /// Exclude the field from the inverted index (stored-only fields).
    pub fn not_indexed(mut self) -> Self {
        self.indexed = false;
        self
    }

    /// Analyze the field with a named analyzer from the schema's analysis
    /// section.
    pub fn analyzer(mut self, name: impl Into<String>) -> Self {
        self.analyzer = Some(name.into());
        self
    }

    /// Relevance boost applied at index time.
    pub fn boost(mut self, boost: f64) -> Self {
        self.boost = Some(boost);
        self
    }

    fn render(&self) -> Value {
        let mut entry = Map::new();
        entry.insert("type".to_string(), json!(self.field_type));
        if self.store {
            entry.insert("store".to_string(), json!("yes"));
        }
        if !self.indexed {
            entry.insert("index".to_string(), json!("no"));
        }
        if let Some(analyzer) = &self.analyzer {
            entry.insert("analyzer".to_string(), json!(analyzer));
        }
        if let Some(boost) = self.boost {
            entry.insert("boost".to_string(), json!(boost));
        }
        Value::Object(entry)
    }
}

/// Declarative index schema: settings, analyzers and doc-type mappings.
#[derive(Debug, Clone)]
pub struct IndexSchema {
    name: String,
    shards: u32,
    replicas: u32,
    /// (name, tokenizer, filter chain), in declaration order.
    analyzers: Vec<(String, String, Vec<String>)>,
    /// (doc type, ordered field mappings), in declaration order.
    mappings: Vec<(String, Vec<(String, FieldMapping)>)>,
}

impl IndexSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shards: 1,
            replicas: 1,
            analyzers: Vec::new(),
            mappings: Vec::new(),
        }
    }

    /// The index name this schema describes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Doc types this schema declares mappings for, in declaration order.
    pub fn doc_types(&self) -> Vec<&str> {
        self.mappings.iter().map(|(dt, _)| dt.as_str()).collect()
    }

    pub fn shards(mut self, shards: u32) -> Self {
        self.shards = shards;
        self
    }

    pub fn replicas(mut self, replicas: u32) -> Self {
        self.replicas = replicas;
        self
    }

    /// Declare a named analyzer: a tokenizer plus an ordered token filter
    /// chain.
    pub fn analyzer(mut self, name: &str, tokenizer: &str, filters: &[&str]) -> Self {
        self.analyzers.push((
            name.to_string(),
            tokenizer.to_string(),
            filters.iter().map(|f| f.to_string()).collect(),
        ));
        self
    }

    /// Declare the field mappings for one doc type.
    pub fn mapping<I, K>(mut self, doc_type: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldMapping)>,
        K: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(name, mapping)| (name.into(), mapping))
            .collect();
        self.mappings.push((doc_type.to_string(), fields));
        self
    }

    /// Render the creation document.
    pub fn build(&self) -> Value {
        let mut settings = Map::new();
        settings.insert("number_of_shards".to_string(), json!(self.shards));
        settings.insert("number_of_replicas".to_string(), json!(self.replicas));

        if !self.analyzers.is_empty() {
            let mut analyzers = Map::new();
            for (name, tokenizer, filters) in &self.analyzers {
                analyzers.insert(
                    name.clone(),
                    json!({"tokenizer": tokenizer, "filter": filters}),
                );
            }
            settings.insert(
                "analysis".to_string(),
                json!({ "analyzer": analyzers }),
            );
        }

        let mut mappings = Map::new();
        for (doc_type, fields) in &self.mappings {
            let mut properties = Map::new();
            for (name, mapping) in fields {
                properties.insert(name.clone(), mapping.render());
            }
            mappings.insert(doc_type.clone(), json!({ "properties": properties }));
        }

        json!({
            "settings": settings,
            "mappings": mappings,
        })
    }
}
