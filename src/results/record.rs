// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! One converted hit.
//!
//! A [`ResultRecord`] carries the four identity fields plus an explicit
//! mapping of source fields. Payload keys colliding with the reserved
//! identity names are skipped, never overwritten - the collision rule is
//! fixed: reserved names win.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::SearchError;

/// Reserved identity field names; colliding payload keys are dropped.
pub const RESERVED_FIELDS: [&str; 4] = ["index", "doc_type", "id", "score"];

/// How hits are converted when filling the cache, fixed per ResultSet at
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordMode {
    /// Convert hits into [`ResultRecord`] values.
    #[default]
    Records,
    /// Yield the plain source mapping with `doc_type` injected.
    Fields,
}

/// One slot's worth of converted hit, shaped per [`RecordMode`].
#[derive(Debug, Clone, PartialEq)]
pub enum RankedResult {
    Record(ResultRecord),
    Fields(Map<String, Value>),
}

impl RankedResult {
    pub fn as_record(&self) -> Option<&ResultRecord> {
        match self {
            RankedResult::Record(record) => Some(record),
            RankedResult::Fields(_) => None,
        }
    }

    pub fn as_fields(&self) -> Option<&Map<String, Value>> {
        match self {
            RankedResult::Record(_) => None,
            RankedResult::Fields(fields) => Some(fields),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub index: String,
    pub doc_type: String,
    pub id: String,
    pub score: f64,
    /// Source fields, minus any key colliding with the reserved names.
    pub fields: Map<String, Value>,
}

impl ResultRecord {
    pub fn new(
        index: impl Into<String>,
        doc_type: impl Into<String>,
        id: impl Into<String>,
        score: f64,
        payload: &Map<String, Value>,
    ) -> Self {
        let mut fields = Map::new();
        for (key, val) in payload {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            fields.insert(key.clone(), val.clone());
        }
        Self {
            index: index.into(),
            doc_type: doc_type.into(),
            id: id.into(),
            score,
            fields,
        }
    }

    /// Convenience accessor for one source field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Pull the effective payload out of a raw hit: a projected `fields` payload
/// wins over the full `_source`.
fn hit_payload(hit: &Value) -> Map<String, Value> {
    hit.get("fields")
        .or_else(|| hit.get("_source"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// Convert one raw hit per the requested mode.
pub(crate) fn convert_hit(
    index: &str,
    hit: &Value,
    mode: RecordMode,
) -> Result<RankedResult, SearchError> {
    let doc_type = hit
        .get("_type")
        .and_then(Value::as_str)
        .unwrap_or("_doc")
        .to_string();
    let payload = hit_payload(hit);

    match mode {
        RecordMode::Records => {
            let id = hit
                .get("_id")
                .and_then(Value::as_str)
                .ok_or_else(|| SearchError::Response("hit without _id".to_string()))?
                .to_string();
            let score = hit.get("_score").and_then(Value::as_f64).unwrap_or(0.0);
            Ok(RankedResult::Record(ResultRecord::new(
                index, doc_type, id, score, &payload,
            )))
        }
        RecordMode::Fields => {
            let mut fields = payload;
            fields.insert("doc_type".to_string(), Value::String(doc_type));
            Ok(RankedResult::Fields(fields))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit() -> Value {
        json!({
            "_index": "content",
            "_type": "item",
            "_id": "42",
            "_score": 1.5,
            "_source": {"title": "red shoes", "price": 10, "id": "spoofed", "score": 99}
        })
    }

    #[test]
    fn test_record_conversion() {
        let result = convert_hit("content", &hit(), RecordMode::Records).unwrap();
        let record = result.as_record().unwrap();
        assert_eq!(record.index, "content");
        assert_eq!(record.doc_type, "item");
        assert_eq!(record.id, "42");
        assert_eq!(record.score, 1.5);
        assert_eq!(record.field("title"), Some(&json!("red shoes")));
    }

    #[test]
    fn test_reserved_names_win_over_payload() {
        let result = convert_hit("content", &hit(), RecordMode::Records).unwrap();
        let record = result.as_record().unwrap();
        // "id" and "score" from the payload were dropped, not merged
        assert_eq!(record.id, "42");
        assert_eq!(record.score, 1.5);
        assert!(record.field("id").is_none());
        assert!(record.field("score").is_none());
    }

    #[test]
    fn test_projected_fields_win_over_source() {
        let mut raw = hit();
        raw["fields"] = json!({"title": "projected"});
        let result = convert_hit("content", &raw, RecordMode::Records).unwrap();
        let record = result.as_record().unwrap();
        assert_eq!(record.field("title"), Some(&json!("projected")));
        assert!(record.field("price").is_none());
    }

    #[test]
    fn test_fields_mode_injects_doc_type() {
        let result = convert_hit("content", &hit(), RecordMode::Fields).unwrap();
        let fields = result.as_fields().unwrap();
        assert_eq!(fields["doc_type"], json!("item"));
        assert_eq!(fields["title"], json!("red shoes"));
    }

    #[test]
    fn test_hit_without_id_is_a_response_error() {
        let raw = json!({"_type": "item", "_source": {}});
        let err = convert_hit("content", &raw, RecordMode::Records).unwrap_err();
        assert!(matches!(err, SearchError::Response(_)));
    }
}
