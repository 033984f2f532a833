// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Filter criteria and operator-suffix parsing.
//!
//! A criterion key is either the literal identity key `ids`, a plain field
//! name, or `field__operator`. Recognized operators:
//!
//! ```text
//! price__gt / price__gte / price__lt / price__lte  ->  range filter
//! category__in (or any list-typed value)           ->  terms filter
//! category                                         ->  exact-term filter
//! ids                                              ->  identity filter
//! ```
//!
//! An unrecognized operator suffix is a hard error, not a silent fall-through
//! to exact-term semantics.

use serde_json::{json, Value};

use crate::error::SearchError;

/// Key for the identity filter.
const IDS_KEY: &str = "ids";

/// An ordered list of `(key, value)` filter criteria.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    entries: Vec<(String, Value)>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one criterion, builder style.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.entries.push((key.into(), value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.entries.iter()
    }
}

impl<K: Into<String>, const N: usize> From<[(K, Value); N]> for Criteria {
    fn from(entries: [(K, Value); N]) -> Self {
        Self {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Criteria {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Parse one criterion into its rendered filter fragment.
pub(crate) fn parse_criterion(key: &str, value: &Value) -> Result<Value, SearchError> {
    if key == IDS_KEY {
        return Ok(json!({"ids": {"values": value}}));
    }

    let (field, operator) = match key.split_once("__") {
        Some((field, operator)) => (field, Some(operator)),
        None => (key, None),
    };

    let fragment = match operator {
        Some(op @ ("gt" | "gte" | "lt" | "lte")) => json!({"range": {field: {op: value}}}),
        Some("in") => json!({"terms": {field: value}}),
        Some(op) => {
            return Err(SearchError::UnsupportedOperator {
                field: field.to_string(),
                operator: op.to_string(),
            })
        }
        None if value.is_array() => json!({"terms": {field: value}}),
        None => json!({"term": {field: value}}),
    };

    Ok(fragment)
}

/// Parse a whole criteria list into filter fragments, in order.
pub(crate) fn parse_criteria(criteria: &Criteria) -> Result<Vec<Value>, SearchError> {
    criteria
        .iter()
        .map(|(key, value)| parse_criterion(key, value))
        .collect()
}
