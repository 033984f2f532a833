// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Facet and suggestion post-processing.
//!
//! The engine returns facets as per-field bucket lists of term+count pairs
//! and suggestions as per-term ranked candidate lists; these helpers re-emit
//! them in the shapes the client exposes.

use std::collections::HashMap;

use serde_json::Value;

/// Re-emit facet buckets as ordered `(term, count)` tuples, preserving the
/// engine-returned bucket order, keyed by the original facet field name.
pub(crate) fn process_facets(section: Option<&Value>) -> HashMap<String, Vec<(String, u64)>> {
    let mut counts = HashMap::new();
    let Some(fields) = section.and_then(Value::as_object) else {
        return counts;
    };

    for (field, details) in fields {
        let buckets = details
            .get("terms")
            .and_then(Value::as_array)
            .map(|terms| {
                terms
                    .iter()
                    .filter_map(|bucket| {
                        let term = bucket.get("term")?.as_str()?.to_string();
                        let count = bucket.get("count")?.as_u64()?;
                        Some((term, count))
                    })
                    .collect()
            })
            .unwrap_or_default();
        counts.insert(field.clone(), buckets);
    }

    counts
}

/// Map each original term to its top-ranked candidate's text, or `None` when
/// the engine returned no candidates for that term.
pub(crate) fn process_suggestions(
    section: Option<&Value>,
    suggest_field: Option<&str>,
) -> Option<HashMap<String, Option<String>>> {
    let section = section?;
    let entries = section.get(suggest_field?)?.as_array()?;

    let mut suggestions = HashMap::new();
    for entry in entries {
        let Some(term) = entry.get("text").and_then(Value::as_str) else {
            continue;
        };
        let top = entry
            .get("options")
            .and_then(Value::as_array)
            .and_then(|opts| opts.first())
            .and_then(|opt| opt.get("text"))
            .and_then(Value::as_str)
            .map(String::from);
        suggestions.insert(term.to_string(), top);
    }

    Some(suggestions)
}
