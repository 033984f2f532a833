//! Integration tests for searchset
//!
//! End-to-end flows through the public API against the in-memory backend:
//! chaining, lazy execution, the sparse cache, facets, suggestions,
//! similarity search, document operations, schemas and bulk reindexing.
//!
//! # Test Organization
//! - `chain_*`   - Query refinement and branch isolation
//! - `cache_*`   - Sparse cache and traversal behavior
//! - `doc_*`     - Document operations and their failure modes
//! - `facet_*` / `suggest_*` - Post-processed side results
//! - `reindex_*` - Schema creation and worker-pool reindexing

use std::sync::Arc;

use serde_json::{json, Map};

use searchset::{
    Criteria, DateRange, DocumentSource, FieldMapping, FilterMode, IndexSchema, MemoryBackend,
    RecordMode, Reindexer, ResultSet, SearchBackend, SearchConfig, SearchError, SourceDocument,
};

// =============================================================================
// Helpers
// =============================================================================

const CATEGORIES: [&str; 3] = ["sneakers", "boots", "sandals"];

/// Seed a catalog of `count` items with predictable fields: price == rank,
/// category cycles through three values.
fn catalog(count: usize) -> Arc<MemoryBackend> {
    let backend = MemoryBackend::new();
    for i in 0..count {
        backend.seed(
            "content",
            "item",
            &format!("{i}"),
            json!({
                "title": format!("item {i}"),
                "price": i,
                "category": CATEGORIES[i % 3],
            }),
        );
    }
    Arc::new(backend)
}

fn result_set(backend: &Arc<MemoryBackend>) -> ResultSet {
    ResultSet::new(
        Arc::clone(backend) as Arc<dyn SearchBackend>,
        "content",
        Some("item"),
    )
}

fn ids(results: &[searchset::RankedResult]) -> Vec<String> {
    results
        .iter()
        .filter_map(|r| r.as_record().map(|rec| rec.id.clone()))
        .collect()
}

// =============================================================================
// Chaining
// =============================================================================

#[tokio::test]
async fn chain_filters_narrow_results() {
    let backend = catalog(30);
    let mut rs = result_set(&backend)
        .filter_and(Criteria::from([("price__lt", json!(10))]))
        .unwrap()
        .filter_and(Criteria::from([("category", json!("sneakers"))]))
        .unwrap()
        .sort(&["price"]);

    let all = rs.to_vec().await.unwrap();
    // sneakers are ranks 0, 3, 6, 9 below 10
    assert_eq!(ids(&all), vec!["0", "3", "6", "9"]);
}

#[tokio::test]
async fn chain_or_filters_widen_results() {
    let backend = catalog(9);
    let mut rs = result_set(&backend)
        .filter_or(Criteria::from([("price", json!(1))]))
        .unwrap()
        .filter_or(Criteria::from([("price", json!(7))]))
        .unwrap()
        .sort(&["price"]);

    assert_eq!(ids(&rs.to_vec().await.unwrap()), vec!["1", "7"]);
}

#[tokio::test]
async fn chain_default_filter_mode_is_configurable() {
    let backend = catalog(9);
    let config = SearchConfig {
        fetch_window: 20,
        default_filter: FilterMode::Or,
    };
    let mut rs = ResultSet::with_config(
        Arc::clone(&backend) as Arc<dyn SearchBackend>,
        "content",
        Some("item"),
        config,
    )
    .filter(Criteria::from([("price", json!(2))]))
    .unwrap()
    .filter(Criteria::from([("price", json!(5))]))
    .unwrap()
    .sort(&["price"]);

    assert_eq!(ids(&rs.to_vec().await.unwrap()), vec!["2", "5"]);
}

#[tokio::test]
async fn chain_branches_never_observe_each_other() {
    let backend = catalog(30);
    let ancestor = result_set(&backend)
        .filter_and(Criteria::from([("price__lt", json!(20))]))
        .unwrap();

    let mut cheap = ancestor
        .clone()
        .filter_and(Criteria::from([("price__lt", json!(5))]))
        .unwrap();
    let mut sneakers = ancestor
        .clone()
        .filter_and(Criteria::from([("category", json!("sneakers"))]))
        .unwrap();
    let mut base = ancestor;

    assert_eq!(cheap.count().await.unwrap(), 5);
    assert_eq!(sneakers.count().await.unwrap(), 7);
    assert_eq!(base.count().await.unwrap(), 20);
}

#[tokio::test]
async fn chain_unknown_operator_fails_fast() {
    let backend = catalog(5);
    let err = result_set(&backend)
        .filter_and(Criteria::from([("price__near", json!(3))]))
        .unwrap_err();

    match err {
        SearchError::UnsupportedOperator { field, operator } => {
            assert_eq!(field, "price");
            assert_eq!(operator, "near");
        }
        other => panic!("expected UnsupportedOperator, got {other:?}"),
    }
    assert!(backend.search_calls().is_empty());
}

#[tokio::test]
async fn chain_raw_query_overrides_everything() {
    let backend = catalog(10);
    let rs = result_set(&backend)
        .search("item", None)
        .filter_and(Criteria::from([("price__lt", json!(3))]))
        .unwrap()
        .raw_query(json!({"query": {"ids": {"values": ["8"]}}}));

    assert_eq!(
        rs.show_query(),
        json!({"query": {"ids": {"values": ["8"]}}})
    );

    let mut rs = rs;
    assert_eq!(ids(&rs.to_vec().await.unwrap()), vec!["8"]);
}

#[tokio::test]
async fn chain_function_score_keeps_filters_effective() {
    let backend = catalog(12);
    let mut spec = Map::new();
    spec.insert("boost_mode".to_string(), json!("multiply"));

    let mut rs = result_set(&backend)
        .filter_and(Criteria::from([("price__gte", json!(10))]))
        .unwrap()
        .function_score(spec)
        .sort(&["price"]);

    // filters ride inside the envelope and still apply
    let body = rs.show_query();
    assert_eq!(
        body["query"]["function_score"]["query"]["filtered"]["filter"]["bool"]["must"],
        json!([{"range": {"price": {"gte": 10}}}])
    );
    assert_eq!(ids(&rs.to_vec().await.unwrap()), vec!["10", "11"]);
}

#[tokio::test]
async fn chain_projection_returns_only_requested_fields() {
    let backend = catalog(5);
    let mut rs = result_set(&backend).only(&["title"]).sort(&["price"]);

    let first = rs.at(0).await.unwrap().unwrap();
    let record = first.as_record().unwrap();
    assert_eq!(record.field("title"), Some(&json!("item 0")));
    assert!(record.field("price").is_none());
}

#[tokio::test]
async fn chain_fields_mode_yields_plain_mappings() {
    let backend = catalog(3);
    let mut rs = result_set(&backend)
        .record_mode(RecordMode::Fields)
        .sort(&["price"]);

    let all = rs.to_vec().await.unwrap();
    let fields = all[0].as_fields().unwrap();
    assert_eq!(fields["doc_type"], json!("item"));
    assert_eq!(fields["price"], json!(0));
}

// =============================================================================
// Sparse cache
// =============================================================================

#[tokio::test]
async fn cache_overlapping_windows_fetch_each_slot_once() {
    let backend = catalog(100);
    let mut rs = result_set(&backend).sort(&["price"]);

    assert_eq!(rs.fetch(0, Some(50)).await.unwrap().len(), 50);
    assert_eq!(rs.fetch(25, Some(75)).await.unwrap().len(), 50);
    // the overlap was served from cache
    let calls = backend.search_calls();
    assert_eq!(calls.len(), 2);
    assert_eq!((calls[1].from, calls[1].size), (50, 25));

    // a third, fully covered request makes no network call at all
    rs.fetch(10, Some(70)).await.unwrap();
    assert_eq!(backend.search_calls().len(), 2);
}

#[tokio::test]
async fn cache_traversal_visits_every_hit_once_in_order() {
    let backend = catalog(45);
    let mut rs = result_set(&backend).sort(&["price"]);

    let mut seen = Vec::new();
    while let Some(hit) = rs.try_next().await.unwrap() {
        seen.push(hit.as_record().unwrap().id.clone());
    }
    assert_eq!(seen.len(), 45);
    assert_eq!(seen[0], "0");
    assert_eq!(seen[44], "44");

    // exhausted stays exhausted
    assert!(rs.try_next().await.unwrap().is_none());
    assert!(rs.try_next().await.unwrap().is_none());

    // reset replays without refetching already-filled slots
    rs.reset();
    let calls_before = backend.search_calls().len();
    let replay = rs.to_vec().await.unwrap();
    assert_eq!(replay.len(), 45);
    assert!(backend.search_calls().len() > calls_before);
}

#[tokio::test]
async fn cache_inverted_range_is_rejected_without_network() {
    let backend = catalog(10);
    let mut rs = result_set(&backend);

    assert!(matches!(
        rs.fetch(9, Some(3)).await.unwrap_err(),
        SearchError::InvalidRange { start: 9, stop: 3 }
    ));
    assert!(backend.search_calls().is_empty());
}

#[tokio::test]
async fn cache_out_of_bounds_access_is_empty_not_an_error() {
    let backend = catalog(5);
    let mut rs = result_set(&backend).sort(&["price"]);

    assert!(rs.at(100).await.unwrap().is_none());
    assert!(rs.fetch(10, Some(20)).await.unwrap().is_empty());
    // totals were still learned from the first round trip
    assert_eq!(rs.count().await.unwrap(), 5);
}

#[tokio::test]
async fn cache_count_does_not_fetch_twice() {
    let backend = catalog(7);
    let mut rs = result_set(&backend);

    assert_eq!(rs.count().await.unwrap(), 7);
    assert_eq!(rs.count().await.unwrap(), 7);
    assert_eq!(backend.search_calls().len(), 1);
}

// =============================================================================
// Document operations
// =============================================================================

#[tokio::test]
async fn doc_get_collapses_absence_and_failure_to_none() {
    let backend = catalog(3);
    let rs = result_set(&backend);

    assert!(rs.get("1", None).await.is_some());
    assert!(rs.get("missing", None).await.is_none());

    backend.fail_backend(true);
    assert!(rs.get("1", None).await.is_none());
}

#[tokio::test]
async fn doc_remove_is_idempotent_and_never_errors() {
    let backend = catalog(3);
    let rs = result_set(&backend);

    assert!(rs.remove("1").await.is_some());
    assert!(rs.remove("1").await.is_none());
    assert_eq!(backend.doc_count("content"), 2);

    backend.fail_backend(true);
    assert!(rs.remove("0").await.is_none());
    backend.fail_backend(false);
    assert_eq!(backend.doc_count("content"), 2);
}

#[tokio::test]
async fn doc_index_then_search_round_trip() {
    let backend = catalog(0);
    let rs = result_set(&backend);
    rs.index("a", &json!({"title": "red shoes", "price": 10}))
        .await
        .unwrap();
    rs.index("b", &json!({"title": "blue hat", "price": 5}))
        .await
        .unwrap();

    let mut rs = rs.search("shoes", Some(&["title"]));
    assert_eq!(ids(&rs.to_vec().await.unwrap()), vec!["a"]);
}

#[tokio::test]
async fn doc_index_propagates_failures() {
    let backend = catalog(1);
    let rs = result_set(&backend);

    backend.fail_backend(true);
    assert!(rs.index("x", &json!({"title": "t"})).await.is_err());
}

// =============================================================================
// Facets and suggestions
// =============================================================================

#[tokio::test]
async fn facet_counts_ride_on_the_search() {
    let backend = catalog(9);
    let mut rs = result_set(&backend).facet("category");

    let counts = rs.facet_counts().await.unwrap();
    // 9 items cycle evenly through the three categories
    let buckets = &counts["category"];
    assert_eq!(buckets.len(), 3);
    assert!(buckets.iter().all(|(_, count)| *count == 3));
    // one round trip served both hits and facets
    assert_eq!(backend.search_calls().len(), 1);
}

#[tokio::test]
async fn facet_filter_narrows_the_facet_not_the_hits() {
    let backend = catalog(12);
    let mut rs = result_set(&backend)
        .facet("category")
        .facet_filter("category", Criteria::from([("price__lt", json!(3))]))
        .unwrap();

    // hits are unfiltered
    assert_eq!(rs.count().await.unwrap(), 12);
    // the facet only counted ranks 0..3
    let counts = rs.facet_counts().await.unwrap();
    let total: u64 = counts["category"].iter().map(|(_, c)| c).sum();
    assert_eq!(total, 3);
}

#[tokio::test]
async fn suggest_maps_terms_to_top_candidate() {
    let backend = catalog(3);
    backend.seed_suggestion("shose", vec!["shoes".to_string(), "hose".to_string()]);

    let mut rs = result_set(&backend).suggest("shose hatz", "title");
    let suggestions = rs.get_suggestions().await.unwrap();

    assert_eq!(suggestions["shose"], Some("shoes".to_string()));
    assert_eq!(suggestions["hatz"], None);
}

#[tokio::test]
async fn suggest_autocomplete_bypasses_the_cache() {
    let backend = catalog(3);
    let rs = result_set(&backend);

    let response = rs.autocomplete("item", "title", 5).await.unwrap();
    let options = response["suggest"][0]["options"].as_array().unwrap();
    assert!(!options.is_empty());

    rs.autocomplete("item", "title", 5).await.unwrap();
    rs.autocomplete("item", "title", 5).await.unwrap();
    // completion calls never touch the search path or its cache
    assert!(backend.search_calls().is_empty());
}

// =============================================================================
// Similarity
// =============================================================================

#[tokio::test]
async fn mlt_excludes_the_seed_document() {
    let backend = catalog(10);
    let mut rs = result_set(&backend).mlt("0", &["title"], Map::new());

    let all = rs.to_vec().await.unwrap();
    assert_eq!(all.len(), 9);
    assert!(all.iter().all(|r| r.as_record().unwrap().id != "0"));
}

// =============================================================================
// Schema and reindex
// =============================================================================

struct CatalogSource {
    count: usize,
}

#[async_trait::async_trait]
impl DocumentSource for CatalogSource {
    fn doc_type(&self) -> &str {
        "item"
    }

    async fn total(&self, _range: &DateRange) -> Result<usize, SearchError> {
        Ok(self.count)
    }

    async fn fetch(
        &self,
        _range: &DateRange,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<SourceDocument>, SearchError> {
        Ok((offset..(offset + limit).min(self.count))
            .map(|i| SourceDocument {
                id: format!("{i}"),
                // every 10th document is unpublished
                active: i % 10 != 0,
                body: json!({
                    "title": format!("item {i}"),
                    "price": i,
                    "category": CATEGORIES[i % 3],
                }),
            })
            .collect())
    }
}

fn content_schema() -> IndexSchema {
    IndexSchema::new("content")
        .shards(1)
        .replicas(1)
        .analyzer("folded", "standard", &["standard", "lowercase", "stop"])
        .mapping(
            "item",
            [
                ("title", FieldMapping::text().store().analyzer("folded").boost(8.0)),
                ("category", FieldMapping::text().store().analyzer("folded")),
                ("price", FieldMapping::new("float").store()),
            ],
        )
}

#[tokio::test]
async fn reindex_rebuild_then_search() {
    let backend = Arc::new(MemoryBackend::new());
    backend.seed("content", "item", "stale", json!({"title": "stale entry"}));

    let reindexer = Reindexer::new(
        Arc::clone(&backend) as Arc<dyn SearchBackend>,
        content_schema(),
    )
    .source(Arc::new(CatalogSource { count: 57 }))
    .batch_size(10)
    .workers(4);

    let stats = reindexer.rebuild(&DateRange::default()).await.unwrap();
    // ranks 0, 10, 20, 30, 40, 50 were inactive
    assert_eq!(stats.indexed, 51);
    assert_eq!(stats.failed, 0);

    let mut rs = result_set(&backend)
        .filter_and(Criteria::from([("price__lt", json!(4))]))
        .unwrap()
        .sort(&["price"]);
    // the stale doc and rank 0 did not survive the rebuild
    assert_eq!(ids(&rs.to_vec().await.unwrap()), vec!["1", "2", "3"]);
}

#[tokio::test]
async fn reindex_update_removes_unpublished_documents() {
    let backend = Arc::new(MemoryBackend::new());
    for i in 0..20 {
        backend.seed("content", "item", &format!("{i}"), json!({"price": i}));
    }

    let reindexer = Reindexer::new(
        Arc::clone(&backend) as Arc<dyn SearchBackend>,
        content_schema(),
    )
    .source(Arc::new(CatalogSource { count: 20 }))
    .batch_size(6)
    .remove_inactive(true);

    let stats = reindexer.update(&DateRange::default()).await.unwrap();
    assert_eq!(stats.indexed, 18);
    assert_eq!(stats.removed, 2);
    assert_eq!(backend.doc_count("content"), 18);
}

#[tokio::test]
async fn schema_admin_round_trip() {
    let backend = catalog(0);
    let rs = result_set(&backend);

    assert!(!rs.check_index().await.unwrap());
    rs.create_index(&content_schema().build()).await.unwrap();
    assert!(rs.check_index().await.unwrap());

    let mapping = rs.get_mapping().await.unwrap();
    assert_eq!(mapping["item"]["properties"]["title"]["boost"], 8.0);

    let settings = rs.get_settings().await.unwrap();
    assert_eq!(settings["number_of_shards"], 1);

    rs.update_settings(&json!({"number_of_replicas": 2}))
        .await
        .unwrap();
    let settings = rs.get_settings().await.unwrap();
    assert_eq!(settings["number_of_replicas"], 2);

    rs.refresh_index().await.unwrap();
    let stats = rs.get_stats().await.unwrap();
    assert!(stats.is_object());

    rs.delete_index().await.unwrap();
    assert!(!rs.check_index().await.unwrap());
}
