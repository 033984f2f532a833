// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic searchset usage example.
//!
//! Demonstrates:
//! 1. Declaring an index schema and creating the index
//! 2. Indexing a handful of documents
//! 3. Chained search + filter + sort + facet refinement
//! 4. Lazy iteration over the sparse-cached result set
//! 5. Spelling suggestions
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;

use serde_json::json;

use searchset::{
    Criteria, FieldMapping, IndexSchema, MemoryBackend, ResultSet, SearchBackend,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Simple logging (no filter for simplicity)
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let backend = Arc::new(MemoryBackend::new());
    backend.seed_suggestion("shose", vec!["shoes".to_string()]);
    let backend: Arc<dyn SearchBackend> = backend;

    // 1. Declare the schema and create the index
    let schema = IndexSchema::new("content")
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
        );

    let admin = ResultSet::new(Arc::clone(&backend), "content", Some("item"));
    admin.create_index(&schema.build()).await?;
    println!("created index: {}", schema.name());

    // 2. Index some documents
    let docs = [
        ("1", json!({"title": "red shoes",   "category": "sneakers", "price": 80})),
        ("2", json!({"title": "blue shoes",  "category": "boots",    "price": 140})),
        ("3", json!({"title": "green shoes", "category": "sneakers", "price": 60})),
        ("4", json!({"title": "red hat",     "category": "hats",     "price": 25})),
    ];
    for (id, body) in &docs {
        admin.index(id, body).await?;
    }
    println!("indexed {} documents", docs.len());

    // 3. Chained refinement; nothing executes until results are accessed
    let mut results = ResultSet::new(Arc::clone(&backend), "content", Some("item"))
        .search("shoes", Some(&["title"]))
        .filter_and(Criteria::from([("price__lt", json!(100))]))?
        .sort(&["-price"])
        .facet("category")
        .suggest("shose", "title");

    println!("rendered query: {}", results.show_query());

    // 4. Iterate lazily
    println!("{} matches:", results.count().await?);
    while let Some(hit) = results.try_next().await? {
        if let Some(record) = hit.as_record() {
            println!(
                "  [{}] {} ({})",
                record.id,
                record.field("title").unwrap_or(&json!("?")),
                record.field("price").unwrap_or(&json!("?")),
            );
        }
    }

    println!("facets: {:?}", results.facet_counts().await?);

    // 5. Spelling suggestions rode along on the same request
    println!("suggestions: {:?}", results.get_suggestions().await?);

    Ok(())
}
