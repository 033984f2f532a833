// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bulk index maintenance.
//!
//! A [`Reindexer`] pushes documents from one or more [`DocumentSource`]s into
//! an index through a pool of async workers. Sources are split into
//! fixed-size batches; workers pull batches from a shared queue, so a slow
//! source never idles the rest of the pool. `update` freshens the index in
//! place, `rebuild` drops and recreates it first.
//!
//! Active documents are indexed; inactive ones are deleted when removal is
//! enabled, so unpublishing a document eventually drops it from the index.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::backend::SearchBackend;
use crate::error::SearchError;
use crate::schema::IndexSchema;

/// One document as supplied by a source.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub id: String,
    /// Inactive documents are removal candidates, never indexed.
    pub active: bool,
    pub body: Value,
}

/// Optional modification-time window, epoch milliseconds, half-open on
/// either side when a bound is absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl DateRange {
    pub fn between(start: i64, end: i64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }
}

/// Supplies documents of one doc type for bulk indexing.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// The doc type the supplied documents belong to.
    fn doc_type(&self) -> &str;

    /// How many documents fall inside the window.
    async fn total(&self, range: &DateRange) -> Result<usize, SearchError>;

    /// Fetch one page of documents inside the window, in a stable order.
    async fn fetch(
        &self,
        range: &DateRange,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<SourceDocument>, SearchError>;
}

/// Outcome counters for one reindex run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReindexStats {
    pub indexed: usize,
    pub removed: usize,
    pub failed: usize,
}

impl ReindexStats {
    fn merge(&mut self, other: ReindexStats) {
        self.indexed += other.indexed;
        self.removed += other.removed;
        self.failed += other.failed;
    }
}

/// One unit of work: a page of one source.
#[derive(Debug, Clone, Copy)]
struct Batch {
    source: usize,
    start: usize,
    end: usize,
}

pub struct Reindexer {
    backend: Arc<dyn SearchBackend>,
    schema: IndexSchema,
    sources: Vec<Arc<dyn DocumentSource>>,
    batch_size: usize,
    workers: usize,
    remove: bool,
}

impl Reindexer {
    pub fn new(backend: Arc<dyn SearchBackend>, schema: IndexSchema) -> Self {
        Self {
            backend,
            schema,
            sources: Vec::new(),
            batch_size: 1000,
            workers: 4,
            remove: false,
        }
    }

    pub fn source(mut self, source: Arc<dyn DocumentSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Documents fetched (and indexed) per batch. Clamped to at least 1.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Concurrent workers pulling batches. Clamped to at least 1.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Delete inactive documents instead of skipping them.
    pub fn remove_inactive(mut self, remove: bool) -> Self {
        self.remove = remove;
        self
    }

    /// Freshen the index: push every source document inside the window.
    pub async fn update(&self, range: &DateRange) -> Result<ReindexStats, SearchError> {
        let mut batches = Vec::new();
        for (idx, source) in self.sources.iter().enumerate() {
            let total = source.total(range).await?;
            info!(
                index = %self.schema.name(),
                doc_type = %source.doc_type(),
                total,
                "queueing source for reindex"
            );
            let mut start = 0;
            while start < total {
                let end = (start + self.batch_size).min(total);
                batches.push(Batch {
                    source: idx,
                    start,
                    end,
                });
                start = end;
            }
        }

        let (tx, rx) = mpsc::channel::<Batch>(self.workers.max(batches.len().max(1)));
        for batch in batches {
            // Capacity covers every batch, so send never blocks here.
            if tx.send(batch).await.is_err() {
                break;
            }
        }
        drop(tx);
        let rx = Arc::new(Mutex::new(rx));

        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let rx = Arc::clone(&rx);
            let backend = Arc::clone(&self.backend);
            let sources = self.sources.clone();
            let index = self.schema.name().to_string();
            let range = *range;
            let remove = self.remove;

            handles.push(tokio::spawn(async move {
                let mut stats = ReindexStats::default();
                loop {
                    let batch = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    let Some(batch) = batch else { break };
                    let source = &sources[batch.source];
                    debug!(
                        worker_id,
                        doc_type = %source.doc_type(),
                        start = batch.start,
                        end = batch.end,
                        "processing batch"
                    );
                    run_batch(&*backend, &index, source.as_ref(), &range, batch, remove, &mut stats)
                        .await;
                }
                stats
            }));
        }

        let mut stats = ReindexStats::default();
        for handle in handles {
            match handle.await {
                Ok(worker_stats) => stats.merge(worker_stats),
                Err(err) => {
                    return Err(SearchError::Response(format!(
                        "reindex worker panicked: {err}"
                    )))
                }
            }
        }

        info!(
            index = %self.schema.name(),
            indexed = stats.indexed,
            removed = stats.removed,
            failed = stats.failed,
            "reindex complete"
        );
        Ok(stats)
    }

    /// Drop the index if present, recreate it from the schema, then update.
    pub async fn rebuild(&self, range: &DateRange) -> Result<ReindexStats, SearchError> {
        let index = self.schema.name();
        if self.backend.index_exists(index).await? {
            info!(%index, "dropping existing index");
            self.backend.delete_index(index).await?;
        }
        self.backend.create_index(index, &self.schema.build()).await?;
        self.update(range).await
    }
}

/// Process one batch: index active documents, remove inactive ones when
/// enabled. Per-document failures are counted, never fatal.
async fn run_batch(
    backend: &dyn SearchBackend,
    index: &str,
    source: &dyn DocumentSource,
    range: &DateRange,
    batch: Batch,
    remove: bool,
    stats: &mut ReindexStats,
) {
    let docs = match source
        .fetch(range, batch.start, batch.end - batch.start)
        .await
    {
        Ok(docs) => docs,
        Err(err) => {
            warn!(
                doc_type = %source.doc_type(),
                start = batch.start,
                end = batch.end,
                %err,
                "batch fetch failed"
            );
            stats.failed += batch.end - batch.start;
            return;
        }
    };

    for doc in docs {
        if doc.active {
            match backend
                .index(index, Some(source.doc_type()), &doc.id, &doc.body)
                .await
            {
                Ok(_) => stats.indexed += 1,
                Err(err) => {
                    warn!(doc_id = %doc.id, %err, "index failed");
                    stats.failed += 1;
                }
            }
        } else if remove {
            // Absent documents are already in the desired state.
            if backend
                .delete(index, Some(source.doc_type()), &doc.id)
                .await
                .is_ok()
            {
                stats.removed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use serde_json::json;

    struct VecSource {
        doc_type: String,
        docs: Vec<SourceDocument>,
    }

    impl VecSource {
        fn new(doc_type: &str, count: usize, inactive_every: usize) -> Self {
            let docs = (0..count)
                .map(|i| SourceDocument {
                    id: format!("{doc_type}-{i}"),
                    active: inactive_every == 0 || i % inactive_every != 0,
                    body: json!({"title": format!("{doc_type} {i}"), "rank": i}),
                })
                .collect();
            Self {
                doc_type: doc_type.to_string(),
                docs,
            }
        }
    }

    #[async_trait]
    impl DocumentSource for VecSource {
        fn doc_type(&self) -> &str {
            &self.doc_type
        }

        async fn total(&self, _range: &DateRange) -> Result<usize, SearchError> {
            Ok(self.docs.len())
        }

        async fn fetch(
            &self,
            _range: &DateRange,
            offset: usize,
            limit: usize,
        ) -> Result<Vec<SourceDocument>, SearchError> {
            Ok(self
                .docs
                .iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect())
        }
    }

    fn schema() -> IndexSchema {
        IndexSchema::new("content").mapping(
            "item",
            [("title", crate::schema::FieldMapping::text().store())],
        )
    }

    #[tokio::test]
    async fn test_update_indexes_active_documents() {
        let backend = Arc::new(MemoryBackend::new());
        let reindexer = Reindexer::new(backend.clone(), schema())
            .source(Arc::new(VecSource::new("item", 25, 0)))
            .batch_size(10)
            .workers(3);

        let stats = reindexer.update(&DateRange::default()).await.unwrap();
        assert_eq!(stats.indexed, 25);
        assert_eq!(stats.removed, 0);
        assert_eq!(stats.failed, 0);
        assert_eq!(backend.doc_count("content"), 25);
    }

    #[tokio::test]
    async fn test_inactive_documents_removed_when_enabled() {
        let backend = Arc::new(MemoryBackend::new());
        // seed every doc, then reindex with every 5th inactive
        for i in 0..20 {
            backend.seed("content", "item", &format!("item-{i}"), json!({"rank": i}));
        }
        let reindexer = Reindexer::new(backend.clone(), schema())
            .source(Arc::new(VecSource::new("item", 20, 5)))
            .batch_size(7)
            .remove_inactive(true);

        let stats = reindexer.update(&DateRange::default()).await.unwrap();
        assert_eq!(stats.indexed, 16);
        assert_eq!(stats.removed, 4);
        assert_eq!(backend.doc_count("content"), 16);
    }

    #[tokio::test]
    async fn test_inactive_documents_skipped_by_default() {
        let backend = Arc::new(MemoryBackend::new());
        let reindexer = Reindexer::new(backend.clone(), schema())
            .source(Arc::new(VecSource::new("item", 10, 2)));

        let stats = reindexer.update(&DateRange::default()).await.unwrap();
        assert_eq!(stats.indexed, 5);
        assert_eq!(stats.removed, 0);
        assert_eq!(backend.doc_count("content"), 5);
    }

    #[tokio::test]
    async fn test_multiple_sources_share_the_pool() {
        let backend = Arc::new(MemoryBackend::new());
        let reindexer = Reindexer::new(backend.clone(), schema())
            .source(Arc::new(VecSource::new("item", 30, 0)))
            .source(Arc::new(VecSource::new("spread", 12, 0)))
            .batch_size(8)
            .workers(4);

        let stats = reindexer.update(&DateRange::default()).await.unwrap();
        assert_eq!(stats.indexed, 42);
        assert_eq!(backend.doc_count("content"), 42);
    }

    #[tokio::test]
    async fn test_rebuild_recreates_the_index() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed("content", "item", "stale", json!({"title": "stale"}));

        let reindexer = Reindexer::new(backend.clone(), schema())
            .source(Arc::new(VecSource::new("item", 5, 0)));
        let stats = reindexer.rebuild(&DateRange::default()).await.unwrap();

        assert_eq!(stats.indexed, 5);
        // the stale document did not survive the rebuild
        assert_eq!(backend.doc_count("content"), 5);
    }

    #[tokio::test]
    async fn test_index_failures_are_counted_not_fatal() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_backend(true);
        let reindexer = Reindexer::new(backend.clone(), schema())
            .source(Arc::new(VecSource::new("item", 4, 0)));

        let stats = reindexer.update(&DateRange::default()).await.unwrap();
        assert_eq!(stats.indexed, 0);
        assert_eq!(stats.failed, 4);
    }
}
