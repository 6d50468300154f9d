use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::describe::{EXTRACT_QUERY, PageDescriber};
use crate::config::{SETTLE_POLL_INTERVAL, SETTLE_TIMEOUT};
use crate::document::{PageImage, Rasterizer, check_pdf_header};
use crate::embedding::TextEmbedder;
use crate::error::{DocumentOpenError, IndexOperationError, IngestError};
use crate::index::{CollectionRecord, CollectionSchema, SourceDocument, VectorIndex};

/// Summary of a completed ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub collection: String,
    pub page_count: usize,
    pub source_sha256: String,
    pub elapsed_ms: u64,
}

/// Rasterize, describe, embed and index one document.
///
/// The collection is replaced in a single transaction after every page has
/// been described and embedded, so a failure at any stage leaves the
/// previous contents untouched. Only one ingestion per collection may run at
/// a time.
pub struct IngestPipeline {
    rasterizer: Arc<dyn Rasterizer>,
    describer: PageDescriber,
    embedder: Arc<dyn TextEmbedder>,
    index: VectorIndex,
    schema: CollectionSchema,
    concurrency: usize,
    settle_timeout: Duration,
}

impl IngestPipeline {
    pub fn new(
        rasterizer: Arc<dyn Rasterizer>,
        describer: PageDescriber,
        embedder: Arc<dyn TextEmbedder>,
        index: VectorIndex,
        schema: CollectionSchema,
        concurrency: usize,
    ) -> Self {
        Self {
            rasterizer,
            describer,
            embedder,
            index,
            schema,
            concurrency: concurrency.max(1),
            settle_timeout: SETTLE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = timeout;
        self
    }

    pub async fn ingest(&self, path: &Path) -> Result<IngestReport, IngestError> {
        let started = Instant::now();
        let source_sha256 = fingerprint(path.to_path_buf()).await?;
        info!(path = %path.display(), sha256 = %source_sha256, "Ingesting document");

        let descriptions = self.describe_pages(path).await?;
        let page_count = descriptions.len();

        let vectors = self.embedder.embed_many(&descriptions).await?;
        let records: Vec<CollectionRecord> = descriptions
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(id, (text, vector))| CollectionRecord {
                id: id as u64,
                vector,
                text,
            })
            .collect();

        let index = self.index.clone();
        let schema = self.schema.clone();
        let source = SourceDocument {
            path: path.display().to_string(),
            sha256: source_sha256.clone(),
        };
        tokio::task::spawn_blocking(move || index.replace_collection(&schema, Some(&source), &records))
            .await
            .map_err(|e| IngestError::Worker(e.to_string()))??;

        if self.schema.consistency.requires_settle() {
            self.settle(page_count).await?;
        }

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            collection = %self.schema.name,
            page_count,
            elapsed_ms,
            "Ingestion completed"
        );
        Ok(IngestReport {
            collection: self.schema.name.clone(),
            page_count,
            source_sha256,
            elapsed_ms,
        })
    }

    /// Stream pages from a blocking rasterizer into at most `concurrency`
    /// in-flight description calls. Output keeps page order.
    async fn describe_pages(&self, path: &Path) -> Result<Vec<String>, IngestError> {
        let (tx, mut rx) = mpsc::channel::<PageImage>(self.concurrency);
        let rasterizer = Arc::clone(&self.rasterizer);
        let owned_path = path.to_path_buf();
        let producer = tokio::task::spawn_blocking(move || {
            rasterizer.rasterize(&owned_path, &mut |page| {
                if tx.blocking_send(page).is_ok() {
                    ControlFlow::Continue(())
                } else {
                    ControlFlow::Break(())
                }
            })
        });

        let describer = &self.describer;
        let described: Result<Vec<String>, _> = futures::stream::poll_fn(move |cx| rx.poll_recv(cx))
            .map(|page| async move { describer.describe(&page, EXTRACT_QUERY).await })
            .buffered(self.concurrency)
            .try_collect()
            .await;

        // The receiver is gone by now, so a still-running producer stops at
        // its next send.
        let rendered = producer
            .await
            .map_err(|e| IngestError::Worker(e.to_string()))?;
        let descriptions = described?;
        let rendered = rendered?;
        debug!(rendered, described = descriptions.len(), "Pages described");
        Ok(descriptions)
    }

    /// Wait until every inserted record is visible to readers.
    async fn settle(&self, expected: usize) -> Result<(), IngestError> {
        let deadline = Instant::now() + self.settle_timeout;
        loop {
            let index = self.index.clone();
            let name = self.schema.name.clone();
            let visible = tokio::task::spawn_blocking(move || index.count(&name))
                .await
                .map_err(|e| IngestError::Worker(e.to_string()))??;
            if visible == expected {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(IndexOperationError::new(
                    "settle",
                    &self.schema.name,
                    anyhow::anyhow!(
                        "{visible} of {expected} records visible after {}ms",
                        self.settle_timeout.as_millis()
                    ),
                )
                .into());
            }
            tokio::time::sleep(SETTLE_POLL_INTERVAL).await;
        }
    }
}

/// Read the document, check its header and return its SHA-256 as hex.
async fn fingerprint(path: PathBuf) -> Result<String, IngestError> {
    let digest = tokio::task::spawn_blocking(move || -> Result<String, DocumentOpenError> {
        let bytes = std::fs::read(&path).map_err(|e| DocumentOpenError::new(&path, e.to_string()))?;
        check_pdf_header(&path, &bytes)?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    })
    .await
    .map_err(|e| IngestError::Worker(e.to_string()))??;
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EMBEDDING_DIMENSION;
    use crate::db::DatabaseDriver;
    use crate::index::{ConsistencyLevel, Metric, SearchParams};
    use crate::test_util::{EchoCompletion, FailingPageCompletion, HashEmbedder, StaticRasterizer};
    use crate::test_util::write_fake_pdf;

    fn schema() -> CollectionSchema {
        CollectionSchema {
            name: "pdf_collection".to_string(),
            dimension: EMBEDDING_DIMENSION,
            metric: Metric::InnerProduct,
            consistency: ConsistencyLevel::Bounded,
        }
    }

    fn pipeline(
        db: &str,
        completion: Arc<dyn crate::completion::CompletionService>,
    ) -> (VectorIndex, IngestPipeline) {
        let index = VectorIndex::new(DatabaseDriver::in_memory(db).unwrap());
        let pipeline = IngestPipeline::new(
            Arc::new(StaticRasterizer),
            PageDescriber::new(completion, "vision"),
            Arc::new(HashEmbedder::new()),
            index.clone(),
            schema(),
            2,
        );
        (index, pipeline)
    }

    const DECK: &[&str] = &[
        "Problem: SMEs wait 90 days for invoices",
        "Solution: instant invoice financing",
        "Team: Jane Doe (CEO), John Roe (CTO)",
        "Market: target industry is B2B fintech",
        "Ask: raising a $2M seed round",
    ];

    #[tokio::test]
    async fn records_follow_page_order() {
        let tmp = tempfile::tempdir().unwrap();
        let deck = write_fake_pdf(tmp.path(), "deck.pdf", DECK).unwrap();
        let (index, pipeline) = pipeline("ingest_page_order", Arc::new(EchoCompletion));

        let report = pipeline.ingest(&deck).await.unwrap();
        assert_eq!(report.page_count, 5);
        assert_eq!(report.collection, "pdf_collection");
        assert_eq!(report.source_sha256.len(), 64);

        let stored = index.records("pdf_collection").unwrap();
        let ids: Vec<u64> = stored.iter().map(|r| r.id).collect();
        let texts: Vec<&str> = stored.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(texts, DECK);
    }

    #[tokio::test]
    async fn reingest_replaces_previous_document() {
        let tmp = tempfile::tempdir().unwrap();
        let first = write_fake_pdf(tmp.path(), "first.pdf", DECK).unwrap();
        let second = write_fake_pdf(tmp.path(), "second.pdf", &["Overview: drone delivery for farms"]).unwrap();
        let (index, pipeline) = pipeline("ingest_replaces", Arc::new(EchoCompletion));

        pipeline.ingest(&first).await.unwrap();
        pipeline.ingest(&second).await.unwrap();

        let query = HashEmbedder::new().embed("invoice financing team").await.unwrap();
        let hits = index
            .search("pdf_collection", &query, 10, SearchParams { metric: Metric::InnerProduct })
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "Overview: drone delivery for farms");
    }

    #[tokio::test]
    async fn failed_description_keeps_previous_collection() {
        let tmp = tempfile::tempdir().unwrap();
        let deck = write_fake_pdf(tmp.path(), "deck.pdf", DECK).unwrap();
        let (index, pipeline) = pipeline("ingest_failure_keeps_state", Arc::new(EchoCompletion));
        pipeline.ingest(&deck).await.unwrap();

        let failing = IngestPipeline::new(
            Arc::new(StaticRasterizer),
            PageDescriber::new(Arc::new(FailingPageCompletion { page: 3 }), "vision"),
            Arc::new(HashEmbedder::new()),
            index.clone(),
            schema(),
            2,
        );
        let err = failing.ingest(&deck).await.unwrap_err();
        assert!(matches!(err, IngestError::Description(ref e) if e.page == 3));
        assert_eq!(index.count("pdf_collection").unwrap(), 5);
    }

    #[tokio::test]
    async fn non_pdf_source_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "just text").unwrap();
        let (index, pipeline) = pipeline("ingest_rejects_non_pdf", Arc::new(EchoCompletion));

        let err = pipeline.ingest(&path).await.unwrap_err();
        assert!(matches!(err, IngestError::Document(_)));
        assert!(index.collection_info("pdf_collection").unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_source_is_rejected() {
        let (_index, pipeline) = pipeline("ingest_missing_source", Arc::new(EchoCompletion));
        let err = pipeline.ingest(Path::new("/nonexistent/deck.pdf")).await.unwrap_err();
        assert!(matches!(err, IngestError::Document(_)));
    }
}
