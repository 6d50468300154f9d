use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{Tool, query_argument, query_parameters};
use crate::completion::ToolSpec;
use crate::embedding::TextEmbedder;
use crate::error::ToolInvocationError;
use crate::index::{IndexReader, Metric, SearchParams};

pub const RETRIEVE_TOOL_NAME: &str = "retrieve_data";

/// Bridges the agent to the ingested document: embed the query, search the
/// active collection, return `[text, distance]` pairs as JSON.
///
/// Holds only an [`IndexReader`], so it cannot modify the collection.
#[derive(Clone)]
pub struct RetrievalTool {
    embedder: Arc<dyn TextEmbedder>,
    index: IndexReader,
    collection: String,
    metric: Metric,
    k: usize,
}

impl RetrievalTool {
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        index: IndexReader,
        collection: &str,
        metric: Metric,
        k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            collection: collection.to_string(),
            metric,
            k,
        }
    }

    /// Top-k `(text, distance)` pairs, most similar first. Empty when nothing
    /// has been ingested.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<(String, f32)>, ToolInvocationError> {
        let fail = |reason: String| ToolInvocationError::new(RETRIEVE_TOOL_NAME, reason);

        let index = self.index.clone();
        let collection = self.collection.clone();
        let stored = tokio::task::spawn_blocking(move || index.count(&collection))
            .await
            .map_err(|e| fail(e.to_string()))?
            .map_err(|e| fail(e.to_string()))?;
        if stored == 0 {
            debug!(collection = %self.collection, "Retrieval on empty collection");
            return Ok(Vec::new());
        }

        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| fail(e.to_string()))?;

        let index = self.index.clone();
        let collection = self.collection.clone();
        let (k, params) = (self.k, SearchParams { metric: self.metric });
        let hits = tokio::task::spawn_blocking(move || index.search(&collection, &vector, k, params))
            .await
            .map_err(|e| fail(e.to_string()))?
            .map_err(|e| fail(e.to_string()))?;

        debug!(query, returned = hits.len(), "Retrieved chunks");
        Ok(hits.into_iter().map(|hit| (hit.text, hit.distance)).collect())
    }

    /// [`retrieve`](Self::retrieve) serialized as a pretty-printed JSON array.
    pub async fn retrieve_json(&self, query: &str) -> Result<String, ToolInvocationError> {
        let pairs = self.retrieve(query).await?;
        serde_json::to_string_pretty(&pairs)
            .map_err(|e| ToolInvocationError::new(RETRIEVE_TOOL_NAME, e.to_string()))
    }
}

#[async_trait]
impl Tool for RetrievalTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: RETRIEVE_TOOL_NAME.to_string(),
            description: "Get necessary information from the ingested pitch deck. Returns up to three [text, distance] pairs, most relevant first; an empty list means nothing relevant was ingested.".to_string(),
            parameters: query_parameters("What to look for in the pitch deck."),
        }
    }

    async fn call(&self, arguments: &Value) -> Result<String, ToolInvocationError> {
        let query = query_argument(RETRIEVE_TOOL_NAME, arguments)?;
        self.retrieve_json(&query).await
    }
}
