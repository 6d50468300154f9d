use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{TextEmbedder, check_vectors};
use crate::config::REQUEST_TIMEOUT;
use crate::error::{EmbeddingServiceError, ServiceError};

/// Embeddings from an Ollama server (`POST /api/embed`).
#[derive(Clone)]
pub struct OllamaEmbedder {
    client: Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str) -> anyhow::Result<Self> {
        anyhow::ensure!(!model.trim().is_empty(), "missing Ollama model name");
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build Ollama HTTP client: {e}"))?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/embed", base_url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }
}

fn parse_response(body: &str) -> Result<Vec<Vec<f32>>, ServiceError> {
    serde_json::from_str::<EmbedResponse>(body)
        .map(|parsed| parsed.embeddings)
        .map_err(|e| ServiceError::Malformed(format!("invalid Ollama embed response: {e}")))
}

#[async_trait]
impl TextEmbedder for OllamaEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingServiceError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = texts.len(), model = %self.model, "Requesting Ollama embeddings");

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(ServiceError::from)?;
        let status = resp.status();
        let body = resp.text().await.map_err(ServiceError::from)?;
        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }
        check_vectors(texts.len(), parse_response(&body)?)
    }
}
