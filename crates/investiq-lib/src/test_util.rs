//! In-process doubles for the external backends.
//!
//! Fake documents use a plain-text layout: a `%PDF-1.7` header line followed
//! by page texts separated by [`FAKE_PAGE_SEPARATOR`]. [`StaticRasterizer`]
//! renders each page as an image whose bytes carry `page <n>\n<text>`, and
//! [`EchoCompletion`] reads that text back as the page description.

use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

use crate::completion::{CompletionRequest, CompletionResponse, CompletionService, Part};
use crate::config::EMBEDDING_DIMENSION;
use crate::document::{PageImage, Rasterizer};
use crate::embedding::TextEmbedder;
use crate::error::{DocumentOpenError, EmbeddingServiceError, ServiceError};
use crate::tools::{SearchSnippet, WebSearch};

pub const FAKE_PAGE_SEPARATOR: &str = "\n%%PAGE\n";

/// Write a fake PDF with one text block per page. Only [`StaticRasterizer`]
/// can read it.
pub fn write_fake_pdf(dir: &Path, name: &str, pages: &[&str]) -> std::io::Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, format!("%PDF-1.7\n{}", pages.join(FAKE_PAGE_SEPARATOR)))?;
    Ok(path)
}

/// A page image whose bytes encode its index and text.
pub fn page_image(page_index: usize, text: &str) -> PageImage {
    PageImage {
        page_index,
        width: 1,
        height: 1,
        png: format!("page {page_index}\n{text}").into_bytes(),
    }
}

/// Decode `(page_index, text)` from an inline image produced by [`page_image`].
fn decode_page(data: &str) -> Option<(usize, String)> {
    let bytes = STANDARD.decode(data).ok()?;
    let content = String::from_utf8(bytes).ok()?;
    let (header, text) = content.split_once('\n')?;
    let index = header.strip_prefix("page ")?.parse().ok()?;
    Some((index, text.to_string()))
}

fn first_image(request: &CompletionRequest) -> Option<(usize, String)> {
    request
        .messages
        .iter()
        .flat_map(|message| &message.parts)
        .find_map(|part| match part {
            Part::InlineImage { data, .. } => decode_page(data),
            _ => None,
        })
}

/// Splits fake documents into pages.
pub struct StaticRasterizer;

impl Rasterizer for StaticRasterizer {
    fn rasterize(
        &self,
        path: &Path,
        sink: &mut dyn FnMut(PageImage) -> ControlFlow<()>,
    ) -> Result<usize, DocumentOpenError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| DocumentOpenError::new(path, e.to_string()))?;
        let body = content
            .split_once('\n')
            .map(|(_, body)| body)
            .ok_or_else(|| DocumentOpenError::new(path, "document has no pages"))?;

        let mut delivered = 0;
        for (index, text) in body.split(FAKE_PAGE_SEPARATOR).enumerate() {
            delivered += 1;
            if sink(page_image(index, text)).is_break() {
                break;
            }
        }
        Ok(delivered)
    }
}

/// Describes a page by returning the text encoded in its image.
pub struct EchoCompletion;

#[async_trait]
impl CompletionService for EchoCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, ServiceError> {
        first_image(request)
            .map(|(_, text)| CompletionResponse::text(text))
            .ok_or_else(|| ServiceError::Malformed("request carries no page image".to_string()))
    }
}

/// Echoes pages like [`EchoCompletion`] but fails on one page index.
pub struct FailingPageCompletion {
    pub page: usize,
}

#[async_trait]
impl CompletionService for FailingPageCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, ServiceError> {
        match first_image(request) {
            Some((index, _)) if index == self.page => Err(ServiceError::Status {
                status: 429,
                body: "quota exhausted".to_string(),
            }),
            Some((_, text)) => Ok(CompletionResponse::text(text)),
            None => Err(ServiceError::Malformed("request carries no page image".to_string())),
        }
    }
}

/// Replays canned responses in order and records every request.
#[derive(Default)]
pub struct ScriptedCompletion {
    script: Mutex<VecDeque<CompletionResponse>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, ServiceError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| ServiceError::Malformed("scripted completion exhausted".to_string()))
    }
}

/// Bag-of-words embedder: each lowercase token is hashed into one of
/// [`EMBEDDING_DIMENSION`] buckets and the result is L2-normalized.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashEmbedder;

impl HashEmbedder {
    pub fn new() -> Self {
        Self
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; EMBEDDING_DIMENSION];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let slot = u64::from_le_bytes(bucket) % EMBEDDING_DIMENSION as u64;
            vector[usize::try_from(slot).unwrap_or_default()] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl TextEmbedder for HashEmbedder {
    fn model_id(&self) -> &str {
        "hash-bag-of-words"
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingServiceError> {
        Ok(texts.iter().map(|text| Self::vector(text)).collect())
    }
}

/// Returns the same snippets for every query, or fails every call.
pub struct CannedWebSearch {
    snippets: Vec<SearchSnippet>,
    fail: bool,
    queries: Mutex<Vec<String>>,
}

impl CannedWebSearch {
    pub fn new(snippets: Vec<SearchSnippet>) -> Self {
        Self {
            snippets,
            fail: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl WebSearch for CannedWebSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchSnippet>, ServiceError> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.to_string());
        if self.fail {
            return Err(ServiceError::Timeout);
        }
        Ok(self.snippets.iter().take(max_results).cloned().collect())
    }
}
