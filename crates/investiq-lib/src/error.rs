//! Typed failures crossing the core's component boundaries.
//!
//! Remote backends fail with [`ServiceError`]; each stage wraps it with the
//! context the caller needs to decide between retrying and aborting.

use std::path::PathBuf;

use thiserror::Error;

/// The source could not be opened or parsed as a PDF document.
#[derive(Debug, Error)]
#[error("cannot open document {}: {reason}", path.display())]
pub struct DocumentOpenError {
    pub path: PathBuf,
    pub reason: String,
}

impl DocumentOpenError {
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Transport-level failure of a remote backend (completion, embedding, search).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request timed out")]
    Timeout,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("missing credentials: {0}")]
    Unauthenticated(String),
}

impl ServiceError {
    /// Whether a caller retrying with backoff has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Malformed(_) | Self::Unauthenticated(_) => false,
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// The vision completion call for one page failed.
#[derive(Debug, Error)]
#[error("describing page {page} failed: {source}")]
pub struct DescriptionServiceError {
    pub page: usize,
    #[source]
    pub source: ServiceError,
}

#[derive(Debug, Error)]
pub enum EmbeddingServiceError {
    #[error("embedding backend failed: {0}")]
    Backend(#[from] ServiceError),
    #[error("embedding model unavailable: {0}")]
    Unavailable(String),
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding backend returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
#[error("index operation `{operation}` on collection '{collection}' failed: {source}")]
pub struct IndexOperationError {
    pub operation: &'static str,
    pub collection: String,
    #[source]
    pub source: anyhow::Error,
}

impl IndexOperationError {
    pub fn new(operation: &'static str, collection: &str, source: anyhow::Error) -> Self {
        Self {
            operation,
            collection: collection.to_string(),
            source,
        }
    }
}

/// A tool called by the agent failed. Fed back to the model as an
/// observation rather than aborting the task.
#[derive(Debug, Error)]
#[error("tool `{tool}` failed: {reason}")]
pub struct ToolInvocationError {
    pub tool: String,
    pub reason: String,
}

impl ToolInvocationError {
    pub fn new(tool: &str, reason: impl Into<String>) -> Self {
        Self {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}

/// The agent finished without output matching the task's schema.
#[derive(Debug, Error)]
#[error("task '{task}' produced output violating its contract: {reason}")]
pub struct OutputContractViolation {
    pub task: String,
    pub reason: String,
    /// The final model text, kept verbatim for inspection.
    pub raw: String,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Document(#[from] DocumentOpenError),
    #[error(transparent)]
    Description(#[from] DescriptionServiceError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingServiceError),
    #[error(transparent)]
    Index(#[from] IndexOperationError),
    #[error("ingestion worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("completion service failed during '{agent}': {source}")]
    Completion {
        agent: String,
        #[source]
        source: ServiceError,
    },
    #[error(transparent)]
    OutputContract(#[from] OutputContractViolation),
    #[error("'{agent}' used {steps} steps without producing a final answer")]
    StepBudgetExhausted { agent: String, steps: usize },
}

impl AgentError {
    /// Raw model text attached to the failure, if any.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Self::OutputContract(violation) => Some(&violation.raw),
            Self::Completion { .. } | Self::StepBudgetExhausted { .. } => None,
        }
    }
}
