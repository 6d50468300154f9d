//! Runtime settings read from environment variables.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::config::{
    AGENT_MODEL, DEFAULT_COLLECTION, DEFAULT_DESCRIBE_CONCURRENCY, DESCRIBE_MODEL, GEMINI_BASE_URL,
    OLLAMA_BASE_URL, OLLAMA_EMBED_MODEL, TOOL_CALL_TIMEOUT, WEB_SEARCH_URL,
};

/// Which embedding backend serves both documents and queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedderBackend {
    #[default]
    Local,
    Ollama,
}

impl fmt::Display for EmbedderBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Ollama => "ollama",
        })
    }
}

impl FromStr for EmbedderBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "ollama" => Ok(Self::Ollama),
            other => anyhow::bail!("unknown embedder '{other}' (expected 'local' or 'ollama')"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub gemini_api_key: Option<String>,
    pub gemini_url: String,
    pub describe_model: String,
    pub agent_model: String,
    pub embedder: EmbedderBackend,
    pub ollama_url: String,
    pub ollama_model: String,
    pub collection: String,
    pub concurrency: usize,
    /// Upper bound for a single agent tool call.
    pub tool_timeout: Duration,
    /// Directory holding the pdfium shared library. The system library is
    /// used when unset.
    pub pdfium_lib: Option<PathBuf>,
    pub search_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_url: GEMINI_BASE_URL.to_string(),
            describe_model: DESCRIBE_MODEL.to_string(),
            agent_model: AGENT_MODEL.to_string(),
            embedder: EmbedderBackend::default(),
            ollama_url: OLLAMA_BASE_URL.to_string(),
            ollama_model: OLLAMA_EMBED_MODEL.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            concurrency: DEFAULT_DESCRIBE_CONCURRENCY,
            tool_timeout: TOOL_CALL_TIMEOUT,
            pdfium_lib: None,
            search_url: WEB_SEARCH_URL.to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from a variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Self::default();

        settings.gemini_api_key = get("GEMINI_API_KEY");
        if let Some(url) = get("INVESTIQ_GEMINI_URL") {
            settings.gemini_url = url;
        }
        if let Some(model) = get("INVESTIQ_DESCRIBE_MODEL") {
            settings.describe_model = model;
        }
        if let Some(model) = get("INVESTIQ_AGENT_MODEL") {
            settings.agent_model = model;
        }
        if let Some(backend) = get("INVESTIQ_EMBEDDER") {
            settings.embedder = backend.parse().context("invalid INVESTIQ_EMBEDDER")?;
        }
        if let Some(url) = get("INVESTIQ_OLLAMA_URL") {
            settings.ollama_url = url;
        }
        if let Some(model) = get("INVESTIQ_OLLAMA_MODEL") {
            settings.ollama_model = model;
        }
        if let Some(collection) = get("INVESTIQ_COLLECTION") {
            settings.collection = collection;
        }
        if let Some(raw) = get("INVESTIQ_CONCURRENCY") {
            settings.concurrency = parse_positive(&raw).context("invalid INVESTIQ_CONCURRENCY")?;
        }
        if let Some(raw) = get("INVESTIQ_TIMEOUT_SECS") {
            let secs = parse_positive(&raw).context("invalid INVESTIQ_TIMEOUT_SECS")?;
            settings.tool_timeout = Duration::from_secs(u64::try_from(secs).unwrap_or(u64::MAX));
        }
        settings.pdfium_lib = get("INVESTIQ_PDFIUM_LIB").map(PathBuf::from);
        if let Some(url) = get("INVESTIQ_SEARCH_URL") {
            settings.search_url = url;
        }
        Ok(settings)
    }
}

fn parse_positive(raw: &str) -> anyhow::Result<usize> {
    let value: usize = raw
        .trim()
        .parse()
        .with_context(|| format!("'{raw}' is not a number"))?;
    anyhow::ensure!(value > 0, "must be greater than zero");
    Ok(value)
}
