use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use async_trait::async_trait;
use fastembed::{
    InitOptionsUserDefined, Pooling, TextEmbedding, TokenizerFiles, UserDefinedEmbeddingModel,
};
use tracing::{debug, info};

use super::{TextEmbedder, check_vectors};
use crate::error::EmbeddingServiceError;

/// Subdirectory name under `model_cache_dir` for GTE multilingual base files.
pub const MODEL_SUBDIR: &str = "gte-multilingual-base";

/// Files the local model needs, relative to [`MODEL_SUBDIR`].
pub const MODEL_FILES: &[&str] = &[
    "model_int8.onnx",
    "tokenizer.json",
    "config.json",
    "special_tokens_map.json",
    "tokenizer_config.json",
];

const MODEL_ID: &str = "gte-multilingual-base-int8";

/// In-process embedder running GTE multilingual base int8 through fastembed.
///
/// The model is loaded on first use so that commands which never embed (for
/// example `model download`) work before the files exist.
pub struct LocalEmbedder {
    model_cache_dir: PathBuf,
    model: Arc<Mutex<Option<TextEmbedding>>>,
}

impl LocalEmbedder {
    pub fn new(model_cache_dir: &Path) -> Self {
        Self {
            model_cache_dir: model_cache_dir.to_path_buf(),
            model: Arc::new(Mutex::new(None)),
        }
    }

    /// Whether every model file is present on disk.
    pub fn is_downloaded(model_cache_dir: &Path) -> bool {
        let base = model_cache_dir.join(MODEL_SUBDIR);
        MODEL_FILES.iter().all(|file| base.join(file).exists())
    }
}

/// Load GTE multilingual base int8 from `model_cache_dir/gte-multilingual-base/`.
///
/// If the model files are not found, returns an error instructing the user
/// to run `investiq model download`.
fn load_model(model_cache_dir: &Path) -> anyhow::Result<TextEmbedding> {
    let base = model_cache_dir.join(MODEL_SUBDIR);

    let onnx_bytes = fs::read(base.join("model_int8.onnx")).with_context(|| {
        format!(
            "Model not found at {}. Run 'investiq model download' first.",
            base.display()
        )
    })?;

    let tokenizer_files = TokenizerFiles {
        tokenizer_file: fs::read(base.join("tokenizer.json")).context("Missing tokenizer.json")?,
        config_file: fs::read(base.join("config.json")).context("Missing config.json")?,
        special_tokens_map_file: fs::read(base.join("special_tokens_map.json"))
            .context("Missing special_tokens_map.json")?,
        tokenizer_config_file: fs::read(base.join("tokenizer_config.json"))
            .context("Missing tokenizer_config.json")?,
    };

    let user_model =
        UserDefinedEmbeddingModel::new(onnx_bytes, tokenizer_files).with_pooling(Pooling::Cls);

    let model =
        TextEmbedding::try_new_from_user_defined(user_model, InitOptionsUserDefined::default())
            .context("Failed to initialize GTE multilingual base int8 model")?;

    info!(path = %base.display(), "Loaded embedding model");
    Ok(model)
}

#[async_trait]
impl TextEmbedder for LocalEmbedder {
    fn model_id(&self) -> &str {
        MODEL_ID
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingServiceError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = texts.len(), "Embedding texts locally");

        let model = Arc::clone(&self.model);
        let model_cache_dir = self.model_cache_dir.clone();
        let owned = texts.to_vec();
        let vectors = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<Vec<f32>>> {
            let mut guard = model
                .lock()
                .map_err(|_| anyhow::anyhow!("embedding model lock poisoned"))?;
            if guard.is_none() {
                *guard = Some(load_model(&model_cache_dir)?);
            }
            let model = guard.as_mut().context("embedding model not loaded")?;
            model.embed(owned, None).context("Failed to embed texts")
        })
        .await
        .map_err(|e| EmbeddingServiceError::Unavailable(e.to_string()))?
        .map_err(|e| EmbeddingServiceError::Unavailable(format!("{e:#}")))?;

        check_vectors(texts.len(), vectors)
    }
}
