use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::completion::{CompletionService, GeminiClient};
use crate::config::{EMBEDDING_DIMENSION, MAX_AGENT_STEPS, RETRIEVAL_TOP_K, WEB_SEARCH_MAX_RESULTS};
use crate::context::InvestiqContext;
use crate::db::DatabaseDriver;
use crate::document::{PdfiumRasterizer, Rasterizer};
use crate::embedding::{LocalEmbedder, OllamaEmbedder, TextEmbedder};
use crate::error::IngestError;
use crate::index::{CollectionSchema, ConsistencyLevel, Metric, VectorIndex};
use crate::pipeline::{IngestPipeline, IngestReport, PageDescriber};
use crate::settings::{EmbedderBackend, Settings};
use crate::tasks::Orchestrator;
use crate::tools::{DuckDuckGoSearch, RetrievalTool, Tool, WebSearch, WebSearchTool};

/// The external collaborators every command is built from.
#[derive(Clone)]
pub struct Backends {
    pub completion: Arc<dyn CompletionService>,
    pub embedder: Arc<dyn TextEmbedder>,
    pub rasterizer: Arc<dyn Rasterizer>,
    pub web_search: Arc<dyn WebSearch>,
}

impl Backends {
    pub fn from_settings(settings: &Settings, context: &InvestiqContext) -> anyhow::Result<Self> {
        let embedder: Arc<dyn TextEmbedder> = match settings.embedder {
            EmbedderBackend::Local => Arc::new(LocalEmbedder::new(&context.model_cache_dir())),
            EmbedderBackend::Ollama => Arc::new(OllamaEmbedder::new(
                &settings.ollama_url,
                &settings.ollama_model,
            )?),
        };
        debug!(embedder = %settings.embedder, "Selected embedding backend");
        Ok(Self {
            completion: Arc::new(GeminiClient::new(
                &settings.gemini_url,
                settings.gemini_api_key.clone(),
            )?),
            embedder,
            rasterizer: Arc::new(PdfiumRasterizer::new(settings.pdfium_lib.clone())),
            web_search: Arc::new(DuckDuckGoSearch::new(&settings.search_url)?),
        })
    }
}

/// Everything a command needs: file locations, settings, the vector store
/// and the backends.
pub struct Runtime {
    pub context: InvestiqContext,
    pub settings: Settings,
    pub db: DatabaseDriver,
    pub backends: Backends,
    ingest_lock: Arc<Mutex<()>>,
}

impl Runtime {
    pub fn new(
        context: InvestiqContext,
        settings: Settings,
        db: DatabaseDriver,
        backends: Backends,
    ) -> Self {
        Self {
            context,
            settings,
            db,
            backends,
            ingest_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Build the production runtime from `INVESTIQ_*` variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let context = InvestiqContext::from_env()?;
        let settings = Settings::from_env()?;
        let db = DatabaseDriver::file(context.db_path());
        let backends = Backends::from_settings(&settings, &context)?;
        Ok(Self::new(context, settings, db, backends))
    }

    pub fn index(&self) -> VectorIndex {
        VectorIndex::new(self.db.clone())
    }

    /// Schema of the active collection.
    pub fn schema(&self) -> CollectionSchema {
        CollectionSchema {
            name: self.settings.collection.clone(),
            dimension: EMBEDDING_DIMENSION,
            metric: Metric::InnerProduct,
            consistency: ConsistencyLevel::Bounded,
        }
    }

    pub fn ingest_pipeline(&self, concurrency: Option<usize>) -> IngestPipeline {
        IngestPipeline::new(
            Arc::clone(&self.backends.rasterizer),
            PageDescriber::new(
                Arc::clone(&self.backends.completion),
                &self.settings.describe_model,
            ),
            Arc::clone(&self.backends.embedder),
            self.index(),
            self.schema(),
            concurrency.unwrap_or(self.settings.concurrency),
        )
    }

    /// Ingest one document. Ingestions through the same runtime run one at a
    /// time.
    pub async fn ingest(
        &self,
        path: &Path,
        concurrency: Option<usize>,
    ) -> Result<IngestReport, IngestError> {
        let _guard = self.ingest_lock.lock().await;
        self.ingest_pipeline(concurrency).ingest(path).await
    }

    pub fn retrieval_tool(&self, k: usize) -> RetrievalTool {
        let schema = self.schema();
        RetrievalTool::new(
            Arc::clone(&self.backends.embedder),
            self.index().reader(),
            &schema.name,
            schema.metric,
            k,
        )
    }

    /// Orchestrator bound to the retrieval tool and web search.
    pub fn orchestrator(&self) -> Orchestrator {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(self.retrieval_tool(RETRIEVAL_TOP_K)),
            Arc::new(WebSearchTool::new(
                Arc::clone(&self.backends.web_search),
                WEB_SEARCH_MAX_RESULTS,
            )),
        ];
        Orchestrator::new(
            Arc::clone(&self.backends.completion),
            &self.settings.agent_model,
            tools,
        )
        .with_max_steps(MAX_AGENT_STEPS)
        .with_tool_timeout(self.settings.tool_timeout)
    }
}
