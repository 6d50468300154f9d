use std::time::Duration;

/// Embedding dimension shared by every collection and every embedding backend
/// (GTE multilingual base and `embeddinggemma` both produce 768 floats).
pub const EMBEDDING_DIMENSION: usize = 768;

/// Uniform scale applied to both page axes when rasterizing.
pub const IMAGE_RESOLUTION_SCALE: f32 = 2.0;

/// Number of chunks the retrieval tool hands back to the agent.
pub const RETRIEVAL_TOP_K: usize = 3;

/// Name of the collection holding the currently ingested document.
pub const DEFAULT_COLLECTION: &str = "pdf_collection";

/// Vision model used to describe rasterized pages.
pub const DESCRIBE_MODEL: &str = "gemini-2.5-flash-lite";

/// Model driving the tool-use loop of analysis tasks.
pub const AGENT_MODEL: &str = "gemini-2.0-flash";

/// Fixed sampling seed so identical input yields identical completions.
pub const SAMPLING_SEED: i64 = 42;

/// Pages described concurrently during ingestion.
pub const DEFAULT_DESCRIBE_CONCURRENCY: usize = 4;

/// Upper bound on model turns per task before the run is abandoned.
pub const MAX_AGENT_STEPS: usize = 16;

/// Timeout applied to every remote request (completion, embedding, search).
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout applied to a single tool invocation inside the agent loop.
pub const TOOL_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// How long ingestion waits for inserted records to become visible.
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Delay between visibility checks while settling.
pub const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Maximum snippets returned by one web search call.
pub const WEB_SEARCH_MAX_RESULTS: usize = 5;

/// Default Gemini REST endpoint.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default Ollama endpoint and embedding model.
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const OLLAMA_EMBED_MODEL: &str = "embeddinggemma";

/// Default web search endpoint (DuckDuckGo Instant Answer API).
pub const WEB_SEARCH_URL: &str = "https://api.duckduckgo.com/";
