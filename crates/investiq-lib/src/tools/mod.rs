//! Capabilities the task agent may call during its tool-use loop.

pub mod retrieval;
pub mod web_search;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::completion::ToolSpec;
use crate::error::ToolInvocationError;

pub use retrieval::RetrievalTool;
pub use web_search::{DuckDuckGoSearch, SearchSnippet, WebSearch, WebSearchTool};

#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    /// Run the tool. The returned text is handed back to the model verbatim.
    async fn call(&self, arguments: &Value) -> Result<String, ToolInvocationError>;
}

/// JSON schema for tools taking a single free-text `query`.
pub fn query_parameters(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": { "type": "string", "description": description }
        },
        "required": ["query"]
    })
}

/// Extract the `query` string argument.
pub fn query_argument(tool: &str, arguments: &Value) -> Result<String, ToolInvocationError> {
    match arguments.get("query").and_then(Value::as_str) {
        Some(query) if !query.trim().is_empty() => Ok(query.trim().to_string()),
        Some(_) => Err(ToolInvocationError::new(tool, "`query` must not be empty")),
        None => Err(ToolInvocationError::new(
            tool,
            "missing string argument `query`",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_argument_trims() {
        let query = query_argument("web_search", &json!({"query": "  acme seed round "})).unwrap();
        assert_eq!(query, "acme seed round");
    }

    #[test]
    fn query_argument_missing_or_blank() {
        let err = query_argument("web_search", &json!({"q": "x"})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "tool `web_search` failed: missing string argument `query`"
        );
        assert!(query_argument("web_search", &json!({"query": " "})).is_err());
        assert!(query_argument("web_search", &json!({"query": 3})).is_err());
    }
}
