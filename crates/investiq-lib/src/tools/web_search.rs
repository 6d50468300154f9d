use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{Tool, query_argument, query_parameters};
use crate::completion::ToolSpec;
use crate::config::REQUEST_TIMEOUT;
use crate::error::{ServiceError, ToolInvocationError};

pub const WEB_SEARCH_TOOL_NAME: &str = "web_search";

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSnippet {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// External search capability returning ranked snippets with source URLs.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchSnippet>, ServiceError>;
}

/// DuckDuckGo Instant Answer API client.
#[derive(Clone)]
pub struct DuckDuckGoSearch {
    client: Client,
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub fn new(endpoint: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("investiq/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build search HTTP client: {e}"))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchSnippet>, ServiceError> {
        debug!(query, "Searching the web");
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_instant_answer(&body, max_results)
    }
}

/// Collect the abstract, direct results and related topics (including
/// nested topic groups) in that order.
pub fn parse_instant_answer(body: &str, max_results: usize) -> Result<Vec<SearchSnippet>, ServiceError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ServiceError::Malformed(format!("invalid search response: {e}")))?;

    let mut snippets = Vec::new();
    let abstract_text = str_field(&value, "AbstractText");
    if !abstract_text.is_empty() {
        snippets.push(SearchSnippet {
            title: str_field(&value, "Heading").to_string(),
            url: str_field(&value, "AbstractURL").to_string(),
            snippet: abstract_text.to_string(),
        });
    }
    for key in ["Results", "RelatedTopics"] {
        if let Some(topics) = value.get(key).and_then(Value::as_array) {
            collect_topics(topics, &mut snippets);
        }
    }
    snippets.truncate(max_results);
    Ok(snippets)
}

fn collect_topics(topics: &[Value], out: &mut Vec<SearchSnippet>) {
    for topic in topics {
        if let Some(nested) = topic.get("Topics").and_then(Value::as_array) {
            collect_topics(nested, out);
            continue;
        }
        let text = str_field(topic, "Text");
        if text.is_empty() {
            continue;
        }
        let title = text.split(" - ").next().unwrap_or(text);
        out.push(SearchSnippet {
            title: title.to_string(),
            url: str_field(topic, "FirstURL").to_string(),
            snippet: text.to_string(),
        });
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Exposes a [`WebSearch`] backend to the agent.
#[derive(Clone)]
pub struct WebSearchTool {
    search: Arc<dyn WebSearch>,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new(search: Arc<dyn WebSearch>, max_results: usize) -> Self {
        Self {
            search,
            max_results,
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: WEB_SEARCH_TOOL_NAME.to_string(),
            description: "Search the public web. Returns a JSON list of {title, url, snippet}; cite the url as the data source.".to_string(),
            parameters: query_parameters("Search terms."),
        }
    }

    async fn call(&self, arguments: &Value) -> Result<String, ToolInvocationError> {
        let query = query_argument(WEB_SEARCH_TOOL_NAME, arguments)?;
        let snippets = self
            .search
            .search(&query, self.max_results)
            .await
            .map_err(|e| ToolInvocationError::new(WEB_SEARCH_TOOL_NAME, e.to_string()))?;
        serde_json::to_string_pretty(&snippets)
            .map_err(|e| ToolInvocationError::new(WEB_SEARCH_TOOL_NAME, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_util::CannedWebSearch;

    const BODY: &str = r#"{
        "Heading": "Acme Corp",
        "AbstractText": "Acme Corp is a logistics company.",
        "AbstractURL": "https://en.wikipedia.org/wiki/Acme",
        "Results": [
            {"Text": "Official site", "FirstURL": "https://acme.example"}
        ],
        "RelatedTopics": [
            {"Text": "Freight - moving goods", "FirstURL": "https://duckduckgo.com/Freight"},
            {"Name": "Companies", "Topics": [
                {"Text": "Globex - a competitor", "FirstURL": "https://duckduckgo.com/Globex"}
            ]},
            {"Text": "", "FirstURL": "https://duckduckgo.com/empty"}
        ]
    }"#;

    #[test]
    fn parse_collects_abstract_results_and_topics() {
        let snippets = parse_instant_answer(BODY, 10).unwrap();
        let titles: Vec<&str> = snippets.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Acme Corp", "Official site", "Freight", "Globex"]);
        assert_eq!(snippets[0].url, "https://en.wikipedia.org/wiki/Acme");
        assert_eq!(snippets[3].snippet, "Globex - a competitor");
    }

    #[test]
    fn parse_truncates_to_limit() {
        assert_eq!(parse_instant_answer(BODY, 2).unwrap().len(), 2);
    }

    #[test]
    fn parse_empty_answer() {
        assert!(parse_instant_answer("{}", 5).unwrap().is_empty());
        assert!(parse_instant_answer("not json", 5).is_err());
    }

    #[tokio::test]
    async fn tool_serializes_snippets() {
        let tool = WebSearchTool::new(
            Arc::new(CannedWebSearch::new(vec![SearchSnippet {
                title: "Acme raises seed".to_string(),
                url: "https://news.example/acme".to_string(),
                snippet: "Acme raised $2M.".to_string(),
            }])),
            5,
        );
        let output = tool.call(&json!({"query": "acme funding"})).await.unwrap();
        let parsed: Vec<SearchSnippet> = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed[0].url, "https://news.example/acme");
    }

    #[tokio::test]
    async fn failing_backend_becomes_tool_error() {
        let tool = WebSearchTool::new(Arc::new(CannedWebSearch::failing()), 5);
        let err = tool.call(&json!({"query": "acme"})).await.unwrap_err();
        assert_eq!(err.tool, "web_search");
    }
}
