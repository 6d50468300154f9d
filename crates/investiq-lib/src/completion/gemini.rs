use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::{
    CompletionRequest, CompletionResponse, CompletionService, Part, Role, ToolCall, ToolSpec,
};
use crate::config::REQUEST_TIMEOUT;
use crate::error::ServiceError;

/// Client for the Gemini `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GeminiClient {
    /// A missing key is reported per request so that commands which never
    /// call the model still work without credentials.
    pub fn new(base_url: &str, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build Gemini HTTP client: {e}"))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.base_url)
    }
}

#[async_trait]
impl CompletionService for GeminiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, ServiceError> {
        let Some(api_key) = &self.api_key else {
            return Err(ServiceError::Unauthenticated(
                "GEMINI_API_KEY is not set".to_string(),
            ));
        };
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending generateContent request"
        );

        let resp = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", api_key)
            .json(&build_body(request))
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
        parse_response(&body)
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Model => "model",
    }
}

fn part_json(part: &Part) -> Value {
    match part {
        Part::Text(text) => json!({ "text": text }),
        Part::InlineImage { mime_type, data } => json!({
            "inlineData": { "mimeType": mime_type, "data": data }
        }),
        Part::ToolCall(call) => {
            let mut function_call = Map::new();
            if let Some(id) = &call.id {
                function_call.insert("id".to_string(), Value::String(id.clone()));
            }
            function_call.insert("name".to_string(), Value::String(call.name.clone()));
            function_call.insert("args".to_string(), call.arguments.clone());
            json!({ "functionCall": function_call })
        }
        Part::ToolResult(result) => {
            let key = if result.is_error { "error" } else { "content" };
            let mut response = Map::new();
            response.insert(key.to_string(), Value::String(result.content.clone()));
            let mut function_response = Map::new();
            if let Some(id) = &result.call_id {
                function_response.insert("id".to_string(), Value::String(id.clone()));
            }
            function_response.insert("name".to_string(), Value::String(result.name.clone()));
            function_response.insert("response".to_string(), Value::Object(response));
            json!({ "functionResponse": function_response })
        }
    }
}

fn tool_json(tool: &ToolSpec) -> Value {
    json!({
        "name": tool.name,
        "description": tool.description,
        "parameters": uppercase_types(&tool.parameters),
    })
}

/// Gemini declares schema types in upper case (`OBJECT`, `STRING`).
fn uppercase_types(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| {
                    let value = match (key.as_str(), value) {
                        ("type", Value::String(ty)) => Value::String(ty.to_uppercase()),
                        _ => uppercase_types(value),
                    };
                    (key.clone(), value)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(uppercase_types).collect()),
        other => other.clone(),
    }
}

/// Request body for `generateContent`.
pub fn build_body(request: &CompletionRequest) -> Value {
    let mut body = Map::new();
    if let Some(instruction) = &request.system_instruction {
        body.insert(
            "systemInstruction".to_string(),
            json!({ "parts": [{ "text": instruction }] }),
        );
    }
    let contents: Vec<Value> = request
        .messages
        .iter()
        .map(|message| {
            json!({
                "role": role_name(message.role),
                "parts": message.parts.iter().map(part_json).collect::<Vec<_>>(),
            })
        })
        .collect();
    body.insert("contents".to_string(), Value::Array(contents));
    if !request.tools.is_empty() {
        body.insert(
            "tools".to_string(),
            json!([{ "functionDeclarations": request.tools.iter().map(tool_json).collect::<Vec<_>>() }]),
        );
    }

    let mut generation = Map::new();
    generation.insert("temperature".to_string(), json!(request.sampling.temperature));
    if let Some(seed) = request.sampling.seed {
        generation.insert("seed".to_string(), json!(seed));
    }
    if let Some(top_p) = request.sampling.top_p {
        generation.insert("topP".to_string(), json!(top_p));
    }
    if let Some(top_k) = request.sampling.top_k {
        generation.insert("topK".to_string(), json!(top_k));
    }
    body.insert("generationConfig".to_string(), Value::Object(generation));
    Value::Object(body)
}

/// Extract text and function calls from the first candidate.
pub fn parse_response(body: &str) -> Result<CompletionResponse, ServiceError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ServiceError::Malformed(format!("invalid JSON: {e}")))?;

    let Some(candidate) = value
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
    else {
        let reason = value
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
            .map_or_else(
                || "response has no candidates".to_string(),
                |reason| format!("prompt blocked: {reason}"),
            );
        return Err(ServiceError::Malformed(reason));
    };

    let parts = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            let finish = candidate
                .get("finishReason")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            ServiceError::Malformed(format!("candidate has no content (finishReason {finish})"))
        })?;

    let mut parsed = Vec::with_capacity(parts.len());
    for part in parts {
        if part.get("thought").and_then(Value::as_bool) == Some(true) {
            continue;
        }
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            parsed.push(Part::Text(text.to_string()));
        } else if let Some(call) = part.get("functionCall") {
            let name = call
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| ServiceError::Malformed("functionCall without name".to_string()))?;
            parsed.push(Part::ToolCall(ToolCall {
                id: call.get("id").and_then(Value::as_str).map(str::to_string),
                name: name.to_string(),
                arguments: call.get("args").cloned().unwrap_or_else(|| json!({})),
            }));
        }
    }
    Ok(CompletionResponse { parts: parsed })
}
