use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use super::{ANALYST_INSTRUCTIONS, TaskDefinition};
use crate::agent::{Agent, AgentEvent, AgentRun};
use crate::completion::{CompletionService, Sampling};
use crate::config::{MAX_AGENT_STEPS, TOOL_CALL_TIMEOUT};
use crate::error::AgentError;
use crate::tools::Tool;

/// Runs task definitions through a tool-using agent.
///
/// Each run builds a fresh [`Agent`], so tasks share nothing except the
/// read-only tools.
pub struct Orchestrator {
    completion: Arc<dyn CompletionService>,
    model: String,
    tools: Vec<Arc<dyn Tool>>,
    sampling: Sampling,
    max_steps: usize,
    tool_timeout: Duration,
}

/// Result of a batch of tasks, keyed by task name in run order.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub results: Map<String, Value>,
    pub tasks_run: Vec<String>,
    pub failed_tasks: Vec<String>,
    pub timestamp: Timestamp,
    pub traces: Option<Map<String, Value>>,
}

impl AnalysisReport {
    pub fn pipeline_status(&self) -> &'static str {
        if self.failed_tasks.is_empty() {
            "completed"
        } else {
            "completed_with_errors"
        }
    }

    /// `{<task>: <result or error>, ..., "metadata": {...}}`.
    pub fn to_json(&self) -> Value {
        let mut out = self.results.clone();
        let mut metadata = Map::new();
        metadata.insert("timestamp".to_string(), json!(self.timestamp.to_string()));
        metadata.insert("pipeline_status".to_string(), json!(self.pipeline_status()));
        metadata.insert("tasks_run".to_string(), json!(self.tasks_run));
        metadata.insert("failed_tasks".to_string(), json!(self.failed_tasks));
        if let Some(traces) = &self.traces {
            metadata.insert("traces".to_string(), Value::Object(traces.clone()));
        }
        out.insert("metadata".to_string(), Value::Object(metadata));
        Value::Object(out)
    }
}

/// A conversational answer with the tools consulted to produce it.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub message: String,
    /// Tool names in call order, repeated when called repeatedly.
    pub tools_used: Vec<String>,
    pub timestamp: Timestamp,
}

impl ChatReply {
    pub fn to_json(&self) -> Value {
        json!({
            "message": self.message,
            "tools_used": self.tools_used,
            "timestamp": self.timestamp.to_string(),
        })
    }
}

const CHAT_AGENT: &str = "chat";

fn chat_prompt(message: &str) -> String {
    format!(
        "User Message: {message}\n\n\
         Please respond as InvestIQ, providing helpful investment analysis and insights. \
         Use the available tools to gather additional information if needed."
    )
}

fn accept_chat_answer(text: &str) -> Result<Value, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("answer is empty".to_string());
    }
    Ok(Value::String(text.to_string()))
}

/// Explicit error payload reported in place of a task result.
pub fn error_payload(err: &AgentError) -> Value {
    json!({
        "error": err.to_string(),
        "raw_output": err.raw_output(),
    })
}

impl Orchestrator {
    pub fn new(completion: Arc<dyn CompletionService>, model: &str, tools: Vec<Arc<dyn Tool>>) -> Self {
        Self {
            completion,
            model: model.to_string(),
            tools,
            sampling: Sampling::deterministic(),
            max_steps: MAX_AGENT_STEPS,
            tool_timeout: TOOL_CALL_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    #[must_use]
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    fn agent_named(&self, name: &str) -> Agent {
        self.tools.iter().fold(
            Agent::new(name, Arc::clone(&self.completion), &self.model, ANALYST_INSTRUCTIONS)
                .with_sampling(self.sampling)
                .with_max_steps(self.max_steps)
                .with_tool_timeout(self.tool_timeout),
            |agent, tool| agent.with_tool(Arc::clone(tool)),
        )
    }

    /// Run one task to a schema-conformant answer.
    pub async fn run_task(&self, task: &TaskDefinition) -> Result<AgentRun, AgentError> {
        info!(task = %task.name, "Running analysis task");
        let run = self
            .agent_named(&task.name)
            .run(&task.render_prompt(), task)
            .await?;
        info!(task = %task.name, steps = run.steps, "Task completed");
        Ok(run)
    }

    /// Run tasks one after another. A failing task is reported as an error
    /// payload and does not stop the ones after it.
    pub async fn run_tasks(&self, tasks: &[TaskDefinition], include_traces: bool) -> AnalysisReport {
        let mut results = Map::new();
        let mut traces = Map::new();
        let mut tasks_run = Vec::with_capacity(tasks.len());
        let mut failed_tasks = Vec::new();

        for task in tasks {
            tasks_run.push(task.name.clone());
            match self.run_task(task).await {
                Ok(run) => {
                    if include_traces {
                        traces.insert(task.name.clone(), events_json(&run.events));
                    }
                    results.insert(task.name.clone(), run.output);
                }
                Err(err) => {
                    warn!(task = %task.name, error = %err, "Task failed");
                    failed_tasks.push(task.name.clone());
                    results.insert(task.name.clone(), error_payload(&err));
                }
            }
        }

        AnalysisReport {
            results,
            tasks_run,
            failed_tasks,
            timestamp: Timestamp::now(),
            traces: include_traces.then_some(traces),
        }
    }
}

impl Orchestrator {
    /// Answer a free-form message with the same agent and tools as the
    /// analysis tasks. Any non-empty text is an acceptable answer.
    pub async fn chat(&self, message: &str) -> Result<ChatReply, AgentError> {
        info!(chars = message.len(), "Running chat");
        let run = self
            .agent_named(CHAT_AGENT)
            .run(&chat_prompt(message), &accept_chat_answer)
            .await?;
        let tools_used = run
            .events
            .iter()
            .filter_map(|event| match event {
                AgentEvent::ToolCall { call, .. } => Some(call.name.clone()),
                _ => None,
            })
            .collect();
        Ok(ChatReply {
            message: run.raw_text.trim().to_string(),
            tools_used,
            timestamp: Timestamp::now(),
        })
    }
}

fn events_json(events: &[AgentEvent]) -> Value {
    serde_json::to_value(events).unwrap_or(Value::Null)
}
