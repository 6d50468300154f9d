//! Tool-use loop driving a completion service towards a contract-conformant
//! answer.
//!
//! The loop is an explicit state machine:
//!
//! ```text
//! AwaitingModel --tool calls--> AwaitingToolResults --results--> AwaitingModel
//! AwaitingModel --plain text--> Done --contract accepts--> output
//! ```
//!
//! Every run owns its message history and event log, so concurrent runs
//! share nothing but the read-only tools.

pub mod json;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::completion::{
    CompletionRequest, CompletionService, Message, Part, Sampling, ToolCall, ToolResult, ToolSpec,
};
use crate::config::{MAX_AGENT_STEPS, TOOL_CALL_TIMEOUT};
use crate::error::{AgentError, OutputContractViolation, ToolInvocationError};
use crate::tools::Tool;

/// Decides whether a final answer is acceptable and extracts its value.
pub trait OutputContract: Send + Sync {
    fn accept(&self, text: &str) -> Result<Value, String>;
}

impl<F> OutputContract for F
where
    F: Fn(&str) -> Result<Value, String> + Send + Sync,
{
    fn accept(&self, text: &str) -> Result<Value, String> {
        self(text)
    }
}

/// Trace entry recorded while a run progresses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AgentEvent {
    ModelText {
        step: usize,
        text: String,
    },
    ToolCall {
        step: usize,
        call: ToolCall,
    },
    ToolResult {
        step: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        tool: String,
        content: String,
    },
    ToolError {
        step: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        tool: String,
        error: String,
    },
}

#[derive(Debug)]
enum AgentState {
    AwaitingModel,
    AwaitingToolResults(Vec<ToolCall>),
    Done(String),
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub output: Value,
    pub raw_text: String,
    pub events: Vec<AgentEvent>,
    /// Completion calls made.
    pub steps: usize,
}

pub struct Agent {
    name: String,
    completion: Arc<dyn CompletionService>,
    model: String,
    instructions: String,
    tools: Vec<Arc<dyn Tool>>,
    sampling: Sampling,
    max_steps: usize,
    tool_timeout: Duration,
}

impl Agent {
    pub fn new(
        name: &str,
        completion: Arc<dyn CompletionService>,
        model: &str,
        instructions: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            completion,
            model: model.to_string(),
            instructions: instructions.to_string(),
            tools: Vec::new(),
            sampling: Sampling::deterministic(),
            max_steps: MAX_AGENT_STEPS,
            tool_timeout: TOOL_CALL_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    #[must_use]
    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    #[must_use]
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Submit `prompt` and loop until the model answers without tool calls.
    /// The answer must satisfy `contract`.
    pub async fn run(
        &self,
        prompt: &str,
        contract: &dyn OutputContract,
    ) -> Result<AgentRun, AgentError> {
        let specs: Vec<ToolSpec> = self.tools.iter().map(|tool| tool.spec()).collect();
        let mut messages = vec![Message::user_text(prompt)];
        let mut events = Vec::new();
        let mut steps = 0;
        let mut state = AgentState::AwaitingModel;

        loop {
            state = match state {
                AgentState::AwaitingModel => {
                    if steps >= self.max_steps {
                        return Err(AgentError::StepBudgetExhausted {
                            agent: self.name.clone(),
                            steps,
                        });
                    }
                    steps += 1;

                    let request = CompletionRequest {
                        model: self.model.clone(),
                        system_instruction: Some(self.instructions.clone()),
                        messages: std::mem::take(&mut messages),
                        tools: specs.clone(),
                        sampling: self.sampling,
                    };
                    let response = self.completion.complete(&request).await;
                    messages = request.messages;
                    let response = response.map_err(|source| AgentError::Completion {
                        agent: self.name.clone(),
                        source,
                    })?;

                    let text = response.joined_text();
                    if !text.trim().is_empty() {
                        events.push(AgentEvent::ModelText {
                            step: steps,
                            text: text.clone(),
                        });
                    }
                    let calls = response.tool_calls();
                    messages.push(Message::model(response.parts));
                    debug!(agent = %self.name, step = steps, tool_calls = calls.len(), "Model responded");

                    if calls.is_empty() {
                        AgentState::Done(text)
                    } else {
                        AgentState::AwaitingToolResults(calls)
                    }
                }
                AgentState::AwaitingToolResults(calls) => {
                    let mut parts = Vec::with_capacity(calls.len());
                    for call in calls {
                        events.push(AgentEvent::ToolCall {
                            step: steps,
                            call: call.clone(),
                        });
                        let result = match self.invoke(&call).await {
                            Ok(content) => {
                                events.push(AgentEvent::ToolResult {
                                    step: steps,
                                    call_id: call.id.clone(),
                                    tool: call.name.clone(),
                                    content: content.clone(),
                                });
                                ToolResult {
                                    call_id: call.id,
                                    name: call.name,
                                    content,
                                    is_error: false,
                                }
                            }
                            Err(err) => {
                                warn!(agent = %self.name, error = %err, "Tool call failed");
                                events.push(AgentEvent::ToolError {
                                    step: steps,
                                    call_id: call.id.clone(),
                                    tool: call.name.clone(),
                                    error: err.reason.clone(),
                                });
                                ToolResult {
                                    call_id: call.id,
                                    name: call.name,
                                    content: err.to_string(),
                                    is_error: true,
                                }
                            }
                        };
                        parts.push(Part::ToolResult(result));
                    }
                    messages.push(Message::user(parts));
                    AgentState::AwaitingModel
                }
                AgentState::Done(text) => {
                    return match contract.accept(&text) {
                        Ok(output) => Ok(AgentRun {
                            output,
                            raw_text: text,
                            events,
                            steps,
                        }),
                        Err(reason) => Err(OutputContractViolation {
                            task: self.name.clone(),
                            reason,
                            raw: text,
                        }
                        .into()),
                    };
                }
            };
        }
    }

    async fn invoke(&self, call: &ToolCall) -> Result<String, ToolInvocationError> {
        let tool = self
            .tools
            .iter()
            .find(|tool| tool.spec().name == call.name)
            .ok_or_else(|| ToolInvocationError::new(&call.name, "unknown tool"))?;
        tokio::time::timeout(self.tool_timeout, tool.call(&call.arguments))
            .await
            .map_err(|_| {
                ToolInvocationError::new(
                    &call.name,
                    format!("timed out after {}s", self.tool_timeout.as_secs()),
                )
            })?
    }
}
