use std::io::{Read, Write};

use anyhow::Context;

use investiq_lib::output::{ConsoleIO, write_json};
use investiq_lib::runtime::Runtime;

/// Run the `investiq chat` command.
pub async fn run_chat<IN, OUT, ERR>(
    message: &str,
    runtime: &Runtime,
    io: &mut dyn ConsoleIO<IN, OUT, ERR>,
) -> anyhow::Result<()>
where
    IN: Read,
    OUT: Write,
    ERR: Write,
{
    if message.trim().is_empty() {
        anyhow::bail!("message must not be empty");
    }

    let reply = runtime
        .orchestrator()
        .chat(message)
        .await
        .context("Chat failed")?;
    write_json(io.stdout(), &reply.to_json())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use investiq_lib::completion::{CompletionResponse, Part, ToolCall};
    use investiq_lib::index::CollectionRecord;
    use investiq_lib::output::BufferedIO;
    use investiq_lib::test_util::{HashEmbedder, ScriptedCompletion};
    use serde_json::json;

    use crate::test_util::runtime_with_completion;

    #[tokio::test]
    async fn try_run_chat_answers_with_tools_used() {
        let completion = Arc::new(ScriptedCompletion::new(vec![
            CompletionResponse {
                parts: vec![Part::ToolCall(ToolCall {
                    id: Some("call_0".to_string()),
                    name: "retrieve_data".to_string(),
                    arguments: json!({ "query": "team" }),
                })],
            },
            CompletionResponse::text("Jane Doe is the CEO."),
        ]));
        let (_tmp, runtime) = runtime_with_completion("cli_chat_tools", completion.clone());
        let text = "Team: Jane Doe (CEO)";
        let record = CollectionRecord {
            id: 0,
            vector: HashEmbedder::vector(text),
            text: text.to_string(),
        };
        runtime
            .index()
            .replace_collection(&runtime.schema(), None, &[record])
            .unwrap();
        let mut io = BufferedIO::new();

        crate::try_run(&["investiq", "chat", "Who leads the team?"], &runtime, &mut io)
            .await
            .unwrap();

        let reply = io.stdout_json().unwrap();
        assert_eq!(reply["message"], "Jane Doe is the CEO.");
        assert_eq!(reply["tools_used"], json!(["retrieve_data"]));
        assert!(reply["timestamp"].is_string());

        let requests = completion.requests();
        let Part::ToolResult(result) = &requests[1].messages[2].parts[0] else {
            panic!("second request does not carry the tool result");
        };
        assert!(!result.is_error);
        assert!(result.content.contains("Team: Jane Doe (CEO)"));
    }

    #[tokio::test]
    async fn try_run_chat_fails_on_empty_answer() {
        let completion = Arc::new(ScriptedCompletion::new(vec![CompletionResponse::text("")]));
        let (_tmp, runtime) = runtime_with_completion("cli_chat_empty", completion);
        let mut io = BufferedIO::new();

        let err = crate::try_run(&["investiq", "chat", "hello"], &runtime, &mut io)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Chat failed");
        assert_eq!(io.stdout_to_string(), "");
    }

    #[tokio::test]
    async fn try_run_chat_rejects_blank_message() {
        let (_tmp, runtime) =
            runtime_with_completion("cli_chat_blank", Arc::new(ScriptedCompletion::default()));
        let mut io = BufferedIO::new();

        let err = crate::try_run(&["investiq", "chat", "  "], &runtime, &mut io)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "message must not be empty");
    }
}
