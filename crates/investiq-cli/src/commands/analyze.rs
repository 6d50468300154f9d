use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::Context;
use tracing::info;

use investiq_lib::output::{ConsoleIO, write_json};
use investiq_lib::runtime::Runtime;

use super::tasks::load_catalog;

#[derive(Debug, Default)]
pub struct AnalyzeOptions {
    pub document: Option<PathBuf>,
    /// Empty means every catalog task in catalog order.
    pub tasks: Vec<String>,
    pub tasks_file: Option<PathBuf>,
    pub trace: bool,
}

/// Run the `investiq analyze` command.
///
/// Task failures are reported inside the printed report; only an invalid
/// selection or a failed up-front ingestion fails the command.
pub async fn run_analyze<IN, OUT, ERR>(
    options: &AnalyzeOptions,
    runtime: &Runtime,
    io: &mut dyn ConsoleIO<IN, OUT, ERR>,
) -> anyhow::Result<()>
where
    IN: Read,
    OUT: Write,
    ERR: Write,
{
    let catalog = load_catalog(options.tasks_file.as_deref())?;
    let tasks = if options.tasks.is_empty() {
        catalog.tasks().to_vec()
    } else {
        catalog.select(&options.tasks)?
    };

    if let Some(document) = &options.document {
        writeln!(io.stderr(), "Ingesting {}...", document.display())?;
        let report = runtime
            .ingest(document, None)
            .await
            .with_context(|| format!("Ingestion of {} failed", document.display()))?;
        writeln!(
            io.stderr(),
            "Ingested {} pages into {}",
            report.page_count,
            report.collection
        )?;
    }

    writeln!(io.stderr(), "Running {} task(s)...", tasks.len())?;
    info!(tasks = tasks.len(), trace = options.trace, "Starting analysis");
    let report = runtime.orchestrator().run_tasks(&tasks, options.trace).await;
    write_json(io.stdout(), &report.to_json())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use investiq_lib::completion::{CompletionResponse, Part, ToolCall};
    use investiq_lib::output::BufferedIO;
    use investiq_lib::test_util::ScriptedCompletion;
    use serde_json::json;

    use crate::test_util::{runtime_in_memory, runtime_with_completion, write_fake_pdf};

    fn retrieve_call(query: &str) -> CompletionResponse {
        CompletionResponse {
            parts: vec![Part::ToolCall(ToolCall {
                id: Some("call_0".to_string()),
                name: "retrieve_data".to_string(),
                arguments: json!({ "query": query }),
            })],
        }
    }

    #[tokio::test]
    async fn try_run_analyze_before_ingestion_uses_empty_retrieval() {
        let completion = Arc::new(ScriptedCompletion::new(vec![
            retrieve_call("revenue"),
            CompletionResponse::text(
                r#"{"revenue_streams": [{"name": "insufficient data", "description": "insufficient data", "target_audience": "insufficient data", "percentage_contribution": "insufficient data"}]}"#,
            ),
        ]));
        let (_tmp, runtime) = runtime_with_completion("cli_analyze_empty", completion.clone());
        let mut io = BufferedIO::new();

        crate::try_run(
            &["investiq", "analyze", "--task", "revenue_stream", "--trace"],
            &runtime,
            &mut io,
        )
        .await
        .unwrap();

        let report = io.stdout_json().unwrap();
        assert_eq!(
            report["revenue_stream"]["revenue_streams"][0]["name"],
            "insufficient data"
        );
        assert_eq!(report["metadata"]["pipeline_status"], "completed");
        assert_eq!(report["metadata"]["tasks_run"], json!(["revenue_stream"]));
        let trace = report["metadata"]["traces"]["revenue_stream"].as_array().unwrap();
        assert_eq!(trace[1]["event"], "tool_result");
        assert_eq!(trace[1]["content"], "[]");
        assert_eq!(completion.requests().len(), 2);
    }

    #[tokio::test]
    async fn try_run_analyze_reports_each_failed_task() {
        let (tmp, runtime) = runtime_in_memory("cli_analyze_failures");
        let deck = write_fake_pdf(tmp.path(), "deck.pdf", &["Team: Jane Doe (CEO)"]).unwrap();
        let mut io = BufferedIO::new();

        crate::try_run(
            &["investiq", "analyze", "--document", deck.to_str().unwrap()],
            &runtime,
            &mut io,
        )
        .await
        .unwrap();

        assert_eq!(runtime.index().count("pdf_collection").unwrap(), 1);
        let report = io.stdout_json().unwrap();
        assert_eq!(report["metadata"]["pipeline_status"], "completed_with_errors");
        assert_eq!(
            report["metadata"]["failed_tasks"],
            report["metadata"]["tasks_run"]
        );
        assert_eq!(report["metadata"]["tasks_run"].as_array().unwrap().len(), 5);
        assert!(report["founder_profile"]["error"].is_string());
        assert!(report["founder_profile"]["raw_output"].is_null());
        assert!(io.stderr_to_string().contains("Ingested 1 pages into pdf_collection"));
    }

    #[tokio::test]
    async fn try_run_analyze_rejects_unknown_task() {
        let (_tmp, runtime) = runtime_in_memory("cli_analyze_unknown");
        let mut io = BufferedIO::new();

        let err = crate::try_run(
            &["investiq", "analyze", "--task", "valuation"],
            &runtime,
            &mut io,
        )
        .await
        .unwrap_err();

        assert!(err.to_string().starts_with("unknown task 'valuation'"));
        assert_eq!(io.stdout_to_string(), "");
    }
}
