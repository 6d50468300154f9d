pub mod cli;
pub mod commands;
pub mod logging;

#[cfg(test)]
pub mod test_util;

use std::io::{Read, Write};

use clap::Parser;

use investiq_lib::output::ConsoleIO;
use investiq_lib::runtime::Runtime;

use cli::{Cli, Command, ModelCommand};

/// Main CLI entry point. Parses args and dispatches to the appropriate command.
pub async fn try_run<IN, OUT, ERR>(
    args: &[&str],
    runtime: &Runtime,
    io: &mut dyn ConsoleIO<IN, OUT, ERR>,
) -> anyhow::Result<()>
where
    IN: Read,
    OUT: Write,
    ERR: Write,
{
    let cli = Cli::try_parse_from(args)?;
    dispatch(cli, runtime, io).await
}

/// Like [`try_run`], but builds the runtime only after the arguments parse,
/// so usage errors and `--help` never depend on the environment.
pub async fn try_run_with_loader<IN, OUT, ERR, F>(
    args: &[&str],
    load_runtime: F,
    io: &mut dyn ConsoleIO<IN, OUT, ERR>,
) -> anyhow::Result<()>
where
    IN: Read,
    OUT: Write,
    ERR: Write,
    F: FnOnce() -> anyhow::Result<Runtime>,
{
    let cli = Cli::try_parse_from(args)?;
    let runtime = load_runtime()?;
    dispatch(cli, &runtime, io).await
}

async fn dispatch<IN, OUT, ERR>(
    cli: Cli,
    runtime: &Runtime,
    io: &mut dyn ConsoleIO<IN, OUT, ERR>,
) -> anyhow::Result<()>
where
    IN: Read,
    OUT: Write,
    ERR: Write,
{
    match cli.command {
        Command::Ingest {
            document,
            concurrency,
        } => commands::ingest::run_ingest(&document, concurrency, runtime, io).await,
        Command::Query { text, k } => commands::query::run_query(&text, k, runtime, io).await,
        Command::Analyze {
            document,
            tasks,
            tasks_file,
            trace,
        } => {
            let options = commands::analyze::AnalyzeOptions {
                document,
                tasks,
                tasks_file,
                trace,
            };
            commands::analyze::run_analyze(&options, runtime, io).await
        }
        Command::Chat { message } => commands::chat::run_chat(&message, runtime, io).await,
        Command::Tasks { tasks_file } => {
            commands::tasks::run_tasks(tasks_file.as_deref(), io)
        }
        Command::Status => commands::status::run_status(runtime, io).await,
        Command::Model { model_command } => match model_command {
            ModelCommand::Download { force } => {
                commands::model::run_model_download(force, runtime, io)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use clap::error::ErrorKind;
    use investiq_lib::output::BufferedIO;

    use super::*;
    use crate::test_util::runtime_not_ingested;

    fn broken_env() -> anyhow::Result<Runtime> {
        anyhow::bail!("invalid INVESTIQ_EMBEDDER")
    }

    #[tokio::test]
    async fn help_does_not_load_runtime() {
        let mut io = BufferedIO::new();
        let err = try_run_with_loader(&["investiq", "--help"], broken_env, &mut io)
            .await
            .unwrap_err();
        let clap_err = err.downcast_ref::<clap::Error>().unwrap();
        assert_eq!(clap_err.kind(), ErrorKind::DisplayHelp);
    }

    #[tokio::test]
    async fn unknown_subcommand_is_usage_error_despite_broken_env() {
        let mut io = BufferedIO::new();
        let err = try_run_with_loader(&["investiq", "qeury", "x"], broken_env, &mut io)
            .await
            .unwrap_err();
        let clap_err = err.downcast_ref::<clap::Error>().unwrap();
        assert_eq!(clap_err.kind(), ErrorKind::InvalidSubcommand);
    }

    #[tokio::test]
    async fn valid_command_surfaces_runtime_error() {
        let mut io = BufferedIO::new();
        let err = try_run_with_loader(&["investiq", "status"], broken_env, &mut io)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid INVESTIQ_EMBEDDER");
        assert_eq!(io.stdout_to_string(), "");
    }

    #[tokio::test]
    async fn loader_runtime_runs_command() {
        let (_tmp, runtime) = runtime_not_ingested();
        let mut io = BufferedIO::new();
        try_run_with_loader(&["investiq", "query", "team"], move || Ok(runtime), &mut io)
            .await
            .unwrap();
        assert_eq!(io.stdout_to_string(), "[]\n");
    }
}
