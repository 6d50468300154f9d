use std::io::{Read, Write};
use std::path::Path;

use anyhow::Context;
use tracing::info;

use investiq_lib::output::{ConsoleIO, write_json};
use investiq_lib::runtime::Runtime;

/// Run the `investiq ingest` command.
pub async fn run_ingest<IN, OUT, ERR>(
    document: &Path,
    concurrency: Option<usize>,
    runtime: &Runtime,
    io: &mut dyn ConsoleIO<IN, OUT, ERR>,
) -> anyhow::Result<()>
where
    IN: Read,
    OUT: Write,
    ERR: Write,
{
    if concurrency == Some(0) {
        anyhow::bail!("--concurrency must be at least 1");
    }

    writeln!(io.stderr(), "Ingesting {}...", document.display())?;
    let report = runtime
        .ingest(document, concurrency)
        .await
        .with_context(|| format!("Ingestion of {} failed", document.display()))?;

    info!(pages = report.page_count, elapsed_ms = report.elapsed_ms, "Ingest command finished");
    write_json(io.stdout(), &report)?;
    Ok(())
}
