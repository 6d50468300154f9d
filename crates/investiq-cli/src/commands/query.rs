use std::io::{Read, Write};

use investiq_lib::output::{ConsoleIO, write_json};
use investiq_lib::runtime::Runtime;

/// Run the `investiq query` command.
pub async fn run_query<IN, OUT, ERR>(
    text: &str,
    k: usize,
    runtime: &Runtime,
    io: &mut dyn ConsoleIO<IN, OUT, ERR>,
) -> anyhow::Result<()>
where
    IN: Read,
    OUT: Write,
    ERR: Write,
{
    if k == 0 {
        anyhow::bail!("-k must be at least 1");
    }

    let hits = runtime.retrieval_tool(k).retrieve(text).await?;
    write_json(io.stdout(), &hits)?;
    Ok(())
}
