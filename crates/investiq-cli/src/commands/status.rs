use std::io::{Read, Write};

use serde_json::{Map, Value, json};

use investiq_lib::output::{ConsoleIO, write_json};
use investiq_lib::runtime::Runtime;

/// Run the `investiq status` command.
pub async fn run_status<IN, OUT, ERR>(
    runtime: &Runtime,
    io: &mut dyn ConsoleIO<IN, OUT, ERR>,
) -> anyhow::Result<()>
where
    IN: Read,
    OUT: Write,
    ERR: Write,
{
    let name = runtime.settings.collection.clone();
    let info = if runtime.db.is_ready() {
        let index = runtime.index();
        let lookup = name.clone();
        tokio::task::spawn_blocking(move || index.collection_info(&lookup)).await??
    } else {
        None
    };

    let mut status = Map::new();
    status.insert("collection".to_string(), json!(name));
    status.insert("exists".to_string(), json!(info.is_some()));
    status.insert("database".to_string(), json!(runtime.db.location()));
    status.insert("embedder".to_string(), json!(runtime.backends.embedder.model_id()));
    if let Some(info) = info {
        if let Value::Object(fields) = serde_json::to_value(&info)? {
            status.extend(fields.into_iter().filter(|(key, _)| key != "name"));
        }
    }
    write_json(io.stdout(), &status)?;
    Ok(())
}
