use std::io::{Read, Write};
use std::path::Path;

use serde_json::{Map, Value};

use investiq_lib::output::{ConsoleIO, write_json};
use investiq_lib::tasks::TaskCatalog;

/// Built-in tasks, overlaid with `tasks_file` when given.
pub fn load_catalog(tasks_file: Option<&Path>) -> anyhow::Result<TaskCatalog> {
    match tasks_file {
        Some(path) => TaskCatalog::from_json_file(path),
        None => Ok(TaskCatalog::builtin()),
    }
}

/// Run the `investiq tasks` command.
pub fn run_tasks<IN, OUT, ERR>(
    tasks_file: Option<&Path>,
    io: &mut dyn ConsoleIO<IN, OUT, ERR>,
) -> anyhow::Result<()>
where
    IN: Read,
    OUT: Write,
    ERR: Write,
{
    let catalog = load_catalog(tasks_file)?;
    let shapes: Map<String, Value> = catalog
        .tasks()
        .iter()
        .map(|task| (task.name.clone(), task.schema.example()))
        .collect();
    write_json(io.stdout(), &shapes)?;
    Ok(())
}
