use std::path::PathBuf;

use clap::{Parser, Subcommand};

use investiq_lib::config::RETRIEVAL_TOP_K;

#[derive(Parser, Debug)]
#[command(
    name = "investiq",
    about = "Pitch deck ingestion and retrieval-augmented investment analysis"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Describe every page of a PDF and replace the active collection with it.
    Ingest {
        /// Path to the PDF document.
        document: PathBuf,
        /// Maximum number of pages described at once.
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Search the active collection and print `[text, distance]` pairs.
    Query {
        /// Free-text query.
        text: String,
        /// Number of results.
        #[arg(short, default_value_t = RETRIEVAL_TOP_K)]
        k: usize,
    },

    /// Run analysis tasks against the active collection.
    Analyze {
        /// Ingest this PDF before running the tasks.
        #[arg(long)]
        document: Option<PathBuf>,
        /// Run only these tasks, in the given order. Repeatable.
        #[arg(long = "task")]
        tasks: Vec<String>,
        /// JSON file with additional or overriding task definitions.
        #[arg(long)]
        tasks_file: Option<PathBuf>,
        /// Include each task's agent trace in the metadata.
        #[arg(long)]
        trace: bool,
    },

    /// Ask the analyst agent a free-form question and print its answer.
    Chat {
        /// The question or instruction.
        message: String,
    },

    /// List the available analysis tasks with their output shapes.
    Tasks {
        /// JSON file with additional or overriding task definitions.
        #[arg(long)]
        tasks_file: Option<PathBuf>,
    },

    /// Show the active collection.
    Status,

    /// Manage the local embedding model.
    Model {
        #[command(subcommand)]
        model_command: ModelCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ModelCommand {
    /// Download the embedding model files from Hugging Face.
    Download {
        /// Force re-download even if files already exist.
        #[arg(long)]
        force: bool,
    },
}
