pub mod describe;
pub mod ingest;

pub use describe::PageDescriber;
pub use ingest::{IngestPipeline, IngestReport};
