pub mod analyze;
pub mod chat;
pub mod ingest;
pub mod model;
pub mod query;
pub mod status;
pub mod tasks;
