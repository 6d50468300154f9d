pub mod agent;
pub mod completion;
pub mod config;
pub mod context;
pub mod db;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod output;
pub mod pipeline;
pub mod runtime;
pub mod settings;
pub mod tasks;
pub mod tools;

#[cfg(any(test, feature = "test-util"))]
pub mod test_util;
