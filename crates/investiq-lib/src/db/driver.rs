use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use super::schema::apply_migrations;

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens connections to the embedded vector store.
///
/// Every operation opens its own connection so that searches can run
/// concurrently from blocking worker threads. The in-memory variant keeps one
/// anchor connection alive so the shared-cache database outlives individual
/// connections.
#[derive(Debug, Clone)]
pub enum DatabaseDriver {
    File(PathBuf),
    InMemory {
        uri: String,
        anchor: Arc<Mutex<Connection>>,
    },
}

impl DatabaseDriver {
    /// A file-backed store. The file is created on first [`open`](Self::open).
    pub fn file(path: PathBuf) -> Self {
        Self::File(path)
    }

    /// A named shared-cache in-memory store. Names must be unique per test.
    pub fn in_memory(name: &str) -> anyhow::Result<Self> {
        let uri = format!("file:{name}?mode=memory&cache=shared");
        let mut anchor = Connection::open_with_flags(&uri, uri_flags())
            .with_context(|| format!("Failed to open in-memory database {name}"))?;
        apply_migrations(&mut anchor)?;
        Ok(Self::InMemory {
            uri,
            anchor: Arc::new(Mutex::new(anchor)),
        })
    }

    /// Whether the backing store exists. A missing file means nothing has
    /// been ingested yet.
    pub fn is_ready(&self) -> bool {
        match self {
            Self::File(path) => path.exists(),
            Self::InMemory { .. } => true,
        }
    }

    /// Human-readable location for logs and status output.
    pub fn location(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::InMemory { uri, .. } => uri.clone(),
        }
    }

    /// Open a connection with migrations applied.
    pub fn open(&self) -> anyhow::Result<Connection> {
        let mut conn = match self {
            Self::File(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create database directory {}", parent.display())
                    })?;
                }
                let conn = Connection::open(path)
                    .with_context(|| format!("Failed to open database {}", path.display()))?;
                let mode: String = conn
                    .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
                    .context("Failed to enable WAL mode")?;
                debug!(path = %path.display(), journal_mode = %mode, "Opened database");
                conn
            }
            Self::InMemory { uri, .. } => Connection::open_with_flags(uri, uri_flags())
                .with_context(|| format!("Failed to open database {uri}"))?,
        };
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("Failed to set busy timeout")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        apply_migrations(&mut conn)?;
        Ok(conn)
    }
}

fn uri_flags() -> OpenFlags {
    OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_URI
}
