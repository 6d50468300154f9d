use rusqlite::Connection;
use rusqlite_migration::{M, Migrations};

/// Define all schema migrations.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // v1: collections and their records
        M::up(
            "CREATE TABLE collections (
                name            TEXT PRIMARY KEY,
                dimension       INTEGER NOT NULL,
                metric          TEXT NOT NULL,
                consistency     TEXT NOT NULL,
                source_path     TEXT,
                source_sha256   TEXT,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
            );

            CREATE TABLE records (
                collection  TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
                id          INTEGER NOT NULL,
                text        TEXT NOT NULL,
                vector      BLOB NOT NULL,
                PRIMARY KEY (collection, id)
            );",
        ),
    ])
}

/// Apply all pending migrations to the database.
pub fn apply_migrations(conn: &mut Connection) -> anyhow::Result<()> {
    migrations()
        .to_latest(conn)
        .map_err(|e| anyhow::anyhow!("Failed to apply migrations: {e}"))?;
    Ok(())
}
