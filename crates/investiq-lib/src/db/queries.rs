#![allow(
    clippy::cast_possible_wrap,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

/// A row of the `collections` table joined with its record count.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRow {
    pub name: String,
    pub dimension: usize,
    pub metric: String,
    pub consistency: String,
    pub source_path: Option<String>,
    pub source_sha256: Option<String>,
    pub created_at: String,
    pub record_count: usize,
}

/// A stored record with its decoded vector.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordRow {
    pub id: u64,
    pub text: String,
    pub vector: Vec<f32>,
}

/// Delete a collection and, through the cascade, all of its records.
/// Returns whether a collection was removed.
pub fn drop_collection(conn: &Connection, name: &str) -> anyhow::Result<bool> {
    let removed = conn
        .execute("DELETE FROM collections WHERE name = ?1", params![name])
        .context("Failed to drop collection")?;
    debug!(collection = name, removed, "Dropped collection");
    Ok(removed > 0)
}

/// Register an empty collection.
pub fn create_collection(
    conn: &Connection,
    name: &str,
    dimension: usize,
    metric: &str,
    consistency: &str,
) -> anyhow::Result<()> {
    debug!(collection = name, dimension, metric, consistency, "Creating collection");
    conn.execute(
        "INSERT INTO collections (name, dimension, metric, consistency) VALUES (?1, ?2, ?3, ?4)",
        params![name, dimension as i64, metric, consistency],
    )
    .context("Failed to create collection")?;
    Ok(())
}

/// Record which document a collection was built from.
pub fn set_collection_source(
    conn: &Connection,
    name: &str,
    source_path: &str,
    source_sha256: &str,
) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE collections SET source_path = ?2, source_sha256 = ?3 WHERE name = ?1",
        params![name, source_path, source_sha256],
    )
    .context("Failed to record collection source")?;
    Ok(())
}

/// Get a collection by name. Returns `None` if it does not exist.
pub fn get_collection(conn: &Connection, name: &str) -> anyhow::Result<Option<CollectionRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT c.name, c.dimension, c.metric, c.consistency, c.source_path,
                    c.source_sha256, c.created_at,
                    (SELECT count(*) FROM records r WHERE r.collection = c.name)
             FROM collections c WHERE c.name = ?1",
        )
        .context("Failed to prepare get_collection query")?;

    let result = stmt
        .query_row(params![name], |row| {
            Ok(CollectionRow {
                name: row.get(0)?,
                dimension: row.get::<_, i64>(1)? as usize,
                metric: row.get(2)?,
                consistency: row.get(3)?,
                source_path: row.get(4)?,
                source_sha256: row.get(5)?,
                created_at: row.get(6)?,
                record_count: row.get::<_, i64>(7)? as usize,
            })
        })
        .optional()
        .context("Failed to query collection")?;

    Ok(result)
}

/// Insert records into an existing collection. Fails on a duplicate id.
pub fn insert_records(
    conn: &Connection,
    collection: &str,
    records: &[(u64, &str, &[f32])],
) -> anyhow::Result<()> {
    debug!(collection, count = records.len(), "Inserting records");
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO records (collection, id, text, vector) VALUES (?1, ?2, ?3, ?4)",
        )
        .context("Failed to prepare insert_records statement")?;
    for (id, text, vector) in records {
        stmt.execute(params![collection, *id as i64, text, encode_vector(vector)])
            .with_context(|| format!("Failed to insert record {id}"))?;
    }
    Ok(())
}

/// Load every record of a collection ordered by id.
pub fn load_records(conn: &Connection, collection: &str) -> anyhow::Result<Vec<RecordRow>> {
    let mut stmt = conn
        .prepare("SELECT id, text, vector FROM records WHERE collection = ?1 ORDER BY id")
        .context("Failed to prepare load_records query")?;

    let rows = stmt
        .query_map(params![collection], |row| {
            let blob: Vec<u8> = row.get(2)?;
            Ok((row.get::<_, i64>(0)? as u64, row.get::<_, String>(1)?, blob))
        })
        .context("Failed to query records")?;

    let mut records = Vec::new();
    for row in rows {
        let (id, text, blob) = row.context("Failed to read record row")?;
        let vector = decode_vector(&blob)
            .with_context(|| format!("Record {id} has a corrupt vector"))?;
        records.push(RecordRow { id, text, vector });
    }
    Ok(records)
}

/// Number of records stored in a collection.
pub fn count_records(conn: &Connection, collection: &str) -> anyhow::Result<usize> {
    let count: i64 = conn
        .query_row(
            "SELECT count(*) FROM records WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )
        .context("Failed to count records")?;
    Ok(count as usize)
}

/// Names of all collections, sorted.
pub fn list_collections(conn: &Connection) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM collections ORDER BY name")
        .context("Failed to prepare list_collections query")?;
    let names = stmt
        .query_map([], |row| row.get(0))
        .context("Failed to query collections")?
        .collect::<Result<Vec<String>, _>>()
        .context("Failed to read collection row")?;
    Ok(names)
}

/// Serialize a vector as packed little-endian `f32`s.
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`encode_vector`].
pub fn decode_vector(blob: &[u8]) -> anyhow::Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        anyhow::bail!("vector blob length {} is not a multiple of 4", blob.len());
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::apply_migrations;

    fn setup() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        apply_migrations(&mut conn).unwrap();
        conn
    }

    #[test]
    fn create_and_get_collection() {
        let conn = setup();
        create_collection(&conn, "pdf_collection", 3, "IP", "Bounded").unwrap();

        let row = get_collection(&conn, "pdf_collection").unwrap().unwrap();
        assert_eq!(row.name, "pdf_collection");
        assert_eq!(row.dimension, 3);
        assert_eq!(row.metric, "IP");
        assert_eq!(row.consistency, "Bounded");
        assert_eq!(row.source_path, None);
        assert_eq!(row.record_count, 0);
    }

    #[test]
    fn get_missing_collection_returns_none() {
        let conn = setup();
        assert!(get_collection(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn insert_and_load_records_in_id_order() {
        let conn = setup();
        create_collection(&conn, "c", 2, "IP", "Bounded").unwrap();
        insert_records(
            &conn,
            "c",
            &[
                (1, "Market: B2B SaaS", &[0.0, 1.0]),
                (0, "Team: two founders", &[1.0, 0.0]),
            ],
        )
        .unwrap();

        let records = load_records(&conn, "c").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 0);
        assert_eq!(records[0].text, "Team: two founders");
        assert_eq!(records[0].vector, vec![1.0, 0.0]);
        assert_eq!(records[1].id, 1);
        assert_eq!(count_records(&conn, "c").unwrap(), 2);
    }

    #[test]
    fn drop_collection_removes_records() {
        let conn = setup();
        create_collection(&conn, "c", 1, "IP", "Bounded").unwrap();
        insert_records(&conn, "c", &[(0, "a", &[0.5])]).unwrap();

        assert!(drop_collection(&conn, "c").unwrap());
        assert!(!drop_collection(&conn, "c").unwrap());
        assert_eq!(count_records(&conn, "c").unwrap(), 0);
    }

    #[test]
    fn collection_source_is_recorded() {
        let conn = setup();
        create_collection(&conn, "c", 1, "IP", "Bounded").unwrap();
        set_collection_source(&conn, "c", "/decks/acme.pdf", "abc123").unwrap();

        let row = get_collection(&conn, "c").unwrap().unwrap();
        assert_eq!(row.source_path.as_deref(), Some("/decks/acme.pdf"));
        assert_eq!(row.source_sha256.as_deref(), Some("abc123"));
    }

    #[test]
    fn list_collections_sorted() {
        let conn = setup();
        create_collection(&conn, "b", 1, "IP", "Bounded").unwrap();
        create_collection(&conn, "a", 1, "IP", "Bounded").unwrap();
        assert_eq!(list_collections(&conn).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn vector_encoding_preserves_values() {
        let vector = vec![0.25_f32, -1.5, f32::MIN_POSITIVE];
        let blob = encode_vector(&vector);
        assert_eq!(blob.len(), 12);
        assert_eq!(decode_vector(&blob).unwrap(), vector);
    }

    #[test]
    fn decode_rejects_truncated_blob() {
        assert!(decode_vector(&[0, 0, 0]).is_err());
    }
}
