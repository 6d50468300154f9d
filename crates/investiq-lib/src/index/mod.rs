//! Collection store with similarity search over page descriptions.
//!
//! Writers (`recreate_collection`, `insert`, `replace_collection`) must be
//! serialized per collection by the caller. Searches open their own
//! connection and may run concurrently.

pub mod metric;

use std::collections::HashSet;

use anyhow::Context;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use crate::db::DatabaseDriver;
use crate::db::queries;
use crate::error::IndexOperationError;

pub use metric::{ConsistencyLevel, Metric};

/// Declared shape of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
    pub consistency: ConsistencyLevel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRecord {
    pub id: u64,
    pub vector: Vec<f32>,
    pub text: String,
}

/// One search match with its raw metric distance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: u64,
    pub text: String,
    pub distance: f32,
}

/// Search parameters. The metric must match the collection's declared one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    pub metric: Metric,
}

/// The document a collection was populated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub dimension: usize,
    pub metric: String,
    pub consistency: String,
    pub record_count: usize,
    pub source_path: Option<String>,
    pub source_sha256: Option<String>,
    pub created_at: String,
}

/// Read-write handle on the vector store.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    db: DatabaseDriver,
}

impl VectorIndex {
    pub fn new(db: DatabaseDriver) -> Self {
        Self { db }
    }

    /// A handle that can only search and inspect collections.
    pub fn reader(&self) -> IndexReader {
        IndexReader {
            index: self.clone(),
        }
    }

    /// Drop any collection named `schema.name` and create it empty.
    pub fn recreate_collection(&self, schema: &CollectionSchema) -> Result<(), IndexOperationError> {
        let run = || -> anyhow::Result<()> {
            let mut conn = self.db.open()?;
            let tx = conn.transaction().context("Failed to begin transaction")?;
            recreate_in(&tx, schema)?;
            tx.commit().context("Failed to commit transaction")?;
            Ok(())
        };
        run().map_err(|e| IndexOperationError::new("recreate_collection", &schema.name, e))
    }

    /// Append records to an existing collection. All-or-nothing: on failure
    /// no record of the batch is stored.
    pub fn insert(&self, name: &str, records: &[CollectionRecord]) -> Result<(), IndexOperationError> {
        let run = || -> anyhow::Result<()> {
            let mut conn = self.db.open()?;
            let tx = conn.transaction().context("Failed to begin transaction")?;
            insert_in(&tx, name, records)?;
            tx.commit().context("Failed to commit transaction")?;
            Ok(())
        };
        run().map_err(|e| IndexOperationError::new("insert", name, e))
    }

    /// Recreate the collection and fill it in one transaction. Readers see
    /// either the previous contents or the complete new set.
    pub fn replace_collection(
        &self,
        schema: &CollectionSchema,
        source: Option<&SourceDocument>,
        records: &[CollectionRecord],
    ) -> Result<(), IndexOperationError> {
        let run = || -> anyhow::Result<()> {
            let mut conn = self.db.open()?;
            let tx = conn.transaction().context("Failed to begin transaction")?;
            recreate_in(&tx, schema)?;
            insert_in(&tx, &schema.name, records)?;
            if let Some(source) = source {
                queries::set_collection_source(&tx, &schema.name, &source.path, &source.sha256)?;
            }
            tx.commit().context("Failed to commit transaction")?;
            Ok(())
        };
        run().map_err(|e| IndexOperationError::new("replace_collection", &schema.name, e))?;
        info!(
            collection = %schema.name,
            records = records.len(),
            "Replaced collection"
        );
        Ok(())
    }

    /// At most `k` nearest records, most similar first. Ties keep insertion
    /// order. A missing or empty collection yields no hits.
    pub fn search(
        &self,
        name: &str,
        query: &[f32],
        k: usize,
        params: SearchParams,
    ) -> Result<Vec<SearchHit>, IndexOperationError> {
        let run = || -> anyhow::Result<Vec<SearchHit>> {
            let conn = self.db.open()?;
            let Some(collection) = queries::get_collection(&conn, name)? else {
                debug!(collection = name, "Search on missing collection");
                return Ok(Vec::new());
            };
            if collection.metric != params.metric.as_str() {
                anyhow::bail!(
                    "collection uses metric {} but search requested {}",
                    collection.metric,
                    params.metric
                );
            }
            if query.len() != collection.dimension {
                anyhow::bail!(
                    "query vector has dimension {} but collection declares {}",
                    query.len(),
                    collection.dimension
                );
            }
            if k == 0 || collection.record_count == 0 {
                return Ok(Vec::new());
            }

            let mut hits: Vec<SearchHit> = queries::load_records(&conn, name)?
                .into_iter()
                .map(|record| SearchHit {
                    distance: params.metric.distance(query, &record.vector),
                    id: record.id,
                    text: record.text,
                })
                .collect();
            hits.sort_by(|a, b| {
                params
                    .metric
                    .rank(a.distance, b.distance)
                    .then(a.id.cmp(&b.id))
            });
            hits.truncate(k);
            debug!(collection = name, k, returned = hits.len(), "Search completed");
            Ok(hits)
        };
        run().map_err(|e| IndexOperationError::new("search", name, e))
    }

    pub fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>, IndexOperationError> {
        let run = || -> anyhow::Result<Option<CollectionInfo>> {
            let conn = self.db.open()?;
            Ok(queries::get_collection(&conn, name)?.map(|row| CollectionInfo {
                name: row.name,
                dimension: row.dimension,
                metric: row.metric,
                consistency: row.consistency,
                record_count: row.record_count,
                source_path: row.source_path,
                source_sha256: row.source_sha256,
                created_at: row.created_at,
            }))
        };
        run().map_err(|e| IndexOperationError::new("collection_info", name, e))
    }

    /// Number of records currently visible in the collection.
    pub fn count(&self, name: &str) -> Result<usize, IndexOperationError> {
        let run = || -> anyhow::Result<usize> {
            let conn = self.db.open()?;
            queries::count_records(&conn, name)
        };
        run().map_err(|e| IndexOperationError::new("count", name, e))
    }

    /// Every record of the collection in id order.
    pub fn records(&self, name: &str) -> Result<Vec<CollectionRecord>, IndexOperationError> {
        let run = || -> anyhow::Result<Vec<CollectionRecord>> {
            let conn = self.db.open()?;
            Ok(queries::load_records(&conn, name)?
                .into_iter()
                .map(|row| CollectionRecord {
                    id: row.id,
                    vector: row.vector,
                    text: row.text,
                })
                .collect())
        };
        run().map_err(|e| IndexOperationError::new("records", name, e))
    }
}

/// Search-only view of a [`VectorIndex`].
#[derive(Debug, Clone)]
pub struct IndexReader {
    index: VectorIndex,
}

/// A store that was never created reads as empty and stays uncreated.
impl IndexReader {
    pub fn search(
        &self,
        name: &str,
        query: &[f32],
        k: usize,
        params: SearchParams,
    ) -> Result<Vec<SearchHit>, IndexOperationError> {
        if !self.index.db.is_ready() {
            return Ok(Vec::new());
        }
        self.index.search(name, query, k, params)
    }

    pub fn collection_info(&self, name: &str) -> Result<Option<CollectionInfo>, IndexOperationError> {
        if !self.index.db.is_ready() {
            return Ok(None);
        }
        self.index.collection_info(name)
    }

    pub fn count(&self, name: &str) -> Result<usize, IndexOperationError> {
        if !self.index.db.is_ready() {
            return Ok(0);
        }
        self.index.count(name)
    }
}

fn recreate_in(conn: &Connection, schema: &CollectionSchema) -> anyhow::Result<()> {
    if schema.dimension == 0 {
        anyhow::bail!("collection dimension must be positive");
    }
    queries::drop_collection(conn, &schema.name)?;
    queries::create_collection(
        conn,
        &schema.name,
        schema.dimension,
        schema.metric.as_str(),
        schema.consistency.as_str(),
    )
}

fn insert_in(conn: &Connection, name: &str, records: &[CollectionRecord]) -> anyhow::Result<()> {
    let collection = queries::get_collection(conn, name)?
        .with_context(|| format!("collection '{name}' does not exist"))?;

    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id) {
            anyhow::bail!("duplicate record id {} in batch", record.id);
        }
        if record.vector.len() != collection.dimension {
            anyhow::bail!(
                "record {} has dimension {} but collection declares {}",
                record.id,
                record.vector.len(),
                collection.dimension
            );
        }
    }

    let rows: Vec<(u64, &str, &[f32])> = records
        .iter()
        .map(|r| (r.id, r.text.as_str(), r.vector.as_slice()))
        .collect();
    queries::insert_records(conn, name, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(name: &str, dimension: usize) -> CollectionSchema {
        CollectionSchema {
            name: name.to_string(),
            dimension,
            metric: Metric::InnerProduct,
            consistency: ConsistencyLevel::Bounded,
        }
    }

    fn record(id: u64, vector: &[f32], text: &str) -> CollectionRecord {
        CollectionRecord {
            id,
            vector: vector.to_vec(),
            text: text.to_string(),
        }
    }

    fn ip() -> SearchParams {
        SearchParams {
            metric: Metric::InnerProduct,
        }
    }

    fn index(name: &str) -> VectorIndex {
        VectorIndex::new(DatabaseDriver::in_memory(name).unwrap())
    }

    #[test]
    fn recreate_leaves_collection_empty() {
        let index = index("index_recreate_empty");
        let schema = schema("c", 2);
        index.recreate_collection(&schema).unwrap();
        index.insert("c", &[record(0, &[1.0, 0.0], "a")]).unwrap();

        index.recreate_collection(&schema).unwrap();
        assert_eq!(index.count("c").unwrap(), 0);
    }

    #[test]
    fn search_missing_collection_is_empty() {
        let index = index("index_search_missing");
        let hits = index.search("nope", &[1.0, 0.0], 3, ip()).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn search_empty_collection_is_empty() {
        let index = index("index_search_empty");
        index.recreate_collection(&schema("c", 2)).unwrap();
        let hits = index.search("c", &[1.0, 0.0], 3, ip()).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn search_returns_top_k_most_similar_first() {
        let index = index("index_search_top_k");
        index.recreate_collection(&schema("c", 2)).unwrap();
        index
            .insert(
                "c",
                &[
                    record(0, &[0.1, 0.0], "weak"),
                    record(1, &[0.9, 0.0], "strong"),
                    record(2, &[0.5, 0.0], "middle"),
                    record(3, &[-1.0, 0.0], "opposite"),
                ],
            )
            .unwrap();

        let hits = index.search("c", &[1.0, 0.0], 3, ip()).unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["strong", "middle", "weak"]);
        assert!((hits[0].distance - 0.9).abs() < 1e-6);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let index = index("index_ties");
        index.recreate_collection(&schema("c", 1)).unwrap();
        index
            .insert(
                "c",
                &[record(1, &[0.5], "second"), record(0, &[0.5], "first")],
            )
            .unwrap();

        let hits = index.search("c", &[1.0], 3, ip()).unwrap();
        assert_eq!(hits[0].id, 0);
        assert_eq!(hits[1].id, 1);
    }

    #[test]
    fn l2_search_ranks_nearest_first() {
        let index = index("index_l2");
        let schema = CollectionSchema {
            metric: Metric::L2,
            ..schema("c", 2)
        };
        index.recreate_collection(&schema).unwrap();
        index
            .insert(
                "c",
                &[record(0, &[5.0, 5.0], "far"), record(1, &[1.0, 1.0], "near")],
            )
            .unwrap();

        let hits = index
            .search("c", &[0.0, 0.0], 1, SearchParams { metric: Metric::L2 })
            .unwrap();
        assert_eq!(hits[0].text, "near");
    }

    #[test]
    fn duplicate_ids_reject_whole_batch() {
        let index = index("index_duplicate_ids");
        index.recreate_collection(&schema("c", 1)).unwrap();

        let err = index
            .insert("c", &[record(0, &[1.0], "a"), record(0, &[1.0], "b")])
            .unwrap_err();
        assert_eq!(err.operation, "insert");
        assert_eq!(index.count("c").unwrap(), 0);
    }

    #[test]
    fn dimension_mismatch_rejects_whole_batch() {
        let index = index("index_dimension_mismatch");
        index.recreate_collection(&schema("c", 2)).unwrap();

        let result = index.insert("c", &[record(0, &[1.0, 0.0], "ok"), record(1, &[1.0], "bad")]);
        assert!(result.is_err());
        assert_eq!(index.count("c").unwrap(), 0);
    }

    #[test]
    fn insert_into_missing_collection_fails() {
        let index = index("index_insert_missing");
        let err = index.insert("nope", &[record(0, &[1.0], "a")]).unwrap_err();
        assert_eq!(err.collection, "nope");
    }

    #[test]
    fn search_rejects_wrong_metric_or_dimension() {
        let index = index("index_search_rejects");
        index.recreate_collection(&schema("c", 2)).unwrap();

        assert!(
            index
                .search("c", &[1.0, 0.0], 3, SearchParams { metric: Metric::L2 })
                .is_err()
        );
        assert!(index.search("c", &[1.0], 3, ip()).is_err());
    }

    #[test]
    fn failed_replace_keeps_previous_contents() {
        let index = index("index_failed_replace");
        let schema = schema("c", 1);
        index
            .replace_collection(&schema, None, &[record(0, &[1.0], "deck one")])
            .unwrap();

        let result = index.replace_collection(
            &schema,
            None,
            &[record(0, &[1.0], "deck two"), record(0, &[1.0], "dup")],
        );
        assert!(result.is_err());

        let hits = index.search("c", &[1.0], 3, ip()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "deck one");
    }

    #[test]
    fn replace_records_source_document() {
        let index = index("index_replace_source");
        let source = SourceDocument {
            path: "/decks/acme.pdf".to_string(),
            sha256: "deadbeef".to_string(),
        };
        index
            .replace_collection(&schema("c", 1), Some(&source), &[record(0, &[1.0], "a")])
            .unwrap();

        let info = index.collection_info("c").unwrap().unwrap();
        assert_eq!(info.record_count, 1);
        assert_eq!(info.metric, "IP");
        assert_eq!(info.consistency, "Bounded");
        assert_eq!(info.source_path.as_deref(), Some("/decks/acme.pdf"));
        assert_eq!(info.source_sha256.as_deref(), Some("deadbeef"));
    }

    #[test]
    fn reader_sees_writer_state() {
        let index = index("index_reader");
        let reader = index.reader();
        assert!(reader.collection_info("c").unwrap().is_none());

        index
            .replace_collection(&schema("c", 1), None, &[record(0, &[1.0], "a")])
            .unwrap();
        assert_eq!(reader.count("c").unwrap(), 1);
        assert_eq!(reader.search("c", &[1.0], 3, ip()).unwrap().len(), 1);
    }

    #[test]
    fn reader_never_creates_missing_store() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("store").join("investiq.db");
        let reader = VectorIndex::new(DatabaseDriver::file(path.clone())).reader();

        assert_eq!(reader.count("c").unwrap(), 0);
        assert!(reader.search("c", &[1.0], 3, ip()).unwrap().is_empty());
        assert!(reader.collection_info("c").unwrap().is_none());
        assert!(!path.exists());
        assert!(!tmp.path().join("store").exists());
    }
}
