//! Vector index for dashboard queries, backed by SQLite
//!
//! Vectors are stored as BLOBs and distances are computed in Rust. The
//! record set is replaced as a whole: `rebuild` runs in one transaction,
//! so readers on other connections observe either the previous
//! generation or the new one, never a mix.

use std::path::Path;
use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{HubError, Result};

/// Distance metric, fixed per index handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
}

impl FromStr for DistanceMetric {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cosine" => Ok(Self::Cosine),
            "euclidean" => Ok(Self::Euclidean),
            other => Err(HubError::Config(format!(
                "unknown distance metric: {}",
                other
            ))),
        }
    }
}

/// An indexable query before insertion. Also the on-disk cache schema
/// produced by the parse phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryEntry {
    pub title: String,
    pub description: String,
    pub query: String,
    pub vector: Vec<f32>,
}

/// A stored query record; `id` is assigned by the store.
#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub query: String,
    pub vector: Vec<f32>,
}

#[derive(Debug)]
pub struct IndexStats {
    pub record_count: usize,
    pub dimension: Option<usize>,
    pub built_at: Option<i64>,
}

pub struct QueryIndex {
    conn: Connection,
    metric: DistanceMetric,
}

impl QueryIndex {
    /// Open or create the index at `path`.
    pub fn open(path: &Path, metric: DistanceMetric) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let index = Self { conn, metric };
        index.init_schema()?;
        Ok(index)
    }

    /// Open an in-memory index (for testing).
    pub fn open_in_memory(metric: DistanceMetric) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let index = Self { conn, metric };
        index.init_schema()?;
        Ok(index)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS queries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                query TEXT NOT NULL,
                vector BLOB NOT NULL
            );

            CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT
            );
            "#,
        )?;

        Ok(())
    }

    /// Replace the whole record set with `entries`.
    ///
    /// Runs in a single transaction: a failure (including a vector
    /// dimension mismatch) rolls back and leaves the previous generation
    /// intact.
    pub fn rebuild(&mut self, entries: &[QueryEntry]) -> Result<usize> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM queries", [])?;
        tx.execute("DELETE FROM index_meta WHERE key = 'dimension'", [])?;

        let mut dimension: Option<usize> = None;
        for entry in entries {
            match dimension {
                None => dimension = Some(entry.vector.len()),
                Some(expected) if expected != entry.vector.len() => {
                    return Err(HubError::DimensionMismatch {
                        expected,
                        found: entry.vector.len(),
                    });
                }
                Some(_) => {}
            }

            tx.execute(
                "INSERT INTO queries (title, description, query, vector) VALUES (?1, ?2, ?3, ?4)",
                params![
                    entry.title,
                    entry.description,
                    entry.query,
                    vector_to_blob(&entry.vector)
                ],
            )?;
        }

        if let Some(dim) = dimension {
            set_meta(&tx, "dimension", &dim.to_string())?;
        }
        set_meta(&tx, "record_count", &entries.len().to_string())?;
        set_meta(&tx, "built_at", &chrono::Utc::now().timestamp().to_string())?;

        tx.commit()?;
        Ok(entries.len())
    }

    /// Whether the index has been built at least once.
    pub fn exists(&self) -> Result<bool> {
        Ok(get_meta(&self.conn, "built_at")?.is_some())
    }

    /// Up to `k` records ordered by ascending distance to `vector`.
    ///
    /// `k` must be positive; asking for more records than exist returns
    /// all of them.
    pub fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<(QueryRecord, f32)>> {
        if k == 0 {
            return Err(HubError::InvalidLimit);
        }

        if let Some(dimension) = self.dimension()? {
            if dimension != vector.len() {
                return Err(HubError::DimensionMismatch {
                    expected: dimension,
                    found: vector.len(),
                });
            }
        }

        let mut stmt = self
            .conn
            .prepare("SELECT id, title, description, query, vector FROM queries")?;

        let rows = stmt.query_map([], |row| {
            let blob: Vec<u8> = row.get(4)?;
            Ok(QueryRecord {
                id: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                query: row.get(3)?,
                vector: blob_to_vector(&blob),
            })
        })?;

        let mut results: Vec<(QueryRecord, f32)> = Vec::new();
        for row in rows {
            let record = row?;
            let distance = match self.metric {
                DistanceMetric::Cosine => cosine_distance(vector, &record.vector),
                DistanceMetric::Euclidean => euclidean_distance(vector, &record.vector),
            };
            results.push((record, distance));
        }

        results.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);

        Ok(results)
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let record_count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM queries", [], |row| row.get(0))?;

        Ok(IndexStats {
            record_count: record_count as usize,
            dimension: self.dimension()?,
            built_at: get_meta(&self.conn, "built_at")?.and_then(|v| v.parse().ok()),
        })
    }

    fn dimension(&self) -> Result<Option<usize>> {
        Ok(get_meta(&self.conn, "dimension")?.and_then(|v| v.parse().ok()))
    }
}

fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO index_meta (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM index_meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| e.into())
}

fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for &value in vector {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
        .collect()
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        1.0 - dot / (norm_a * norm_b)
    } else {
        1.0
    }
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, vector: Vec<f32>) -> QueryEntry {
        QueryEntry {
            title: title.to_string(),
            description: format!("{} description", title),
            query: format!("{} | take 1", title),
            vector,
        }
    }

    #[test]
    fn blob_conversion_roundtrips() {
        let vector = vec![1.0, 2.0, 3.0, -0.5];
        assert_eq!(blob_to_vector(&vector_to_blob(&vector)), vector);
    }

    #[test]
    fn exists_flips_after_first_rebuild() {
        let mut index = QueryIndex::open_in_memory(DistanceMetric::Cosine).unwrap();
        assert!(!index.exists().unwrap());

        index.rebuild(&[entry("a", vec![1.0, 0.0])]).unwrap();
        assert!(index.exists().unwrap());
    }

    #[test]
    fn nearest_orders_by_ascending_distance() {
        let mut index = QueryIndex::open_in_memory(DistanceMetric::Cosine).unwrap();
        index
            .rebuild(&[
                entry("far", vec![0.0, 1.0]),
                entry("near", vec![1.0, 0.0]),
                entry("mid", vec![1.0, 1.0]),
            ])
            .unwrap();

        let results = index.nearest(&[1.0, 0.0], 3).unwrap();
        let titles: Vec<&str> = results.iter().map(|(r, _)| r.title.as_str()).collect();
        assert_eq!(titles, vec!["near", "mid", "far"]);

        for window in results.windows(2) {
            assert!(window[0].1 <= window[1].1);
        }
    }

    #[test]
    fn euclidean_metric_orders_by_magnitude_too() {
        let mut index = QueryIndex::open_in_memory(DistanceMetric::Euclidean).unwrap();
        index
            .rebuild(&[
                entry("close", vec![1.0, 0.0]),
                entry("scaled", vec![10.0, 0.0]),
            ])
            .unwrap();

        // Same direction, different magnitude: euclidean tells them
        // apart, closest first.
        let results = index.nearest(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results[0].0.title, "close");
        assert!(results[0].1 < results[1].1);
    }

    #[test]
    fn oversized_k_returns_all_records() {
        let mut index = QueryIndex::open_in_memory(DistanceMetric::Cosine).unwrap();
        index
            .rebuild(&[entry("a", vec![1.0, 0.0]), entry("b", vec![0.0, 1.0])])
            .unwrap();

        let results = index.nearest(&[1.0, 0.0], 50).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn zero_k_is_rejected() {
        let index = QueryIndex::open_in_memory(DistanceMetric::Cosine).unwrap();
        assert!(matches!(
            index.nearest(&[1.0], 0),
            Err(HubError::InvalidLimit)
        ));
    }

    #[test]
    fn rebuild_replaces_previous_generation() {
        let mut index = QueryIndex::open_in_memory(DistanceMetric::Cosine).unwrap();
        index
            .rebuild(&[
                entry("old-a", vec![1.0, 0.0]),
                entry("old-b", vec![0.0, 1.0]),
            ])
            .unwrap();

        index.rebuild(&[entry("new", vec![1.0, 1.0])]).unwrap();

        let results = index.nearest(&[1.0, 1.0], 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.title, "new");
    }

    #[test]
    fn dimension_mismatch_aborts_and_keeps_old_generation() {
        let mut index = QueryIndex::open_in_memory(DistanceMetric::Cosine).unwrap();
        index
            .rebuild(&[
                entry("old-a", vec![1.0, 0.0]),
                entry("old-b", vec![0.0, 1.0]),
            ])
            .unwrap();

        let result = index.rebuild(&[
            entry("bad-a", vec![1.0, 0.0]),
            entry("bad-b", vec![1.0, 0.0, 0.0]),
        ]);
        assert!(matches!(
            result,
            Err(HubError::DimensionMismatch {
                expected: 2,
                found: 3
            })
        ));

        // The failed rebuild must not have touched the stored set.
        let results = index.nearest(&[1.0, 0.0], 10).unwrap();
        assert_eq!(results.len(), 2);
        let titles: Vec<&str> = results.iter().map(|(r, _)| r.title.as_str()).collect();
        assert!(titles.contains(&"old-a"));
        assert!(titles.contains(&"old-b"));
    }

    #[test]
    fn failed_rebuild_is_invisible_to_other_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");

        let mut writer = QueryIndex::open(&path, DistanceMetric::Cosine).unwrap();
        writer
            .rebuild(&[
                entry("old-a", vec![1.0, 0.0]),
                entry("old-b", vec![0.0, 1.0]),
            ])
            .unwrap();

        let reader = QueryIndex::open(&path, DistanceMetric::Cosine).unwrap();

        let _ = writer.rebuild(&[
            entry("bad-a", vec![1.0, 0.0]),
            entry("bad-b", vec![1.0, 0.0, 0.0]),
        ]);

        let results = reader.nearest(&[1.0, 0.0], 10).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(reader.stats().unwrap().record_count, 2);
    }

    #[test]
    fn query_vector_dimension_is_checked() {
        let mut index = QueryIndex::open_in_memory(DistanceMetric::Cosine).unwrap();
        index.rebuild(&[entry("a", vec![1.0, 0.0])]).unwrap();

        assert!(matches!(
            index.nearest(&[1.0, 0.0, 0.0], 1),
            Err(HubError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn stats_reflect_current_generation() {
        let mut index = QueryIndex::open_in_memory(DistanceMetric::Cosine).unwrap();
        index.rebuild(&[entry("a", vec![1.0, 0.0, 0.0])]).unwrap();

        let stats = index.stats().unwrap();
        assert_eq!(stats.record_count, 1);
        assert_eq!(stats.dimension, Some(3));
        assert!(stats.built_at.is_some());
    }
}
