//! Turso Embedded / libSQL storage layer for the knowledge index.
//!
//! The [`Storage`] struct wraps a libSQL database holding one logical
//! collection of chunks. Category partitioning is a column filter applied at
//! query time, so new categories need no schema change.
//!
//! Similarity search is a brute-force cosine scan over the embeddings of one
//! category. The knowledge base is a handful of policy and incident files, so
//! the scan stays small.

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use eventintel_shared::{Category, EventIntelError, Result};
use libsql::{Connection, Database, params};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

/// A chunk ready to be written.
#[derive(Debug, Clone)]
pub struct NewChunk {
    /// Content hash (hex SHA-256).
    pub id: String,
    pub content: String,
    pub category: Category,
    pub source_file: String,
    pub embedding: Vec<f32>,
}

/// A chunk read back from the database.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: String,
    pub content: String,
    pub category: Category,
    pub source_file: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// A chunk with its similarity to a query vector.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: StoredChunk,
    /// Cosine similarity in [-1, 1]; higher is closer.
    pub score: f64,
}

fn storage_err(e: libsql::Error) -> EventIntelError {
    EventIntelError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| EventIntelError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        EventIntelError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Insert a chunk unless a chunk with the same id exists.
    /// Returns `true` if a row was written.
    pub async fn insert_chunk(&self, chunk: &NewChunk) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let affected = self
            .conn
            .execute(
                "INSERT INTO chunks (id, content, category, source_file, embedding, dimensions, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO NOTHING",
                params![
                    chunk.id.as_str(),
                    chunk.content.as_str(),
                    chunk.category.as_str(),
                    chunk.source_file.as_str(),
                    f32_vec_to_bytes(&chunk.embedding),
                    chunk.embedding.len() as i64,
                    now.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(affected > 0)
    }

    /// Delete every chunk. Returns the number of rows removed.
    pub async fn clear(&self) -> Result<u64> {
        self.conn
            .execute("DELETE FROM chunks", params![])
            .await
            .map_err(storage_err)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Whether a chunk with `id` is stored.
    pub async fn contains(&self, id: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query("SELECT 1 FROM chunks WHERE id = ?1", params![id])
            .await
            .map_err(storage_err)?;
        Ok(rows.next().await.map_err(storage_err)?.is_some())
    }

    /// Total number of chunks across all categories.
    pub async fn count(&self) -> Result<u64> {
        self.count_where("SELECT COUNT(*) FROM chunks", params![]).await
    }

    /// Number of chunks in one category.
    pub async fn count_in(&self, category: Category) -> Result<u64> {
        self.count_where(
            "SELECT COUNT(*) FROM chunks WHERE category = ?1",
            params![category.as_str()],
        )
        .await
    }

    async fn count_where(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<u64> {
        let mut rows = self.conn.query(sql, params).await.map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(storage_err)?.max(0) as u64),
            None => Ok(0),
        }
    }

    /// All chunks of one category, oldest first.
    pub async fn chunks_in(&self, category: Category) -> Result<Vec<StoredChunk>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, content, category, source_file, embedding, dimensions, created_at
                 FROM chunks WHERE category = ?1 ORDER BY created_at, id",
                params![category.as_str()],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_chunk(&row)?);
        }
        Ok(results)
    }

    /// Top-`k` chunks of `category` by cosine similarity to `query`.
    ///
    /// Chunks whose dimensions differ from the query are skipped.
    pub async fn nearest(
        &self,
        query: &[f32],
        category: Category,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if k == 0 || query.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<ScoredChunk> = self
            .chunks_in(category)
            .await?
            .into_iter()
            .filter(|c| c.embedding.len() == query.len())
            .map(|chunk| {
                let score = cosine_similarity(query, &chunk.embedding);
                ScoredChunk { chunk, score }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }
}

/// Convert a database row to a [`StoredChunk`].
fn row_to_chunk(row: &libsql::Row) -> Result<StoredChunk> {
    let category: String = row.get(2).map_err(storage_err)?;
    let blob: Vec<u8> = row.get(4).map_err(storage_err)?;
    let dimensions: i64 = row.get(5).map_err(storage_err)?;
    let created_at: String = row.get(6).map_err(storage_err)?;

    Ok(StoredChunk {
        id: row.get::<String>(0).map_err(storage_err)?,
        content: row.get::<String>(1).map_err(storage_err)?,
        category: category
            .parse::<Category>()
            .map_err(EventIntelError::Storage)?,
        source_file: row.get::<String>(3).map_err(storage_err)?,
        embedding: bytes_to_f32_vec(&blob, dimensions.max(0) as usize),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| EventIntelError::Storage(format!("invalid date: {e}")))?,
    })
}

/// Convert f32 slice to bytes (little-endian).
fn f32_vec_to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert bytes back to f32 vec.
fn bytes_to_f32_vec(bytes: &[u8], expected_dims: usize) -> Vec<f32> {
    let mut result = Vec::with_capacity(expected_dims);
    for chunk in bytes.chunks_exact(4) {
        result.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    result
}

/// Cosine similarity between two vectors; 0 when either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
