//! SQLite-backed persistent vector index.
//!
//! One database file per collection. Vectors are stored as little-endian
//! `f32` blobs and searched with brute-force cosine similarity, which is
//! adequate for the tens of thousands of chunks a fleet corpus holds.
//!
//! This module is only available when the `sqlite` feature is enabled.

use std::collections::HashMap;
use std::fmt::Display;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::document::{Chunk, IndexedVector, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{VectorIndex, cosine_similarity, dimension_mismatch, rank};

const BACKEND: &str = "SQLite";
const DIMENSIONS_KEY: &str = "dimensions";

fn store_error(e: impl Display) -> RagError {
    RagError::VectorStore { backend: BACKEND.into(), message: e.to_string() }
}

/// A [`VectorIndex`] persisted in a SQLite database (WAL mode).
///
/// Each [`insert`](VectorIndex::insert) call runs in one transaction and is
/// committed before returning. The collection dimension is recorded on the
/// first insert and enforced afterwards.
pub struct SqliteVectorIndex {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteVectorIndex {
    /// Open (or create) the database for `collection` inside `dir`.
    ///
    /// The file is `<dir>/<collection>.db`; characters other than ASCII
    /// alphanumerics, `-` and `_` in the collection name are replaced by `_`.
    pub async fn open(dir: impl AsRef<Path>, collection: &str) -> Result<Self> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let file: String = collection
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        Self::with_path(dir.join(format!("{file}.db"))).await
    }

    /// Open (or create) the database at `db_path`.
    pub async fn with_path(db_path: PathBuf) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(store_error)?;

        let index = Self { pool, db_path };
        index.init_schema().await?;
        info!(path = %index.db_path.display(), "opened sqlite vector index");
        Ok(index)
    }

    /// Location of the database file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS vectors (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS collection_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    async fn stored_dimensions<'e, E>(executor: E) -> Result<Option<usize>>
    where
        E: sqlx::SqliteExecutor<'e>,
    {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM collection_meta WHERE key = ?1")
                .bind(DIMENSIONS_KEY)
                .fetch_optional(executor)
                .await
                .map_err(store_error)?;
        value
            .map(|v| v.parse::<usize>().map_err(|e| store_error(format!("bad dimension {v:?}: {e}"))))
            .transpose()
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn insert(&self, vectors: Vec<IndexedVector>) -> Result<()> {
        let Some(first) = vectors.first() else {
            return Ok(());
        };

        let mut tx = self.pool.begin().await.map_err(store_error)?;

        let expected = match Self::stored_dimensions(&mut *tx).await? {
            Some(dims) => dims,
            None => {
                let dims = first.embedding.len();
                sqlx::query("INSERT INTO collection_meta (key, value) VALUES (?1, ?2)")
                    .bind(DIMENSIONS_KEY)
                    .bind(dims.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(store_error)?;
                dims
            }
        };
        if let Some(bad) = vectors.iter().find(|v| v.embedding.len() != expected) {
            return Err(dimension_mismatch(BACKEND, expected, bad.embedding.len()));
        }

        for vector in &vectors {
            let metadata = serde_json::to_string(&vector.chunk.metadata)?;
            sqlx::query(
                "INSERT INTO vectors (id, content, metadata, embedding) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&vector.id)
            .bind(&vector.chunk.content)
            .bind(&metadata)
            .bind(Self::serialize_embedding(&vector.embedding))
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        }

        tx.commit().await.map_err(store_error)?;
        debug!(count = vectors.len(), "committed vectors");
        Ok(())
    }

    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        if let Some(expected) = Self::stored_dimensions(&self.pool).await? {
            if expected != embedding.len() {
                return Err(dimension_mismatch(BACKEND, expected, embedding.len()));
            }
        }

        let rows = sqlx::query("SELECT content, metadata, embedding FROM vectors")
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in rows {
            let metadata: String = row.get("metadata");
            let blob: Vec<u8> = row.get("embedding");
            let chunk = Chunk {
                content: row.get("content"),
                metadata: serde_json::from_str::<HashMap<String, String>>(&metadata)?,
            };
            let similarity_score = cosine_similarity(&Self::deserialize_embedding(&blob), embedding);
            scored.push(SearchResult { chunk, similarity_score });
        }
        Ok(rank(scored, top_k))
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors")
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(count as usize)
    }

    async fn dimensions(&self) -> Result<Option<usize>> {
        Self::stored_dimensions(&self.pool).await
    }

    fn backend(&self) -> &str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_blob_is_little_endian_f32() {
        let blob = SqliteVectorIndex::serialize_embedding(&[1.0, -0.5]);
        assert_eq!(blob.len(), 8);
        assert_eq!(SqliteVectorIndex::deserialize_embedding(&blob), vec![1.0, -0.5]);
    }
}
