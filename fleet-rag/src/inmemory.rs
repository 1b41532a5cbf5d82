//! In-memory vector index using cosine similarity.
//!
//! This module provides [`InMemoryVectorIndex`], a dependency-free index backed
//! by a `Vec` protected by a `tokio::sync::RwLock`. Nothing is persisted; it is
//! suitable for development, testing, and small-scale use.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{IndexedVector, SearchResult};
use crate::error::Result;
use crate::vectorstore::{VectorIndex, cosine_similarity, dimension_mismatch, rank};

/// An in-memory, brute-force cosine index.
///
/// # Example
///
/// ```rust,ignore
/// use fleet_rag::{InMemoryVectorIndex, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.insert(vectors).await?;
/// let hits = index.query(&query_embedding, 5).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    vectors: RwLock<Vec<IndexedVector>>,
}

impl InMemoryVectorIndex {
    /// Create a new empty index.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn insert(&self, vectors: Vec<IndexedVector>) -> Result<()> {
        let mut stored = self.vectors.write().await;
        let expected = stored.first().map(|v| v.embedding.len());
        let expected = expected.or_else(|| vectors.first().map(|v| v.embedding.len()));
        if let Some(expected) = expected {
            if let Some(bad) = vectors.iter().find(|v| v.embedding.len() != expected) {
                return Err(dimension_mismatch(self.backend(), expected, bad.embedding.len()));
            }
        }
        stored.extend(vectors);
        Ok(())
    }

    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let stored = self.vectors.read().await;
        if let Some(first) = stored.first() {
            if first.embedding.len() != embedding.len() {
                return Err(dimension_mismatch(
                    self.backend(),
                    first.embedding.len(),
                    embedding.len(),
                ));
            }
        }

        let scored = stored
            .iter()
            .map(|v| SearchResult {
                chunk: v.chunk.clone(),
                similarity_score: cosine_similarity(&v.embedding, embedding),
            })
            .collect();
        Ok(rank(scored, top_k))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.vectors.read().await.len())
    }

    async fn dimensions(&self) -> Result<Option<usize>> {
        Ok(self.vectors.read().await.first().map(|v| v.embedding.len()))
    }

    fn backend(&self) -> &str {
        "InMemory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;

    fn vector(id: &str, embedding: Vec<f32>) -> IndexedVector {
        IndexedVector { id: id.into(), embedding, chunk: Chunk::new(id).with_source("test") }
    }

    #[tokio::test]
    async fn rejects_mixed_dimensions() {
        let index = InMemoryVectorIndex::new();
        index.insert(vec![vector("a", vec![1.0, 0.0])]).await.unwrap();
        let err = index.insert(vec![vector("b", vec![1.0, 0.0, 0.0])]).await;
        assert!(err.is_err());
        assert!(index.query(&[1.0], 1).await.is_err());
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn query_returns_most_similar_first() {
        let index = InMemoryVectorIndex::new();
        index
            .insert(vec![vector("far", vec![0.0, 1.0]), vector("near", vec![1.0, 0.1])])
            .await
            .unwrap();
        let hits = index.query(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits[0].chunk.content, "near");
        assert!(hits[0].similarity_score > hits[1].similarity_score);
        assert_eq!(index.dimensions().await.unwrap(), Some(2));
    }
}
