//! Vector index trait and the store that embeds, batches, and filters around it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::cache::EmbeddingCache;
use crate::document::{Chunk, CollectionInfo, IndexedVector, SearchResult};
use crate::error::{RagError, Result};

/// Default number of chunks embedded and inserted per batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// A storage backend for embedded chunks with nearest-neighbour search.
///
/// Scores returned by [`query`](VectorIndex::query) are cosine similarities in
/// `[-1, 1]`, higher meaning more similar, ordered descending. Backends must
/// reject vectors whose dimension differs from the ones already stored.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert vectors. Returns once they are as durable as the backend gets.
    async fn insert(&self, vectors: Vec<IndexedVector>) -> Result<()>;

    /// Up to `top_k` stored chunks most similar to `embedding`.
    async fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;

    /// Number of stored vectors.
    async fn count(&self) -> Result<usize>;

    /// Dimension of stored vectors, `None` while empty.
    async fn dimensions(&self) -> Result<Option<usize>>;

    /// Backend name used in logs and errors.
    fn backend(&self) -> &str;
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if the lengths differ or either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Sort by descending score and keep the best `top_k`.
pub(crate) fn rank(mut results: Vec<SearchResult>, top_k: usize) -> Vec<SearchResult> {
    results.sort_by(|a, b| {
        b.similarity_score.partial_cmp(&a.similarity_score).unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(top_k);
    results
}

/// A named collection of chunks: embeds on the way in, searches on the way out.
///
/// Ingestion is batched to bound peak memory and serialized by a writer lock;
/// searches run concurrently. Every [`add_documents`](Self::add_documents) call
/// assigns fresh ids, so re-adding identical chunks stores duplicates.
pub struct VectorStore {
    name: String,
    index: Arc<dyn VectorIndex>,
    cache: Arc<EmbeddingCache>,
    batch_size: usize,
    similarity_threshold: f64,
    write_lock: Mutex<()>,
}

impl VectorStore {
    /// Create a store over `index`, embedding through `cache`.
    pub fn new(
        name: impl Into<String>,
        index: Arc<dyn VectorIndex>,
        cache: Arc<EmbeddingCache>,
    ) -> Self {
        Self {
            name: name.into(),
            index,
            cache,
            batch_size: DEFAULT_BATCH_SIZE,
            similarity_threshold: 0.7,
            write_lock: Mutex::new(()),
        }
    }

    /// Set the ingestion batch size (values below 1 are treated as 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the threshold used when a search does not pass one.
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }

    /// Embed and store `chunks`, `batch_size` at a time.
    ///
    /// Each batch is durable before the next one starts. A failure leaves the
    /// batches already written in place.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStore`] if the index rejects a batch.
    #[instrument(skip_all, fields(collection = %self.name, chunks = chunks.len()))]
    pub async fn add_documents(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            warn!("no documents to add");
            return Ok(());
        }

        let _writer = self.write_lock.lock().await;
        for (batch_no, batch) in chunks.chunks(self.batch_size).enumerate() {
            let texts: Vec<&str> = batch.iter().map(|c| c.content.as_str()).collect();
            let embeddings = self.cache.get(&texts, true).await;

            let vectors = batch
                .iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| IndexedVector {
                    id: Uuid::new_v4().to_string(),
                    embedding,
                    chunk: chunk.clone(),
                })
                .collect();

            self.index.insert(vectors).await.map_err(|e| {
                error!(batch = batch_no + 1, error = %e, "failed to insert batch");
                e
            })?;
            info!(batch = batch_no + 1, size = batch.len(), "added batch");
        }

        info!(count = chunks.len(), "added documents to vector store");
        Ok(())
    }

    /// Chunks similar to `query`, best first.
    ///
    /// At most `k` results are returned; any scoring below `threshold`
    /// (or the store default when `None`) are dropped. The bound is inclusive.
    /// Failures are logged and yield an empty result.
    #[instrument(skip_all, fields(collection = %self.name, k))]
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        threshold: Option<f64>,
    ) -> Vec<SearchResult> {
        let threshold = threshold.unwrap_or(self.similarity_threshold);
        match self.try_similarity_search(query, k, threshold).await {
            Ok(results) => {
                info!(found = results.len(), threshold, "similarity search completed");
                results
            }
            Err(e) => {
                error!(error = %e, "similarity search failed");
                Vec::new()
            }
        }
    }

    async fn try_similarity_search(
        &self,
        query: &str,
        k: usize,
        threshold: f64,
    ) -> Result<Vec<SearchResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let embedding = self.cache.get_query_embedding(query, true).await;
        let results = self.index.query(&embedding, k).await?;
        Ok(results.into_iter().filter(|r| r.similarity_score >= threshold).collect())
    }

    /// Name, size, and dimension of the collection.
    pub async fn get_collection_info(&self) -> Result<CollectionInfo> {
        let count = self.index.count().await?;
        let dimensions = self.index.dimensions().await?;
        Ok(CollectionInfo { name: self.name.clone(), count, dimensions })
    }
}

/// Build the dimension-mismatch error every backend reports.
pub(crate) fn dimension_mismatch(backend: &str, expected: usize, got: usize) -> RagError {
    RagError::VectorStore {
        backend: backend.to_string(),
        message: format!("embedding dimension {got} does not match collection dimension {expected}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_parallel_vectors_is_one() {
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_of_zero_or_mismatched_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn rank_orders_descending_and_truncates() {
        let make = |s: f64| SearchResult { chunk: Chunk::new(s.to_string()), similarity_score: s };
        let ranked = rank(vec![make(0.1), make(0.9), make(0.5)], 2);
        let scores: Vec<f64> = ranked.iter().map(|r| r.similarity_score).collect();
        assert_eq!(scores, vec![0.9, 0.5]);
    }
}
