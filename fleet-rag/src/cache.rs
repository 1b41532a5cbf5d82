//! Exact-text memoization of embedding calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::document::Embedding;
use crate::embedding::EmbeddingProvider;
use crate::metrics::MetricsCollector;

/// Size of an [`EmbeddingCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of cached vectors.
    pub cached_embeddings: usize,
    /// Total number of floats held across all cached vectors.
    pub total_cache_size: usize,
}

/// Memoizes [`EmbeddingProvider`] calls keyed by a SHA-256 of the exact text.
///
/// The map is unbounded and has no expiry; entries live until [`clear`](Self::clear)
/// or process exit. Zero-vector fallbacks are handed to the caller but never
/// stored, so a text that failed during an outage is embedded again on the
/// next call. Access is serialized by a mutex that is never held across
/// a provider call, so two tasks racing on the same uncached text may both
/// embed it (the second write wins with an identical vector).
///
/// Document and query embeddings share one key space.
pub struct EmbeddingCache {
    provider: Arc<EmbeddingProvider>,
    entries: Mutex<HashMap<String, Embedding>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl EmbeddingCache {
    pub fn new(provider: Arc<EmbeddingProvider>) -> Self {
        Self { provider, entries: Mutex::new(HashMap::new()), metrics: None }
    }

    /// Report hits and misses into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &Arc<EmbeddingProvider> {
        &self.provider
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Embedding>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cache key for `text`.
    pub fn cache_key(text: &str) -> String {
        let digest = Sha256::digest(text.as_bytes());
        format!("embed_{digest:x}")
    }

    fn record(&self, hits: usize, misses: usize) {
        if let Some(metrics) = &self.metrics {
            (0..hits).for_each(|_| metrics.record_cache_hit());
            (0..misses).for_each(|_| metrics.record_cache_miss());
        }
    }

    /// Embeddings for `texts`, in input order.
    ///
    /// With `use_cache`, only texts missing from the cache reach the provider
    /// (each distinct missing text once) and their vectors are stored before
    /// returning. Without it, every text goes to the provider and the cache is
    /// neither read nor written.
    pub async fn get<S: AsRef<str>>(&self, texts: &[S], use_cache: bool) -> Vec<Embedding> {
        if !use_cache {
            return self.provider.embed_many(texts).await;
        }

        let keys: Vec<String> = texts.iter().map(|t| Self::cache_key(t.as_ref())).collect();
        let mut results: Vec<Option<Embedding>> = Vec::with_capacity(texts.len());
        // distinct missing key -> index of its first occurrence
        let mut pending: Vec<(String, usize)> = Vec::new();
        {
            let entries = self.entries();
            for (i, key) in keys.iter().enumerate() {
                match entries.get(key) {
                    Some(embedding) => results.push(Some(embedding.clone())),
                    None => {
                        results.push(None);
                        if !pending.iter().any(|(k, _)| k == key) {
                            pending.push((key.clone(), i));
                        }
                    }
                }
            }
        }

        let misses = pending.len();
        self.record(texts.len() - results.iter().filter(|r| r.is_none()).count(), misses);

        if !pending.is_empty() {
            let miss_texts: Vec<&str> = pending.iter().map(|(_, i)| texts[*i].as_ref()).collect();
            let fresh = self.provider.try_embed_many(&miss_texts).await;

            let mut entries = self.entries();
            for ((key, _), embedding) in pending.into_iter().zip(fresh) {
                let Some(embedding) = embedding else {
                    continue;
                };
                for (slot, k) in results.iter_mut().zip(&keys) {
                    if slot.is_none() && *k == key {
                        *slot = Some(embedding.clone());
                    }
                }
                entries.insert(key, embedding);
            }
        }

        debug!(requested = texts.len(), misses, "embedding cache lookup");
        results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| self.provider.fallback_embedding()))
            .collect()
    }

    /// Embedding for a single query text.
    pub async fn get_query_embedding(&self, text: &str, use_cache: bool) -> Embedding {
        if !use_cache {
            return self.provider.embed_one(text).await;
        }

        let key = Self::cache_key(text);
        if let Some(embedding) = self.entries().get(&key).cloned() {
            self.record(1, 0);
            return embedding;
        }

        self.record(0, 1);
        match self.provider.try_embed_one(text).await {
            Some(embedding) => {
                self.entries().insert(key, embedding.clone());
                embedding
            }
            None => self.provider.fallback_embedding(),
        }
    }

    /// Drop every cached vector.
    pub fn clear(&self) {
        self.entries().clear();
        info!("embedding cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries();
        CacheStats {
            cached_embeddings: entries.len(),
            total_cache_size: entries.values().map(Vec::len).sum(),
        }
    }
}
