//! Data types for chunks, stored vectors, search results, and query responses.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A fixed-length vector representation of a piece of text.
pub type Embedding = Vec<f32>;

/// Metadata key naming the provenance of a chunk. Used for citations.
pub const SOURCE_KEY: &str = "source";

/// Label used when a chunk carries no `source` metadata.
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// A bounded span of source text plus provenance metadata.
///
/// Chunks are produced by the ingestion collaborator and are never mutated
/// after creation. They have no identity of their own; the vector index
/// assigns one when the chunk is stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Chunk {
    /// The text content of the chunk.
    pub content: String,
    /// Key-value metadata. Should include [`SOURCE_KEY`].
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    /// Create a chunk with the given content and no metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), metadata: HashMap::new() }
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the `source` metadata entry.
    pub fn with_source(self, source: impl Into<String>) -> Self {
        self.with_metadata(SOURCE_KEY, source)
    }

    /// The citation label for this chunk, or `"Unknown"`.
    pub fn source(&self) -> &str {
        self.metadata.get(SOURCE_KEY).map(String::as_str).unwrap_or(UNKNOWN_SOURCE)
    }
}

/// A chunk persisted in a vector index together with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedVector {
    /// Store-assigned identifier.
    pub id: String,
    /// The embedding computed for `chunk.content`.
    pub embedding: Embedding,
    /// The stored chunk.
    pub chunk: Chunk,
}

/// A retrieved [`Chunk`] paired with its similarity to the query.
///
/// Scores are cosine similarities in `[-1, 1]`; higher is more similar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub similarity_score: f64,
}

/// A cited source attached to a [`QueryResponse`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceInfo {
    /// 1-based position in retrieval order.
    pub rank: usize,
    /// The chunk content, cut to 200 characters plus `...` when longer.
    pub content: String,
    /// The chunk's original metadata.
    pub metadata: HashMap<String, String>,
    /// Similarity score rounded to three decimals.
    pub similarity_score: f64,
}

/// The answer returned for one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResponse {
    /// Generated (or fixed fallback) answer text.
    pub answer: String,
    /// Mean retrieval similarity in `[0, 1]`, rounded to two decimals.
    ///
    /// This is a retrieval heuristic. It says nothing about factual accuracy.
    pub confidence: f64,
    /// Cited sources in retrieval rank order.
    pub sources: Vec<SourceInfo>,
}

impl QueryResponse {
    /// A response with zero confidence and no sources.
    pub fn fallback(answer: impl Into<String>) -> Self {
        Self { answer: answer.into(), confidence: 0.0, sources: Vec::new() }
    }
}

/// Summary of a stored collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Number of stored vectors.
    pub count: usize,
    /// Embedding dimensionality, once the first vector has been stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
}
