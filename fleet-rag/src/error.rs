//! Error types for the `fleet-rag` crate.

use thiserror::Error;

/// Errors that can occur in retrieval and generation operations.
///
/// Most of these never reach the caller of [`RagPipeline::query`](crate::RagPipeline::query):
/// the components that own a degradation rule log the error and substitute a
/// fallback value instead.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding model that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred while generating answer text.
    #[error("Generation error ({provider}): {message}")]
    Generation {
        /// The generative model that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector index backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStore {
        /// The index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The question was rejected before retrieval.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// An error in the query orchestration, tagged with the stage that failed.
    #[error("Pipeline error at {stage}: {message}")]
    Pipeline {
        /// The query stage that was active when the failure happened.
        stage: String,
        /// A description of the failure.
        message: String,
    },

    /// A source document could not be loaded or chunked.
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
