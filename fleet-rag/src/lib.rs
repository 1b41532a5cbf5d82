//! # fleet-rag
//!
//! Retrieval-augmented question answering over commercial-vehicle maintenance
//! data: maintenance logs, fleet records, fault codes, and service manuals.
//!
//! ## Overview
//!
//! A question is embedded, matched against stored chunks by cosine
//! similarity, and the best matches are packed into a bounded context that a
//! hosted generative model answers from. Every stage degrades instead of
//! failing, so [`RagPipeline::query`] always returns a [`QueryResponse`].
//!
//! - [`EmbeddingProvider`] - truncation, retries, and zero-vector fallback over an [`EmbeddingModel`]
//! - [`EmbeddingCache`] - exact-text memoization of embeddings
//! - [`VectorStore`] - batched ingestion and thresholded search over a [`VectorIndex`]
//! - [`ContextAssembler`] - bounded prompt context
//! - [`AnswerGenerator`] - generation with retries and an apology fallback
//! - [`RagPipeline`] - the query orchestrator
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fleet_rag::*;
//! use fleet_rag::mock::{MockEmbeddingModel, MockGenerativeModel};
//!
//! let metrics = Arc::new(MetricsCollector::new());
//! let provider = Arc::new(EmbeddingProvider::new(Arc::new(MockEmbeddingModel::new(768))));
//! let cache = Arc::new(EmbeddingCache::new(provider).with_metrics(metrics.clone()));
//! let store = Arc::new(VectorStore::new("fleet", Arc::new(InMemoryVectorIndex::new()), cache));
//! let generator = Arc::new(AnswerGenerator::new(Arc::new(MockGenerativeModel::new("..."))));
//!
//! let pipeline = RagPipeline::builder()
//!     .vector_store(store)
//!     .generator(generator)
//!     .metrics(metrics)
//!     .build()?;
//! let response = pipeline.ask("Why is my engine overheating?").await;
//! ```
//!
//! ## Features
//!
//! - `gemini` - [`gemini::GeminiClient`] for the hosted Gemini API
//! - `sqlite` - [`sqlite::SqliteVectorIndex`], a persistent index

pub mod cache;
pub mod chunking;
pub mod config;
pub mod context;
pub mod document;
pub mod embedding;
pub mod error;
#[cfg(feature = "gemini")]
pub mod gemini;
pub mod generator;
pub mod inmemory;
pub mod metrics;
pub mod mock;
pub mod model;
pub mod pipeline;
pub mod retry;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod text;
pub mod vectorstore;

pub use cache::{CacheStats, EmbeddingCache};
pub use chunking::{CharacterChunker, Chunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use context::ContextAssembler;
pub use document::{Chunk, CollectionInfo, Embedding, IndexedVector, QueryResponse, SearchResult, SourceInfo};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
#[cfg(feature = "gemini")]
pub use gemini::GeminiClient;
pub use generator::{APOLOGY_ANSWER, AnswerGenerator};
pub use inmemory::InMemoryVectorIndex;
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use model::{EmbeddingModel, GenerationParams, GenerativeModel, TaskType};
pub use pipeline::{ERROR_ANSWER, NO_MATCH_ANSWER, QueryRequest, QueryStage, RagPipeline, RagPipelineBuilder};
pub use retry::RetryPolicy;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteVectorIndex;
pub use vectorstore::{VectorIndex, VectorStore};
