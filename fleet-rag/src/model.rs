//! Capability traits for hosted model providers.
//!
//! [`EmbeddingModel`] and [`GenerativeModel`] are the seams between the RAG
//! components and a concrete vendor API. The orchestrator only ever sees these
//! traits, so an alternate provider (or a test double from [`crate::mock`]) can
//! be substituted without touching it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::Embedding;
use crate::error::Result;

/// What an embedding will be used for. Some providers embed documents and
/// queries into slightly different spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    /// Text that will be stored and searched.
    RetrievalDocument,
    /// A question used to search stored text.
    RetrievalQuery,
}

/// A provider that turns a single text into a vector.
///
/// Implementations make exactly one provider call per invocation and report
/// failures as errors; truncation, retries, and fallbacks are layered on top
/// by [`EmbeddingProvider`](crate::EmbeddingProvider).
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embed one text.
    async fn embed(&self, text: &str, task: TaskType) -> Result<Embedding>;

    /// Dimensionality of the vectors this model produces.
    fn dimensions(&self) -> usize;

    /// Provider name used in logs and errors.
    fn name(&self) -> &str;
}

/// Decoding parameters for a generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Output token budget.
    pub max_output_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling parameter.
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self { max_output_tokens: 1000, temperature: 0.1, top_p: 0.8 }
    }
}

/// A hosted text-generation model.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Produce a completion for `prompt`.
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// Provider name used in logs and errors.
    fn name(&self) -> &str;
}
