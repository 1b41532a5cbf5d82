//! Configuration for the retrieval and generation components.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Tunable parameters shared by the query and ingestion paths.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Minimum cosine similarity for a search result to be kept (inclusive).
    pub similarity_threshold: f64,
    /// Maximum assembled context size in characters.
    pub max_context_length: usize,
    /// Number of results requested when the caller does not specify `k`.
    pub default_k: usize,
    /// Upper bound applied to any requested `k`.
    pub max_results: usize,
    /// Questions longer than this many characters are truncated.
    pub max_query_length: usize,
    /// Number of chunks embedded and inserted per ingestion batch.
    pub batch_size: usize,
    /// Dimensionality of the embedding model (and of the fallback zero vector).
    pub embedding_dimensions: usize,
    /// Texts are cut to this many characters before being embedded.
    pub max_input_chars: usize,
    /// Output token budget for answer generation.
    pub max_output_tokens: u32,
    /// Sampling temperature for answer generation.
    pub temperature: f32,
    /// Nucleus sampling parameter for answer generation.
    pub top_p: f32,
    /// Optional deadline for a whole query; expiry yields the error response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_timeout: Option<Duration>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.7,
            max_context_length: 4000,
            default_k: 5,
            max_results: 10,
            max_query_length: 500,
            batch_size: 50,
            embedding_dimensions: 768,
            max_input_chars: 2048,
            max_output_tokens: 1000,
            temperature: 0.1,
            top_p: 0.8,
            query_timeout: None,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f64) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Set the maximum assembled context length in characters.
    pub fn max_context_length(mut self, length: usize) -> Self {
        self.config.max_context_length = length;
        self
    }

    /// Set the default number of results per query.
    pub fn default_k(mut self, k: usize) -> Self {
        self.config.default_k = k;
        self
    }

    /// Set the cap applied to requested result counts.
    pub fn max_results(mut self, max: usize) -> Self {
        self.config.max_results = max;
        self
    }

    /// Set the maximum accepted question length in characters.
    pub fn max_query_length(mut self, length: usize) -> Self {
        self.config.max_query_length = length;
        self
    }

    /// Set the ingestion batch size.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set the embedding dimensionality.
    pub fn embedding_dimensions(mut self, dims: usize) -> Self {
        self.config.embedding_dimensions = dims;
        self
    }

    /// Set the per-text character limit applied before embedding.
    pub fn max_input_chars(mut self, chars: usize) -> Self {
        self.config.max_input_chars = chars;
        self
    }

    /// Set the output token budget for generation.
    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.config.max_output_tokens = tokens;
        self
    }

    /// Set the generation temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the generation top-p.
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.config.top_p = top_p;
        self
    }

    /// Set a deadline for whole queries.
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.config.query_timeout = Some(timeout);
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if:
    /// - `similarity_threshold` is outside `[-1, 1]` (cosine range)
    /// - any size or count is zero
    /// - `default_k > max_results`
    /// - `top_p` is outside `(0, 1]`
    pub fn build(self) -> Result<RagConfig> {
        let c = &self.config;
        if !(-1.0..=1.0).contains(&c.similarity_threshold) {
            return Err(RagError::Config(format!(
                "similarity_threshold ({}) must be within [-1, 1]",
                c.similarity_threshold
            )));
        }
        for (name, value) in [
            ("max_context_length", c.max_context_length),
            ("default_k", c.default_k),
            ("max_results", c.max_results),
            ("max_query_length", c.max_query_length),
            ("batch_size", c.batch_size),
            ("embedding_dimensions", c.embedding_dimensions),
            ("max_input_chars", c.max_input_chars),
        ] {
            if value == 0 {
                return Err(RagError::Config(format!("{name} must be greater than zero")));
            }
        }
        if c.default_k > c.max_results {
            return Err(RagError::Config(format!(
                "default_k ({}) must not exceed max_results ({})",
                c.default_k, c.max_results
            )));
        }
        if !(c.top_p > 0.0 && c.top_p <= 1.0) {
            return Err(RagError::Config(format!("top_p ({}) must be within (0, 1]", c.top_p)));
        }
        Ok(self.config)
    }
}
