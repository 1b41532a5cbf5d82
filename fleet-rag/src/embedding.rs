//! Resilient embedding front-end over an [`EmbeddingModel`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::document::Embedding;
use crate::error::{RagError, Result};
use crate::model::{EmbeddingModel, TaskType};
use crate::retry::RetryPolicy;
use crate::text::truncate_chars;

/// Default per-text character limit applied before embedding.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 2048;

/// Converts text into embeddings without ever failing the caller.
///
/// - every text is cut to `max_input_chars` characters before submission;
/// - each provider call is retried under the configured [`RetryPolicy`];
/// - a text whose retries are exhausted gets a zero vector of the configured
///   dimension, and the rest of the batch continues;
/// - during batches, a short pause follows every `pace_every`-th call.
///
/// # Example
///
/// ```rust,ignore
/// let provider = EmbeddingProvider::new(Arc::new(gemini));
/// let vectors = provider.embed_many(&["oil change interval"]).await;
/// ```
pub struct EmbeddingProvider {
    model: Arc<dyn EmbeddingModel>,
    retry: RetryPolicy,
    dimensions: usize,
    max_input_chars: usize,
    pace_every: usize,
    pace_delay: Duration,
}

impl EmbeddingProvider {
    /// Wrap `model` with the default limits (2048 chars, 3 attempts, a 1 s
    /// pause after every 10th call).
    pub fn new(model: Arc<dyn EmbeddingModel>) -> Self {
        let dimensions = model.dimensions();
        Self {
            model,
            retry: RetryPolicy::default(),
            dimensions,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            pace_every: 10,
            pace_delay: Duration::from_secs(1),
        }
    }

    /// Set the retry policy applied to each provider call.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override the expected dimension (also the fallback vector length).
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Set the per-text character limit.
    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    /// Pause for `delay` after every `every` calls within one batch.
    /// `every == 0` disables pacing.
    pub fn with_pacing(mut self, every: usize, delay: Duration) -> Self {
        self.pace_every = every;
        self.pace_delay = delay;
        self
    }

    /// Dimensionality of the produced vectors.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Name of the wrapped model.
    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// The vector substituted when a text cannot be embedded.
    pub fn fallback_embedding(&self) -> Embedding {
        vec![0.0; self.dimensions]
    }

    /// Embed a batch of document texts, preserving order.
    pub async fn embed_many<S: AsRef<str>>(&self, texts: &[S]) -> Vec<Embedding> {
        self.try_embed_many(texts)
            .await
            .into_iter()
            .map(|e| e.unwrap_or_else(|| self.fallback_embedding()))
            .collect()
    }

    /// Embed a single query text.
    pub async fn embed_one(&self, text: &str) -> Embedding {
        self.try_embed_one(text).await.unwrap_or_else(|| self.fallback_embedding())
    }

    /// Like [`embed_many`](Self::embed_many), with `None` where retries were
    /// exhausted instead of the zero vector.
    pub(crate) async fn try_embed_many<S: AsRef<str>>(
        &self,
        texts: &[S],
    ) -> Vec<Option<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            embeddings.push(self.try_embed(text.as_ref(), TaskType::RetrievalDocument).await);

            let done = i + 1;
            if self.pace_every > 0 && done % self.pace_every == 0 && done < texts.len() {
                debug!(done, total = texts.len(), "pausing between embedding calls");
                tokio::time::sleep(self.pace_delay).await;
            }
        }
        if !texts.is_empty() {
            info!(count = texts.len(), model = self.model.name(), "generated embeddings");
        }
        embeddings
    }

    pub(crate) async fn try_embed_one(&self, text: &str) -> Option<Embedding> {
        self.try_embed(text, TaskType::RetrievalQuery).await
    }

    async fn try_embed(&self, text: &str, task: TaskType) -> Option<Embedding> {
        let input = truncate_chars(text, self.max_input_chars);
        match self.retry.run("embed", || self.embed_checked(input, task)).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                error!(
                    model = self.model.name(),
                    ?task,
                    text_len = input.len(),
                    error = %e,
                    "embedding failed, using zero vector"
                );
                None
            }
        }
    }

    async fn embed_checked(&self, text: &str, task: TaskType) -> Result<Embedding> {
        let embedding = self.model.embed(text, task).await?;
        if embedding.len() != self.dimensions {
            return Err(RagError::Embedding {
                provider: self.model.name().to_string(),
                message: format!(
                    "expected {} dimensions, got {}",
                    self.dimensions,
                    embedding.len()
                ),
            });
        }
        Ok(embedding)
    }
}
