//! Answer generation with retries and a fixed apology fallback.

use std::sync::Arc;

use tracing::{error, info};

use crate::error::{RagError, Result};
use crate::model::{GenerationParams, GenerativeModel};
use crate::retry::RetryPolicy;

/// Returned when every generation attempt has failed.
pub const APOLOGY_ANSWER: &str =
    "I apologize, but I encountered an error processing your request. Please try again.";

/// Turns a prompt into answer text and never fails the caller.
///
/// Decoding parameters are fixed at construction (low temperature, fixed
/// top-p); only the output token budget varies per call. An empty completion
/// counts as a failed attempt.
pub struct AnswerGenerator {
    model: Arc<dyn GenerativeModel>,
    retry: RetryPolicy,
    params: GenerationParams,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model, retry: RetryPolicy::default(), params: GenerationParams::default() }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set temperature and top-p (the token budget is supplied per call).
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Generate a completion of at most `max_output_tokens` tokens.
    ///
    /// Returns [`APOLOGY_ANSWER`] once the retry budget is exhausted.
    pub async fn generate(&self, prompt: &str, max_output_tokens: u32) -> String {
        let params = GenerationParams { max_output_tokens, ..self.params };
        match self.retry.run("generate", || self.generate_checked(prompt, &params)).await {
            Ok(text) => {
                info!(model = self.model.name(), chars = text.len(), "generated answer");
                text
            }
            Err(e) => {
                error!(model = self.model.name(), error = %e, "generation failed, returning apology");
                APOLOGY_ANSWER.to_string()
            }
        }
    }

    async fn generate_checked(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let text = self.model.generate(prompt, params).await?;
        if text.trim().is_empty() {
            return Err(RagError::Generation {
                provider: self.model.name().to_string(),
                message: "model returned an empty completion".to_string(),
            });
        }
        Ok(text)
    }
}
