//! Gemini REST client implementing both model capability traits.
//!
//! This module is only available when the `gemini` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::document::Embedding;
use crate::error::{RagError, Result};
use crate::model::{EmbeddingModel, GenerationParams, GenerativeModel, TaskType};

/// The default Gemini API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The default model for answer generation.
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-2.5-flash";

/// The default model for embeddings.
pub const DEFAULT_EMBEDDING_MODEL: &str = "models/text-embedding-004";

/// The dimensionality of `text-embedding-004`.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;

const PROVIDER: &str = "Gemini";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A client for the Gemini `embedContent` and `generateContent` endpoints.
///
/// One client serves as both the [`EmbeddingModel`] and the
/// [`GenerativeModel`]; each method makes exactly one HTTP request.
///
/// # Example
///
/// ```rust,ignore
/// use fleet_rag::gemini::GeminiClient;
///
/// let client = GeminiClient::new(api_key)?.with_generation_model("gemini-2.5-pro");
/// let answer = client.generate("Hello", &GenerationParams::default()).await?;
/// ```
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    generation_model: String,
    embedding_model: String,
    dimensions: usize,
}

impl GeminiClient {
    /// Create a client with the default models and base URL.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RagError::Config("Gemini API key must not be empty".into()));
        }

        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().map_err(|e| {
            RagError::Config(format!("failed to build Gemini HTTP client: {e}"))
        })?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.into(),
            generation_model: DEFAULT_GENERATION_MODEL.into(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        })
    }

    /// Point the client at another API root (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the generation model (e.g. `gemini-2.5-pro`).
    pub fn with_generation_model(mut self, model: impl Into<String>) -> Self {
        self.generation_model = model.into();
        self
    }

    /// Set the embedding model and the dimensionality it produces.
    pub fn with_embedding_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.embedding_model = model.into();
        self.dimensions = dimensions;
        self
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/{}:{method}", self.base_url, qualified(model))
    }

    async fn post<B, R>(&self, url: &str, body: &B, on_error: fn(String) -> RagError) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                on_error(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(provider = PROVIDER, %status, "API error");
            return Err(on_error(format!("API returned {status}: {detail}")));
        }

        response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            on_error(format!("failed to parse response: {e}"))
        })
    }
}

fn qualified(model: &str) -> String {
    if model.starts_with("models/") { model.to_string() } else { format!("models/{model}") }
}

fn embedding_error(message: String) -> RagError {
    RagError::Embedding { provider: PROVIDER.into(), message }
}

fn generation_error(message: String) -> RagError {
    RagError::Generation { provider: PROVIDER.into(), message }
}

// ── Gemini API request/response types ──────────────────────────────

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: String,
    content: Content<'a>,
    task_type: TaskType,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        Some(text)
    }
}

// ── Capability trait implementations ───────────────────────────────

#[async_trait]
impl EmbeddingModel for GeminiClient {
    async fn embed(&self, text: &str, task: TaskType) -> Result<Embedding> {
        debug!(provider = PROVIDER, model = %self.embedding_model, ?task, text_len = text.len(), "embedding text");

        let body = EmbedRequest {
            model: qualified(&self.embedding_model),
            content: Content { role: None, parts: vec![Part { text }] },
            task_type: task,
        };
        let url = self.endpoint(&self.embedding_model, "embedContent");
        let response: EmbedResponse = self.post(&url, &body, embedding_error).await?;
        Ok(response.embedding.values)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.generation_model, prompt_len = prompt.len(), "generating");

        let body = GenerateRequest {
            contents: vec![Content { role: Some("user"), parts: vec![Part { text: prompt }] }],
            generation_config: GenerationConfig {
                max_output_tokens: params.max_output_tokens,
                temperature: params.temperature,
                top_p: params.top_p,
            },
        };
        let url = self.endpoint(&self.generation_model, "generateContent");
        let response: GenerateResponse = self.post(&url, &body, generation_error).await?;
        response.text().ok_or_else(|| generation_error("response contained no candidates".into()))
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_api_key() {
        assert!(GeminiClient::new("  ").is_err());
    }

    #[test]
    fn endpoints_qualify_model_names() {
        let client = GeminiClient::new("key").unwrap().with_base_url("http://localhost:9/v1beta/");
        assert_eq!(
            client.endpoint("gemini-2.5-flash", "generateContent"),
            "http://localhost:9/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(
            client.endpoint(DEFAULT_EMBEDDING_MODEL, "embedContent"),
            "http://localhost:9/v1beta/models/text-embedding-004:embedContent"
        );
    }

    #[test]
    fn embed_request_uses_api_field_names() {
        let body = EmbedRequest {
            model: qualified("text-embedding-004"),
            content: Content { role: None, parts: vec![Part { text: "brake fade" }] },
            task_type: TaskType::RetrievalQuery,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "models/text-embedding-004");
        assert_eq!(json["taskType"], "RETRIEVAL_QUERY");
        assert_eq!(json["content"]["parts"][0]["text"], "brake fade");
        assert!(json["content"].get("role").is_none());
    }

    #[test]
    fn generate_response_joins_text_parts() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"Check "},{"text":"coolant."}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.text().as_deref(), Some("Check coolant."));

        let empty: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.text(), None);
    }
}
