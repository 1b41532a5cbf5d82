//! RAG query orchestrator.
//!
//! The [`RagPipeline`] composes a [`VectorStore`], a [`ContextAssembler`], and
//! an [`AnswerGenerator`] into the end-to-end query contract:
//! retrieve, filter, assemble, generate, score, package.
//!
//! # Example
//!
//! ```rust,ignore
//! use fleet_rag::{RagPipeline, RagConfig, QueryRequest};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .vector_store(store)
//!     .generator(Arc::new(generator))
//!     .metrics(metrics)
//!     .build()?;
//!
//! let response = pipeline.query(&QueryRequest::new("Why is my engine overheating?")).await;
//! ```

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::config::RagConfig;
use crate::context::ContextAssembler;
use crate::document::{QueryResponse, SearchResult, SourceInfo};
use crate::error::{RagError, Result};
use crate::generator::AnswerGenerator;
use crate::metrics::MetricsCollector;
use crate::text::{char_len, preview, truncate_chars};
use crate::vectorstore::VectorStore;

/// Answer returned when retrieval finds nothing above the threshold.
pub const NO_MATCH_ANSWER: &str = "I couldn't find relevant information to answer your question. Please try rephrasing or asking about a different topic.";

/// Answer returned when the query fails for any reason.
pub const ERROR_ANSWER: &str =
    "I encountered an error while processing your question. Please try again.";

/// Source previews are cut to this many characters.
pub const SOURCE_PREVIEW_CHARS: usize = 200;

const DEFAULT_K: usize = 5;

fn default_k() -> usize {
    DEFAULT_K
}

fn default_include_sources() -> bool {
    true
}

/// One question submitted to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The user's question.
    pub question: String,
    /// Number of chunks to retrieve (capped at `max_results`).
    #[serde(default = "default_k")]
    pub k: usize,
    /// Attach cited sources to the response.
    #[serde(default = "default_include_sources")]
    pub include_sources: bool,
}

impl QueryRequest {
    /// A request with `k = 5` and sources included.
    pub fn new(question: impl Into<String>) -> Self {
        Self { question: question.into(), k: DEFAULT_K, include_sources: true }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_sources(mut self, include_sources: bool) -> Self {
        self.include_sources = include_sources;
        self
    }
}

/// Position of a query in its lifecycle.
///
/// Stage transitions are logged at debug level, and a timeout or panic is
/// reported as [`RagError::Pipeline`] tagged with the stage that was active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    Received,
    Retrieved,
    NoMatch,
    ContextBuilt,
    Answered,
    Responded,
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Retrieved => "retrieved",
            Self::NoMatch => "no_match",
            Self::ContextBuilt => "context_built",
            Self::Answered => "answered",
            Self::Responded => "responded",
        };
        f.write_str(name)
    }
}

/// Build the instruction prompt for `question` grounded on `context`.
pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "You are an expert maintenance advisor for commercial trucking fleets. \
Use the provided context to answer the user's question accurately and helpfully.

Context:
{context}

Question: {question}

Instructions:
- Provide a detailed, practical answer based on the context
- Focus on actionable maintenance advice
- Include specific procedures, costs, or timeframes when available
- If the question relates to safety or compliance, emphasize those aspects
- If the context doesn't contain enough information, say so clearly
- Cite sources when referencing specific information

Answer:"
    )
}

/// Mean similarity of `results`, clamped to `[0, 1]` and rounded to two
/// decimals. Zero for an empty slice.
///
/// This measures retrieval relevance only; it is not calibrated against
/// answer correctness.
pub fn calculate_confidence(results: &[SearchResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let mean = results.iter().map(|r| r.similarity_score).sum::<f64>() / results.len() as f64;
    round_to(mean.clamp(0.0, 1.0), 2)
}

/// Citation records for `results` in rank order, ranks starting at 1.
pub fn format_sources(results: &[SearchResult]) -> Vec<SourceInfo> {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| SourceInfo {
            rank: i + 1,
            content: preview(&r.chunk.content, SOURCE_PREVIEW_CHARS),
            metadata: r.chunk.metadata.clone(),
            similarity_score: round_to(r.similarity_score, 3),
        })
        .collect()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// The RAG query orchestrator.
///
/// [`query`](Self::query) never fails: an empty retrieval yields the fixed
/// no-match response, and any error, panic, or timeout on the way yields the
/// fixed error response. Both carry zero confidence and no sources.
pub struct RagPipeline {
    config: RagConfig,
    store: Arc<VectorStore>,
    assembler: ContextAssembler,
    generator: Arc<AnswerGenerator>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn vector_store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Answer `request`.
    #[instrument(skip_all, fields(k = request.k, include_sources = request.include_sources))]
    pub async fn query(&self, request: &QueryRequest) -> QueryResponse {
        let started = Instant::now();
        let outcome = self.try_query(request).await;
        let elapsed = started.elapsed();

        if let Some(metrics) = &self.metrics {
            metrics.record_query(elapsed, outcome.is_err());
        }

        match outcome {
            Ok(response) => {
                info!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    confidence = response.confidence,
                    sources = response.sources.len(),
                    "query answered"
                );
                response
            }
            Err(e) => {
                error!(elapsed_ms = elapsed.as_millis() as u64, error = %e, "query failed");
                QueryResponse::fallback(ERROR_ANSWER)
            }
        }
    }

    /// Shorthand for [`query`](Self::query) with the configured `default_k`
    /// and sources included.
    pub async fn ask(&self, question: &str) -> QueryResponse {
        self.query(&QueryRequest::new(question).with_k(self.config.default_k)).await
    }

    /// Like [`query`](Self::query), but surfaces the failure instead of the
    /// fixed error response. Metrics are not recorded.
    ///
    /// A timeout or panic becomes [`RagError::Pipeline`] whose `stage` is the
    /// [`QueryStage`] reached before the failure.
    pub async fn try_query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let stage = Mutex::new(QueryStage::Received);
        let run = AssertUnwindSafe(self.run(request, &stage)).catch_unwind();
        let caught = match self.config.query_timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(caught) => caught,
                Err(_) => {
                    let message = format!("query exceeded {}ms", limit.as_millis());
                    return Err(stage_error(&stage, message));
                }
            },
            None => run.await,
        };
        caught.map_err(|payload| {
            stage_error(&stage, format!("panicked: {}", panic_message(payload)))
        })?
    }

    async fn run(&self, request: &QueryRequest, stage: &Mutex<QueryStage>) -> Result<QueryResponse> {
        let question = self.normalize_question(&request.question)?;
        let k = request.k.min(self.config.max_results);
        if k < request.k {
            debug!(requested = request.k, k, "capped result count");
        }

        let threshold = Some(self.config.similarity_threshold);
        let results = self.store.similarity_search(question, k, threshold).await;
        advance(stage, QueryStage::Retrieved);

        if results.is_empty() {
            advance(stage, QueryStage::NoMatch);
            return Ok(QueryResponse::fallback(NO_MATCH_ANSWER));
        }

        let context = self.assembler.build(&results, self.config.max_context_length);
        advance(stage, QueryStage::ContextBuilt);

        let prompt = build_prompt(question, &context);
        let answer = self.generator.generate(&prompt, self.config.max_output_tokens).await;
        advance(stage, QueryStage::Answered);

        let response = QueryResponse {
            answer,
            confidence: calculate_confidence(&results),
            sources: if request.include_sources { format_sources(&results) } else { Vec::new() },
        };
        advance(stage, QueryStage::Responded);
        Ok(response)
    }

    fn normalize_question<'q>(&self, question: &'q str) -> Result<&'q str> {
        let trimmed = question.trim();
        if trimmed.is_empty() {
            return Err(RagError::InvalidQuery("question is empty".to_string()));
        }
        let max = self.config.max_query_length;
        if char_len(trimmed) > max {
            warn!(length = char_len(trimmed), max, "question too long, truncating");
            return Ok(truncate_chars(trimmed, max));
        }
        Ok(trimmed)
    }
}

fn advance(stage: &Mutex<QueryStage>, next: QueryStage) {
    let mut current = stage.lock().unwrap_or_else(|e| e.into_inner());
    debug!(from = %*current, to = %next, "query stage");
    *current = next;
}

fn stage_error(stage: &Mutex<QueryStage>, message: String) -> RagError {
    let current = *stage.lock().unwrap_or_else(|e| e.into_inner());
    RagError::Pipeline { stage: current.to_string(), message }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `vector_store` and `generator` are required; `config` defaults to
/// [`RagConfig::default`] and `metrics` is optional.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    store: Option<Arc<VectorStore>>,
    generator: Option<Arc<AnswerGenerator>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the vector store to retrieve from.
    pub fn vector_store(mut self, store: Arc<VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the answer generator.
    pub fn generator(mut self, generator: Arc<AnswerGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Record every query into `metrics`.
    pub fn metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a required field is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let store = self
            .store
            .ok_or_else(|| RagError::Config("vector_store is required".to_string()))?;
        let generator =
            self.generator.ok_or_else(|| RagError::Config("generator is required".to_string()))?;

        Ok(RagPipeline {
            config: self.config.unwrap_or_default(),
            store,
            assembler: ContextAssembler::new(),
            generator,
            metrics: self.metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::document::Chunk;

    fn scored(content: &str, score: f64) -> SearchResult {
        SearchResult { chunk: Chunk::new(content).with_source("log.csv"), similarity_score: score }
    }

    #[test]
    fn confidence_is_rounded_mean() {
        assert_eq!(calculate_confidence(&[scored("a", 0.8), scored("b", 0.6)]), 0.7);
        assert_eq!(calculate_confidence(&[scored("a", 0.82), scored("b", 0.65)]), 0.74);
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(calculate_confidence(&[scored("a", -0.4)]), 0.0);
        assert_eq!(calculate_confidence(&[]), 0.0);
    }

    #[test]
    fn sources_are_ranked_truncated_and_rounded() {
        let long = "z".repeat(250);
        let sources = format_sources(&[scored(&long, 0.81234), scored("short", 0.6)]);
        assert_eq!(sources[0].rank, 1);
        assert_eq!(sources[0].content, format!("{}...", "z".repeat(200)));
        assert_eq!(sources[0].similarity_score, 0.812);
        assert_eq!(sources[1].rank, 2);
        assert_eq!(sources[1].content, "short");
        assert_eq!(
            sources[1].metadata,
            HashMap::from([("source".to_string(), "log.csv".to_string())])
        );
    }

    #[test]
    fn prompt_embeds_question_and_context() {
        let prompt = build_prompt("Why is my engine overheating?", "Source: a\ncoolant");
        assert!(prompt.starts_with("You are an expert maintenance advisor"));
        assert!(prompt.contains("Context:\nSource: a\ncoolant\n\nQuestion: Why is my engine overheating?"));
        assert!(prompt.trim_end().ends_with("Answer:"));
    }

    #[test]
    fn request_defaults_when_deserialized() {
        let request: QueryRequest = serde_json::from_str(r#"{"question":"brakes?"}"#).unwrap();
        assert_eq!(request, QueryRequest::new("brakes?"));
        assert_eq!(request.k, 5);
        assert!(request.include_sources);
    }
}
