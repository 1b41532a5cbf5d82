//! Deterministic model doubles for tests and offline demos.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::document::Embedding;
use crate::error::{RagError, Result};
use crate::model::{EmbeddingModel, GenerationParams, GenerativeModel, TaskType};

/// An [`EmbeddingModel`] producing hash-derived, L2-normalised vectors.
///
/// The same text always maps to the same vector. Specific texts can be pinned
/// to explicit vectors, and failures can be scripted.
#[derive(Debug, Default)]
pub struct MockEmbeddingModel {
    dimensions: usize,
    pinned: HashMap<String, Embedding>,
    failing_texts: Vec<String>,
    fail_first: usize,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl MockEmbeddingModel {
    /// Create a model producing `dimensions`-length vectors.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, ..Default::default() }
    }

    /// Return `embedding` whenever `text` is embedded.
    pub fn with_embedding(mut self, text: impl Into<String>, embedding: Embedding) -> Self {
        self.pinned.insert(text.into(), embedding);
        self
    }

    /// Fail every call whose text equals `text`.
    pub fn failing_on(mut self, text: impl Into<String>) -> Self {
        self.failing_texts.push(text.into());
        self
    }

    /// Fail the first `n` calls, whatever the text.
    pub fn failing_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    /// Number of `embed` calls so far (including failed ones).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every text submitted so far, in call order.
    pub fn seen_texts(&self) -> Vec<String> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }

    fn hashed_embedding(&self, text: &str) -> Embedding {
        let digest = Sha256::digest(text.as_bytes());
        let mut seed = u64::from_le_bytes(digest[..8].try_into().unwrap_or_default());
        let mut emb: Embedding = (0..self.dimensions)
            .map(|_| {
                // splitmix64
                seed = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
                let mut z = seed;
                z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
                z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
                z ^= z >> 31;
                ((z >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0) as f32
            })
            .collect();
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            emb.iter_mut().for_each(|x| *x /= norm);
        }
        emb
    }
}

#[async_trait]
impl EmbeddingModel for MockEmbeddingModel {
    async fn embed(&self, text: &str, _task: TaskType) -> Result<Embedding> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(text.to_string());
        }
        if call < self.fail_first || self.failing_texts.iter().any(|t| t == text) {
            return Err(RagError::Embedding {
                provider: "Mock".into(),
                message: format!("scripted failure on call {}", call + 1),
            });
        }
        Ok(self.pinned.get(text).cloned().unwrap_or_else(|| self.hashed_embedding(text)))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "Mock"
    }
}

/// A [`GenerativeModel`] returning a canned answer.
#[derive(Debug, Default)]
pub struct MockGenerativeModel {
    response: String,
    fail_first: usize,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    last_params: Mutex<Option<GenerationParams>>,
}

impl MockGenerativeModel {
    /// Always answer with `response`.
    pub fn new(response: impl Into<String>) -> Self {
        Self { response: response.into(), ..Default::default() }
    }

    /// Fail the first `n` calls.
    pub fn failing_first(mut self, n: usize) -> Self {
        self.fail_first = n;
        self
    }

    /// A model whose every call fails.
    pub fn always_failing() -> Self {
        Self::new("").failing_first(usize::MAX)
    }

    /// Number of `generate` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every prompt received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Decoding parameters of the most recent call.
    pub fn last_params(&self) -> Option<GenerationParams> {
        self.last_params.lock().ok().and_then(|p| *p)
    }
}

#[async_trait]
impl GenerativeModel for MockGenerativeModel {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        if let Ok(mut last) = self.last_params.lock() {
            *last = Some(*params);
        }
        if call < self.fail_first {
            return Err(RagError::Generation {
                provider: "Mock".into(),
                message: format!("scripted failure on call {}", call + 1),
            });
        }
        Ok(self.response.clone())
    }

    fn name(&self) -> &str {
        "Mock"
    }
}
