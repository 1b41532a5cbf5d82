//! Environment-driven application settings.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use fleet_rag::RagConfig;
use fleet_rag::gemini::{
    DEFAULT_BASE_URL, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_GENERATION_MODEL,
};
use serde::Serialize;

/// Everything the `fleet` binary reads from its environment.
///
/// Values come from the process environment, with a `.env` file in the
/// working directory filling gaps. Every key except `GOOGLE_API_KEY` has a
/// default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    #[serde(skip)]
    pub google_api_key: String,
    pub gemini_model: String,
    pub embedding_model: String,
    pub gemini_base_url: String,
    pub vector_store_dir: PathBuf,
    pub collection_name: String,
    pub log_level: String,
    pub log_dir: PathBuf,
    pub data_dir: PathBuf,
    pub max_query_length: usize,
    pub max_results: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub similarity_threshold: f64,
    pub max_context_length: usize,
    pub embedding_dimensions: usize,
    pub query_timeout: Option<Duration>,
}

impl Settings {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self> {
        // A missing .env file is normal.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Fails when `GOOGLE_API_KEY` is missing or blank, or when a numeric key
    /// does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let string = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let google_api_key = get("GOOGLE_API_KEY")
            .ok_or_else(|| anyhow!("GOOGLE_API_KEY must be set (in the environment or .env)"))?;
        let data_dir = PathBuf::from(string("DATA_DIR", "./data"));

        Ok(Self {
            google_api_key,
            gemini_model: string("GEMINI_MODEL", DEFAULT_GENERATION_MODEL),
            embedding_model: string("EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            gemini_base_url: string("GEMINI_BASE_URL", DEFAULT_BASE_URL),
            vector_store_dir: get("VECTOR_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("vector_store")),
            collection_name: string("COLLECTION_NAME", "maintenance_docs"),
            log_level: string("LOG_LEVEL", "info").to_lowercase(),
            log_dir: PathBuf::from(string("LOG_DIR", "./logs")),
            max_query_length: parse(get("MAX_QUERY_LENGTH"), "MAX_QUERY_LENGTH", 500)?,
            max_results: parse(get("MAX_RESULTS"), "MAX_RESULTS", 10)?,
            chunk_size: parse(get("CHUNK_SIZE"), "CHUNK_SIZE", 1000)?,
            chunk_overlap: parse(get("CHUNK_OVERLAP"), "CHUNK_OVERLAP", 200)?,
            similarity_threshold: parse(get("SIMILARITY_THRESHOLD"), "SIMILARITY_THRESHOLD", 0.7)?,
            max_context_length: parse(get("MAX_CONTEXT_LENGTH"), "MAX_CONTEXT_LENGTH", 4000)?,
            embedding_dimensions: parse(
                get("EMBEDDING_DIMENSIONS"),
                "EMBEDDING_DIMENSIONS",
                DEFAULT_EMBEDDING_DIMENSIONS,
            )?,
            query_timeout: get("QUERY_TIMEOUT_SECS")
                .map(|v| parse(Some(v), "QUERY_TIMEOUT_SECS", 0u64))
                .transpose()?
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            data_dir,
        })
    }

    /// Directory scanned for plain-text and markdown manuals.
    pub fn raw_data_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    /// The retrieval and generation parameters these settings imply.
    pub fn rag_config(&self) -> Result<RagConfig> {
        let mut builder = RagConfig::builder()
            .similarity_threshold(self.similarity_threshold)
            .max_context_length(self.max_context_length)
            .max_results(self.max_results)
            .default_k(5.min(self.max_results))
            .max_query_length(self.max_query_length)
            .embedding_dimensions(self.embedding_dimensions);
        if let Some(timeout) = self.query_timeout {
            builder = builder.query_timeout(timeout);
        }
        builder.build().context("invalid retrieval settings")
    }
}

fn parse<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e| anyhow!("{key}={raw:?} is invalid: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings> {
        let env: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let s = settings(&[("GOOGLE_API_KEY", "secret")]).unwrap();
        assert_eq!(s.gemini_model, "gemini-2.5-flash");
        assert_eq!(s.embedding_model, "models/text-embedding-004");
        assert_eq!(s.collection_name, "maintenance_docs");
        assert_eq!(s.vector_store_dir, PathBuf::from("./data/vector_store"));
        assert_eq!(s.raw_data_dir(), PathBuf::from("./data/raw"));
        assert_eq!(s.max_results, 10);
        assert_eq!((s.chunk_size, s.chunk_overlap), (1000, 200));
        assert_eq!(s.similarity_threshold, 0.7);
        assert_eq!(s.max_context_length, 4000);
        assert_eq!(s.embedding_dimensions, 768);
        assert_eq!(s.query_timeout, None);
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = settings(&[("GOOGLE_API_KEY", "  ")]).unwrap_err();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn overrides_are_parsed() {
        let s = settings(&[
            ("GOOGLE_API_KEY", "secret"),
            ("DATA_DIR", "/srv/fleet"),
            ("SIMILARITY_THRESHOLD", "0.55"),
            ("MAX_RESULTS", "3"),
            ("QUERY_TIMEOUT_SECS", "45"),
            ("LOG_LEVEL", "DEBUG"),
        ])
        .unwrap();
        assert_eq!(s.vector_store_dir, PathBuf::from("/srv/fleet/vector_store"));
        assert_eq!(s.similarity_threshold, 0.55);
        assert_eq!(s.query_timeout, Some(Duration::from_secs(45)));
        assert_eq!(s.log_level, "debug");

        let config = s.rag_config().unwrap();
        assert_eq!(config.max_results, 3);
        assert_eq!(config.default_k, 3);
    }

    #[test]
    fn bad_number_names_the_key() {
        let err = settings(&[("GOOGLE_API_KEY", "k"), ("CHUNK_SIZE", "big")]).unwrap_err();
        assert!(err.to_string().contains("CHUNK_SIZE"));
    }

    #[test]
    fn out_of_range_threshold_fails_config() {
        let s = settings(&[("GOOGLE_API_KEY", "k"), ("SIMILARITY_THRESHOLD", "1.5")]).unwrap();
        assert!(s.rag_config().is_err());
    }
}
