//! The application context: one owner for every long-lived component.

use std::sync::Arc;

use anyhow::{Context, Result};
use fleet_rag::{
    AnswerGenerator, EmbeddingCache, EmbeddingModel, EmbeddingProvider, GeminiClient,
    GenerationParams, GenerativeModel, MetricsCollector, RagPipeline, SqliteVectorIndex,
    VectorIndex, VectorStore,
};
use tracing::info;

use crate::settings::Settings;

/// Settings, metrics, embedding cache, vector store, and orchestrator for
/// one process.
///
/// Built once in `main` and passed by reference to the commands; nothing
/// here is global.
pub struct AppContext {
    pub settings: Settings,
    pub metrics: Arc<MetricsCollector>,
    pub cache: Arc<EmbeddingCache>,
    pub store: Arc<VectorStore>,
    pub pipeline: RagPipeline,
}

impl AppContext {
    /// Wire the Gemini client and the on-disk SQLite index.
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        let client = GeminiClient::new(settings.google_api_key.clone())?
            .with_base_url(settings.gemini_base_url.clone())
            .with_generation_model(settings.gemini_model.clone())
            .with_embedding_model(settings.embedding_model.clone(), settings.embedding_dimensions);
        let client = Arc::new(client);

        let index = SqliteVectorIndex::open(&settings.vector_store_dir, &settings.collection_name)
            .await
            .with_context(|| {
                format!("failed to open vector store in {}", settings.vector_store_dir.display())
            })?;

        Self::assemble(settings, client.clone(), client, Arc::new(index))
    }

    /// Wire the components over explicit models and index.
    pub fn assemble(
        settings: Settings,
        embedder: Arc<dyn EmbeddingModel>,
        generator: Arc<dyn GenerativeModel>,
        index: Arc<dyn VectorIndex>,
    ) -> Result<Self> {
        let config = settings.rag_config()?;
        let metrics = Arc::new(MetricsCollector::new());

        let provider = EmbeddingProvider::new(embedder)
            .with_dimensions(config.embedding_dimensions)
            .with_max_input_chars(config.max_input_chars);
        let cache =
            Arc::new(EmbeddingCache::new(Arc::new(provider)).with_metrics(metrics.clone()));

        let store = Arc::new(
            VectorStore::new(settings.collection_name.clone(), index, cache.clone())
                .with_batch_size(config.batch_size)
                .with_similarity_threshold(config.similarity_threshold),
        );

        let generator = AnswerGenerator::new(generator).with_params(GenerationParams {
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        });

        let pipeline = RagPipeline::builder()
            .config(config)
            .vector_store(store.clone())
            .generator(Arc::new(generator))
            .metrics(metrics.clone())
            .build()?;

        info!(collection = %settings.collection_name, "application context ready");
        Ok(Self { settings, metrics, cache, store, pipeline })
    }
}
