//! Embedding cache call-count semantics.

use std::sync::Arc;

use fleet_rag::cache::EmbeddingCache;
use fleet_rag::embedding::EmbeddingProvider;
use fleet_rag::metrics::MetricsCollector;
use fleet_rag::mock::MockEmbeddingModel;
use fleet_rag::retry::RetryPolicy;

fn cache(model: Arc<MockEmbeddingModel>) -> EmbeddingCache {
    let provider = EmbeddingProvider::new(model).with_retry_policy(RetryPolicy::immediate(3));
    EmbeddingCache::new(Arc::new(provider))
}

#[tokio::test]
async fn same_text_twice_calls_provider_once() {
    let model = Arc::new(MockEmbeddingModel::new(8));
    let cache = cache(model.clone());

    let first = cache.get(&["coolant temperature high"], true).await;
    let second = cache.get(&["coolant temperature high"], true).await;

    assert_eq!(model.calls(), 1);
    assert_eq!(first, second);
}

#[tokio::test]
async fn different_texts_call_provider_for_each() {
    let model = Arc::new(MockEmbeddingModel::new(8));
    let cache = cache(model.clone());

    cache.get(&["brake pads"], true).await;
    cache.get(&["air filter"], true).await;

    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn disabled_cache_always_calls_provider() {
    let model = Arc::new(MockEmbeddingModel::new(8));
    let cache = cache(model.clone());

    cache.get(&["DPF regeneration"], true).await;
    cache.get(&["DPF regeneration"], false).await;
    cache.get_query_embedding("DPF regeneration", false).await;

    assert_eq!(model.calls(), 3);
    assert_eq!(cache.stats().cached_embeddings, 1);
}

#[tokio::test]
async fn mixed_batch_only_embeds_misses_and_keeps_order() {
    let model = Arc::new(MockEmbeddingModel::new(4));
    let cache = cache(model.clone());

    let warm = cache.get(&["b"], true).await;
    let out = cache.get(&["a", "b", "c", "a"], true).await;

    assert_eq!(model.seen_texts(), vec!["b", "a", "c"]);
    assert_eq!(out.len(), 4);
    assert_eq!(out[1], warm[0]);
    assert_eq!(out[0], out[3]);
    assert_ne!(out[0], out[2]);
}

#[tokio::test]
async fn query_embedding_shares_the_cache() {
    let model = Arc::new(MockEmbeddingModel::new(4));
    let cache = cache(model.clone());

    cache.get(&["tire rotation"], true).await;
    cache.get_query_embedding("tire rotation", true).await;

    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn reports_hits_misses_and_stats() {
    let model = Arc::new(MockEmbeddingModel::new(4));
    let metrics = Arc::new(MetricsCollector::new());
    let cache = cache(model).with_metrics(metrics.clone());

    cache.get(&["x", "y"], true).await;
    cache.get(&["x"], true).await;
    cache.get_query_embedding("y", true).await;

    let snap = metrics.snapshot();
    assert_eq!(snap.embedding_cache_misses, 2);
    assert_eq!(snap.embedding_cache_hits, 2);

    let stats = cache.stats();
    assert_eq!(stats.cached_embeddings, 2);
    assert_eq!(stats.total_cache_size, 8);

    cache.clear();
    assert_eq!(cache.stats().cached_embeddings, 0);
}

#[tokio::test]
async fn fallback_vector_is_not_cached() {
    let model = Arc::new(MockEmbeddingModel::new(4).failing_first(3));
    let cache = cache(model.clone());

    let failed = cache.get(&["coolant flush procedure"], true).await;
    assert_eq!(failed[0], vec![0.0; 4]);
    assert_eq!(model.calls(), 3);
    assert_eq!(cache.stats().cached_embeddings, 0);

    let recovered = cache.get(&["coolant flush procedure"], true).await;
    assert_eq!(model.calls(), 4);
    assert!(recovered[0].iter().any(|v| *v != 0.0));
    assert_eq!(cache.stats().cached_embeddings, 1);
}

#[tokio::test]
async fn fallback_query_vector_is_not_cached() {
    let model = Arc::new(MockEmbeddingModel::new(4).failing_first(3));
    let cache = cache(model.clone());

    assert_eq!(cache.get_query_embedding("engine overheating", true).await, vec![0.0; 4]);
    let recovered = cache.get_query_embedding("engine overheating", true).await;

    assert_eq!(model.calls(), 4);
    assert!(recovered.iter().any(|v| *v != 0.0));
}
