//! Property tests for in-memory vector index search ordering.

use fleet_rag::document::{Chunk, IndexedVector};
use fleet_rag::inmemory::InMemoryVectorIndex;
use fleet_rag::vectorstore::VectorIndex;
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate a stored vector with a normalized embedding.
fn arb_vector(dim: usize) -> impl Strategy<Value = IndexedVector> {
    ("[a-z]{3,8}", "[a-z ]{5,30}", arb_normalized_embedding(dim)).prop_map(
        |(id, text, embedding)| IndexedVector {
            id,
            embedding,
            chunk: Chunk::new(text).with_source("maintenance_logs.csv"),
        },
    )
}

/// Searching an InMemoryVectorIndex returns results ordered by descending
/// cosine similarity, at most `top_k` of them, with scores in [-1, 1].
mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            vectors in proptest::collection::vec(arb_vector(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let stored = vectors.len();
            let rt = tokio::runtime::Runtime::new().unwrap();
            let results = rt.block_on(async {
                let index = InMemoryVectorIndex::new();
                index.insert(vectors).await.unwrap();
                index.query(&query, top_k).await.unwrap()
            });

            prop_assert!(results.len() <= top_k);
            prop_assert_eq!(results.len(), stored.min(top_k));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].similarity_score >= window[1].similarity_score,
                    "results not in descending order: {} < {}",
                    window[0].similarity_score,
                    window[1].similarity_score,
                );
            }
            for result in &results {
                prop_assert!((-1.0..=1.0).contains(&result.similarity_score));
            }
        }
    }
}

/// Ids are not used for deduplication: identical chunks are all kept.
#[tokio::test]
async fn identical_chunks_are_stored_twice() {
    let index = InMemoryVectorIndex::new();
    let make = |id: &str| IndexedVector {
        id: id.to_string(),
        embedding: vec![1.0, 0.0],
        chunk: Chunk::new("Replace air filter").with_source("manual.txt"),
    };
    index.insert(vec![make("a")]).await.unwrap();
    index.insert(vec![make("b")]).await.unwrap();
    assert_eq!(index.count().await.unwrap(), 2);
}
