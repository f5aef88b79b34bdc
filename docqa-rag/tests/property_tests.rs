//! Property tests for chunking, embedding order and index search ordering.

use std::collections::HashMap;
use std::sync::Arc;

use docqa_rag::{
    Chunk, Chunker, Document, Embedder, HashingEmbeddingProvider, IndexEntry, RecursiveChunker,
    VectorIndex, reconstruct,
};
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

fn entry(ordinal: usize, embedding: Vec<f32>) -> IndexEntry {
    IndexEntry {
        chunk: Chunk {
            id: format!("doc_{ordinal}"),
            text: format!("chunk {ordinal}"),
            document_id: "doc".to_string(),
            ordinal,
            start: 0,
            metadata: HashMap::new(),
        },
        embedding,
    }
}

/// Text mixing words, sentence ends, paragraph breaks and non-Latin script.
fn arb_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            "[a-z]{1,12}",
            Just(" ".to_string()),
            Just(". ".to_string()),
            Just("\n".to_string()),
            Just("\n\n".to_string()),
            Just("सूर्य एक तारा है। ".to_string()),
            Just("é".to_string()),
        ],
        0..200,
    )
    .prop_map(|parts| parts.concat())
}

/// Chunks cover the text exactly, stay within the size bound, and share
/// exactly `chunk_overlap` characters with their predecessor.
mod prop_chunking {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_reconstruct_the_document(
            text in arb_text(),
            size in 2usize..80,
            overlap_ratio in 0.0f64..0.9,
        ) {
            let overlap = ((size as f64) * overlap_ratio) as usize;
            let chunker = RecursiveChunker::new(size, overlap).unwrap();
            let chunks = chunker.split(&Document::new("doc", text.clone()));

            prop_assert_eq!(chunks.is_empty(), text.is_empty());
            prop_assert_eq!(reconstruct(&chunks), text);

            for chunk in &chunks {
                prop_assert!(chunk.char_len() <= size);
                prop_assert!(chunk.char_len() > 0);
            }
            for (i, pair) in chunks.windows(2).enumerate() {
                prop_assert_eq!(pair[0].ordinal, i);
                prop_assert!(pair[1].start > pair[0].start);
                prop_assert_eq!(pair[1].start, pair[0].start + pair[0].char_len() - overlap);
            }
        }
    }
}

/// Embedding a batch returns one unit vector per input, in input order,
/// regardless of batch size.
mod prop_embed_order {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn batched_output_matches_one_at_a_time(
            texts in proptest::collection::vec("[a-z ]{1,40}", 1..20),
            batch_size in 1usize..8,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let provider = Arc::new(HashingEmbeddingProvider::new(32));
            let batched = Embedder::new(provider.clone(), batch_size);
            let single = Embedder::new(provider, 1);
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();

            let (all, each) = rt.block_on(async {
                let all = batched.embed(&refs).await.unwrap();
                let mut each = Vec::new();
                for text in &refs {
                    each.push(single.embed_query(text).await.unwrap());
                }
                (all, each)
            });

            prop_assert_eq!(all.len(), texts.len());
            prop_assert_eq!(&all, &each);
            for vector in &all {
                let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
                prop_assert!((norm - 1.0).abs() < 1e-4);
            }
        }
    }
}

/// *For any* indexed set and query, search returns at most `k` results in
/// descending score order, with ties in insertion order.
mod prop_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_k(
            embeddings in proptest::collection::vec(arb_normalized_embedding(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            k in 1usize..25,
        ) {
            let count = embeddings.len();
            let entries = embeddings.into_iter().enumerate().map(|(i, e)| entry(i, e)).collect();
            let index = VectorIndex::build("test-model", DIM, entries).unwrap();
            let results = index.search(&query, k).unwrap();

            prop_assert_eq!(results.len(), k.min(count));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
                if window[0].score == window[1].score {
                    prop_assert!(window[0].chunk.ordinal < window[1].chunk.ordinal);
                }
            }
        }

        #[test]
        fn results_match_brute_force_top_k(
            embeddings in proptest::collection::vec(arb_normalized_embedding(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            k in 1usize..25,
        ) {
            let dot = |e: &[f32]| e.iter().zip(&query).map(|(a, b)| a * b).sum::<f32>();
            let expected: Vec<f32> = embeddings.iter().map(|e| dot(e)).collect();
            let entries =
                embeddings.into_iter().enumerate().map(|(i, e)| entry(i, e)).collect();
            let index = VectorIndex::build("test-model", DIM, entries).unwrap();
            let results = index.search(&query, k).unwrap();

            for result in &results {
                prop_assert!((result.score - expected[result.chunk.ordinal]).abs() < 1e-5);
            }
            let cutoff = results.last().map(|r| r.score).unwrap();
            for (ordinal, score) in expected.iter().enumerate() {
                if results.iter().all(|r| r.chunk.ordinal != ordinal) {
                    prop_assert!(
                        *score <= cutoff + 1e-5,
                        "entry {} scored {} but was left out (cutoff {})",
                        ordinal,
                        score,
                        cutoff,
                    );
                }
            }
        }

        #[test]
        fn duplicate_embeddings_keep_insertion_order(
            embedding in arb_normalized_embedding(DIM),
            copies in 2usize..10,
        ) {
            let entries = (0..copies).map(|i| entry(i, embedding.clone())).collect();
            let index = VectorIndex::build("test-model", DIM, entries).unwrap();
            let results = index.search(&embedding, copies).unwrap();
            let order: Vec<usize> = results.iter().map(|r| r.chunk.ordinal).collect();
            prop_assert_eq!(order, (0..copies).collect::<Vec<_>>());
        }
    }
}
