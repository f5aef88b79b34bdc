//! Exact cosine-similarity vector index.
//!
//! [`VectorIndex`] is immutable once built: the only way to change its
//! contents is to build a new one and swap it in through an
//! [`IndexHandle`](crate::IndexHandle).

use chrono::{DateTime, Utc};

use crate::document::{IndexEntry, RetrievalResult, SearchResult};
use crate::embedding::l2_norm;
use crate::error::{RagError, Result};

/// An in-memory index of chunk embeddings searched by cosine similarity.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::VectorIndex;
///
/// let index = VectorIndex::build("hashing-bow-384", 384, entries)?;
/// let results = index.search(&query_embedding, 3)?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    embedding_model: String,
    dimensions: usize,
    built_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
    norms: Vec<f32>,
}

impl VectorIndex {
    /// Build an index over `entries`, keeping their order for tie-breaks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if any entry's embedding length
    /// differs from `dimensions`, and [`RagError::InvalidInput`] if
    /// `dimensions` is zero or an embedding holds a non-finite value. Nothing
    /// is built on error.
    pub fn build(
        embedding_model: impl Into<String>,
        dimensions: usize,
        entries: Vec<IndexEntry>,
    ) -> Result<Self> {
        Self::from_parts(embedding_model.into(), dimensions, Utc::now(), entries)
    }

    pub(crate) fn from_parts(
        embedding_model: String,
        dimensions: usize,
        built_at: DateTime<Utc>,
        entries: Vec<IndexEntry>,
    ) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::InvalidInput("index dimension must be greater than zero".into()));
        }
        for (position, entry) in entries.iter().enumerate() {
            if entry.embedding.len() != dimensions {
                return Err(RagError::DimensionMismatch {
                    expected: dimensions,
                    actual: entry.embedding.len(),
                    context: format!("entry {position} (chunk '{}')", entry.chunk.id),
                });
            }
            if entry.embedding.iter().any(|x| !x.is_finite()) {
                return Err(RagError::InvalidInput(format!(
                    "embedding of chunk '{}' contains a non-finite value",
                    entry.chunk.id
                )));
            }
        }
        let norms = entries.iter().map(|e| l2_norm(&e.embedding)).collect();
        Ok(Self { embedding_model, dimensions, built_at, entries, norms })
    }

    /// Return the `k` entries most similar to `query`, best first.
    ///
    /// Equal scores keep insertion order. An index with fewer than `k`
    /// entries returns all of them.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] if `k == 0` or the query holds a
    /// non-finite value, and [`RagError::DimensionMismatch`] if the query has
    /// the wrong length.
    pub fn search(&self, query: &[f32], k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(RagError::InvalidInput("k must be greater than zero".into()));
        }
        if query.len() != self.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
                context: "query embedding".into(),
            });
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(RagError::InvalidInput(
                "query embedding contains a non-finite value".into(),
            ));
        }

        let query_norm = l2_norm(query);
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .zip(&self.norms)
            .enumerate()
            .map(|(position, (entry, norm))| {
                (position, cosine_similarity(&entry.embedding, *norm, query, query_norm))
            })
            .collect();

        // `sort_by` is stable, so equal scores stay in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| SearchResult {
                chunk: self.entries[position].chunk.clone(),
                score,
            })
            .collect())
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// When this index was built.
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cosine similarity with precomputed norms. Returns 0.0 if either vector has
/// zero magnitude.
fn cosine_similarity(a: &[f32], norm_a: f32, b: &[f32], norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::document::Chunk;

    fn entry(id: &str, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk: Chunk {
                id: id.to_string(),
                text: id.to_string(),
                document_id: "doc".to_string(),
                ordinal: 0,
                start: 0,
                metadata: HashMap::new(),
            },
            embedding,
        }
    }

    #[test]
    fn zero_k_is_rejected() {
        let index = VectorIndex::build("m", 2, vec![entry("a", vec![1.0, 0.0])]).unwrap();
        assert!(matches!(index.search(&[1.0, 0.0], 0), Err(RagError::InvalidInput(_))));
    }

    #[test]
    fn query_dimension_is_checked() {
        let index = VectorIndex::build("m", 2, vec![entry("a", vec![1.0, 0.0])]).unwrap();
        let err = index.search(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 3, .. }));
    }

    #[test]
    fn zero_magnitude_entries_score_zero() {
        let index = VectorIndex::build(
            "m",
            2,
            vec![entry("zero", vec![0.0, 0.0]), entry("x", vec![1.0, 0.0])],
        )
        .unwrap();
        let results = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(results[0].chunk.id, "x");
        assert_eq!(results[1].score, 0.0);
    }

    #[test]
    fn build_rejects_entries_of_another_dimension() {
        let entries = vec![entry("a", vec![1.0, 0.0]), entry("b", vec![1.0, 0.0, 0.0])];
        let err = VectorIndex::build("m", 2, entries).unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 3, .. }));
    }

    #[test]
    fn search_returns_exact_top_k() {
        let index = VectorIndex::build(
            "m",
            2,
            vec![
                entry("west", vec![-1.0, 0.0]),
                entry("north", vec![0.0, 1.0]),
                entry("east", vec![1.0, 0.0]),
                entry("north-east", vec![0.8, 0.6]),
            ],
        )
        .unwrap();

        let results = index.search(&[1.0, 0.0], 2).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.chunk.id.as_str()).collect();
        assert_eq!(ids, ["east", "north-east"]);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert!((results[1].score - 0.8).abs() < 1e-6);

        let all = index.search(&[1.0, 0.0], 10).unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.chunk.id.as_str()).collect();
        assert_eq!(ids, ["east", "north-east", "north", "west"]);
        assert!((all[3].score + 1.0).abs() < 1e-6);
    }

    #[test]
    fn non_finite_embeddings_are_rejected() {
        let err = VectorIndex::build("m", 2, vec![entry("nan", vec![f32::NAN, 0.0])]).unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
    }
}
