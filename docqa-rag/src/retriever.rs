//! Query-time retrieval: embed the question, search the current index.

use tracing::{debug, info};

use crate::document::RetrievalResult;
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::handle::IndexHandle;

/// Turns a query string into ranked supporting passages.
///
/// Every call re-embeds the query; nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct Retriever {
    embedder: Embedder,
    index: IndexHandle,
    similarity_threshold: Option<f32>,
}

impl Retriever {
    pub fn new(embedder: Embedder, index: IndexHandle) -> Self {
        Self { embedder, index, similarity_threshold: None }
    }

    /// Drop results scoring below `threshold`.
    pub fn with_similarity_threshold(mut self, threshold: Option<f32>) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    pub fn index(&self) -> &IndexHandle {
        &self.index
    }

    /// Retrieve up to `k` passages for `query`, best first.
    ///
    /// An empty index yields an empty result rather than an error.
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexNotFound`] if no index has been built or loaded
    /// - [`RagError::EmbeddingModelMismatch`] if the index was built by a
    ///   different embedding model
    /// - [`RagError::InvalidInput`] if `k == 0`
    /// - embedding errors from [`Embedder::embed_query`]
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(RagError::InvalidInput("k must be greater than zero".into()));
        }
        let index = self
            .index
            .snapshot()
            .await
            .ok_or(RagError::IndexNotFound { path: None })?;

        if index.embedding_model() != self.embedder.model_id() {
            return Err(RagError::EmbeddingModelMismatch {
                index_model: index.embedding_model().to_string(),
                query_model: self.embedder.model_id().to_string(),
            });
        }
        if index.is_empty() {
            debug!("index is empty; returning no passages");
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed_query(query).await?;
        let mut results = index.search(&query_embedding, k)?;

        if let Some(threshold) = self.similarity_threshold {
            results.retain(|r| r.score >= threshold);
        }

        info!(
            result_count = results.len(),
            top_score = ?results.first().map(|r| r.score),
            "retrieval completed"
        );
        Ok(results)
    }
}
