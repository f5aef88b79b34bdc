//! Embedding providers and the batching [`Embedder`] that wraps them.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input. Override this method if the backend
    /// supports native batch embedding for better throughput.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Return the identifier of the underlying model.
    ///
    /// Indexes record this value; queries against an index built by a
    /// different model are refused.
    fn model_id(&self) -> &str;
}

/// Applies batching and normalization policy on top of an [`EmbeddingProvider`].
///
/// Every returned vector has the provider's dimension and unit L2 norm.
/// Output order always matches input order.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("model", &self.provider.model_id())
            .field("dimensions", &self.provider.dimensions())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl Embedder {
    /// Wrap `provider`, sending at most `batch_size` texts per call.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Self {
        Self { provider, batch_size: batch_size.max(1) }
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Embed `texts`, returning one vector per input in the same order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ModelUnavailable`] if the provider fails, returns
    /// the wrong number of vectors, or returns a zero vector, and
    /// [`RagError::DimensionMismatch`] if a vector has the wrong length.
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(model = self.model_id(), batch_size = batch.len(), "embedding batch");
            let vectors = self.provider.embed_batch(batch).await.map_err(|e| {
                error!(model = self.model_id(), error = %e, "embedding batch failed");
                match e {
                    RagError::ModelUnavailable { .. } | RagError::DimensionMismatch { .. } => e,
                    other => RagError::model_unavailable(self.model_id(), other.to_string()),
                }
            })?;
            if vectors.len() != batch.len() {
                return Err(RagError::model_unavailable(
                    self.model_id(),
                    format!("expected {} embeddings, received {}", batch.len(), vectors.len()),
                ));
            }
            for vector in vectors {
                embeddings.push(self.check(vector)?);
            }
        }
        Ok(embeddings)
    }

    /// Embed a single query string.
    ///
    /// # Errors
    ///
    /// Same as [`embed`](Embedder::embed).
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text]).await?.pop().ok_or_else(|| {
            RagError::model_unavailable(self.model_id(), "provider returned no embedding")
        })
    }

    fn check(&self, mut vector: Vec<f32>) -> Result<Vec<f32>> {
        let expected = self.dimensions();
        if vector.len() != expected {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: vector.len(),
                context: format!("output of embedding model '{}'", self.model_id()),
            });
        }
        let norm = l2_norm(&vector);
        if !norm.is_finite() || norm == 0.0 {
            return Err(RagError::model_unavailable(
                self.model_id(),
                "model returned a zero or non-finite embedding",
            ));
        }
        vector.iter_mut().for_each(|x| *x /= norm);
        Ok(vector)
    }
}

pub(crate) fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
