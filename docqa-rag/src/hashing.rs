//! Deterministic lexical embeddings via feature hashing.
//!
//! [`HashingEmbeddingProvider`] needs no model files or network access: each
//! lowercase word is hashed (FNV-1a) into one of `dimensions` buckets with a
//! hash-derived sign. Texts that share words end up close under cosine
//! similarity. It is useful offline and makes retrieval tests reproducible.

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// An [`EmbeddingProvider`] that maps words to buckets by hashing.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::HashingEmbeddingProvider;
///
/// let provider = HashingEmbeddingProvider::new(384);
/// assert_eq!(provider.model_id(), "hashing-bow-384");
/// ```
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimensions: usize,
    model_id: String,
}

impl HashingEmbeddingProvider {
    /// Create a provider producing `dimensions`-long vectors.
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self { dimensions, model_id: format!("hashing-bow-{dimensions}") }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let hash = fnv1a(&word.to_lowercase());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        // Wordless text (punctuation, whitespace) collapses onto one fixed direction.
        if vector.iter().all(|x| *x == 0.0) {
            vector[0] = 1.0;
        }
        vector
    }
}

impl Default for HashingEmbeddingProvider {
    fn default() -> Self {
        Self::new(384)
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(FNV_OFFSET, |hash, b| (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME))
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_same_vector() {
        let provider = HashingEmbeddingProvider::new(64);
        assert_eq!(provider.vectorize("Stars emit light."), provider.vectorize("stars EMIT light"));
    }

    #[test]
    fn text_without_words_is_not_zero() {
        let provider = HashingEmbeddingProvider::new(16);
        let vector = provider.vectorize(" ... !");
        assert_eq!(vector[0], 1.0);
        assert!(vector[1..].iter().all(|x| *x == 0.0));
    }
}
