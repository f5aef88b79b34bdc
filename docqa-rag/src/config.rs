//! Configuration for the retrieval core and answer generation.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::prompt::{CONTEXT_PLACEHOLDER, DEFAULT_TEMPLATE, QUESTION_PLACEHOLDER};

/// Sentence-embedding model used when none is configured.
pub const DEFAULT_EMBEDDING_MODEL: &str =
    "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2";

/// Conservative characters-per-token estimate used to turn the generator's
/// token window into a character budget. Devanagari text tokenizes densely.
pub const APPROX_CHARS_PER_TOKEN: usize = 2;

/// Sampling parameters handed to the [`AnswerGenerator`](crate::AnswerGenerator).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationParams {
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
    /// Nucleus-sampling threshold.
    pub top_p: f32,
    /// Context window of the model, in tokens. The prompt and the
    /// `max_tokens` completion must fit in it together.
    pub context_window: usize,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self { temperature: 0.5, max_tokens: 512, top_p: 1.0, context_window: 2048 }
    }
}

/// Configuration parameters for the RAG pipeline.
///
/// Every field has a default, so a JSON config file only needs to name the
/// values it changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Identifier of the embedding model; recorded in the persisted index.
    pub embedding_model: String,
    /// Number of texts sent to the embedding model per call.
    pub embedding_batch_size: usize,
    /// Where the index is persisted. `None` keeps the index in memory only.
    pub index_path: Option<PathBuf>,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Minimum similarity score; lower-scoring results are filtered out.
    pub similarity_threshold: Option<f32>,
    /// Upper bound for the assembled context block, in characters. The
    /// generator's context window may lower it further; see
    /// [`RagConfig::context_budget_chars`].
    pub max_context_chars: usize,
    /// Custom prompt template containing `{context}` and `{question}`.
    pub prompt_template: Option<String>,
    /// Parameters for the answer generator.
    pub generation: GenerationParams,
    /// Upper bound on a single question's end-to-end latency, in milliseconds.
    pub query_timeout_ms: Option<u64>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_batch_size: 32,
            index_path: None,
            top_k: 3,
            similarity_threshold: None,
            max_context_chars: 6000,
            prompt_template: None,
            generation: GenerationParams::default(),
            query_timeout_ms: None,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// The configured query timeout.
    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }

    /// Characters available for retrieved context.
    ///
    /// The smaller of `max_context_chars` and what is left of the generator's
    /// window after reserving `max_tokens` for the completion and the
    /// template's own text, at [`APPROX_CHARS_PER_TOKEN`].
    pub fn context_budget_chars(&self) -> usize {
        let prompt_tokens =
            self.generation.context_window.saturating_sub(self.generation.max_tokens as usize);
        let template = self.prompt_template.as_deref().unwrap_or(DEFAULT_TEMPLATE);
        let window_chars = (prompt_tokens * APPROX_CHARS_PER_TOKEN)
            .saturating_sub(template.chars().count());
        self.max_context_chars.min(window_chars)
    }

    /// Check that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k` or `embedding_batch_size` is zero
    /// - `max_tokens >= context_window`
    /// - the context budget is smaller than `chunk_size`
    /// - `embedding_model` is empty
    /// - a custom prompt template lacks `{context}` or `{question}`
    /// - generation parameters are out of range
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.embedding_batch_size == 0 {
            return Err(RagError::ConfigError(
                "embedding_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.embedding_model.trim().is_empty() {
            return Err(RagError::ConfigError("embedding_model must not be empty".to_string()));
        }
        if let Some(template) = &self.prompt_template {
            for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
                if !template.contains(placeholder) {
                    return Err(RagError::ConfigError(format!(
                        "prompt_template must contain {placeholder}"
                    )));
                }
            }
        }
        let generation = &self.generation;
        if generation.temperature.is_nan() || generation.temperature < 0.0 {
            return Err(RagError::ConfigError("temperature must be non-negative".to_string()));
        }
        if generation.top_p.is_nan() || generation.top_p <= 0.0 || generation.top_p > 1.0 {
            return Err(RagError::ConfigError("top_p must be in (0, 1]".to_string()));
        }
        if generation.max_tokens == 0 {
            return Err(RagError::ConfigError("max_tokens must be greater than zero".to_string()));
        }
        if generation.max_tokens as usize >= generation.context_window {
            return Err(RagError::ConfigError(format!(
                "max_tokens ({}) must be less than context_window ({})",
                generation.max_tokens, generation.context_window
            )));
        }
        // The best-ranked chunk must always fit.
        let budget = self.context_budget_chars();
        if budget < self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "context budget ({budget} chars) must be at least chunk_size ({})",
                self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the embedding model identifier.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set how many texts are embedded per model call.
    pub fn embedding_batch_size(mut self, size: usize) -> Self {
        self.config.embedding_batch_size = size;
        self
    }

    /// Persist the index at `path`.
    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.index_path = Some(path.into());
        self
    }

    /// Set the number of top results to return from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    /// Set the context budget in characters.
    pub fn max_context_chars(mut self, chars: usize) -> Self {
        self.config.max_context_chars = chars;
        self
    }

    /// Use a custom prompt template.
    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = Some(template.into());
        self
    }

    /// Set the generation parameters.
    pub fn generation(mut self, params: GenerationParams) -> Self {
        self.config.generation = params;
        self
    }

    /// Bound each question's end-to-end latency, at millisecond precision.
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.config.query_timeout_ms = Some(millis);
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
