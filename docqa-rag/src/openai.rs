//! Embedding and completion backends for OpenAI-compatible HTTP APIs.
//!
//! Works against api.openai.com as well as local servers that expose the same
//! `/v1/embeddings` and `/v1/completions` routes (llama.cpp, vLLM, Ollama).
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::GenerationParams;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::AnswerGenerator;

/// The default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// The default embedding model.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// The default dimensionality for `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

fn endpoint(base_url: &str, route: &str) -> String {
    format!("{}/v1/{route}", base_url.trim_end_matches('/'))
}

/// Turn a non-success response into a [`RagError::ModelUnavailable`].
async fn api_error(model: &str, response: reqwest::Response) -> RagError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail =
        serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
    error!(%model, %status, "API error");
    RagError::model_unavailable(model, format!("API returned {status}: {detail}"))
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by an OpenAI-compatible embeddings API.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-3-small`.
/// - `dimensions` – expected output size; also sent to the API when set
///   explicitly.
/// - `api_key` – optional; local servers usually do not need one.
/// - `base_url` – defaults to `https://api.openai.com`.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new()
///     .with_base_url("http://localhost:8080")
///     .with_model("paraphrase-multilingual-MiniLM-L12-v2")
///     .with_dimensions(384);
/// let embedding = provider.embed("hello world").await?;
/// ```
#[derive(Debug, Clone)]
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
    request_dimensions: Option<usize>,
}

impl Default for OpenAIEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAIEmbeddingProvider {
    /// Create a provider for the default model and endpoint, without a key.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: None,
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
        }
    }

    /// Set the API base URL, without the `/v1` suffix.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Authenticate with a bearer token. Empty keys are ignored.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        self.api_key = (!api_key.is_empty()).then_some(api_key);
        self
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimensions.
    ///
    /// This also updates the value returned by
    /// [`dimensions()`](EmbeddingProvider::dimensions).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RagError::model_unavailable(&self.model, "API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(batch_size = texts.len(), model = %self.model, "embedding batch");

        let request_body = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.request_dimensions,
        };

        let mut request =
            self.client.post(endpoint(&self.base_url, "embeddings")).json(&request_body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(|e| {
            error!(model = %self.model, error = %e, "request failed");
            RagError::model_unavailable(&self.model, format!("request failed: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(api_error(&self.model, response).await);
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(model = %self.model, error = %e, "failed to parse response");
            RagError::model_unavailable(&self.model, format!("failed to parse response: {e}"))
        })?;

        // Servers may return items out of order; `index` is authoritative.
        parsed.data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// ── Completions ────────────────────────────────────────────────────

/// An [`AnswerGenerator`] backed by an OpenAI-compatible completions API.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::openai::OpenAICompletionGenerator;
///
/// let generator = OpenAICompletionGenerator::new("mistral-7b-instruct")
///     .with_base_url("http://localhost:8080")
///     .with_params(GenerationParams::default());
/// let answer = generator.generate(&prompt).await?;
/// ```
#[derive(Debug, Clone)]
pub struct OpenAICompletionGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    params: GenerationParams,
}

impl OpenAICompletionGenerator {
    /// Create a generator for `model` against the default endpoint.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: None,
            model: model.into(),
            params: GenerationParams::default(),
        }
    }

    /// Set the API base URL, without the `/v1` suffix.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Authenticate with a bearer token. Empty keys are ignored.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        self.api_key = (!api_key.is_empty()).then_some(api_key);
        self
    }

    /// Set the sampling parameters.
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

#[async_trait]
impl AnswerGenerator for OpenAICompletionGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "requesting completion");

        let request_body = CompletionRequest {
            model: &self.model,
            prompt,
            temperature: self.params.temperature,
            max_tokens: self.params.max_tokens,
            top_p: self.params.top_p,
        };

        let mut request =
            self.client.post(endpoint(&self.base_url, "completions")).json(&request_body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(|e| {
            error!(model = %self.model, error = %e, "request failed");
            RagError::model_unavailable(&self.model, format!("request failed: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(api_error(&self.model, response).await);
        }

        let parsed: CompletionResponse = response.json().await.map_err(|e| {
            error!(model = %self.model, error = %e, "failed to parse response");
            RagError::model_unavailable(&self.model, format!("failed to parse response: {e}"))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| RagError::model_unavailable(&self.model, "API returned no choices"))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
