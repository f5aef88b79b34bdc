//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] coordinates ingestion (chunk → embed → build → persist
//! → swap) and question answering (embed → search → assemble → generate) by
//! composing a [`Chunker`], an [`EmbeddingProvider`], a shared
//! [`IndexHandle`] and an [`AnswerGenerator`].
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{RagPipeline, RagConfig, HashingEmbeddingProvider};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::new(384)))
//!     .generator(Arc::new(my_generator))
//!     .build()?;
//!
//! pipeline.ingest(&documents).await?;
//! let answer = pipeline.answer("What is the sun?").await?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{Document, IndexEntry, RetrievalResult};
use crate::embedding::{Embedder, EmbeddingProvider};
use crate::error::{RagError, Result};
use crate::generation::AnswerGenerator;
use crate::handle::{IndexHandle, IndexState};
use crate::index::VectorIndex;
use crate::prompt::{Prompt, PromptAssembler};
use crate::retriever::Retriever;

/// Summary of a completed ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Documents received.
    pub documents: usize,
    /// Documents that produced no chunks.
    pub empty_documents: usize,
    /// Chunks embedded and indexed.
    pub chunks: usize,
    /// Embedding dimension of the new index.
    pub dimensions: usize,
    /// Embedding model recorded in the new index.
    pub embedding_model: String,
    /// Where the index was saved, if persistence is configured.
    pub persisted_to: Option<PathBuf>,
}

/// A passage cited in an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    /// The passage text.
    pub text: String,
    /// ID of the document the passage came from.
    pub source_id: String,
    /// Similarity of the passage to the question.
    pub score: f32,
}

/// An answer with the passages it was conditioned on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// The generated answer.
    pub answer: String,
    /// Passages included in the prompt, best first.
    pub sources: Vec<Source>,
    /// Retrieved passages left out to fit the context budget.
    pub dropped_chunks: usize,
}

/// The user-facing result of a question: an answer or a refusal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerResponse {
    /// The answer, or `cannot answer: <reason>`.
    pub answer: String,
    /// Cited passages; empty on failure.
    pub sources: Vec<Source>,
    /// Retrieved passages left out to fit the context budget.
    #[serde(default)]
    pub dropped_chunks: usize,
    /// Error kind when the question could not be answered.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl AnswerResponse {
    /// The refusal returned in place of an answer when `error` occurred.
    pub fn refusal(error: &RagError) -> Self {
        Self {
            answer: format!("cannot answer: {error}"),
            sources: Vec::new(),
            dropped_chunks: 0,
            error: Some(error.kind().to_string()),
        }
    }
}

impl From<Answer> for AnswerResponse {
    fn from(answer: Answer) -> Self {
        Self {
            answer: answer.answer,
            sources: answer.sources,
            dropped_chunks: answer.dropped_chunks,
            error: None,
        }
    }
}

/// A question's retrieved passages and the prompt built from them.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    pub results: RetrievalResult,
    pub prompt: Prompt,
}

/// Observable state of the pipeline's index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub state: IndexState,
    pub entries: usize,
    pub dimensions: Option<usize>,
    pub embedding_model: Option<String>,
    pub built_at: Option<DateTime<Utc>>,
    /// Whether the index was built by the pipeline's embedding model.
    pub compatible: bool,
}

/// The RAG pipeline orchestrator.
///
/// Stateless per question; the only shared state is the index behind the
/// [`IndexHandle`]. Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    chunker: Arc<dyn Chunker>,
    retriever: Retriever,
    assembler: PromptAssembler,
    generator: Arc<dyn AnswerGenerator>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn embedder(&self) -> &Embedder {
        self.retriever.embedder()
    }

    pub fn index(&self) -> &IndexHandle {
        self.retriever.index()
    }

    pub fn generator(&self) -> &Arc<dyn AnswerGenerator> {
        &self.generator
    }

    /// Rebuild the index from `documents`: chunk → embed → build → save → swap.
    ///
    /// The new index replaces the current one only after it is fully built
    /// and, if `index_path` is configured, saved. On error neither the
    /// in-memory index nor the persisted file is changed.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyDocumentSet`] if `documents` is empty or no document
    ///   contains any text
    /// - [`RagError::ModelUnavailable`] / [`RagError::DimensionMismatch`] from
    ///   embedding
    /// - [`RagError::Io`] if the index cannot be saved
    pub async fn ingest(&self, documents: &[Document]) -> Result<IngestReport> {
        if documents.is_empty() {
            return Err(RagError::EmptyDocumentSet);
        }
        let _guard = self.index().begin_build().await;

        // 1. Chunk every document
        let mut chunks = Vec::new();
        let mut empty_documents = 0;
        for document in documents {
            let document_chunks = self.chunker.split(document);
            if document_chunks.is_empty() {
                warn!(document.id = %document.id, "document has no text");
                empty_documents += 1;
            }
            chunks.extend(document_chunks);
        }
        if chunks.is_empty() {
            error!(documents = documents.len(), "no text found in any document");
            return Err(RagError::EmptyDocumentSet);
        }
        info!(documents = documents.len(), chunk_count = chunks.len(), "split documents");

        // 2. Embed all chunk texts in batches
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder().embed(&texts).await.map_err(|e| {
            error!(error = %e, "embedding failed during ingestion");
            e
        })?;

        // 3. Build the new index off to the side
        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();
        let index =
            VectorIndex::build(self.embedder().model_id(), self.embedder().dimensions(), entries)?;

        // 4. Persist before publishing
        if let Some(path) = &self.config.index_path {
            index.save(path).await.map_err(|e| {
                error!(path = %path.display(), error = %e, "failed to save index");
                e
            })?;
        }

        let report = IngestReport {
            documents: documents.len(),
            empty_documents,
            chunks: index.len(),
            dimensions: index.dimensions(),
            embedding_model: index.embedding_model().to_string(),
            persisted_to: self.config.index_path.clone(),
        };

        // 5. Publish atomically
        self.index().replace(index).await;
        info!(chunk_count = report.chunks, model = %report.embedding_model, "index rebuilt");
        Ok(report)
    }

    /// Load the persisted index from `index_path` and make it current.
    ///
    /// An index built by a different embedding model is still loaded, but
    /// every question against it fails with
    /// [`RagError::EmbeddingModelMismatch`].
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexNotFound`] if no `index_path` is configured or
    ///   nothing exists there
    /// - [`RagError::IndexCorrupt`] if the file cannot be read back
    pub async fn load_index(&self) -> Result<IndexStatus> {
        let path =
            self.config.index_path.as_ref().ok_or(RagError::IndexNotFound { path: None })?;
        let index = VectorIndex::load(path).await?;
        if index.embedding_model() != self.embedder().model_id() {
            warn!(
                index_model = index.embedding_model(),
                query_model = self.embedder().model_id(),
                "index was built with a different embedding model; questions will be refused"
            );
        }
        info!(path = %path.display(), entries = index.len(), "loaded index");
        self.index().replace(index).await;
        Ok(self.status().await)
    }

    /// Report the current index state.
    pub async fn status(&self) -> IndexStatus {
        let state = self.index().state().await;
        match self.index().snapshot().await {
            Some(index) => IndexStatus {
                state,
                entries: index.len(),
                dimensions: Some(index.dimensions()),
                embedding_model: Some(index.embedding_model().to_string()),
                built_at: Some(index.built_at()),
                compatible: index.embedding_model() == self.embedder().model_id(),
            },
            None => IndexStatus {
                state,
                entries: 0,
                dimensions: None,
                embedding_model: None,
                built_at: None,
                compatible: false,
            },
        }
    }

    /// Retrieve the configured `top_k` passages for `question`.
    ///
    /// # Errors
    ///
    /// See [`Retriever::retrieve`].
    pub async fn retrieve(&self, question: &str) -> Result<RetrievalResult> {
        self.retriever.retrieve(question, self.config.top_k).await
    }

    /// Retrieve passages for `question` and assemble the prompt.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] for a blank question, otherwise see
    /// [`Retriever::retrieve`].
    pub async fn prepare(&self, question: &str) -> Result<PreparedQuery> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidInput("question must not be empty".into()));
        }
        let results = self.retrieve(question).await?;
        let prompt = self.assembler.assemble(question, &results);
        Ok(PreparedQuery { results, prompt })
    }

    /// Answer `question` from the indexed documents.
    ///
    /// If `query_timeout_ms` is configured, an answer that takes longer is
    /// abandoned; only the in-flight work is discarded.
    ///
    /// # Errors
    ///
    /// Any error from [`prepare`](RagPipeline::prepare),
    /// [`RagError::ModelUnavailable`] if generation fails, and
    /// [`RagError::Timeout`].
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        match self.config.query_timeout() {
            Some(limit) => tokio::time::timeout(limit, self.answer_inner(question))
                .await
                .map_err(|_| {
                    warn!(timeout = ?limit, "question timed out");
                    RagError::Timeout(limit)
                })?,
            None => self.answer_inner(question).await,
        }
    }

    async fn answer_inner(&self, question: &str) -> Result<Answer> {
        let PreparedQuery { results, prompt } = self.prepare(question).await?;

        let completion = self.generator.generate(&prompt.text).await.map_err(|e| {
            error!(model = self.generator.model_id(), error = %e, "generation failed");
            match e {
                RagError::ModelUnavailable { .. } => e,
                other => RagError::model_unavailable(self.generator.model_id(), other.to_string()),
            }
        })?;

        let sources = results
            .into_iter()
            .take(prompt.included)
            .map(|r| Source { text: r.chunk.text, source_id: r.chunk.document_id, score: r.score })
            .collect();

        info!(included = prompt.included, dropped = prompt.dropped, "question answered");
        Ok(Answer {
            answer: completion.trim().to_string(),
            sources,
            dropped_chunks: prompt.dropped,
        })
    }

    /// Answer `question`, turning any failure into a `cannot answer: <reason>`
    /// response instead of an error.
    pub async fn answer_or_refusal(&self, question: &str) -> AnswerResponse {
        match self.answer(question).await {
            Ok(answer) => answer.into(),
            Err(e) => AnswerResponse::refusal(&e),
        }
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, `embedding_provider` and `generator` are required. Without an
/// explicit chunker, a [`RecursiveChunker`] is built from the config; without
/// an explicit index handle, a fresh empty one is created.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .generator(Arc::new(generator))
///     .index(shared_handle)  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    generator: Option<Arc<dyn AnswerGenerator>>,
    chunker: Option<Arc<dyn Chunker>>,
    index: Option<IndexHandle>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the answer generator.
    pub fn generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Override the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Share an existing index handle.
    pub fn index(mut self, index: IndexHandle) -> Self {
        self.index = Some(index);
        self
    }

    /// Build the [`RagPipeline`], validating the config and required fields.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any required field is missing or
    /// the config is invalid.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap)?),
        };

        let mut assembler = PromptAssembler::new(config.context_budget_chars());
        if let Some(template) = &config.prompt_template {
            assembler = assembler.with_template(template.clone())?;
        }

        let embedder = Embedder::new(embedding_provider, config.embedding_batch_size);
        let retriever = Retriever::new(embedder, self.index.unwrap_or_default())
            .with_similarity_threshold(config.similarity_threshold);

        Ok(RagPipeline { config, chunker, retriever, assembler, generator })
    }
}
