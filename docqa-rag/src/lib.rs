//! Retrieval core for answering questions over a local document collection.
//!
//! This crate provides:
//! - Overlapping, separator-aware document chunking
//! - Batched, normalized embedding on top of pluggable providers
//! - An exact cosine-similarity vector index with JSON persistence
//! - Atomic index replacement under concurrent readers
//! - Prompt assembly within a context budget
//! - A [`RagPipeline`] that ties ingestion and answering together
//!
//! Enable the `openai` feature for HTTP backends that speak the
//! OpenAI-compatible embeddings and completions APIs.

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod handle;
pub mod hashing;
pub mod index;
mod persist;
pub mod pipeline;
pub mod prompt;
pub mod retriever;

#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{Chunker, RecursiveChunker, reconstruct};
pub use config::{DEFAULT_EMBEDDING_MODEL, GenerationParams, RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, IndexEntry, RetrievalResult, SearchResult};
pub use embedding::{Embedder, EmbeddingProvider};
pub use error::{RagError, Result};
pub use generation::AnswerGenerator;
pub use handle::{BuildGuard, IndexHandle, IndexState};
pub use hashing::HashingEmbeddingProvider;
pub use index::VectorIndex;
pub use persist::INDEX_FORMAT_VERSION;
pub use pipeline::{
    Answer, AnswerResponse, IndexStatus, IngestReport, PreparedQuery, RagPipeline,
    RagPipelineBuilder, Source,
};
pub use prompt::{Prompt, PromptAssembler};
pub use retriever::Retriever;
