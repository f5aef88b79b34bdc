//! Error types for the `docqa-rag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in retrieval and answering operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// The embedding or generation model failed to load or respond.
    #[error("Model unavailable ({model}): {message}")]
    ModelUnavailable {
        /// Identifier of the model that failed.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// An embedding did not have the dimension the index expects.
    #[error("Dimension mismatch: expected {expected}, got {actual} ({context})")]
    DimensionMismatch {
        /// The index (or model) dimension.
        expected: usize,
        /// The offending embedding's dimension.
        actual: usize,
        /// Where the mismatch was detected.
        context: String,
    },

    /// No index has been built or persisted yet.
    #[error("Index not found{}", location(.path))]
    IndexNotFound {
        /// Location that was expected to hold the index; `None` for an
        /// index that was never built in memory.
        path: Option<PathBuf>,
    },

    /// A persisted index exists but cannot be read back.
    #[error("Index at {} is corrupt: {message}", .path.display())]
    IndexCorrupt {
        /// Location of the unreadable index.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// The index was built with a different embedding model than the one
    /// used to embed queries.
    #[error(
        "Embedding model mismatch: index was built with '{index_model}', query embedder is '{query_model}'"
    )]
    EmbeddingModelMismatch {
        /// Model recorded in the index.
        index_model: String,
        /// Model of the current embedder.
        query_model: String,
    },

    /// Ingestion was invoked with no documents.
    #[error("No documents to ingest")]
    EmptyDocumentSet,

    /// A caller-supplied argument is out of range.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The query did not finish within the configured timeout.
    #[error("Query timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A filesystem error outside of index loading.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RagError {
    /// Shorthand for a [`RagError::ModelUnavailable`].
    pub fn model_unavailable(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelUnavailable { model: model.into(), message: message.into() }
    }

    /// Stable, machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModelUnavailable { .. } => "model_unavailable",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::IndexNotFound { .. } => "index_not_found",
            Self::IndexCorrupt { .. } => "index_corrupt",
            Self::EmbeddingModelMismatch { .. } => "embedding_model_mismatch",
            Self::EmptyDocumentSet => "empty_document_set",
            Self::InvalidInput(_) => "invalid_input",
            Self::ConfigError(_) => "config_error",
            Self::Timeout(_) => "timeout",
            Self::Io(_) => "io",
        }
    }
}

fn location(path: &Option<PathBuf>) -> String {
    path.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default()
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
