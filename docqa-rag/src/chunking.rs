//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! cuts text into overlapping character windows, preferring to end a window on
//! a paragraph, line, sentence or word boundary before falling back to a hard
//! character cut.
//!
//! All sizes are measured in characters, not bytes, so multi-byte scripts are
//! never split inside a code point.

use tracing::debug;

use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// Break points in order of preference.
const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", "। ", " "];

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks, in document order.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn split(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits text into windows of at most `chunk_size` characters, consecutive
/// windows sharing exactly `chunk_overlap` characters.
///
/// Chunk IDs are generated as `{document_id}_{ordinal}`. Each chunk inherits
/// the parent document's metadata plus a `chunk_index` field.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(500, 50)?;
/// let chunks = chunker.split(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_string()).collect(),
        })
    }

    /// Replace the break-point preference list. An empty list means every
    /// window ends on a hard character cut.
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators =
            separators.into_iter().map(Into::into).filter(|s: &String| !s.is_empty()).collect();
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Compute `(start, end)` character spans of every window.
    ///
    /// `bounds[c]` is the byte offset of character `c`; its last element is
    /// `text.len()`.
    fn spans(&self, text: &str, bounds: &[usize]) -> Vec<(usize, usize)> {
        let char_count = bounds.len() - 1;

        let mut spans = Vec::new();
        let mut start = 0;
        while char_count - start > self.chunk_size {
            let end = self.find_break(text, bounds, start, start + self.chunk_size);
            spans.push((start, end));
            start = end - self.chunk_overlap;
        }
        if char_count > 0 {
            spans.push((start, char_count));
        }
        spans
    }

    /// Find where the window starting at `start` should end, at most `hard_end`.
    ///
    /// A break is accepted only past `start + chunk_overlap` so the next window
    /// always starts after this one.
    fn find_break(&self, text: &str, bounds: &[usize], start: usize, hard_end: usize) -> usize {
        let window_start = bounds[start];
        let window = &text[window_start..bounds[hard_end]];
        let min_end = start + self.chunk_overlap;

        for separator in &self.separators {
            let Some(pos) = window.rfind(separator.as_str()) else {
                continue;
            };
            let byte_end = window_start + pos + separator.len();
            if let Ok(end) = bounds.binary_search(&byte_end) {
                if end > min_end {
                    return end;
                }
            }
        }
        hard_end
    }
}

impl Chunker for RecursiveChunker {
    fn split(&self, document: &Document) -> Vec<Chunk> {
        if document.text.is_empty() {
            debug!(document.id = %document.id, "skipping empty document");
            return Vec::new();
        }

        let text = &document.text;
        let bounds: Vec<usize> =
            text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();

        let chunks: Vec<Chunk> = self
            .spans(text, &bounds)
            .into_iter()
            .enumerate()
            .map(|(ordinal, (start, end))| {
                let mut metadata = document.metadata.clone();
                metadata.insert("chunk_index".to_string(), ordinal.to_string());
                Chunk {
                    id: format!("{}_{ordinal}", document.id),
                    text: text[bounds[start]..bounds[end]].to_string(),
                    document_id: document.id.clone(),
                    ordinal,
                    start,
                    metadata,
                }
            })
            .collect();

        debug!(document.id = %document.id, chunk_count = chunks.len(), "split document");
        chunks
    }
}

/// Rebuild a document's text from its chunks by dropping each chunk's overlap
/// with its predecessor.
///
/// `chunks` must be the output of a single [`Chunker::split`] call, in order.
pub fn reconstruct(chunks: &[Chunk]) -> String {
    let mut text = String::new();
    let mut covered = 0usize;
    for chunk in chunks {
        let skip = covered.saturating_sub(chunk.start);
        text.extend(chunk.text.chars().skip(skip));
        covered = covered.max(chunk.start + chunk.char_len());
    }
    text
}
