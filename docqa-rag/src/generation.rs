//! Answer generator trait for the language model that turns a prompt into an
//! answer.

use async_trait::async_trait;

use crate::error::Result;

/// A text-in/text-out language model.
///
/// Implementations are treated as pure functions of the prompt, modulo
/// sampling randomness. Generation parameters are fixed when the
/// implementation is constructed.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::AnswerGenerator;
///
/// let completion = generator.generate("Context: ...\n\nQuestion: ...\n\nAnswer:").await?;
/// ```
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Produce a completion for `prompt`.
    ///
    /// Implementations should report an unreachable or failing model as
    /// [`RagError::ModelUnavailable`](crate::RagError::ModelUnavailable).
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Return the identifier of the underlying model.
    fn model_id(&self) -> &str;
}
