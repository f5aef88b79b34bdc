//! Prompt assembly: merge retrieved passages and the question into one prompt.

use serde::Serialize;
use tracing::{debug, warn};

use crate::document::SearchResult;
use crate::error::{RagError, Result};

pub const CONTEXT_PLACEHOLDER: &str = "{context}";
pub const QUESTION_PLACEHOLDER: &str = "{question}";

/// Placed between passages in the context block.
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

/// Context text used when no passage was retrieved.
pub const NO_CONTEXT: &str = "(no context available)";

/// Instructs the model to answer only from the supplied context.
pub const DEFAULT_TEMPLATE: &str = "\
Use the following pieces of context to answer the question at the end.
If you don't know the answer, just say that you don't know, don't try to make up an answer.
Answer in the language the question asks for.

Context: {context}

Question: {question}

Answer:";

/// An assembled prompt and how much retrieved context made it in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    /// The full prompt text.
    pub text: String,
    /// Number of leading passages included in the context.
    pub included: usize,
    /// Number of lowest-ranked passages dropped to meet the context budget.
    pub dropped: usize,
}

/// Builds prompts from a fixed template and a context budget.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    template: String,
    max_context_chars: usize,
}

impl PromptAssembler {
    /// Use the default template with a context budget of `max_context_chars`.
    pub fn new(max_context_chars: usize) -> Self {
        Self { template: DEFAULT_TEMPLATE.to_string(), max_context_chars }
    }

    /// Use a custom template.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the template lacks `{context}` or
    /// `{question}`.
    pub fn with_template(mut self, template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
            if !template.contains(placeholder) {
                return Err(RagError::ConfigError(format!(
                    "prompt template must contain {placeholder}"
                )));
            }
        }
        self.template = template;
        Ok(self)
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Assemble a prompt for `question` from `results`, best passage first.
    ///
    /// If the joined passages exceed the context budget, passages are removed
    /// from the end (lowest ranked) until the rest fit. The number removed is
    /// reported in [`Prompt::dropped`].
    pub fn assemble(&self, question: &str, results: &[SearchResult]) -> Prompt {
        let delimiter_len = CONTEXT_DELIMITER.chars().count();
        let mut included = 0;
        let mut context_len = 0;
        for result in results {
            let separator = if included == 0 { 0 } else { delimiter_len };
            let next_len = context_len + separator + result.chunk.char_len();
            if next_len > self.max_context_chars {
                break;
            }
            context_len = next_len;
            included += 1;
        }
        let dropped = results.len() - included;
        if dropped > 0 {
            warn!(
                included,
                dropped,
                budget = self.max_context_chars,
                "context budget exceeded; dropped lowest-ranked passages"
            );
        }

        let context = if included == 0 {
            NO_CONTEXT.to_string()
        } else {
            results[..included]
                .iter()
                .map(|r| r.chunk.text.as_str())
                .collect::<Vec<_>>()
                .join(CONTEXT_DELIMITER)
        };

        let text = render(&self.template, &context, question);
        debug!(included, prompt_chars = text.chars().count(), "assembled prompt");
        Prompt { text, included, dropped }
    }
}

/// Substitute both placeholders in a single pass, so placeholder-like text
/// inside the context or question is left alone.
fn render(template: &str, context: &str, question: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + question.len());
    let mut rest = template;
    loop {
        let next_context = rest.find(CONTEXT_PLACEHOLDER);
        let next_question = rest.find(QUESTION_PLACEHOLDER);
        let (pos, placeholder, value) = match (next_context, next_question) {
            (Some(c), Some(q)) if c < q => (c, CONTEXT_PLACEHOLDER, context),
            (_, Some(q)) => (q, QUESTION_PLACEHOLDER, question),
            (Some(c), None) => (c, CONTEXT_PLACEHOLDER, context),
            (None, None) => break,
        };
        out.push_str(&rest[..pos]);
        out.push_str(value);
        rest = &rest[pos + placeholder.len()..];
    }
    out.push_str(rest);
    out
}
