// Answer synthesis
// Builds a grounded prompt from retrieved records and hands it to a generation service

pub mod ollama;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::GenerationConfig;
use crate::retrieval::RetrievalResult;
use crate::{RagError, Result};

pub use ollama::OllamaGenerator;

pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Limits passed with every generation request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

/// An external text generation service
///
/// Implementations report transport, HTTP and decoding failures as
/// [`RagError::GenerationService`] and timeouts as [`RagError::Timeout`]. They
/// do not retry.
pub trait GenerationClient: Send + Sync {
    fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;
}

/// Joins the texts of `results` with a blank line, dropping the farthest
/// results until the context is at most `max_chars` characters long.
///
/// Returns the context and how many results it contains. Records are never
/// cut; when not even the closest record fits the context is empty.
#[inline]
pub fn build_context(results: &[RetrievalResult], max_chars: usize) -> (String, usize) {
    let separator_len = CONTEXT_SEPARATOR.chars().count();
    let lengths: Vec<usize> = results
        .iter()
        .map(|r| r.record.text.chars().count())
        .collect();

    let mut kept = results.len();
    let total = |n: usize| lengths[..n].iter().sum::<usize>() + separator_len * n.saturating_sub(1);
    while kept > 0 && total(kept) > max_chars {
        kept -= 1;
    }

    if kept < results.len() {
        warn!(
            "Context budget of {} characters exceeded, dropped {} of {} results",
            max_chars,
            results.len() - kept,
            results.len()
        );
    }

    let context = results[..kept]
        .iter()
        .map(|r| r.record.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);

    (context, kept)
}

/// The prompt sent to the generation service; `query` is embedded verbatim
#[inline]
pub fn build_prompt(context: &str, query: &str) -> String {
    format!(
        "Answer the following query based on the context:\n\nContext:\n{}\n\nQuery: {}\n\nAnswer:",
        context, query
    )
}

/// A generated answer and how many of the offered results its context held
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synthesis {
    pub text: String,
    /// Leading results that fit the context budget; 0 means the answer is ungrounded
    pub grounded_on: usize,
}

/// Composes context and query into a prompt and forwards it to a [`GenerationClient`]
#[derive(Clone)]
pub struct AnswerSynthesizer {
    client: Arc<dyn GenerationClient>,
    options: GenerationOptions,
    max_context_chars: usize,
}

impl std::fmt::Debug for AnswerSynthesizer {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerSynthesizer")
            .field("options", &self.options)
            .field("max_context_chars", &self.max_context_chars)
            .finish_non_exhaustive()
    }
}

impl AnswerSynthesizer {
    #[inline]
    pub fn new(client: Arc<dyn GenerationClient>, config: &GenerationConfig) -> Self {
        Self {
            client,
            options: GenerationOptions {
                max_tokens: config.max_tokens,
                temperature: config.temperature,
            },
            max_context_chars: config.max_context_chars,
        }
    }

    #[inline]
    pub fn options(&self) -> GenerationOptions {
        self.options
    }

    #[inline]
    pub fn max_context_chars(&self) -> usize {
        self.max_context_chars
    }

    /// Prompt that [`synthesize`](Self::synthesize) would send for these inputs
    #[inline]
    pub fn prompt_for(&self, query: &str, results: &[RetrievalResult]) -> String {
        let (context, _) = build_context(results, self.max_context_chars);
        build_prompt(&context, query)
    }

    /// Generate an answer to `query` grounded in `results`, returned as-is
    #[inline]
    pub fn synthesize(&self, query: &str, results: &[RetrievalResult]) -> Result<String> {
        self.synthesize_detailed(query, results)
            .map(|synthesis| synthesis.text)
    }

    /// Like [`synthesize`](Self::synthesize), also reporting how many results
    /// made it into the context
    #[inline]
    pub fn synthesize_detailed(&self, query: &str, results: &[RetrievalResult]) -> Result<Synthesis> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidQuery("query must not be blank".to_string()));
        }

        let (context, kept) = build_context(results, self.max_context_chars);
        debug!(
            "Built context from {} of {} results ({} chars)",
            kept,
            results.len(),
            context.chars().count()
        );

        let prompt = build_prompt(&context, query);
        let answer = self.client.generate(&prompt, &self.options)?;

        info!("Generated answer ({} chars)", answer.len());
        Ok(Synthesis {
            text: answer,
            grounded_on: kept,
        })
    }
}
