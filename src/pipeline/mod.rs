// Question answering pipeline
// Retrieval followed by synthesis, bounded by one request timeout


use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::retrieval::{RetrievalResult, Retriever};
use crate::synthesis::AnswerSynthesizer;
use crate::{RagError, Result};

/// A generated answer together with the records it was grounded on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub query: String,
    pub text: String,
    pub results: Vec<RetrievalResult>,
    /// How many of `results` fit the context budget and reached the model
    pub grounded_on: usize,
}

/// Async entry point composing [`Retriever`] and [`AnswerSynthesizer`]
///
/// Both stages block on network calls, so they run on tokio's blocking pool.
/// The whole request is bounded by `request_timeout`; exceeding it yields
/// [`RagError::Timeout`] with stage `"request"`.
#[derive(Debug, Clone)]
pub struct Pipeline {
    retriever: Arc<Retriever>,
    synthesizer: AnswerSynthesizer,
    default_k: usize,
    request_timeout: Duration,
}

impl Pipeline {
    #[inline]
    pub fn new(retriever: Arc<Retriever>, synthesizer: AnswerSynthesizer, config: &Config) -> Self {
        Self {
            retriever,
            synthesizer,
            default_k: config.retrieval.top_k,
            request_timeout: Duration::from_secs(config.generation.request_timeout_secs),
        }
    }

    #[inline]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[inline]
    pub fn retriever(&self) -> &Arc<Retriever> {
        &self.retriever
    }

    #[inline]
    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// Retrieve records for `query`; `k` falls back to the configured default
    #[inline]
    pub async fn retrieve(&self, query: &str, k: Option<usize>) -> Result<Vec<RetrievalResult>> {
        let retriever = Arc::clone(&self.retriever);
        let query = query.to_string();
        let k = k.unwrap_or(self.default_k);

        run_bounded(self.request_timeout, move || retriever.retrieve(&query, k)).await
    }

    /// Retrieve, then generate an answer grounded in the retrieved records
    #[inline]
    pub async fn answer(&self, query: &str, k: Option<usize>) -> Result<Answer> {
        let retriever = Arc::clone(&self.retriever);
        let synthesizer = self.synthesizer.clone();
        let query = query.to_string();
        let k = k.unwrap_or(self.default_k);

        info!("Answering query with k={}", k);
        run_bounded(self.request_timeout, move || {
            let results = retriever.retrieve(&query, k)?;
            debug!("Synthesizing from {} results", results.len());
            let synthesis = synthesizer.synthesize_detailed(&query, &results)?;
            Ok(Answer {
                query,
                text: synthesis.text,
                results,
                grounded_on: synthesis.grounded_on,
            })
        })
        .await
    }
}

async fn run_bounded<T, F>(timeout: Duration, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(work)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(RagError::Other(anyhow::anyhow!(
            "Request task failed: {}",
            join_error
        ))),
        Err(_) => {
            warn!("Request exceeded {:?}", timeout);
            Err(RagError::Timeout { stage: "request" })
        }
    }
}
