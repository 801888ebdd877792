//! Context assembly and version comparison.
//!
//! A [`Comparator`] turns one question into one model call:
//!
//! ```text
//! question → index query → ComparisonContext → PromptContract::render
//!          → provider chat (streamed, timeout-bounded, cancellable)
//!          → Comparison { answer, citations }
//! ```
//!
//! The retrieved units travel with the answer so callers can show the
//! supporting excerpts. If generation fails they travel with the error
//! instead, so citations stay available even without an answer.

mod context;
mod prompt;

pub use context::ComparisonContext;
pub use prompt::{Instruction, PromptContract, CONTRACT_VERSION, DEFAULT_SENTINEL};

use crate::config::Config;
use crate::index::{Embed, IndexError, RetrievalPolicy, RetrievalResult, VersionIndex};
use crate::provider::{ChatRequest, ChatResponse, Message, Provider, ProviderError};
use crate::unit::VersionLabel;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum CompareError {
    #[error("Retrieval failed: {0}")]
    Index(#[from] IndexError),

    /// The model call failed after retrieval succeeded.
    #[error("Generation failed: {source}")]
    Generation {
        citations: RetrievalResult,
        #[source]
        source: ProviderError,
    },
}

impl CompareError {
    /// Units retrieved before the failure, if retrieval got that far.
    pub fn citations(&self) -> Option<&RetrievalResult> {
        match self {
            CompareError::Index(_) => None,
            CompareError::Generation { citations, .. } => Some(citations),
        }
    }
}

pub type Result<T> = std::result::Result<T, CompareError>;

/// A generated answer and the units it was grounded on.
#[derive(Debug, Clone)]
pub struct Comparison {
    /// Raw model output, unmodified
    pub answer: String,
    pub citations: RetrievalResult,
}

/// Answers comparison questions against a built [`VersionIndex`].
#[derive(Clone)]
pub struct Comparator {
    provider: Arc<dyn Provider>,
    embedder: Arc<dyn Embed>,
    model: String,
    temperature: f64,
    contract: PromptContract,
    policy: RetrievalPolicy,
    old: VersionLabel,
    new: VersionLabel,
    timeout: Duration,
}

impl Comparator {
    pub fn new(config: &Config, provider: Arc<dyn Provider>, embedder: Arc<dyn Embed>) -> Self {
        Self {
            provider,
            embedder,
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            contract: config.prompt.clone(),
            policy: config.retrieval.policy,
            old: VersionLabel::new(config.versions.old.clone()),
            new: VersionLabel::new(config.versions.new.clone()),
            timeout: Duration::from_secs(config.provider.request_timeout_secs),
        }
    }

    pub fn with_policy(mut self, policy: RetrievalPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Retrieves `k` units for `question` and asks the model to compare them.
    pub async fn compare(&self, index: &VersionIndex, question: &str, k: usize) -> Result<Comparison> {
        self.compare_streaming(index, question, k, |_| {}).await
    }

    /// Like [`compare`](Self::compare), forwarding each streamed chunk of the
    /// answer to `on_chunk` as it arrives.
    pub async fn compare_streaming(
        &self,
        index: &VersionIndex,
        question: &str,
        k: usize,
        on_chunk: impl FnMut(&str) + Send,
    ) -> Result<Comparison> {
        let never = CancellationToken::new();
        self.compare_cancellable(index, question, k, on_chunk, &never).await
    }

    /// Full form of [`compare`](Self::compare): streamed, and abandoned with
    /// [`ProviderError::Cancelled`] as soon as `cancel` fires.
    pub async fn compare_cancellable(
        &self,
        index: &VersionIndex,
        question: &str,
        k: usize,
        mut on_chunk: impl FnMut(&str) + Send,
        cancel: &CancellationToken,
    ) -> Result<Comparison> {
        let citations = index
            .query_with_policy(question, self.embedder.as_ref(), k, self.policy)
            .await?;

        if citations.is_empty() {
            debug!("No units retrieved, answering with the sentinel");
            on_chunk(self.contract.sentinel.as_str());
            return Ok(Comparison {
                answer: self.contract.sentinel.clone(),
                citations,
            });
        }

        let context = ComparisonContext::from_result(&citations);
        let prompt = self.contract.render(question, &context, &self.old, &self.new);
        debug!(
            units = citations.len(),
            old = citations.for_version(&self.old).count(),
            new = citations.for_version(&self.new).count(),
            prompt_len = prompt.len(),
            "Comparison prompt assembled"
        );

        match self.generate(prompt, &mut on_chunk, cancel).await {
            Ok(answer) => {
                info!(answer_len = answer.len(), "Comparison generated");
                Ok(Comparison { answer, citations })
            }
            Err(source) => {
                warn!(error = %source, "Generation failed; returning citations only");
                Err(CompareError::Generation { citations, source })
            }
        }
    }

    async fn generate(
        &self,
        prompt: String,
        on_chunk: &mut (dyn FnMut(&str) + Send),
        cancel: &CancellationToken,
    ) -> std::result::Result<String, ProviderError> {
        let request = ChatRequest::new(&self.model, vec![Message::user(prompt)])
            .with_temperature(self.temperature);

        let mut answer = String::new();
        let outcome = {
            let chat = self.provider.chat(
                request,
                Box::new(|chunk: ChatResponse| {
                    on_chunk(chunk.content.as_str());
                    answer.push_str(&chunk.content);
                }),
            );

            tokio::select! {
                _ = cancel.cancelled() => Err(ProviderError::Cancelled),
                result = tokio::time::timeout(self.timeout, chat) => match result {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(self.timeout.as_secs())),
                },
            }
        };

        outcome.map(|()| answer)
    }
}
