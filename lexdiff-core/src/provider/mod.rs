//! LLM provider abstraction layer.
//!
//! This module defines a common interface for LLM backends that provide
//! streaming chat completions and embeddings. The comparison pipeline only
//! talks to these traits, so tests can swap in deterministic stubs.

mod types;
pub mod ollama;

// Re-export common types
pub use types::{
    ChatRequest,
    ChatResponse,
    EmbedRequest,
    EmbedResponse,
    Message,
    ModelInfo,
    Provider,
    ProviderError,
    Result,
};

// Re-export provider implementations
pub use ollama::OllamaProvider;
