//! lexdiff-core - Version comparison for legal documents
//!
//! Provides the pieces for asking what changed between two versions of a
//! legal document:
//! - Document loading (PDF, DOCX)
//! - Article-aligned chunking with a length-based fallback
//! - A version-tagged similarity index
//! - Prompt assembly and streamed comparison through a local LLM (Ollama)
//!
//! ## Primary API
//!
//! Most callers drive everything through a [`Session`]: `ingest` a document
//! pair, then `compare` as many questions as needed.

pub mod chunker;
pub mod compare;
pub mod config;
pub mod index;
pub mod loader;
pub mod provider;
pub mod session;
pub mod unit;

pub use chunker::{ChunkerError, LegalChunker};
pub use compare::{CompareError, Comparator, Comparison, PromptContract};
pub use config::Config;
pub use index::{IndexError, RetrievalPolicy, RetrievalResult, VersionIndex};
pub use loader::{DocumentSource, FileLoader, LoaderError, Page};
pub use session::{IngestError, Session, SessionBuilder};
pub use unit::{TextUnit, VersionLabel};

// Provider exports
pub use provider::{ChatRequest, ChatResponse, Message, OllamaProvider, Provider, ProviderError};
