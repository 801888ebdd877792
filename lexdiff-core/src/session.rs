//! Caller-held state for one document pair.
//!
//! A [`Session`] owns the collaborators (loader, chunker, embedder,
//! comparator) and the most recently built index. Nothing is global:
//! two sessions never see each other's documents.

use crate::chunker::{ChunkerError, LegalChunker};
use crate::compare::{CompareError, Comparator, Comparison};
use crate::config::Config;
use crate::index::{Embed, Embedder, IndexError, VersionIndex};
use crate::loader::{DocumentSource, FileLoader, LoaderError};
use crate::provider::{OllamaProvider, Provider};
use crate::unit::{TextUnit, VersionLabel};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to load {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: LoaderError,
    },

    #[error("Invalid chunker setup: {0}")]
    Chunker(#[from] ChunkerError),

    #[error("Failed to build index: {0}")]
    Index(#[from] IndexError),
}

pub struct Session {
    config: Config,
    loader: Arc<dyn DocumentSource>,
    chunker: LegalChunker,
    comparator: Comparator,
    embedder: Arc<dyn Embed>,
    index: Option<Arc<VersionIndex>>,
}

impl Session {
    /// Creates a session backed by Ollama and the local filesystem.
    pub fn new(config: Config) -> Result<Self, IngestError> {
        SessionBuilder::new(config).build()
    }

    pub fn builder(config: Config) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    /// Loads, chunks and indexes both documents.
    ///
    /// The previous index is replaced only if every step succeeds. Returns
    /// the number of units indexed.
    pub async fn ingest(&mut self, path_old: impl AsRef<Path>, path_new: impl AsRef<Path>) -> Result<usize, IngestError> {
        let old = VersionLabel::new(self.config.versions.old.clone());
        let new = VersionLabel::new(self.config.versions.new.clone());

        let mut units = self.load_units(path_old.as_ref(), &old).await?;
        let old_count = units.len();
        units.extend(self.load_units(path_new.as_ref(), &new).await?);
        let new_count = units.len() - old_count;

        for (label, count) in [(&old, old_count), (&new, new_count)] {
            if count == 0 {
                warn!(version = %label, "Document produced no units; answers will only cover the other version");
            }
        }

        let index = VersionIndex::build(units, self.embedder.as_ref()).await?;
        let total = index.len();
        self.index = Some(Arc::new(index));

        info!(
            old = old_count,
            new = new_count,
            total,
            "Document pair ingested"
        );
        Ok(total)
    }

    async fn load_units(&self, path: &Path, version: &VersionLabel) -> Result<Vec<TextUnit>, IngestError> {
        let pages = self.loader.load(path).await.map_err(|source| IngestError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), pages = pages.len(), %version, "Pages loaded");
        Ok(self.chunker.chunk_pages(&pages, version))
    }

    /// Answers `question` with the configured `retrieval.top_k`.
    pub async fn compare(&self, question: &str) -> Result<Comparison, CompareError> {
        self.compare_with_k(question, self.config.retrieval.top_k).await
    }

    pub async fn compare_with_k(&self, question: &str, k: usize) -> Result<Comparison, CompareError> {
        let index = self.require_index()?;
        self.comparator.compare(&index, question, k).await
    }

    /// Streams the answer to `on_chunk` while it is generated.
    pub async fn compare_streaming(
        &self,
        question: &str,
        k: usize,
        on_chunk: impl FnMut(&str) + Send,
        cancel: &CancellationToken,
    ) -> Result<Comparison, CompareError> {
        let index = self.require_index()?;
        self.comparator
            .compare_cancellable(&index, question, k, on_chunk, cancel)
            .await
    }

    fn require_index(&self) -> Result<Arc<VersionIndex>, CompareError> {
        self.index
            .clone()
            .ok_or(CompareError::Index(IndexError::Empty))
    }

    /// The index from the last successful ingest, if any.
    pub fn index(&self) -> Option<&Arc<VersionIndex>> {
        self.index.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

}

/// Assembles a [`Session`], defaulting any collaborator not supplied.
pub struct SessionBuilder {
    config: Config,
    provider: Option<Arc<dyn Provider>>,
    embedder: Option<Arc<dyn Embed>>,
    loader: Option<Arc<dyn DocumentSource>>,
}

impl SessionBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            provider: None,
            embedder: None,
            loader: None,
        }
    }

    /// Provider for generation, and for embeddings unless an embedder is set.
    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn Embed>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn loader(mut self, loader: Arc<dyn DocumentSource>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn build(self) -> Result<Session, IngestError> {
        let config = self.config;
        let chunker = LegalChunker::new(config.chunker.clone())?;

        let provider = self
            .provider
            .unwrap_or_else(|| Arc::new(OllamaProvider::new(&config)));
        let embedder = self.embedder.unwrap_or_else(|| {
            Arc::new(Embedder::new(provider.clone(), config.embedding.model.clone()))
        });
        let loader = self.loader.unwrap_or_else(|| Arc::new(FileLoader::new()));
        let comparator = Comparator::new(&config, provider, embedder.clone());

        Ok(Session {
            config,
            loader,
            chunker,
            comparator,
            embedder,
            index: None,
        })
    }
}
