//! Two-tier chunking of legal text.
//!
//! Legal changes are easiest to read at article granularity, so the chunker
//! first splits a document at its article markers and keeps each article
//! whole. Only articles longer than `max_unit_size` fall through to a
//! size-bounded splitter with overlap.
//!
//! # Pipeline
//!
//! 1. **Structural split**: a [`BoundaryStrategy`] reports where articles
//!    begin; the marker stays with the segment that follows it.
//! 2. **Noise filter**: trimmed segments of `min_segment_len` characters or
//!    fewer (stray titles, page headers) are dropped.
//! 3. **Fallback split**: oversized segments are cut into overlapping pieces
//!    of about `fallback_chunk_size` characters.
//!
//! Every emitted [`TextUnit`] carries the caller's version label.

mod boundary;

pub use boundary::{Boundary, BoundaryStrategy, MarkerPattern};

use crate::config::ChunkerConfig;
use crate::loader::Page;
use crate::unit::{TextUnit, VersionLabel};
use std::ops::Range;
use text_splitter::{Characters, ChunkConfig, TextSplitter};
use thiserror::Error;
use tracing::debug;

/// Errors raised while setting up a chunker.
#[derive(Debug, Error)]
pub enum ChunkerError {
    #[error("Invalid chunker configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid article marker pattern {pattern:?}: {message}")]
    Pattern { pattern: String, message: String },
}

pub type Result<T> = std::result::Result<T, ChunkerError>;

/// Splits legal documents into article-aligned, version-tagged units.
pub struct LegalChunker {
    config: ChunkerConfig,
    boundary: Box<dyn BoundaryStrategy>,
    splitter: TextSplitter<Characters>,
}

impl LegalChunker {
    /// Creates a chunker using the marker family named in `config`.
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        let boundary = MarkerPattern::for_family(&config.marker)?;
        Self::with_boundary(config, Box::new(boundary))
    }

    /// Creates a chunker with a caller-supplied boundary strategy.
    ///
    /// `config.marker` is ignored in favor of `boundary`.
    pub fn with_boundary(config: ChunkerConfig, boundary: Box<dyn BoundaryStrategy>) -> Result<Self> {
        if config.fallback_chunk_size == 0 {
            return Err(ChunkerError::InvalidConfig(
                "fallback_chunk_size must be greater than zero".to_string(),
            ));
        }
        if config.fallback_overlap >= config.fallback_chunk_size {
            return Err(ChunkerError::InvalidConfig(format!(
                "fallback_overlap ({}) must be smaller than fallback_chunk_size ({})",
                config.fallback_overlap, config.fallback_chunk_size
            )));
        }
        if config.max_unit_size < config.fallback_chunk_size {
            return Err(ChunkerError::InvalidConfig(format!(
                "max_unit_size ({}) must be at least fallback_chunk_size ({})",
                config.max_unit_size, config.fallback_chunk_size
            )));
        }

        let chunk_config = ChunkConfig::new(config.fallback_chunk_size)
            .with_overlap(config.fallback_overlap)
            .map_err(|e| ChunkerError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            config,
            boundary,
            splitter: TextSplitter::new(chunk_config),
        })
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Splits `text` into units tagged with `version`, in document order.
    ///
    /// Empty or whitespace-only input yields no units.
    pub fn chunk(&self, text: &str, version: &VersionLabel) -> Vec<TextUnit> {
        let mut units = Vec::new();
        let mut dropped = 0usize;
        let mut oversized = 0usize;

        let segments = segment_ranges(text, &self.boundary.boundaries(text));
        let segment_count = segments.len();

        for (range, article_id) in segments {
            let raw = &text[range.clone()];
            let trimmed = raw.trim();
            let start = range.start + (raw.len() - raw.trim_start().len());

            if trimmed.chars().count() <= self.config.min_segment_len {
                if !trimmed.is_empty() {
                    dropped += 1;
                }
                continue;
            }

            if trimmed.chars().count() <= self.config.max_unit_size {
                units.push(TextUnit {
                    content: trimmed.to_string(),
                    version: version.clone(),
                    article_id,
                    part: None,
                    span: start..start + trimmed.len(),
                });
                continue;
            }

            oversized += 1;
            for (part, (offset, piece)) in self.splitter.chunk_indices(trimmed).enumerate() {
                let piece_start = start + offset;
                units.push(TextUnit {
                    content: piece.to_string(),
                    version: version.clone(),
                    article_id: article_id.clone(),
                    part: Some(part),
                    span: piece_start..piece_start + piece.len(),
                });
            }
        }

        debug!(
            version = %version,
            segments = segment_count,
            dropped,
            oversized,
            units = units.len(),
            "Document chunked"
        );

        units
    }

    /// Chunks a loaded document.
    ///
    /// Pages are joined with a newline first, so an article that continues
    /// across a page break stays a single segment. Spans refer to the joined
    /// text.
    pub fn chunk_pages(&self, pages: &[Page], version: &VersionLabel) -> Vec<TextUnit> {
        let text = pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.chunk(&text, version)
    }
}

/// Turns boundary offsets into consecutive segment ranges covering `text`.
///
/// Text before the first boundary becomes its own segment with no article id.
fn segment_ranges(text: &str, boundaries: &[Boundary]) -> Vec<(Range<usize>, Option<String>)> {
    let mut segments = Vec::with_capacity(boundaries.len() + 1);
    let mut start = 0;
    let mut article_id = None;

    for boundary in boundaries {
        if boundary.offset <= start && start != 0 {
            continue;
        }
        if boundary.offset > start {
            segments.push((start..boundary.offset, article_id.take()));
        }
        start = boundary.offset;
        article_id = boundary.article_id.clone();
    }

    if start < text.len() {
        segments.push((start..text.len(), article_id));
    }

    segments
}
