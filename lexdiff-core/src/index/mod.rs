//! Version-tagged, in-memory vector index.
//!
//! The index is built once per document pair and is immutable afterwards:
//! there is no insert, update or delete. [`VersionIndex::build`] consumes the
//! units and only returns once every one of them is embedded, so a partially
//! built index can never be queried. A finished index is plain data and can
//! be shared behind an `Arc` for concurrent, lock-free queries.
//!
//! # How It Works
//!
//! 1. **Build**: each unit's content is embedded and stored with its version
//!    label, in insertion order.
//! 2. **Query**: the question is embedded with the same [`Embed`]
//!    implementation and every stored unit is scored by cosine similarity.
//! 3. **Select**: a [`RetrievalPolicy`] picks up to `k` units, which are
//!    returned most similar first. Ties keep insertion order.

mod embedder;
mod types;

pub use embedder::{Embed, Embedder, EmbedderError};
pub use types::{EmbeddedUnit, RetrievalResult, ScoredUnit};

use crate::unit::{TextUnit, VersionLabel};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Why an index build was rejected.
#[derive(Debug, Error)]
pub enum BuildFailure {
    #[error("no units to index")]
    NoUnits,

    #[error("embedding unit {position} failed: {source}")]
    Embedding {
        position: usize,
        #[source]
        source: EmbedderError,
    },

    #[error("unit {position} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        position: usize,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Index build failed: {0}")]
    Build(#[from] BuildFailure),

    #[error("Index is empty")]
    Empty,

    #[error("Failed to embed question: {0}")]
    QueryEmbedding(#[source] EmbedderError),

    #[error("Question embedding has dimension {found}, index expects {expected}")]
    QueryDimension { expected: usize, found: usize },
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// How the `k` retrieved units are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalPolicy {
    /// Global top-k by similarity. A lopsided document pair can return units
    /// from only one version.
    #[default]
    TopK,
    /// Each version label first gets `k / label_count` of its own best
    /// units; the remaining slots go to the best of the rest.
    Balanced,
}

/// Immutable similarity index over version-tagged units.
#[derive(Debug, Clone, Default)]
pub struct VersionIndex {
    entries: Vec<EmbeddedUnit>,
    dimension: usize,
}

impl VersionIndex {
    /// Embeds and stores every unit.
    ///
    /// All-or-nothing: an empty input, any embedding failure, or
    /// inconsistent dimensions reject the whole build.
    pub async fn build(units: Vec<TextUnit>, embedder: &dyn Embed) -> Result<Self> {
        if units.is_empty() {
            return Err(BuildFailure::NoUnits.into());
        }

        let mut entries = Vec::with_capacity(units.len());
        let mut dimension = 0;

        for (position, unit) in units.into_iter().enumerate() {
            let embedding = embedder
                .embed(&unit.content)
                .await
                .map_err(|source| BuildFailure::Embedding { position, source })?;

            if position == 0 {
                dimension = embedding.len();
            } else if embedding.len() != dimension {
                return Err(BuildFailure::DimensionMismatch {
                    position,
                    expected: dimension,
                    found: embedding.len(),
                }
                .into());
            }

            entries.push(EmbeddedUnit { unit, embedding });
        }

        info!(units = entries.len(), dimension, "Version index built");
        Ok(Self { entries, dimension })
    }

    /// Returns the `k` stored units most similar to `question`.
    pub async fn query(&self, question: &str, embedder: &dyn Embed, k: usize) -> Result<RetrievalResult> {
        self.query_with_policy(question, embedder, k, RetrievalPolicy::TopK).await
    }

    /// Like [`query`](Self::query), with an explicit selection policy.
    ///
    /// Returns every stored unit, without error, when fewer than `k` exist.
    pub async fn query_with_policy(
        &self,
        question: &str,
        embedder: &dyn Embed,
        k: usize,
        policy: RetrievalPolicy,
    ) -> Result<RetrievalResult> {
        if self.entries.is_empty() {
            return Err(IndexError::Empty);
        }

        let query_embedding = embedder
            .embed(question)
            .await
            .map_err(IndexError::QueryEmbedding)?;
        if query_embedding.len() != self.dimension {
            return Err(IndexError::QueryDimension {
                expected: self.dimension,
                found: query_embedding.len(),
            });
        }

        let result = self.rank(&query_embedding, k, policy);
        debug!(k, ?policy, returned = result.len(), "Retrieved units");
        Ok(result)
    }

    /// Scores every entry against `query_embedding` and selects up to `k`.
    pub fn rank(&self, query_embedding: &[f32], k: usize, policy: RetrievalPolicy) -> RetrievalResult {
        let mut ranked: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(query_embedding, &entry.embedding)))
            .collect();

        // Stable sort: equal scores keep insertion order.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let selected: Vec<(usize, f32)> = match policy {
            RetrievalPolicy::TopK => ranked.into_iter().take(k).collect(),
            RetrievalPolicy::Balanced => self.select_balanced(ranked, k),
        };

        RetrievalResult {
            units: selected
                .into_iter()
                .map(|(i, score)| ScoredUnit {
                    unit: self.entries[i].unit.clone(),
                    score,
                })
                .collect(),
        }
    }

    fn select_balanced(&self, ranked: Vec<(usize, f32)>, k: usize) -> Vec<(usize, f32)> {
        let labels = self.versions();
        let quota = if labels.is_empty() { 0 } else { k / labels.len() };
        let mut picked = vec![false; ranked.len()];
        let mut taken = 0;

        for label in &labels {
            let mut per_label = 0;
            for (slot, (i, _)) in ranked.iter().enumerate() {
                if per_label == quota {
                    break;
                }
                if &self.entries[*i].unit.version == label {
                    picked[slot] = true;
                    per_label += 1;
                    taken += 1;
                }
            }
        }

        for flag in picked.iter_mut() {
            if taken >= k {
                break;
            }
            if !*flag {
                *flag = true;
                taken += 1;
            }
        }

        ranked
            .into_iter()
            .zip(picked)
            .filter_map(|(entry, keep)| keep.then_some(entry))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Length of every stored embedding; `0` for an empty index.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Stored units in insertion order.
    pub fn units(&self) -> impl Iterator<Item = &TextUnit> {
        self.entries.iter().map(|e| &e.unit)
    }

    /// Distinct version labels in order of first insertion.
    pub fn versions(&self) -> Vec<VersionLabel> {
        let mut labels: Vec<VersionLabel> = Vec::new();
        for entry in &self.entries {
            if !labels.contains(&entry.unit.version) {
                labels.push(entry.unit.version.clone());
            }
        }
        labels
    }

    /// Number of stored units per version label, in order of first insertion.
    pub fn count_by_version(&self) -> Vec<(VersionLabel, usize)> {
        self.versions()
            .into_iter()
            .map(|label| {
                let count = self.entries.iter().filter(|e| e.unit.version == label).count();
                (label, count)
            })
            .collect()
    }
}

/// Computes cosine similarity between two vectors.
///
/// Returns values from -1.0 (opposite) to 1.0 (identical), with 0.0 indicating
/// orthogonal vectors. Returns 0.0 for mismatched lengths or zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}
