use crate::unit::{TextUnit, VersionLabel};

/// A unit together with its embedding, as stored in the index.
#[derive(Debug, Clone)]
pub struct EmbeddedUnit {
    pub unit: TextUnit,
    pub embedding: Vec<f32>,
}

/// A retrieved unit and its similarity to the question.
///
/// # Score Range
///
/// Scores are cosine similarities in `-1.0..=1.0`; higher is more similar.
/// Zero-magnitude vectors score `0.0`.
#[derive(Debug, Clone)]
pub struct ScoredUnit {
    pub unit: TextUnit,
    pub score: f32,
}

/// Units returned for one question, most similar first.
///
/// Doubles as the citation list shown next to a generated answer.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub units: Vec<ScoredUnit>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScoredUnit> {
        self.units.iter()
    }

    pub fn contains_version(&self, version: &VersionLabel) -> bool {
        self.units.iter().any(|s| &s.unit.version == version)
    }

    /// Units carrying `version`, in retrieval order.
    pub fn for_version<'a>(&'a self, version: &'a VersionLabel) -> impl Iterator<Item = &'a ScoredUnit> + 'a {
        self.units.iter().filter(move |s| &s.unit.version == version)
    }
}

impl<'a> IntoIterator for &'a RetrievalResult {
    type Item = &'a ScoredUnit;
    type IntoIter = std::slice::Iter<'a, ScoredUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.iter()
    }
}
