//! Structural boundary detection for legal text.

use super::{ChunkerError, Result};
use crate::config::MarkerFamily;
use regex::Regex;
use std::fmt;

/// Start of a top-level article within a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    /// Byte offset of the marker; the marker belongs to the segment it starts
    pub offset: usize,
    pub article_id: Option<String>,
}

/// Finds where top-level articles begin.
///
/// Implementations must return boundaries in ascending offset order.
pub trait BoundaryStrategy: Send + Sync + fmt::Debug {
    fn boundaries(&self, text: &str) -> Vec<Boundary>;
}

/// Regex-based marker detection ("Article 12", "Điều 12", ...).
///
/// The first capture group, when present, is taken as the article id. The
/// built-in families only match a marker at the start of a line, so inline
/// cross-references ("as provided in Article 5") never open a new article.
#[derive(Debug, Clone)]
pub struct MarkerPattern {
    regex: Regex,
}

impl MarkerPattern {
    pub const ENGLISH: &'static str = r"(?m)^[ \t]*Article\s+(\d+)";
    pub const VIETNAMESE: &'static str = r"(?m)^[ \t]*Điều\s+(\d+)";

    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| ChunkerError::Pattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { regex })
    }

    pub fn for_family(family: &MarkerFamily) -> Result<Self> {
        match family {
            MarkerFamily::English => Self::new(Self::ENGLISH),
            MarkerFamily::Vietnamese => Self::new(Self::VIETNAMESE),
            MarkerFamily::Custom { pattern } => Self::new(pattern),
        }
    }

}

impl BoundaryStrategy for MarkerPattern {
    fn boundaries(&self, text: &str) -> Vec<Boundary> {
        self.regex
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                // Zero-width matches from custom patterns would split nowhere useful.
                if whole.is_empty() {
                    return None;
                }
                Some(Boundary {
                    offset: whole.start(),
                    article_id: caps.get(1).map(|m| m.as_str().to_string()),
                })
            })
            .collect()
    }
}

impl fmt::Display for MarkerPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.regex.as_str())
    }
}
