//! Version-tagged text units, the currency of the whole pipeline.

use std::borrow::Cow;
use std::fmt;
use std::ops::Range;

/// Tag distinguishing the two documents of a comparison pair.
///
/// `OLD` and `NEW` are the well-known labels; any other string is accepted so
/// callers can use localized or document-specific tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionLabel(Cow<'static, str>);

impl VersionLabel {
    pub const OLD: Self = Self(Cow::Borrowed("OLD"));
    pub const NEW: Self = Self(Cow::Borrowed("NEW"));

    pub fn new(label: impl Into<String>) -> Self {
        Self(Cow::Owned(label.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionLabel {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for VersionLabel {
    fn from(label: String) -> Self {
        Self::new(label)
    }
}

/// A contiguous span of source text plus the metadata attached at ingestion.
///
/// Units are created once by the chunker and never mutated; the version label
/// in particular is fixed for the unit's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    /// Trimmed, non-empty text
    pub content: String,
    pub version: VersionLabel,
    /// Numeral of the article marker this unit was split on, if any
    pub article_id: Option<String>,
    /// Index of this piece when an oversized article was sub-split
    pub part: Option<usize>,
    /// Byte range of `content` within the chunked document text
    pub span: Range<usize>,
}

impl TextUnit {
    pub fn new(content: impl Into<String>, version: impl Into<VersionLabel>) -> Self {
        let content = content.into();
        let len = content.len();
        Self {
            content,
            version: version.into(),
            article_id: None,
            part: None,
            span: 0..len,
        }
    }

    pub fn with_article(mut self, article_id: impl Into<String>) -> Self {
        self.article_id = Some(article_id.into());
        self
    }

    /// Number of characters in the unit's content.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_labels() {
        assert_eq!(VersionLabel::OLD.as_str(), "OLD");
        assert_eq!(VersionLabel::NEW.to_string(), "NEW");
        assert_eq!(VersionLabel::from("OLD"), VersionLabel::OLD);
    }

    #[test]
    fn test_char_len_counts_characters() {
        let unit = TextUnit::new("Điều 1", VersionLabel::OLD);
        assert_eq!(unit.char_len(), 6);
        assert_eq!(unit.span, 0..unit.content.len());
    }
}
