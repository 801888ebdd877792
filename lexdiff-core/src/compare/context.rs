use crate::index::RetrievalResult;
use std::fmt;

/// Retrieved units flattened into one version-labeled block for the prompt.
///
/// Rebuilt for every question and never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparisonContext(String);

impl ComparisonContext {
    /// Formats each unit as `[<label>]\nContent: <content>\n\n`, in retrieval order.
    pub fn from_result(result: &RetrievalResult) -> Self {
        let mut context = String::new();
        for scored in result {
            context.push_str(&format!(
                "[{}]\nContent: {}\n\n",
                scored.unit.version, scored.unit.content
            ));
        }
        Self(context)
    }

    pub fn from_raw(context: impl Into<String>) -> Self {
        Self(context.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ComparisonContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::ScoredUnit;
    use crate::unit::{TextUnit, VersionLabel};

    #[test]
    fn test_labeled_blocks_in_retrieval_order() {
        let result = RetrievalResult {
            units: vec![
                ScoredUnit {
                    unit: TextUnit::new("Article 2. Cards carry a chip.", VersionLabel::NEW),
                    score: 0.9,
                },
                ScoredUnit {
                    unit: TextUnit::new("Article 2. Cards carry a barcode.", VersionLabel::OLD),
                    score: 0.8,
                },
            ],
        };

        let context = ComparisonContext::from_result(&result);
        assert_eq!(
            context.as_str(),
            "[NEW]\nContent: Article 2. Cards carry a chip.\n\n\
             [OLD]\nContent: Article 2. Cards carry a barcode.\n\n"
        );
    }

    #[test]
    fn test_empty_result_gives_empty_context() {
        assert!(ComparisonContext::from_result(&RetrievalResult::default()).is_empty());
    }
}
