//! The instruction contract given to the generative model.
//!
//! Behavior is configured through flags rather than free text, so tests can
//! assert which instructions a prompt carries without pinning exact wording.

use super::context::ComparisonContext;
use crate::unit::VersionLabel;
use serde::{Deserialize, Serialize};

/// Current revision of the instruction wording.
pub const CONTRACT_VERSION: u32 = 1;

/// Default phrase the model must emit when the excerpts say nothing relevant.
pub const DEFAULT_SENTINEL: &str = "no change information found";

/// Versioned set of behavioral constraints for the comparison prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptContract {
    pub version: u32,
    /// Answer only from the supplied excerpts
    pub answer_only_from_context: bool,
    /// Summarize what each version says, by label
    pub must_cite_versions: bool,
    /// Reply with exactly `sentinel` when the excerpts are insufficient
    pub sentinel_on_missing_info: bool,
    /// No notes, conclusions or commentary beyond the answer
    pub suppress_meta_commentary: bool,
    /// Don't repeat the excerpts word for word; citations are shown separately
    pub forbid_verbatim_quotes: bool,
    pub sentinel: String,
    /// Language to answer in, e.g. "Vietnamese"
    pub response_language: Option<String>,
}

impl Default for PromptContract {
    fn default() -> Self {
        Self {
            version: CONTRACT_VERSION,
            answer_only_from_context: true,
            must_cite_versions: true,
            sentinel_on_missing_info: true,
            suppress_meta_commentary: true,
            forbid_verbatim_quotes: true,
            sentinel: DEFAULT_SENTINEL.to_string(),
            response_language: None,
        }
    }
}

/// One rendered instruction line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    StateChanges { old: VersionLabel, new: VersionLabel },
    AnswerOnlyFromContext,
    CiteVersions { old: VersionLabel, new: VersionLabel },
    NoVerbatimQuotes,
    NoMetaCommentary,
    Sentinel(String),
    Language(String),
}

impl Instruction {
    pub fn text(&self) -> String {
        match self {
            Instruction::StateChanges { old, new } => format!(
                "State directly what changed between [{}] and [{}]: what was added, removed, or reworded.",
                old, new
            ),
            Instruction::AnswerOnlyFromContext => {
                "Use only the document excerpts above; do not rely on outside knowledge.".to_string()
            }
            Instruction::CiteVersions { old, new } => format!(
                "Briefly summarize what [{}] says and what [{}] says on this point.",
                old, new
            ),
            Instruction::NoVerbatimQuotes => {
                "Do not quote the excerpts verbatim; the reader can see them separately.".to_string()
            }
            Instruction::NoMetaCommentary => {
                "Do not add notes, conclusions, or personal commentary. Stop once the differences are summarized."
                    .to_string()
            }
            Instruction::Sentinel(sentinel) => format!(
                "If the excerpts do not contain the information needed, reply with exactly this sentence and nothing else: \"{}\"",
                sentinel
            ),
            Instruction::Language(language) => format!("Answer in {}.", language),
        }
    }
}

impl PromptContract {
    /// Instructions enabled by this contract, in prompt order.
    pub fn instructions(&self, old: &VersionLabel, new: &VersionLabel) -> Vec<Instruction> {
        let mut out = vec![Instruction::StateChanges {
            old: old.clone(),
            new: new.clone(),
        }];

        if self.answer_only_from_context {
            out.push(Instruction::AnswerOnlyFromContext);
        }
        if self.must_cite_versions {
            out.push(Instruction::CiteVersions {
                old: old.clone(),
                new: new.clone(),
            });
        }
        if self.forbid_verbatim_quotes {
            out.push(Instruction::NoVerbatimQuotes);
        }
        if self.suppress_meta_commentary {
            out.push(Instruction::NoMetaCommentary);
        }
        if self.sentinel_on_missing_info {
            out.push(Instruction::Sentinel(self.sentinel.clone()));
        }
        if let Some(language) = &self.response_language {
            out.push(Instruction::Language(language.clone()));
        }

        out
    }

    /// Builds the full prompt for one question.
    pub fn render(
        &self,
        question: &str,
        context: &ComparisonContext,
        old: &VersionLabel,
        new: &VersionLabel,
    ) -> String {
        let mut prompt = format!(
            "You are a legal analyst comparing two versions of a legal document, [{}] and [{}].\n\
             Find the differences relevant to this request: \"{}\"\n\n\
             [DOCUMENT EXCERPTS]:\n{}\n\
             [INSTRUCTIONS]:\n",
            old,
            new,
            question,
            context.as_str()
        );

        for instruction in self.instructions(old, new) {
            prompt.push_str("- ");
            prompt.push_str(&instruction.text());
            prompt.push('\n');
        }

        prompt.push_str("\nAnswer:\n");
        prompt
    }

    /// Whether `answer` is the sentinel, ignoring case, surrounding
    /// whitespace, quotes and a trailing period.
    pub fn is_sentinel(&self, answer: &str) -> bool {
        let normalize = |s: &str| {
            s.trim()
                .trim_matches(|c| c == '"' || c == '\'')
                .trim_end_matches('.')
                .trim()
                .to_lowercase()
        };
        normalize(answer) == normalize(&self.sentinel)
    }
}
