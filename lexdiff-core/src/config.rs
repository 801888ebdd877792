use crate::compare::PromptContract;
use crate::index::RetrievalPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for a comparison session.
///
/// Every section has defaults, so a YAML file only needs the keys it overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub provider: ProviderConfig,
    pub chunker: ChunkerConfig,
    pub retrieval: RetrievalConfig,
    pub versions: VersionLabels,
    pub prompt: PromptContract,
}

/// Configuration for the generative model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
}

/// Configuration for the embedding model.
///
/// The same model embeds both the indexed units and the question, so it must
/// not change within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
}

/// Transport limits applied to every provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Upper bound for a single embedding or chat request, in seconds
    pub request_timeout_secs: u64,
}

/// Configuration for two-tier legal chunking.
///
/// All sizes are measured in characters, not bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Articles up to this length are kept whole
    pub max_unit_size: usize,
    /// Target size for sub-chunks of oversized articles
    pub fallback_chunk_size: usize,
    /// Characters shared between adjacent sub-chunks
    pub fallback_overlap: usize,
    /// Segments this short or shorter are dropped as formatting noise
    pub min_segment_len: usize,
    /// Which article marker starts a new segment
    pub marker: MarkerFamily,
}

/// Article marker vocabulary used to find structural boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum MarkerFamily {
    /// "Article 12"
    English,
    /// "Điều 12"
    Vietnamese,
    /// A regular expression whose first capture group is the article id
    Custom { pattern: String },
}

/// Retrieval settings for each question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub policy: RetrievalPolicy,
}

/// Labels attached to the two documents of a pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionLabels {
    pub old: String,
    pub new: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "qwen3:8b".to_string(),
            base_url: "http://localhost:11434".to_string(),
            temperature: 0.2,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "qwen3-embedding:8b".to_string(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 120,
        }
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_unit_size: 2000,
            fallback_chunk_size: 1000,
            fallback_overlap: 200,
            min_segment_len: 50,
            marker: MarkerFamily::default(),
        }
    }
}

impl Default for MarkerFamily {
    fn default() -> Self {
        Self::English
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 6,
            policy: RetrievalPolicy::default(),
        }
    }
}

impl Default for VersionLabels {
    fn default() -> Self {
        Self {
            old: "OLD".to_string(),
            new: "NEW".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from `lexdiff.yaml` if it exists, otherwise use defaults.
    pub fn load_or_default() -> Self {
        Self::load("lexdiff.yaml").unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunker_config_defaults() {
        let config = ChunkerConfig::default();
        assert_eq!(config.max_unit_size, 2000);
        assert_eq!(config.fallback_chunk_size, 1000);
        assert_eq!(config.fallback_overlap, 200);
        assert_eq!(config.min_segment_len, 50);
        assert_eq!(config.marker, MarkerFamily::English);
    }

    #[test]
    fn test_retrieval_config_defaults() {
        let config = RetrievalConfig::default();
        assert_eq!(config.top_k, 6);
        assert_eq!(config.policy, RetrievalPolicy::TopK);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
llm:
  model: "llama3.2:latest"
chunker:
  marker:
    family: vietnamese
versions:
  old: "BẢN CŨ"
  new: "BẢN MỚI"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.llm.model, "llama3.2:latest");
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.chunker.marker, MarkerFamily::Vietnamese);
        assert_eq!(config.chunker.max_unit_size, 2000);
        assert_eq!(config.versions.old, "BẢN CŨ");
        assert_eq!(config.retrieval.top_k, 6);
        assert_eq!(config.provider.request_timeout_secs, 120);
    }

    #[test]
    fn test_custom_marker_yaml() {
        let yaml = r#"
chunker:
  marker:
    family: custom
    pattern: '\bSection\s+(\d+)'
retrieval:
  policy: balanced
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config.chunker.marker,
            MarkerFamily::Custom {
                pattern: r"\bSection\s+(\d+)".to_string()
            }
        );
        assert_eq!(config.retrieval.policy, RetrievalPolicy::Balanced);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/definitely/not/here/lexdiff.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileRead(_)));
    }
}
