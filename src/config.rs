use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::AssistError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistConfig {
    pub data_dir: PathBuf,
    pub embedding: EmbeddingConfig,
    pub collections: Vec<CollectionConfig>,
    pub search: SearchConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model used when a collection does not name its own.
    pub default_model: String,
    pub cache_size: usize,
    /// Bounded attempts for a transient model-load failure.
    pub load_attempts: u32,
}

/// Role a collection plays in routing. The QnA collection drives the DB-match
/// decision; policy collections feed the grounded LLM fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionRole {
    Qna,
    Policy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Cosine,
    L2,
    Dot,
}

/// HNSW-style index effort knobs, recorded per collection so a reindex can
/// recover the exact parameters a collection was built with. Backends that
/// auto-tune (LanceDB) still persist and report them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswConfig {
    pub construction_effort: usize,
    pub search_effort: usize,
    pub connectivity: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            construction_effort: 200,
            search_effort: 64,
            connectivity: 16,
        }
    }
}

/// Where a collection's source records come from on reindex.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum SourceKind {
    /// Patterns joined with responses from the relational store.
    Relational,
    /// Paragraph-split document file (.docx, .txt, .md).
    File { path: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub name: String,
    pub role: CollectionRole,
    pub embedding_model: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    #[serde(default)]
    pub index: HnswConfig,
    /// Per-collection decision threshold. Never a literal in routing code.
    pub similarity_threshold: f32,
    pub source: SourceKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub qna_top_k: usize,
    pub policy_top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl AssistConfig {
    /// Validate config values, returning errors for clearly broken
    /// configurations. Fatal at startup; never retried.
    pub fn validate(&self) -> Result<(), AssistError> {
        if self.collections.is_empty() {
            return Err(AssistError::Configuration(
                "at least one collection must be configured".into(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for c in &self.collections {
            if !seen.insert(c.name.as_str()) {
                return Err(AssistError::Configuration(format!(
                    "duplicate collection name '{}'",
                    c.name
                )));
            }
            if c.dimension == 0 {
                return Err(AssistError::Configuration(format!(
                    "collection '{}': dimension must be > 0",
                    c.name
                )));
            }
            if !(0.0..=1.0).contains(&c.similarity_threshold) {
                return Err(AssistError::Configuration(format!(
                    "collection '{}': similarity_threshold must be in [0.0, 1.0]",
                    c.name
                )));
            }
        }
        if self.qna_collection().is_none() {
            return Err(AssistError::Configuration(
                "a collection with role 'qna' is required".into(),
            ));
        }
        if self.policy_collections().next().is_none() {
            return Err(AssistError::Configuration(
                "a collection with role 'policy' is required".into(),
            ));
        }
        if self.search.qna_top_k == 0 || self.search.policy_top_k == 0 {
            return Err(AssistError::Configuration(
                "search.qna_top_k and search.policy_top_k must be > 0".into(),
            ));
        }
        if self.embedding.load_attempts == 0 {
            return Err(AssistError::Configuration(
                "embedding.load_attempts must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Load config from a JSON file, then validate.
    pub fn from_file(path: &Path) -> Result<Self, AssistError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AssistError::Configuration(format!("failed to read config file: {e}"))
        })?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| AssistError::Configuration(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn qna_collection(&self) -> Option<&CollectionConfig> {
        self.collections
            .iter()
            .find(|c| c.role == CollectionRole::Qna)
    }

    /// Policy collections in declaration order; fan-out and context
    /// concatenation preserve this order.
    pub fn policy_collections(&self) -> impl Iterator<Item = &CollectionConfig> {
        self.collections
            .iter()
            .filter(|c| c.role == CollectionRole::Policy)
    }
}

impl Default for AssistConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("intra-assist");

        Self {
            data_dir,
            embedding: EmbeddingConfig {
                default_model: "hash-minilm-384".into(),
                cache_size: 1000,
                load_attempts: 3,
            },
            collections: vec![
                CollectionConfig {
                    name: "qna_patterns".into(),
                    role: CollectionRole::Qna,
                    embedding_model: "hash-minilm-384".into(),
                    dimension: 384,
                    metric: DistanceMetric::Cosine,
                    index: HnswConfig::default(),
                    similarity_threshold: 0.7,
                    source: SourceKind::Relational,
                },
                CollectionConfig {
                    name: "policy_documents".into(),
                    role: CollectionRole::Policy,
                    embedding_model: "hash-minilm-384".into(),
                    dimension: 384,
                    metric: DistanceMetric::Cosine,
                    index: HnswConfig {
                        construction_effort: 400,
                        search_effort: 128,
                        connectivity: 32,
                    },
                    similarity_threshold: 0.6,
                    source: SourceKind::File {
                        path: PathBuf::from("./metadata/policy.docx"),
                    },
                },
            ],
            search: SearchConfig {
                qna_top_k: 5,
                policy_top_k: 3,
            },
            llm: LlmConfig {
                endpoint: "https://api.openai.com/v1/chat/completions".into(),
                model: "gpt-4o-mini".into(),
                api_key_env: "OPENAI_API_KEY".into(),
                max_tokens: 500,
                temperature: 0.7,
                timeout_secs: 20,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(AssistConfig::default().validate().is_ok());
    }

    #[test]
    fn duplicate_collection_names_rejected() {
        let mut config = AssistConfig::default();
        let dup = config.collections[0].clone();
        config.collections.push(dup);
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let mut config = AssistConfig::default();
        config.collections[0].similarity_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_policy_collection_rejected() {
        let mut config = AssistConfig::default();
        config.collections.retain(|c| c.role == CollectionRole::Qna);
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_top_k_rejected() {
        let mut config = AssistConfig::default();
        config.search.qna_top_k = 0;
        assert!(config.validate().is_err());
    }
}
