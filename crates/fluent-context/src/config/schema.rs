//! Configuration shape and schema bounds (§6), enforced via `schemars` +
//! `jsonschema`.

use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EmbeddingConfig {
    #[schemars(range(min = 100, max = 3000))]
    pub chunk_size: u32,
    #[schemars(range(min = 0, max = 1000))]
    pub chunk_overlap: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Bm25Config {
    #[schemars(range(min = 0.1, max = 5.0))]
    pub k1: f64,
    #[schemars(range(min = 0.1, max = 1.0))]
    pub b: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchConfig {
    pub bm25: Bm25Config,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SummarizationConfig {
    #[schemars(range(min = 500, max = 5000))]
    pub threshold: u32,
    #[schemars(range(min = 0.1, max = 0.9))]
    pub compression_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ImportanceScoringConfig {
    #[schemars(range(min = 0.1, max = 2.0))]
    pub code_weight: f64,
    #[schemars(range(min = 0.1, max = 2.0))]
    pub comment_weight: f64,
    #[schemars(range(min = 0.1, max = 2.0))]
    pub metadata_weight: f64,
    #[schemars(range(min = 0.1, max = 2.0))]
    pub framework_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContextManagementConfig {
    #[schemars(range(min = 5, max = 300))]
    pub optimization_interval: u32,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
    pub summarization: SummarizationConfig,
    pub importance_scoring: ImportanceScoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RootConfig {
    pub context_management: ContextManagementConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptive_config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "CONTEXT_BACKGROUND_OPT_TARGET_TOKENS")]
    pub background_opt_target_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "CONTEXT_RESERVED_TOKENS_FOR_PROMPT")]
    pub reserved_tokens_for_prompt: Option<u64>,
}

impl Default for ContextManagementConfig {
    fn default() -> Self {
        ContextManagementConfig {
            optimization_interval: 60,
            embedding: EmbeddingConfig { chunk_size: 1000, chunk_overlap: 200 },
            search: SearchConfig { bm25: Bm25Config { k1: 1.2, b: 0.75 } },
            summarization: SummarizationConfig { threshold: 1000, compression_ratio: 0.5 },
            importance_scoring: ImportanceScoringConfig {
                code_weight: 1.0,
                comment_weight: 0.5,
                metadata_weight: 0.5,
                framework_weight: 0.8,
            },
        }
    }
}

impl Default for RootConfig {
    fn default() -> Self {
        RootConfig {
            context_management: ContextManagementConfig::default(),
            adaptive_config: None,
            background_opt_target_tokens: None,
            reserved_tokens_for_prompt: None,
        }
    }
}

static COMPILED_SCHEMA: Lazy<jsonschema::JSONSchema> = Lazy::new(|| {
    let schema = schemars::schema_for!(RootConfig);
    let schema_value = serde_json::to_value(&schema).expect("schema serializes");
    jsonschema::JSONSchema::compile(&schema_value).expect("schema compiles")
});

/// `validate(config) -> (ok, errors)`.
pub fn validate(config: &Value) -> (bool, Vec<String>) {
    match COMPILED_SCHEMA.validate(config) {
        Ok(()) => (true, Vec::new()),
        Err(errors) => (false, errors.map(|e| e.to_string()).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = serde_json::to_value(RootConfig::default()).unwrap();
        let (ok, errors) = validate(&config);
        assert!(ok, "errors: {errors:?}");
    }

    #[test]
    fn out_of_bounds_chunk_size_is_rejected() {
        let mut config = RootConfig::default();
        config.context_management.embedding.chunk_size = 50;
        let value = serde_json::to_value(config).unwrap();
        let (ok, errors) = validate(&value);
        assert!(!ok);
        assert!(!errors.is_empty());
    }
}
