//! Shared trait and config for the three compression strategies of C6.

use serde_json::{Map, Value};

use crate::token::Language;

#[derive(Debug, Clone)]
pub struct CompressionConfig {
    pub summarization_threshold: usize,
    pub compression_ratio: f64,
    pub preserve_imports: bool,
    pub preserve_classes: bool,
    pub preserve_structure: bool,
    pub dedup_window: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        CompressionConfig {
            summarization_threshold: 200,
            compression_ratio: 0.5,
            preserve_imports: true,
            preserve_classes: true,
            preserve_structure: true,
            dedup_window: 10,
        }
    }
}

/// Output of a single strategy's `compress`. Sizes are character counts,
/// matching the compression-ratio definition in the data model.
pub struct CompressionOutput {
    pub code_context: Map<String, Value>,
    pub original_size: usize,
    pub compressed_size: usize,
    /// Strategy-specific block merged under `compression_metadata.<key>`.
    pub extra_metadata: Value,
}

pub trait CompressionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn compress(&self, code_context: &Map<String, Value>, config: &CompressionConfig) -> CompressionOutput;
    /// Returns the (possibly still-lossy) code_context and a metadata note
    /// describing what decompression could and could not restore.
    fn decompress(&self, code_context: &Map<String, Value>, strategy_metadata: &Value) -> (Map<String, Value>, Value);
}

pub fn char_count_total(code_context: &Map<String, Value>) -> usize {
    code_context.values().filter_map(|v| v.as_str()).map(|s| s.chars().count()).sum()
}

pub fn language_of(path: &str) -> Language {
    Language::from_path(path)
}

pub fn compression_ratio(original: usize, compressed: usize) -> f64 {
    if original == 0 {
        1.0
    } else {
        compressed as f64 / original as f64
    }
}
