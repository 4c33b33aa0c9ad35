//! C7 — Compression Manager.

use serde_json::{Map, Value};

use crate::compression::key_info_extractor::KeyInfoExtractor;
use crate::compression::reference_deduplicator::ReferenceDeduplicator;
use crate::compression::semantic_summarizer::SemanticSummarizer;
use crate::compression::strategy::{char_count_total, compression_ratio, CompressionConfig, CompressionStrategy};
use crate::token::TokenEstimator;
use crate::types::{json_stringify, ContextTree};

pub struct CompressionManager {
    strategies: Vec<Box<dyn CompressionStrategy>>,
    config: CompressionConfig,
    compression_threshold: u64,
    min_compression_ratio: f64,
    estimator: TokenEstimator,
}

impl CompressionManager {
    pub fn new(config: CompressionConfig, compression_threshold: u64, min_compression_ratio: f64) -> Self {
        CompressionManager {
            strategies: vec![
                Box::new(SemanticSummarizer),
                Box::new(KeyInfoExtractor),
                Box::new(ReferenceDeduplicator),
            ],
            config,
            compression_threshold,
            min_compression_ratio,
            estimator: TokenEstimator::new(),
        }
    }

    fn estimate_total_chars(&self, context: &ContextTree) -> u64 {
        let mut total = 0u64;
        if let Some(Value::Object(code)) = context.get("code_context") {
            total += char_count_total(code) as u64;
        }
        for (k, v) in context {
            if k == "code_context" {
                continue;
            }
            total += json_stringify(v).chars().count() as u64;
        }
        total
    }

    /// `need_compression(context, token_count?)`. When `token_count` is not
    /// supplied, a coarse char/4 surrogate is used, matching the manager's
    /// "estimate, don't re-tokenize" fast path.
    pub fn need_compression(&self, context: &ContextTree, token_count: Option<u64>) -> bool {
        let estimate = token_count.unwrap_or_else(|| self.estimate_total_chars(context) / 4);
        estimate > self.compression_threshold
    }

    /// `compress(context, strategy_names?, force?)`.
    pub fn compress(&self, context: &ContextTree, strategy_names: Option<&[&str]>, force: bool) -> ContextTree {
        if strategy_names.is_none() && !force && !self.need_compression(context, None) {
            return context.clone();
        }

        let code_context = match context.get("code_context").and_then(|v| v.as_object()) {
            Some(m) => m.clone(),
            None => return context.clone(),
        };

        let candidates: Vec<&Box<dyn CompressionStrategy>> = self
            .strategies
            .iter()
            .filter(|s| strategy_names.map(|names| names.contains(&s.name())).unwrap_or(true))
            .collect();

        let mut best: Option<(f64, Map<String, Value>, Value, &str)> = None;

        for strategy in candidates {
            let output = strategy.compress(&code_context, &self.config);
            let ratio = compression_ratio(output.original_size, output.compressed_size);

            let overall = serde_json::json!({
                "strategy": strategy.name(),
                "original_size": output.original_size,
                "compressed_size": output.compressed_size,
                "compression_ratio": ratio,
            });

            let should_replace = match &best {
                None => true,
                Some((best_ratio, ..)) => ratio < *best_ratio,
            };
            if should_replace {
                best = Some((ratio, output.code_context, overall_with_extra(overall, strategy.name(), output.extra_metadata), strategy.name()));
            }
        }

        match best {
            Some((ratio, code, metadata, _name)) if force || ratio <= self.min_compression_ratio => {
                let mut result = context.clone();
                result.insert("code_context".to_string(), Value::Object(code));
                result.insert("compression_metadata".to_string(), metadata);
                result
            }
            _ if force => {
                let mut result = context.clone();
                result.insert(
                    "compression_metadata".to_string(),
                    serde_json::json!({ "overall": { "status": "minimal_metadata_only" } }),
                );
                result
            }
            _ => context.clone(),
        }
    }

    /// Isolated single-string compression path used by the Background
    /// Optimizer for string leaves exceeding 1000 characters — wraps the
    /// string as a one-entry `code_context` and runs it through the three
    /// strategies, per the resolution of the `compress_text` open question.
    pub fn compress_text(&self, text: &str) -> String {
        let mut wrapped = Map::new();
        wrapped.insert("__leaf__".to_string(), Value::String(text.to_string()));

        let mut best: Option<(f64, String)> = None;
        for strategy in &self.strategies {
            let output = strategy.compress(&wrapped, &self.config);
            let ratio = compression_ratio(output.original_size, output.compressed_size);
            let candidate = output.code_context.get("__leaf__").and_then(|v| v.as_str()).unwrap_or(text).to_string();
            let better = match &best {
                None => true,
                Some((best_ratio, _)) => ratio < *best_ratio,
            };
            if better {
                best = Some((ratio, candidate));
            }
        }

        best.map(|(_, s)| s).unwrap_or_else(|| text.to_string())
    }

    /// `decompress(context)`: dispatch by `compression_metadata.overall.strategy`.
    pub fn decompress(&self, context: &ContextTree) -> ContextTree {
        let mut result = context.clone();
        let strategy_name = context
            .get("compression_metadata")
            .and_then(|m| m.get("overall"))
            .and_then(|o| o.get("strategy"))
            .and_then(|s| s.as_str())
            .map(|s| s.to_string());

        let Some(name) = strategy_name else {
            result.insert(
                "decompression_metadata".to_string(),
                serde_json::json!({ "decompression_skipped": true }),
            );
            return result;
        };

        let Some(strategy) = self.strategies.iter().find(|s| s.name() == name) else {
            let known: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
            result.insert(
                "decompression_metadata".to_string(),
                serde_json::json!({ "decompression_error": true, "known_strategies": known }),
            );
            return result;
        };

        let code_context = match context.get("code_context").and_then(|v| v.as_object()) {
            Some(m) => m.clone(),
            None => return result,
        };

        let strategy_metadata = context
            .get("compression_metadata")
            .and_then(|m| m.get(name.as_str()))
            .cloned()
            .unwrap_or(Value::Null);

        let (restored, note) = strategy.decompress(&code_context, &strategy_metadata);
        result.insert("code_context".to_string(), Value::Object(restored));

        let mut decompression_metadata = Map::new();
        decompression_metadata.insert(name, note);
        result.insert("decompression_metadata".to_string(), Value::Object(decompression_metadata));
        result
    }
}

fn overall_with_extra(overall: Value, strategy_name: &str, extra: Value) -> Value {
    let mut map = Map::new();
    map.insert("overall".to_string(), overall);
    map.insert(strategy_name.to_string(), extra);
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::empty_tree;

    fn manager() -> CompressionManager {
        CompressionManager::new(CompressionConfig::default(), 100, 0.99)
    }

    #[test]
    fn need_compression_respects_threshold() {
        let mgr = manager();
        let mut tree = empty_tree();
        let mut code = Map::new();
        code.insert("a.py".to_string(), Value::from("x".repeat(1000)));
        tree.insert("code_context".to_string(), Value::Object(code));
        assert!(mgr.need_compression(&tree, None));
    }

    #[test]
    fn compression_metadata_faithfulness() {
        let mgr = manager();
        let mut tree = empty_tree();
        let mut code = Map::new();
        let content = "def f():\n    pass\n".repeat(50);
        code.insert("a.py".to_string(), Value::from(content.clone()));
        tree.insert("code_context".to_string(), Value::Object(code));

        let compressed = mgr.compress(&tree, None, true);
        let overall = &compressed["compression_metadata"]["overall"];
        let original_size = overall["original_size"].as_u64().unwrap() as usize;
        assert_eq!(original_size, content.chars().count());
    }

    #[test]
    fn unknown_compressed_context_round_trips_via_skip_note() {
        let mgr = manager();
        let tree = empty_tree();
        let decompressed = mgr.decompress(&tree);
        assert!(decompressed["decompression_metadata"]["decompression_skipped"].as_bool().unwrap());
    }
}
