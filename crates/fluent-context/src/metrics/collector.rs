//! C12 — Metrics Collector.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Map, Value};

const WINDOW: usize = 50;
const FLUSH_INTERVAL_SECONDS: f64 = 300.0;
const RETENTION_SECONDS: f64 = 7.0 * 24.0 * 3600.0;

const KINDS: &[&str] = &[
    "token_usage",
    "search_relevance",
    "summarization_quality",
    "response_latency",
    "embedding_latency",
    "optimization_duration",
    "context_relevance",
];

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn timestamp_suffix() -> String {
    chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

#[derive(Debug, Clone)]
struct MetricRecord {
    fields: Value,
}

struct MetricsState {
    buffers: HashMap<&'static str, VecDeque<MetricRecord>>,
    last_flush: f64,
}

pub struct MetricsCollector {
    state: Mutex<MetricsState>,
    metrics_dir: PathBuf,
}

fn record(fields: Value) -> MetricRecord {
    MetricRecord { fields: merge_timestamp(fields) }
}

fn merge_timestamp(fields: Value) -> Value {
    let mut obj = match fields {
        Value::Object(m) => m,
        other => {
            let mut m = Map::new();
            m.insert("value".to_string(), other);
            m
        }
    };
    obj.insert("timestamp".to_string(), json!(now_secs()));
    Value::Object(obj)
}

impl MetricsCollector {
    pub fn new(metrics_dir: impl Into<PathBuf>) -> Self {
        let mut buffers = HashMap::new();
        for kind in KINDS {
            buffers.insert(*kind, VecDeque::with_capacity(WINDOW));
        }
        MetricsCollector {
            state: Mutex::new(MetricsState { buffers, last_flush: now_secs() }),
            metrics_dir: metrics_dir.into(),
        }
    }

    fn add_metric(&self, kind: &'static str, fields: Value) {
        let rec = record(fields);
        let mut state = self.state.lock().unwrap();
        let buf = state.buffers.entry(kind).or_default();
        buf.push_back(rec);
        while buf.len() > WINDOW {
            buf.pop_front();
        }
    }

    pub fn log_token_usage(&self, section: &str, tokens: u64) {
        self.add_metric("token_usage", json!({ "section": section, "tokens": tokens }));
    }

    pub fn log_search_relevance(&self, query: &str, relevance: f64) {
        self.add_metric("search_relevance", json!({ "query": query, "relevance": relevance }));
    }

    pub fn log_summarization_quality(&self, path: &str, compression_ratio: f64) {
        self.add_metric("summarization_quality", json!({ "path": path, "compression_ratio": compression_ratio }));
    }

    pub fn log_response_latency(&self, operation: &str, seconds: f64) {
        self.add_metric("response_latency", json!({ "operation": operation, "seconds": seconds }));
    }

    pub fn log_embedding_latency(&self, seconds: f64) {
        self.add_metric("embedding_latency", json!({ "seconds": seconds }));
    }

    pub fn log_optimization_duration(&self, seconds: f64) {
        self.add_metric("optimization_duration", json!({ "seconds": seconds }));
    }

    /// Tagged by a stable hash of the config active when the sample was
    /// taken, so `analyze_config_performance` can group by config.
    pub fn log_context_relevance(&self, relevance: f64, config_hash: &str) {
        self.add_metric("context_relevance", json!({ "relevance": relevance, "config_hash": config_hash }));
    }

    /// Per-kind aggregates: count, average, min, max, and (where the
    /// record carries a numeric primary field) median.
    pub fn get_metrics_summary(&self) -> Value {
        let state = self.state.lock().unwrap();
        let mut out = Map::new();
        for kind in KINDS {
            let buf = state.buffers.get(kind).cloned().unwrap_or_default();
            out.insert((*kind).to_string(), summarize_buffer(&buf));
        }
        Value::Object(out)
    }

    /// Stable JSON-based hash of a config value, used both to tag context
    /// relevance samples and to group them back up for analysis.
    pub fn hash_config(config: &Value) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let stable = crate::types::json_stringify(config);
        let mut hasher = DefaultHasher::new();
        stable.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    pub fn analyze_config_performance(&self, config: &Value) -> Value {
        let hash = Self::hash_config(config);
        let state = self.state.lock().unwrap();
        let buf = state.buffers.get("context_relevance").cloned().unwrap_or_default();
        let matching: Vec<f64> = buf
            .iter()
            .filter(|r| r.fields.get("config_hash").and_then(|v| v.as_str()) == Some(hash.as_str()))
            .filter_map(|r| r.fields.get("relevance").and_then(|v| v.as_f64()))
            .collect();

        if matching.is_empty() {
            return json!({ "config_hash": hash, "sample_count": 0, "average_relevance": Value::Null });
        }
        let sum: f64 = matching.iter().sum();
        json!({
            "config_hash": hash,
            "sample_count": matching.len(),
            "average_relevance": sum / matching.len() as f64,
        })
    }

    /// Bounded, confidence-tagged suggestions. Only `high`/`medium`
    /// confidence entries are intended to be auto-applied by the caller.
    pub fn recommend_config_improvements(&self, current: &Value) -> Vec<Value> {
        let state = self.state.lock().unwrap();
        let mut suggestions = Vec::new();

        if let Some(buf) = state.buffers.get("context_relevance") {
            let samples: Vec<f64> = buf.iter().filter_map(|r| r.fields.get("relevance").and_then(|v| v.as_f64())).collect();
            if samples.len() >= 5 {
                let avg = samples.iter().sum::<f64>() / samples.len() as f64;
                if avg < 0.7 {
                    let current_overlap = current
                        .pointer("/context_management/embedding/chunk_overlap")
                        .and_then(|v| v.as_f64())
                        .unwrap_or(200.0);
                    suggestions.push(json!({
                        "path": "context_management.embedding.chunk_overlap",
                        "action": "increase",
                        "amount_ratio": 0.2,
                        "from": current_overlap,
                        "reason": format!("average context relevance {avg:.2} below 0.7 over {} samples", samples.len()),
                        "confidence": "high",
                    }));
                }
            }
        }

        if let Some(buf) = state.buffers.get("summarization_quality") {
            let ratios: Vec<f64> = buf.iter().filter_map(|r| r.fields.get("compression_ratio").and_then(|v| v.as_f64())).collect();
            if ratios.len() >= 5 {
                let avg = ratios.iter().sum::<f64>() / ratios.len() as f64;
                if avg > 0.8 {
                    suggestions.push(json!({
                        "path": "context_management.summarization.threshold",
                        "action": "decrease",
                        "amount_ratio": 0.1,
                        "reason": format!("average compression ratio {avg:.2} indicates weak summarization"),
                        "confidence": "medium",
                    }));
                }
            }
        }

        suggestions
    }

    /// Splits the window in half and reports direction with percent change
    /// on the named numeric `field`.
    pub fn calculate_trend(&self, kind: &str, field: &str) -> Value {
        let state = self.state.lock().unwrap();
        let Some(buf) = state.buffers.get(kind) else {
            return json!({ "direction": "stable", "percent_change": 0.0 });
        };
        let values: Vec<f64> = buf.iter().filter_map(|r| r.fields.get(field).and_then(|v| v.as_f64())).collect();
        if values.len() < 4 {
            return json!({ "direction": "stable", "percent_change": 0.0 });
        }

        let mid = values.len() / 2;
        let (first, second) = values.split_at(mid);
        let first_avg = first.iter().sum::<f64>() / first.len() as f64;
        let second_avg = second.iter().sum::<f64>() / second.len() as f64;

        let percent_change = if first_avg.abs() > f64::EPSILON {
            (second_avg - first_avg) / first_avg * 100.0
        } else {
            0.0
        };

        let direction = if percent_change > 5.0 {
            "improving"
        } else if percent_change < -5.0 {
            "declining"
        } else {
            "stable"
        };

        json!({ "direction": direction, "percent_change": percent_change })
    }

    /// Flushes the in-memory buffers to a timestamped snapshot if at least
    /// `FLUSH_INTERVAL_SECONDS` have elapsed since the last flush, then
    /// deletes snapshot files older than 7 days. Returns `true` if a flush
    /// actually happened.
    pub async fn maybe_flush(&self) -> bool {
        let should_flush = {
            let state = self.state.lock().unwrap();
            now_secs() - state.last_flush >= FLUSH_INTERVAL_SECONDS
        };
        if !should_flush {
            return false;
        }
        self.flush().await;
        true
    }

    pub async fn flush(&self) {
        let snapshot = self.get_metrics_summary_raw();
        let now = now_secs();

        if let Err(e) = tokio::fs::create_dir_all(&self.metrics_dir).await {
            log::warn!("metrics flush skipped, could not create {}: {e}", self.metrics_dir.display());
            return;
        }

        let filename = format!("metrics_{}.json", timestamp_suffix());
        let path = self.metrics_dir.join(filename);
        match serde_json::to_string_pretty(&snapshot) {
            Ok(content) => {
                if let Err(e) = tokio::fs::write(&path, content).await {
                    log::warn!("metrics flush write failed for {}: {e}", path.display());
                }
            }
            Err(e) => log::warn!("metrics flush serialization failed: {e}"),
        }

        {
            let mut state = self.state.lock().unwrap();
            state.last_flush = now;
        }

        self.prune_old_files(now).await;
    }

    fn get_metrics_summary_raw(&self) -> Value {
        let state = self.state.lock().unwrap();
        let mut out = Map::new();
        for kind in KINDS {
            let buf = state.buffers.get(kind).cloned().unwrap_or_default();
            let items: Vec<Value> = buf.into_iter().map(|r| r.fields).collect();
            out.insert((*kind).to_string(), Value::Array(items));
        }
        Value::Object(out)
    }

    async fn prune_old_files(&self, now: f64) {
        let Ok(mut entries) = tokio::fs::read_dir(&self.metrics_dir).await else { return };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(meta) = entry.metadata().await else { continue };
            let Ok(modified) = meta.modified() else { continue };
            let age = now - modified.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64();
            if age > RETENTION_SECONDS {
                let _ = tokio::fs::remove_file(entry.path()).await;
            }
        }
    }

    pub fn metrics_dir(&self) -> &Path {
        &self.metrics_dir
    }
}

fn summarize_buffer(buf: &VecDeque<MetricRecord>) -> Value {
    if buf.is_empty() {
        return json!({ "count": 0 });
    }

    let primary_field = buf[0]
        .fields
        .as_object()
        .and_then(|m| m.keys().find(|k| k.as_str() != "timestamp" && k.as_str() != "section" && k.as_str() != "path" && k.as_str() != "query" && k.as_str() != "operation" && k.as_str() != "config_hash"))
        .cloned();

    let Some(field) = primary_field else {
        return json!({ "count": buf.len() });
    };

    let mut values: Vec<f64> = buf.iter().filter_map(|r| r.fields.get(&field).and_then(|v| v.as_f64())).collect();
    if values.is_empty() {
        return json!({ "count": buf.len() });
    }

    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let sum: f64 = values.iter().sum();
    let average = sum / values.len() as f64;
    let min = values.first().copied().unwrap_or(0.0);
    let max = values.last().copied().unwrap_or(0.0);
    let median = values[values.len() / 2];

    json!({
        "count": buf.len(),
        "field": field,
        "average": average,
        "min": min,
        "max": max,
        "median": median,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_are_bounded_to_window() {
        let collector = MetricsCollector::new("/tmp/does-not-matter");
        for i in 0..80 {
            collector.log_token_usage("code_context", i);
        }
        let summary = collector.get_metrics_summary();
        assert_eq!(summary["token_usage"]["count"].as_u64().unwrap(), WINDOW as u64);
    }

    #[test]
    fn trend_detects_improvement_and_decline() {
        let collector = MetricsCollector::new("/tmp/does-not-matter");
        for r in [0.3, 0.3, 0.3, 0.3, 0.9, 0.9, 0.9, 0.9] {
            collector.log_context_relevance(r, "cfg1");
        }
        let trend = collector.calculate_trend("context_relevance", "relevance");
        assert_eq!(trend["direction"], json!("improving"));
    }

    #[test]
    fn recommend_improvements_flags_low_relevance() {
        let collector = MetricsCollector::new("/tmp/does-not-matter");
        for _ in 0..10 {
            collector.log_context_relevance(0.4, "cfg1");
        }
        let current = json!({ "context_management": { "embedding": { "chunk_overlap": 200 } } });
        let suggestions = collector.recommend_config_improvements(&current);
        assert!(suggestions.iter().any(|s| s["confidence"] == json!("high")));
    }

    #[tokio::test]
    async fn flush_writes_a_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let collector = MetricsCollector::new(dir.path());
        collector.log_token_usage("code_context", 10);
        collector.flush().await;

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut found = false;
        while let Some(entry) = entries.next_entry().await.unwrap() {
            if entry.file_name().to_string_lossy().starts_with("metrics_") {
                found = true;
            }
        }
        assert!(found);
    }
}
