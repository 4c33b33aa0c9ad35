//! C5 — Pruning Engine.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use lru::LruCache;
use serde_json::Value;

use crate::pruning::value_score::{sort_candidates, PruningCandidate};
use crate::token::TokenEstimator;
use crate::types::{json_stringify, ContextTree};

const LRU_CAPACITY: usize = 1000;
const HISTORY_CAP: usize = 10;
const DAY_SECONDS: f64 = 86_400.0;
const PROTECTED_THRESHOLD: f64 = 0.7;
const TRUNCATE_AT: usize = 100;

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

struct PruningState {
    access_history: HashMap<String, VecDeque<f64>>,
    access_counts: HashMap<String, u64>,
    importance_overrides: HashMap<String, f64>,
    critical_paths: HashSet<String>,
    lru: LruCache<String, f64>,
}

pub struct PruningEngine {
    state: Mutex<PruningState>,
    estimator: TokenEstimator,
    recency_weight: f64,
    frequency_weight: f64,
    importance_weight: f64,
}

impl PruningEngine {
    pub fn new() -> Self {
        PruningEngine {
            state: Mutex::new(PruningState {
                access_history: HashMap::new(),
                access_counts: HashMap::new(),
                importance_overrides: HashMap::new(),
                critical_paths: HashSet::new(),
                lru: LruCache::new(std::num::NonZeroUsize::new(LRU_CAPACITY).unwrap()),
            }),
            estimator: TokenEstimator::new(),
            recency_weight: 0.5,
            frequency_weight: 0.3,
            importance_weight: 0.2,
        }
    }

    pub fn record_access(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        let now = now_secs();
        state.lru.put(path.to_string(), now);
        let history = state.access_history.entry(path.to_string()).or_default();
        history.push_back(now);
        while history.len() > HISTORY_CAP {
            history.pop_front();
        }
        *state.access_counts.entry(path.to_string()).or_insert(0) += 1;
    }

    pub fn set_importance_override(&self, path: &str, score: f64) {
        let mut state = self.state.lock().unwrap();
        state.importance_overrides.insert(path.to_string(), score.clamp(0.0, 1.0));
    }

    pub fn add_critical_path(&self, path: &str) {
        self.state.lock().unwrap().critical_paths.insert(path.to_string());
    }

    pub fn remove_critical_path(&self, path: &str) {
        self.state.lock().unwrap().critical_paths.remove(path);
    }

    pub fn is_critical(&self, path: &str) -> bool {
        self.state.lock().unwrap().critical_paths.contains(path)
    }

    /// `value_score(path)` per the recency/frequency/importance weighted sum.
    pub fn value_score(&self, path: &str) -> f64 {
        let state = self.state.lock().unwrap();
        if state.critical_paths.contains(path) {
            return 1.0;
        }
        if let Some(score) = state.importance_overrides.get(path) {
            return *score;
        }

        let recency = state
            .lru
            .peek(path)
            .map(|ts| (1.0 - (now_secs() - ts) / DAY_SECONDS).max(0.0))
            .unwrap_or(0.0);

        let max_count = state.access_counts.values().copied().max().unwrap_or(1).max(1);
        let count = state.access_counts.get(path).copied().unwrap_or(0);
        let frequency = count as f64 / max_count as f64;

        let importance = 0.5;

        self.recency_weight * recency + self.frequency_weight * frequency + self.importance_weight * importance
    }

    fn is_critical_locked(&self, path: &str, critical: &HashSet<String>) -> bool {
        critical.contains(path)
    }

    /// Recursively collects one candidate per string leaf and one aggregate
    /// candidate per mapping node, skipping anything under a critical path.
    pub fn identify_pruning_candidates(&self, context: &ContextTree) -> Vec<PruningCandidate> {
        let state = self.state.lock().unwrap();
        let mut out = Vec::new();
        for (key, value) in context {
            self.walk(key, value, &state.critical_paths, &mut out);
        }
        drop(state);
        sort_candidates(&mut out);
        out
    }

    fn walk(&self, path: &str, value: &Value, critical: &HashSet<String>, out: &mut Vec<PruningCandidate>) {
        if self.is_critical_locked(path, critical) {
            return;
        }
        match value {
            Value::String(s) => {
                let tokens = self.estimator.estimate_text(s, None);
                if tokens > 0 {
                    out.push(PruningCandidate {
                        key_path: path.to_string(),
                        value_score: self.value_score(path),
                        tokens,
                    });
                }
            }
            Value::Object(map) => {
                let aggregate_tokens = self.estimator.estimate_text(&json_stringify(value), None);
                out.push(PruningCandidate {
                    key_path: path.to_string(),
                    value_score: self.value_score(path),
                    tokens: aggregate_tokens,
                });
                for (child_key, child_value) in map {
                    let child_path = format!("{path}.{child_key}");
                    self.walk(&child_path, child_value, critical, out);
                }
            }
            _ => {}
        }
    }

    /// Walks candidates ascending, skipping protected ones, deleting or
    /// truncating until `pruned_tokens >= current - target`. Returns the
    /// number of tokens removed.
    pub fn prune(&self, context: &mut ContextTree, current: u64, target: u64) -> u64 {
        if current <= target {
            return 0;
        }
        let needed = current - target;
        let candidates = self.identify_pruning_candidates(context);
        let mut pruned: u64 = 0;

        for candidate in candidates {
            if pruned >= needed {
                break;
            }
            if candidate.value_score > PROTECTED_THRESHOLD {
                continue;
            }
            if let Some(removed) = self.apply_prune(context, &candidate.key_path) {
                pruned += removed;
            }
        }

        pruned
    }

    fn apply_prune(&self, context: &mut ContextTree, path: &str) -> Option<u64> {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.is_empty() {
            return None;
        }

        if segments.len() == 1 {
            let existing = context.get(&segments[0].to_string())?.clone();
            return self.prune_value_in_place(context, segments[0], &existing);
        }

        let mut cur = context.get_mut(segments[0])?;
        for seg in &segments[1..segments.len() - 1] {
            cur = cur.as_object_mut()?.get_mut(*seg)?;
        }
        let obj = cur.as_object_mut()?;
        let last = segments[segments.len() - 1];
        let existing = obj.get(last)?.clone();
        self.prune_value(obj, last, &existing)
    }

    fn prune_value_in_place(&self, context: &mut ContextTree, key: &str, existing: &Value) -> Option<u64> {
        self.prune_value(context, key, existing)
    }

    fn prune_value(&self, parent: &mut serde_json::Map<String, Value>, key: &str, existing: &Value) -> Option<u64> {
        match existing {
            Value::String(s) if s.chars().count() > TRUNCATE_AT => {
                let before = self.estimator.estimate_text(s, None);
                let truncated: String = s.chars().take(TRUNCATE_AT).collect::<String>()
                    + "... [truncated during optimization]";
                let after = self.estimator.estimate_text(&truncated, None);
                parent.insert(key.to_string(), Value::String(truncated));
                Some(before.saturating_sub(after))
            }
            _ => {
                let before = self.estimator.estimate_text(&json_stringify(existing), None);
                parent.remove(key);
                Some(before)
            }
        }
    }
}

impl Default for PruningEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::empty_tree;
    use serde_json::Map;

    #[test]
    fn critical_paths_are_never_pruned() {
        let engine = PruningEngine::new();
        engine.add_critical_path("code_context");
        let mut tree = empty_tree();
        let mut code = Map::new();
        code.insert("a.py".to_string(), Value::from("x = 1\n".repeat(500)));
        tree.insert("code_context".to_string(), Value::Object(code));

        let before = tree.clone();
        engine.prune(&mut tree, 10_000, 0);
        assert_eq!(tree, before);
    }

    #[test]
    fn pruning_terminates_at_or_under_target() {
        let engine = PruningEngine::new();
        let mut tree = empty_tree();
        let mut code = Map::new();
        for i in 0..20 {
            code.insert(format!("f{i}.py"), Value::from("x = 1\n".repeat(50)));
        }
        tree.insert("code_context".to_string(), Value::Object(code));

        engine.prune(&mut tree, 5000, 100);
        let remaining_candidates = engine.identify_pruning_candidates(&tree);
        assert!(remaining_candidates.iter().all(|c| c.value_score > PROTECTED_THRESHOLD) || remaining_candidates.is_empty());
    }

    #[test]
    fn value_score_for_critical_path_is_one() {
        let engine = PruningEngine::new();
        engine.add_critical_path("a.b");
        assert_eq!(engine.value_score("a.b"), 1.0);
    }
}
