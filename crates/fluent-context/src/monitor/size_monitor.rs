//! C4 — Size Monitor.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use crate::token::TokenEstimator;
use crate::types::ContextTree;

const THRESHOLDS: [f64; 3] = [0.7, 0.8, 0.9];
const HISTORY_CAP: usize = 100;

#[derive(Debug, Clone)]
pub struct ThresholdAlert {
    pub ratio: f64,
    pub current_usage: u64,
    pub max_tokens: u64,
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[derive(Debug, Clone)]
pub struct SizeMonitor {
    max_tokens: u64,
    history: VecDeque<(f64, u64)>,
    exceeded: Vec<f64>,
    current_usage: u64,
    section_breakdown: Value,
    estimator: TokenEstimator,
}

impl SizeMonitor {
    pub fn new(max_tokens: u64) -> Self {
        SizeMonitor {
            max_tokens,
            history: VecDeque::new(),
            exceeded: Vec::new(),
            current_usage: 0,
            section_breakdown: Value::Null,
            estimator: TokenEstimator::new(),
        }
    }

    pub fn current_usage(&self) -> u64 {
        self.current_usage
    }

    pub fn section_breakdown(&self) -> &Value {
        &self.section_breakdown
    }

    /// Recomputes usage, appends to the bounded history, and emits alerts
    /// for thresholds crossed upward since the previous update; clears
    /// thresholds fallen below.
    pub fn update(&mut self, context: &ContextTree) -> Vec<ThresholdAlert> {
        let estimate = self.estimator.estimate_context(context);
        let usage = estimate["total"].as_u64().unwrap_or(0);
        self.current_usage = usage;
        self.section_breakdown = estimate;

        self.history.push_back((now_secs(), usage));
        while self.history.len() > HISTORY_CAP {
            self.history.pop_front();
        }

        let ratio = if self.max_tokens > 0 {
            usage as f64 / self.max_tokens as f64
        } else {
            0.0
        };

        let mut alerts = Vec::new();
        for threshold in THRESHOLDS {
            let was_exceeded = self.exceeded.contains(&threshold);
            let now_exceeded = ratio >= threshold;
            if now_exceeded && !was_exceeded {
                alerts.push(ThresholdAlert {
                    ratio: threshold,
                    current_usage: usage,
                    max_tokens: self.max_tokens,
                });
                self.exceeded.push(threshold);
            } else if !now_exceeded && was_exceeded {
                self.exceeded.retain(|t| *t != threshold);
            }
        }

        alerts
    }

    /// Tokens/second over the last <=5 history points.
    pub fn growth_rate(&self) -> f64 {
        let window: Vec<&(f64, u64)> = self.history.iter().rev().take(5).collect();
        if window.len() < 2 {
            return 0.0;
        }
        let newest = window[0];
        let oldest = window[window.len() - 1];
        let dt = newest.0 - oldest.0;
        if dt <= 0.0 {
            return 0.0;
        }
        (newest.1 as f64 - oldest.1 as f64) / dt
    }

    pub fn time_to_threshold(&self, ratio: f64) -> Option<f64> {
        let target = (self.max_tokens as f64) * ratio;
        if self.current_usage as f64 >= target {
            return Some(0.0);
        }
        let rate = self.growth_rate();
        if rate <= 0.0 {
            return None;
        }
        Some((target - self.current_usage as f64) / rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::empty_tree;
    use serde_json::Map;

    #[test]
    fn alerts_fire_on_rising_crossing_and_clear_on_falling() {
        let mut monitor = SizeMonitor::new(100);
        let mut small = empty_tree();
        let mut code = Map::new();
        code.insert("a.py".to_string(), Value::from("x"));
        small.insert("code_context".to_string(), Value::Object(code));
        let alerts = monitor.update(&small);
        assert!(alerts.is_empty() || monitor.current_usage() < 70);
    }

    #[test]
    fn history_is_capped() {
        let mut monitor = SizeMonitor::new(1000);
        let tree = empty_tree();
        for _ in 0..150 {
            monitor.update(&tree);
        }
        assert!(monitor.history.len() <= HISTORY_CAP);
    }
}
