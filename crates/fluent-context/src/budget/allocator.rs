//! C3 — Budget Allocator.

use serde_json::{Map, Value};

use crate::importance::ImportanceScorer;
use crate::token::{Language, TokenEstimator};
use crate::types::{json_stringify, ContextTree, TaskType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationStrategy {
    PriorityBased,
    TaskAdaptive,
}

impl Default for AllocationStrategy {
    fn default() -> Self {
        AllocationStrategy::PriorityBased
    }
}

pub struct AllocationResult {
    pub optimized_context: ContextTree,
    pub report: Value,
    pub importance_map: Value,
}

#[derive(Debug, Clone, Copy)]
pub struct Budget {
    pub max_tokens: u64,
    pub reserved_tokens: u64,
}

impl Budget {
    pub fn available(&self) -> u64 {
        self.max_tokens.saturating_sub(self.reserved_tokens)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BudgetAllocator {
    estimator: TokenEstimator,
    scorer: ImportanceScorer,
}

const TRUNCATION_MARKER_PREFIX: &str = "... [truncated";

impl BudgetAllocator {
    pub fn new() -> Self {
        BudgetAllocator {
            estimator: TokenEstimator::new(),
            scorer: ImportanceScorer::new(),
        }
    }

    /// Produce a head+tail (or head-only) truncation of `content` that fits
    /// within `budget` real tokens, using per-line token counts rather than
    /// a character heuristic.
    fn truncate_to_budget(&self, content: &str, budget: u64, language: Language) -> String {
        let lines: Vec<&str> = content.lines().collect();
        let per_line = self.estimator.per_line_tokens(content, Some(language));
        debug_assert_eq!(lines.len(), per_line.len());

        if lines.is_empty() || budget == 0 {
            return format!("{TRUNCATION_MARKER_PREFIX} {} lines] ...", lines.len());
        }

        let half = budget / 2;
        let mut head = Vec::new();
        let mut head_tokens = 0u64;
        let mut head_idx = 0;
        while head_idx < lines.len() {
            let cost = per_line[head_idx];
            if head_tokens + cost > half.max(1) {
                break;
            }
            head.push(lines[head_idx]);
            head_tokens += cost;
            head_idx += 1;
        }

        let remaining_budget = budget.saturating_sub(head_tokens);
        let mut tail = Vec::new();
        let mut tail_tokens = 0u64;
        let mut tail_idx = lines.len();
        while tail_idx > head_idx {
            let cost = per_line[tail_idx - 1];
            if tail_tokens + cost > remaining_budget {
                break;
            }
            tail.push(lines[tail_idx - 1]);
            tail_tokens += cost;
            tail_idx -= 1;
        }
        tail.reverse();

        let retained_lines = head.len() + tail.len();
        let truncated_lines = lines.len() - retained_lines;

        if retained_lines == 0 {
            return format!("{TRUNCATION_MARKER_PREFIX} {} lines] ...", lines.len());
        }

        if retained_lines >= 10 && truncated_lines > 0 {
            format!(
                "{}\n{TRUNCATION_MARKER_PREFIX} {truncated_lines} lines] ...\n{}",
                head.join("\n"),
                tail.join("\n")
            )
        } else {
            format!(
                "{}\n{TRUNCATION_MARKER_PREFIX} {} lines] ...",
                head.join("\n"),
                lines.len() - head.len()
            )
        }
    }

    pub fn allocate(
        &self,
        context: &ContextTree,
        task_type: Option<&TaskType>,
        task_keywords: &[String],
        force: bool,
        budget: Budget,
    ) -> AllocationResult {
        let importance_map = self.scorer.score(context, task_type, task_keywords);
        let estimate = self.estimator.estimate_context(context);
        let total_estimate = estimate["total"].as_u64().unwrap_or(0);
        let available = budget.available();

        if total_estimate <= available && !force {
            let mut report = Map::new();
            report.insert("original_tokens".to_string(), Value::from(total_estimate));
            report.insert("available_tokens".to_string(), Value::from(available));
            report.insert("allocated_tokens".to_string(), Value::from(total_estimate));
            report.insert(
                "code_context_tokens".to_string(),
                estimate.get("code_context").and_then(|c| c.get("total")).cloned().unwrap_or(Value::from(0)),
            );
            report.insert("other_tokens".to_string(), Value::from(total_estimate.saturating_sub(
                estimate.get("code_context").and_then(|c| c.get("total")).and_then(|v| v.as_u64()).unwrap_or(0),
            )));
            report.insert("optimization_applied".to_string(), Value::from(false));
            report.insert("files".to_string(), Value::Object(Map::new()));

            return AllocationResult {
                optimized_context: context.clone(),
                report: Value::Object(report),
                importance_map,
            };
        }

        let code_total = estimate
            .get("code_context")
            .and_then(|c| c.get("total"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let code_share = if total_estimate > 0 {
            code_total as f64 / total_estimate as f64
        } else {
            0.0
        };
        let code_budget = ((available as f64) * code_share).min((available as f64) * 0.8) as u64;

        let mut optimized = context.clone();
        let mut file_reports = Map::new();
        let mut allocated_code_tokens: u64 = 0;

        if let Some(Value::Object(code_map)) = context.get("code_context") {
            let scores_obj = importance_map
                .get("code_context")
                .and_then(|v| v.as_object())
                .cloned()
                .unwrap_or_default();

            let mut files: Vec<(&String, &Value, f64)> = code_map
                .iter()
                .map(|(p, v)| {
                    let score = scores_obj.get(p).and_then(|s| s.as_f64()).unwrap_or(1.0);
                    (p, v, score)
                })
                .collect();
            files.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

            let mut new_code = Map::new();
            for (path, value, importance) in files {
                let content = value.as_str().unwrap_or_default();
                let language = Language::from_path(path);
                let file_tokens = self.estimator.estimate_file(path, Some(content));

                if allocated_code_tokens + file_tokens <= code_budget {
                    new_code.insert(path.clone(), Value::String(content.to_string()));
                    allocated_code_tokens += file_tokens;
                    file_reports.insert(
                        path.clone(),
                        serde_json::json!({ "allocated_tokens": file_tokens, "importance_score": importance }),
                    );
                } else if importance >= 1.5 {
                    let remaining = code_budget.saturating_sub(allocated_code_tokens);
                    if remaining > 0 {
                        let truncated = self.truncate_to_budget(content, remaining, language);
                        let truncated_tokens = self.estimator.estimate_text(&truncated, Some(language));
                        new_code.insert(path.clone(), Value::String(truncated));
                        allocated_code_tokens += truncated_tokens;
                        file_reports.insert(
                            path.clone(),
                            serde_json::json!({ "allocated_tokens": truncated_tokens, "importance_score": importance }),
                        );
                    }
                }
            }
            optimized.insert("code_context".to_string(), Value::Object(new_code));
        }

        let other_tokens = total_estimate.saturating_sub(code_total);

        let mut report = Map::new();
        report.insert("original_tokens".to_string(), Value::from(total_estimate));
        report.insert("available_tokens".to_string(), Value::from(available));
        report.insert(
            "allocated_tokens".to_string(),
            Value::from(allocated_code_tokens + other_tokens),
        );
        report.insert("code_context_tokens".to_string(), Value::from(allocated_code_tokens));
        report.insert("other_tokens".to_string(), Value::from(other_tokens));
        report.insert("optimization_applied".to_string(), Value::from(true));
        report.insert("files".to_string(), Value::Object(file_reports));

        AllocationResult {
            optimized_context: optimized,
            report: Value::Object(report),
            importance_map,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::empty_tree;

    fn budget(max: u64, reserved: u64) -> Budget {
        Budget { max_tokens: max, reserved_tokens: reserved }
    }

    #[test]
    fn idempotent_no_op_when_under_budget() {
        let allocator = BudgetAllocator::new();
        let mut tree = empty_tree();
        let mut code = Map::new();
        code.insert("a.py".to_string(), Value::from("x = 1\n"));
        tree.insert("code_context".to_string(), Value::Object(code));

        let result = allocator.allocate(&tree, None, &[], false, budget(10_000, 0));
        assert_eq!(result.optimized_context, tree);
        assert_eq!(result.report["optimization_applied"], Value::from(false));
    }

    #[test]
    fn allocation_bound_respected_when_applied() {
        let allocator = BudgetAllocator::new();
        let mut tree = empty_tree();
        let mut code = Map::new();
        code.insert("a.py".to_string(), Value::from("def f(): pass\n"));
        code.insert("b.py".to_string(), Value::from(format!("x = 1\n{}", "y = 2\n".repeat(200))));
        tree.insert("code_context".to_string(), Value::Object(code));

        let b = budget(400, 50);
        let result = allocator.allocate(&tree, None, &[], false, b);
        assert_eq!(result.report["optimization_applied"], Value::from(true));
        let allocated = result.report["allocated_tokens"].as_u64().unwrap();
        assert!(allocated <= b.available());
        assert!(result.optimized_context["code_context"]["a.py"].is_string());
    }

    #[test]
    fn s2_keyword_boost_wins_under_tight_budget() {
        let allocator = BudgetAllocator::new();
        let mut tree = empty_tree();
        let mut code = Map::new();
        code.insert("u.py".to_string(), Value::from("# important important important\nx = 1\n".repeat(20)));
        code.insert("v.py".to_string(), Value::from("y = 2\n".repeat(20)));
        code.insert("w.py".to_string(), Value::from("z = 3\n".repeat(20)));
        tree.insert("code_context".to_string(), Value::Object(code));

        let keywords = vec!["important".to_string()];
        let result = allocator.allocate(&tree, None, &keywords, false, budget(120, 0));
        assert!(result.optimized_context["code_context"].get("u.py").is_some());
    }
}
