//! C2 — Importance Scorer.

use serde_json::{Map, Value};

use crate::importance::patterns::{contains_important_name, count_entities, filename_has_role_token, pattern_bonus};
use crate::token::Language;
use crate::types::{ContextTree, TaskType};

#[derive(Debug, Clone, Default)]
pub struct ImportanceScorer;

impl ImportanceScorer {
    pub fn new() -> Self {
        ImportanceScorer
    }

    fn language_factor(language: Language) -> f64 {
        match language {
            Language::Python | Language::Ruby => 1.1,
            Language::Java | Language::CSharp => 1.2,
            _ => 1.0,
        }
    }

    fn complexity_factor(content: &str, language: Language) -> f64 {
        let counts = count_entities(content, language);
        let raw = 1.0 + 0.1 * (counts.functions + counts.classes) as f64 + 0.02 * counts.imports as f64;
        raw.min(2.0)
    }

    fn task_modifier(task_type: &TaskType, path: &str, content: &str) -> f64 {
        let lower_path = path.to_ascii_lowercase();
        match task_type {
            TaskType::Debugging => {
                let in_test_dir = lower_path.contains("test/") || lower_path.contains("spec/");
                let mentions_error = content.to_ascii_lowercase().contains("error")
                    || content.to_ascii_lowercase().contains("exception");
                if in_test_dir || mentions_error {
                    1.35
                } else {
                    1.0
                }
            }
            TaskType::Implementation => {
                if lower_path.contains("component") || lower_path.contains("model") {
                    1.3
                } else {
                    1.0
                }
            }
            TaskType::Refactoring => {
                if lower_path.contains("util") || lower_path.contains("helper") {
                    1.2
                } else {
                    1.0
                }
            }
            _ => 1.0,
        }
    }

    /// `score(context, task_type?, task_keywords?) -> importance_map`.
    /// Deterministic; never mutates `context`.
    pub fn score(
        &self,
        context: &ContextTree,
        task_type: Option<&TaskType>,
        task_keywords: &[String],
    ) -> Value {
        let mut out = Map::new();

        if let Some(Value::Object(code)) = context.get("code_context") {
            let mut files = Map::new();
            for (path, value) in code {
                let content = value.as_str().unwrap_or_default();
                let language = Language::from_path(path);

                let mut score = 1.0_f64;
                score *= Self::complexity_factor(content, language);
                score *= if contains_important_name(content) { 1.5 } else { 1.0 };
                score *= Self::language_factor(language);
                score *= (1.0 + pattern_bonus(content, language)).min(3.0);
                score *= if filename_has_role_token(path) { 1.3 } else { 1.0 };
                score = score.clamp(0.5, 3.0);

                if let Some(tt) = task_type {
                    score *= Self::task_modifier(tt, path, content);
                }

                if !task_keywords.is_empty() {
                    let lower_content = content.to_ascii_lowercase();
                    let mut bonus = 0.0_f64;
                    for kw in task_keywords {
                        if !kw.is_empty() && lower_content.contains(&kw.to_ascii_lowercase()) {
                            bonus += 0.2;
                        }
                    }
                    bonus = bonus.min(1.0);
                    score *= 1.0 + bonus;
                }

                files.insert(path.clone(), Value::from(score));
            }
            out.insert("code_context".to_string(), Value::Object(files));
        }

        for (section, _) in context {
            if section == "code_context" {
                continue;
            }
            let mut weight = 1.0_f64;
            if section == "metadata" && matches!(task_type, Some(TaskType::Documentation)) {
                weight = 1.5;
            }
            out.insert(section.clone(), Value::from(weight));
        }

        Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::empty_tree;

    #[test]
    fn scorer_is_deterministic_and_does_not_mutate() {
        let scorer = ImportanceScorer::new();
        let mut tree = empty_tree();
        let mut code = Map::new();
        code.insert("main.py".to_string(), Value::from("def main():\n    pass\n"));
        tree.insert("code_context".to_string(), Value::Object(code));
        let before = tree.clone();

        let a = scorer.score(&tree, None, &[]);
        let b = scorer.score(&tree, None, &[]);
        assert_eq!(a, b);
        assert_eq!(tree, before);
    }

    #[test]
    fn keyword_boost_raises_score() {
        let scorer = ImportanceScorer::new();
        let mut tree = empty_tree();
        let mut code = Map::new();
        code.insert("u.py".to_string(), Value::from("x = 'important thing'\n"));
        code.insert("v.py".to_string(), Value::from("y = 'other'\n"));
        tree.insert("code_context".to_string(), Value::Object(code));

        let keywords = vec!["important".to_string()];
        let scores = scorer.score(&tree, None, &keywords);
        let u = scores["code_context"]["u.py"].as_f64().unwrap();
        let v = scores["code_context"]["v.py"].as_f64().unwrap();
        assert!(u > v);
    }

    #[test]
    fn documentation_task_raises_metadata_weight() {
        let scorer = ImportanceScorer::new();
        let mut tree = empty_tree();
        tree.insert("metadata".to_string(), Value::from("note"));
        let scores = scorer.score(&tree, Some(&TaskType::Documentation), &[]);
        assert_eq!(scores["metadata"].as_f64().unwrap(), 1.5);
    }
}
