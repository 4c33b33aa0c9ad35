//! C1 — Token Estimator.
//!
//! Counts tokens with a real subword tokenizer (the cl100k family via
//! `tiktoken-rs`) rather than a character-count heuristic, applying a
//! per-language density modifier on top of the raw count.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::{Map, Value};
use tiktoken_rs::CoreBPE;

use crate::error::{CoreError, CoreResult};
use crate::token::language::Language;
use crate::types::ContextTree;

static ENCODER: OnceCell<Arc<CoreBPE>> = OnceCell::new();

fn encoder() -> CoreResult<Arc<CoreBPE>> {
    if let Some(enc) = ENCODER.get() {
        return Ok(enc.clone());
    }
    let built = tiktoken_rs::cl100k_base()
        .map_err(|e| CoreError::ResourceUnavailable(format!("EncodingUnavailable: {e}")))?;
    let arc = Arc::new(built);
    let _ = ENCODER.set(arc.clone());
    Ok(arc)
}

#[derive(Debug, Clone, Default)]
pub struct TokenEstimator;

impl TokenEstimator {
    pub fn new() -> Self {
        TokenEstimator
    }

    /// Raw cl100k token count, with no density modifier applied.
    fn raw_count(text: &str) -> CoreResult<usize> {
        let enc = encoder()?;
        Ok(enc.encode_with_special_tokens(text).len())
    }

    /// `estimate_text(text, language?) -> int`. Falls back to the
    /// `Unknown` language's neutral (1.0) modifier when no language is
    /// given.
    pub fn estimate_text(&self, text: &str, language: Option<Language>) -> u64 {
        match Self::raw_count(text) {
            Ok(raw) => {
                let modifier = language.unwrap_or(Language::Unknown).density_modifier();
                ((raw as f64) * modifier).round() as u64
            }
            Err(e) => {
                log::warn!("token estimation fell back to default: {e}");
                language.unwrap_or(Language::Unknown).typical_file_tokens()
            }
        }
    }

    /// `estimate_file(path, content?) -> int`. Language is selected from
    /// the file extension via the closed table in `language.rs`. When no
    /// content is supplied, returns the per-language typical-file default
    /// rather than attempting I/O itself — reading files is a
    /// collaborator's job (see `collaborators::FileProvider`).
    pub fn estimate_file(&self, path: &str, content: Option<&str>) -> u64 {
        let language = Language::from_path(path);
        match content {
            Some(text) => self.estimate_text(text, Some(language)),
            None => language.typical_file_tokens(),
        }
    }

    /// `estimate_context(tree) -> estimate_tree`.
    pub fn estimate_context(&self, tree: &ContextTree) -> Value {
        let mut out = Map::new();
        let mut total: u64 = 0;

        if let Some(Value::Object(code)) = tree.get("code_context") {
            let mut files = Map::new();
            let mut code_total: u64 = 0;
            for (path, value) in code {
                let text = value.as_str().unwrap_or_default();
                let n = self.estimate_file(path, Some(text));
                code_total += n;
                files.insert(path.clone(), Value::from(n));
            }
            let mut code_section = Map::new();
            code_section.insert("total".to_string(), Value::from(code_total));
            code_section.insert("files".to_string(), Value::Object(files));
            out.insert("code_context".to_string(), Value::Object(code_section));
            total += code_total;
        }

        for (section, value) in tree {
            if section == "code_context" {
                continue;
            }
            let n = self.estimate_text(&crate::types::json_stringify(value), None);
            out.insert(section.clone(), Value::from(n));
            total += n;
        }

        out.insert("total".to_string(), Value::from(total));
        Value::Object(out)
    }

    /// Real per-line token counts, used by the Budget Allocator to
    /// truncate by tokens rather than characters.
    pub fn per_line_tokens(&self, text: &str, language: Option<Language>) -> Vec<u64> {
        text.lines()
            .map(|line| self.estimate_text(line, language))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_text_is_deterministic() {
        let est = TokenEstimator::new();
        let a = est.estimate_text("def f():\n    pass\n", Some(Language::Python));
        let b = est.estimate_text("def f():\n    pass\n", Some(Language::Python));
        assert_eq!(a, b);
        assert!(a > 0);
    }

    #[test]
    fn estimate_file_without_content_uses_default() {
        let est = TokenEstimator::new();
        assert_eq!(est.estimate_file("x.py", None), Language::Python.typical_file_tokens());
    }

    #[test]
    fn estimator_agreement_property() {
        let est = TokenEstimator::new();
        let text = "class Foo:\n    def bar(self):\n        return 1\n";
        let from_text = est.estimate_text(text, Some(Language::Python));
        let from_file = est.estimate_file("x.py", Some(text));
        assert_eq!(from_text, from_file);
    }

    #[test]
    fn estimate_context_sums_sections() {
        let est = TokenEstimator::new();
        let mut tree = crate::types::empty_tree();
        let mut code = Map::new();
        code.insert("a.py".to_string(), Value::from("x = 1\n"));
        tree.insert("code_context".to_string(), Value::Object(code));
        tree.insert("metadata".to_string(), Value::from("note"));

        let estimate = est.estimate_context(&tree);
        let total = estimate.get("total").unwrap().as_u64().unwrap();
        assert!(total > 0);
        assert!(estimate.get("code_context").unwrap().get("files").is_some());
    }
}
