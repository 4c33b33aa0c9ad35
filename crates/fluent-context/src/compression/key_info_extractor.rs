//! Key-Info Extractor strategy (C6).
//!
//! Extracts only lines matching a closed pattern set (class/def/import/
//! decorator/docstring), optionally interpolating structure markers, and
//! prepends a header recording the source path and match counts.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::compression::strategy::{char_count_total, compression_ratio, language_of, CompressionConfig, CompressionOutput, CompressionStrategy};
use crate::token::Language;

struct ExtractPatterns {
    class_re: Regex,
    def_re: Regex,
    import_re: Regex,
    decorator_re: Regex,
    docstring_re: Regex,
    comment_prefix: &'static str,
}

static PYTHON: Lazy<ExtractPatterns> = Lazy::new(|| ExtractPatterns {
    class_re: Regex::new(r"^\s*class\s+\w+").unwrap(),
    def_re: Regex::new(r"^\s*(async\s+)?def\s+\w+\s*\(").unwrap(),
    import_re: Regex::new(r"^\s*(import|from)\s+\S+").unwrap(),
    decorator_re: Regex::new(r"^\s*@\w+").unwrap(),
    docstring_re: Regex::new(r#"^\s*"""#).unwrap(),
    comment_prefix: "#",
});

static GENERIC: Lazy<ExtractPatterns> = Lazy::new(|| ExtractPatterns {
    class_re: Regex::new(r"^\s*(export\s+)?(public\s+)?(class|interface|struct)\s+\w+").unwrap(),
    def_re: Regex::new(r"^\s*(export\s+)?(public|private|protected)?\s*(static\s+)?(async\s+)?(function\s+\w+|\w+\s*\([^)]*\)\s*\{)").unwrap(),
    import_re: Regex::new(r"^\s*(import|using|require|#include)\b").unwrap(),
    decorator_re: Regex::new(r"^\s*@\w+").unwrap(),
    docstring_re: Regex::new(r"^\s*/\*\*").unwrap(),
    comment_prefix: "//",
});

fn patterns_for(language: Language) -> &'static ExtractPatterns {
    match language {
        Language::Python | Language::Ruby => &PYTHON,
        _ => &GENERIC,
    }
}

fn extract(content: &str, p: &ExtractPatterns, preserve_structure: bool) -> (String, usize) {
    let mut out = Vec::new();
    let mut matches = 0usize;
    let mut last_indent: Option<usize> = None;

    for line in content.lines() {
        let indent = line.chars().take_while(|c| *c == ' ' || *c == '\t').count();
        let matched = p.class_re.is_match(line)
            || p.def_re.is_match(line)
            || p.import_re.is_match(line)
            || p.decorator_re.is_match(line)
            || p.docstring_re.is_match(line);

        if matched {
            if preserve_structure {
                if let Some(prev) = last_indent {
                    if indent > prev {
                        out.push(format!("{:width$}{} ...", "", p.comment_prefix, width = prev + 2));
                    }
                }
            }
            out.push(line.to_string());
            last_indent = Some(indent);
            matches += 1;
        }
    }

    (out.join("\n"), matches)
}

pub struct KeyInfoExtractor;

impl CompressionStrategy for KeyInfoExtractor {
    fn name(&self) -> &'static str {
        "key_info_extractor"
    }

    fn compress(&self, code_context: &Map<String, Value>, config: &CompressionConfig) -> CompressionOutput {
        let original_size = char_count_total(code_context);
        let mut new_code = Map::new();
        let mut extracted_files = Map::new();

        for (path, value) in code_context {
            let content = value.as_str().unwrap_or_default();
            let language = language_of(path);
            let p = patterns_for(language);
            let (extracted, matches) = extract(content, p, config.preserve_structure);

            let header = format!(
                "{} Key-Info Extract: source={path} patterns=class,def,import,decorator,docstring matches={matches}",
                p.comment_prefix
            );
            let body = format!("{header}\n{extracted}");
            let ratio = compression_ratio(content.chars().count(), body.chars().count());

            extracted_files.insert(path.clone(), serde_json::json!({ "matches": matches, "compression_ratio": ratio }));
            new_code.insert(path.clone(), Value::String(body));
        }

        let compressed_size = char_count_total(&new_code);
        CompressionOutput {
            code_context: new_code,
            original_size,
            compressed_size,
            extra_metadata: Value::Object(extracted_files),
        }
    }

    fn decompress(&self, code_context: &Map<String, Value>, _strategy_metadata: &Value) -> (Map<String, Value>, Value) {
        let note = serde_json::json!({
            "strategy": "key_info_extraction",
            "reversible": false,
            "note": "key-info extraction discards non-matching lines; the original cannot be reconstructed",
        });
        (code_context.clone(), note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_only_matching_lines() {
        let mut code = Map::new();
        code.insert(
            "a.py".to_string(),
            Value::from("import os\nclass Foo:\n    def bar(self):\n        x = 1\n        return x\n"),
        );
        let strategy = KeyInfoExtractor;
        let out = strategy.compress(&code, &CompressionConfig::default());
        let body = out.code_context["a.py"].as_str().unwrap();
        assert!(body.contains("import os"));
        assert!(body.contains("class Foo"));
        assert!(body.contains("def bar"));
        assert!(!body.contains("return x"));
    }
}
