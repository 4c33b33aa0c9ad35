//! Semantic Summarizer strategy (C6).
//!
//! For files exceeding the summarization threshold, keeps imports, class
//! headers, function signatures, decorators, and top-level statements;
//! replaces function/class bodies with a sentinel comment.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::compression::strategy::{char_count_total, compression_ratio, language_of, CompressionConfig, CompressionOutput, CompressionStrategy};
use crate::token::Language;

struct LineClassifier {
    import_re: Regex,
    class_re: Regex,
    function_re: Regex,
    decorator_re: Regex,
    comment_prefix: &'static str,
    sentinel: &'static str,
}

static PYTHON: Lazy<LineClassifier> = Lazy::new(|| LineClassifier {
    import_re: Regex::new(r"^\s*(import|from)\s+\S+").unwrap(),
    class_re: Regex::new(r"^\s*class\s+\w+").unwrap(),
    function_re: Regex::new(r"^\s*(async\s+)?def\s+\w+\s*\(").unwrap(),
    decorator_re: Regex::new(r"^\s*@\w+").unwrap(),
    comment_prefix: "#",
    sentinel: "# Summarized: body omitted",
});

static JS_TS: Lazy<LineClassifier> = Lazy::new(|| LineClassifier {
    import_re: Regex::new(r"^\s*(import|export\s+.*from|const\s+\w+\s*=\s*require)\b").unwrap(),
    class_re: Regex::new(r"^\s*(export\s+)?class\s+\w+").unwrap(),
    function_re: Regex::new(r"^\s*(export\s+)?(async\s+)?function\s+\w+\s*\(|^\s*(public|private|protected)?\s*\w+\s*\([^)]*\)\s*\{").unwrap(),
    decorator_re: Regex::new(r"^\s*@\w+").unwrap(),
    comment_prefix: "//",
    sentinel: "// Summarized: body omitted",
});

static JAVA_CSHARP: Lazy<LineClassifier> = Lazy::new(|| LineClassifier {
    import_re: Regex::new(r"^\s*(import|using)\s+").unwrap(),
    class_re: Regex::new(r"^\s*(public\s+|private\s+)?(class|interface)\s+\w+").unwrap(),
    function_re: Regex::new(r"^\s*(public|private|protected|static|\s)+[\w<>\[\]]+\s+\w+\s*\([^)]*\)\s*\{?").unwrap(),
    decorator_re: Regex::new(r"^\s*@\w+").unwrap(),
    comment_prefix: "//",
    sentinel: "// Summarized: body omitted",
});

fn classifier_for(language: Language) -> Option<&'static LineClassifier> {
    match language {
        Language::Python => Some(&PYTHON),
        Language::JavaScript | Language::TypeScript => Some(&JS_TS),
        Language::Java | Language::CSharp => Some(&JAVA_CSHARP),
        _ => None,
    }
}

fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ' || *c == '\t').count()
}

fn summarize_with_classifier(content: &str, c: &LineClassifier, config: &CompressionConfig) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let mut out = Vec::new();
    out.push(format!("{} Summarized Content:", c.comment_prefix));

    let mut suppress_from_indent: Option<usize> = None;

    for line in lines {
        let indent = indent_of(line);

        if let Some(floor) = suppress_from_indent {
            if indent >= floor && !line.trim().is_empty() {
                continue;
            } else {
                suppress_from_indent = None;
            }
        }

        let is_import = config.preserve_imports && c.import_re.is_match(line);
        let is_class = config.preserve_classes && c.class_re.is_match(line);
        let is_function = c.function_re.is_match(line);
        let is_decorator = c.decorator_re.is_match(line);

        if is_import || is_class || is_function || is_decorator || indent == 0 {
            out.push(line.to_string());
            if (is_class || is_function) && suppress_from_indent.is_none() {
                out.push(format!("{:width$}{}", "", c.sentinel, width = indent + 4));
                suppress_from_indent = Some(indent + 1);
            }
        }
    }

    out.join("\n")
}

fn head_tail_fallback(content: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() <= 20 {
        return content.to_string();
    }
    let head = lines[..10].join("\n");
    let tail = lines[lines.len() - 10..].join("\n");
    format!("{head}\n... [{} lines omitted] ...\n{tail}", lines.len() - 20)
}

pub struct SemanticSummarizer;

impl CompressionStrategy for SemanticSummarizer {
    fn name(&self) -> &'static str {
        "semantic_summarizer"
    }

    fn compress(&self, code_context: &Map<String, Value>, config: &CompressionConfig) -> CompressionOutput {
        let original_size = char_count_total(code_context);
        let mut new_code = Map::new();
        let mut summarized_files = Map::new();

        for (path, value) in code_context {
            let content = value.as_str().unwrap_or_default();
            let line_count = content.lines().count();
            if line_count <= config.summarization_threshold {
                new_code.insert(path.clone(), value.clone());
                continue;
            }

            let language = language_of(path);
            let summarized = match classifier_for(language) {
                Some(c) => summarize_with_classifier(content, c, config),
                None => head_tail_fallback(content),
            };

            let ratio = compression_ratio(content.chars().count(), summarized.chars().count());
            summarized_files.insert(
                path.clone(),
                serde_json::json!({ "compression_ratio": ratio, "original_lines": line_count }),
            );
            new_code.insert(path.clone(), Value::String(summarized));
        }

        let compressed_size = char_count_total(&new_code);
        CompressionOutput {
            code_context: new_code,
            original_size,
            compressed_size,
            extra_metadata: Value::Object(summarized_files),
        }
    }

    fn decompress(&self, code_context: &Map<String, Value>, _strategy_metadata: &Value) -> (Map<String, Value>, Value) {
        let note = serde_json::json!({
            "strategy": "semantic_summarization",
            "reversible": false,
            "note": "semantic summarization is lossy; function and class bodies cannot be reconstructed",
        });
        (code_context.clone(), note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_imports_and_signatures_s3() {
        let mut body = String::from("import os\n\nclass Foo:\n");
        body.push_str("    def bar(self):\n        x = 1\n        return x\n");
        for i in 0..250 {
            body.push_str(&format!("    # filler {i}\n"));
        }
        body.push_str("\ndef top_level():\n    return 1\n");

        let mut code = Map::new();
        code.insert("big.py".to_string(), Value::from(body));

        let strategy = SemanticSummarizer;
        let config = CompressionConfig { summarization_threshold: 200, ..Default::default() };
        let out = strategy.compress(&code, &config);

        let summarized = out.code_context["big.py"].as_str().unwrap();
        assert!(summarized.contains("import os"));
        assert!(summarized.contains("class Foo"));
        assert!(summarized.contains("def bar"));
        assert!(summarized.contains("Summarized"));
        assert!(out.compressed_size < out.original_size);
    }

    #[test]
    fn files_under_threshold_are_untouched() {
        let mut code = Map::new();
        code.insert("small.py".to_string(), Value::from("x = 1\n"));
        let strategy = SemanticSummarizer;
        let out = strategy.compress(&code, &CompressionConfig::default());
        assert_eq!(out.code_context["small.py"], code["small.py"]);
    }
}
