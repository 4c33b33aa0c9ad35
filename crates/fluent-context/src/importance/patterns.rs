//! Closed regex tables used by the Importance Scorer (no AST parser is part
//! of this workspace's dependency stack, so the regex path named as a
//! fallback in the scoring algorithm is the sole entity-extraction path).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::token::Language;

pub const IMPORTANT_NAMES: &[&str] = &[
    "main", "controller", "service", "create", "update", "validate", "handler", "process",
];

pub const FILENAME_ROLE_TOKENS: &[&str] = &[
    "main", "app", "index", "core", "base", "config", "util",
];

struct LangPatterns {
    function: Regex,
    class: Regex,
    import: Regex,
    docstring: Regex,
    decorator: Regex,
    try_catch: Regex,
}

static PY_PATTERNS: Lazy<LangPatterns> = Lazy::new(|| LangPatterns {
    function: Regex::new(r"(?m)^\s*def\s+(\w+)").unwrap(),
    class: Regex::new(r"(?m)^\s*class\s+(\w+)").unwrap(),
    import: Regex::new(r"(?m)^\s*(import|from)\s+\S+").unwrap(),
    docstring: Regex::new(r#"(?s)""".*?""""#).unwrap(),
    decorator: Regex::new(r"(?m)^\s*@\w+").unwrap(),
    try_catch: Regex::new(r"(?m)^\s*(try|except)\b").unwrap(),
});

static JS_PATTERNS: Lazy<LangPatterns> = Lazy::new(|| LangPatterns {
    function: Regex::new(r"(?m)\bfunction\s+(\w+)|\b(\w+)\s*=\s*\([^)]*\)\s*=>").unwrap(),
    class: Regex::new(r"(?m)^\s*class\s+(\w+)").unwrap(),
    import: Regex::new(r"(?m)^\s*(import|require)\b").unwrap(),
    docstring: Regex::new(r"(?s)/\*\*.*?\*/").unwrap(),
    decorator: Regex::new(r"(?m)^\s*@\w+").unwrap(),
    try_catch: Regex::new(r"(?m)^\s*(try|catch)\b").unwrap(),
});

static JAVA_PATTERNS: Lazy<LangPatterns> = Lazy::new(|| LangPatterns {
    function: Regex::new(r"(?m)\b(public|private|protected)\s+[\w<>\[\]]+\s+(\w+)\s*\(").unwrap(),
    class: Regex::new(r"(?m)^\s*(public\s+)?(class|interface)\s+(\w+)").unwrap(),
    import: Regex::new(r"(?m)^\s*import\s+").unwrap(),
    docstring: Regex::new(r"(?s)/\*\*.*?\*/").unwrap(),
    decorator: Regex::new(r"(?m)^\s*@\w+").unwrap(),
    try_catch: Regex::new(r"(?m)^\s*(try|catch)\b").unwrap(),
});

static GENERIC_PATTERNS: Lazy<LangPatterns> = Lazy::new(|| LangPatterns {
    function: Regex::new(r"(?m)\bfunc(tion)?\s+(\w+)").unwrap(),
    class: Regex::new(r"(?m)^\s*(class|struct)\s+(\w+)").unwrap(),
    import: Regex::new(r"(?m)^\s*(import|using|include)\b").unwrap(),
    docstring: Regex::new(r"(?s)/\*.*?\*/").unwrap(),
    decorator: Regex::new(r"(?m)^\s*@\w+").unwrap(),
    try_catch: Regex::new(r"(?m)^\s*(try|catch)\b").unwrap(),
});

fn patterns_for(language: Language) -> &'static LangPatterns {
    match language {
        Language::Python | Language::Ruby => &PY_PATTERNS,
        Language::JavaScript | Language::TypeScript | Language::Php => &JS_PATTERNS,
        Language::Java | Language::CSharp => &JAVA_PATTERNS,
        _ => &GENERIC_PATTERNS,
    }
}

/// Counts of defined entities, used to derive the complexity factor.
pub struct EntityCounts {
    pub functions: usize,
    pub classes: usize,
    pub imports: usize,
}

pub fn count_entities(content: &str, language: Language) -> EntityCounts {
    let p = patterns_for(language);
    EntityCounts {
        functions: p.function.find_iter(content).count(),
        classes: p.class.find_iter(content).count(),
        imports: p.import.find_iter(content).count(),
    }
}

/// Weighted pattern bonus from §4.2(d), capped by the caller at ×3.
pub fn pattern_bonus(content: &str, language: Language) -> f64 {
    let p = patterns_for(language);
    let mut bonus = 0.0;
    bonus += p.class.find_iter(content).count() as f64 * 0.15;
    bonus += p.function.find_iter(content).count() as f64 * 0.05;
    bonus += p.import.find_iter(content).count() as f64 * 0.02;
    bonus += p.docstring.find_iter(content).count() as f64 * 0.10;
    bonus += p.decorator.find_iter(content).count() as f64 * 0.05;
    bonus += p.try_catch.find_iter(content).count() as f64 * 0.05;
    bonus
}

pub fn contains_important_name(content: &str) -> bool {
    let lower = content.to_ascii_lowercase();
    IMPORTANT_NAMES.iter().any(|name| lower.contains(name))
}

pub fn filename_has_role_token(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    FILENAME_ROLE_TOKENS.iter().any(|tok| lower.contains(tok))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_python_entities() {
        let src = "import os\nclass Foo:\n    def bar(self):\n        pass\n";
        let counts = count_entities(src, Language::Python);
        assert_eq!(counts.imports, 1);
        assert_eq!(counts.classes, 1);
        assert_eq!(counts.functions, 1);
    }

    #[test]
    fn filename_role_matches_expected_tokens() {
        assert!(filename_has_role_token("src/core/engine.rs"));
        assert!(!filename_has_role_token("src/widgets/button.rs"));
    }
}
