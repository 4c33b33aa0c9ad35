//! Closed extension-to-language table and per-language density modifiers.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Java,
    CSharp,
    Go,
    Cpp,
    Ruby,
    Php,
    Html,
    Css,
    Markdown,
    Json,
    Yaml,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "py" => Language::Python,
            "js" | "jsx" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "java" => Language::Java,
            "cs" => Language::CSharp,
            "go" => Language::Go,
            "cpp" | "cc" => Language::Cpp,
            "rb" => Language::Ruby,
            "php" => Language::Php,
            "html" | "htm" => Language::Html,
            "css" => Language::Css,
            "md" => Language::Markdown,
            "json" => Language::Json,
            "yml" | "yaml" => Language::Yaml,
            _ => Language::Unknown,
        }
    }

    pub fn from_path(path: &str) -> Self {
        match path.rsplit_once('.') {
            Some((_, ext)) => Self::from_extension(ext),
            None => Language::Unknown,
        }
    }

    /// Multiplicative modifier applied to the raw cl100k token count to
    /// approximate a per-language density family.
    pub fn density_modifier(&self) -> f64 {
        match self {
            Language::Python => 1.00,
            Language::TypeScript => 1.15,
            Language::JavaScript => 1.10,
            Language::Java => 1.25,
            Language::CSharp => 1.25,
            Language::Go => 1.05,
            Language::Cpp => 1.20,
            Language::Ruby => 1.00,
            Language::Php => 1.10,
            Language::Html => 0.95,
            Language::Css => 0.95,
            Language::Markdown => 0.90,
            Language::Json => 1.00,
            Language::Yaml => 0.95,
            Language::Unknown => 1.00,
        }
    }

    /// Typical-file fallback token count when neither content nor a
    /// readable file is available.
    pub fn typical_file_tokens(&self) -> u64 {
        match self {
            Language::Python | Language::Ruby => 400,
            Language::JavaScript | Language::TypeScript | Language::Php => 450,
            Language::Java | Language::CSharp | Language::Cpp => 550,
            Language::Go => 400,
            Language::Html | Language::Css => 300,
            Language::Markdown => 250,
            Language::Json | Language::Yaml => 150,
            Language::Unknown => 400,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_table_is_closed_and_correct() {
        assert_eq!(Language::from_path("main.py"), Language::Python);
        assert_eq!(Language::from_path("app.tsx"), Language::TypeScript);
        assert_eq!(Language::from_path("README.md"), Language::Markdown);
        assert_eq!(Language::from_path("noext"), Language::Unknown);
    }
}
