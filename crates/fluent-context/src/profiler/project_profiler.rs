//! C10 — Project Profiler.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::token::Language;

const IGNORED_DIRS: &[&str] = &[
    ".git", "__pycache__", "node_modules", "venv", "build", "dist", ".vscode", ".idea",
];
const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;
const SAMPLE_FILES_PER_LANGUAGE: usize = 10;
const SAMPLE_BYTES: usize = 50 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeBucket {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProjectType {
    WebFrontend,
    WebBackend,
    DataScience,
    CliTool,
    Library,
    Generic,
}

struct FrameworkPattern {
    name: &'static str,
    re: Regex,
}

static FRAMEWORK_PATTERNS: Lazy<Vec<FrameworkPattern>> = Lazy::new(|| {
    vec![
        FrameworkPattern { name: "django", re: Regex::new(r"from django|import django").unwrap() },
        FrameworkPattern { name: "flask", re: Regex::new(r"from flask|import flask").unwrap() },
        FrameworkPattern { name: "fastapi", re: Regex::new(r"from fastapi|import fastapi").unwrap() },
        FrameworkPattern { name: "react", re: Regex::new(r"from ['\"]react['\"]|import React").unwrap() },
        FrameworkPattern { name: "vue", re: Regex::new(r"from ['\"]vue['\"]|new Vue\(").unwrap() },
        FrameworkPattern { name: "angular", re: Regex::new(r"@angular/core|@Component\(").unwrap() },
        FrameworkPattern { name: "express", re: Regex::new(r"require\(['\"]express['\"]\)|from ['\"]express['\"]").unwrap() },
        FrameworkPattern { name: "next", re: Regex::new(r"from ['\"]next['\"]|next/router").unwrap() },
    ]
});

#[derive(Debug, Clone)]
pub struct ProjectProfile {
    pub total_files: usize,
    pub total_size: u64,
    pub extension_counts: HashMap<String, (usize, u64)>,
    pub primary_language: Language,
    pub size_bucket: SizeBucket,
    pub max_depth: usize,
    pub avg_depth: f64,
    pub top_dirs: Vec<(String, usize)>,
    pub frameworks: Vec<String>,
    pub project_type: ProjectType,
    pub avg_line_length: f64,
    pub empty_line_ratio: f64,
    pub comment_ratio: f64,
}

impl ProjectProfile {
    pub fn to_json(&self) -> Value {
        json!({
            "total_files": self.total_files,
            "total_size": self.total_size,
            "primary_language": format!("{:?}", self.primary_language),
            "size_bucket": format!("{:?}", self.size_bucket),
            "max_depth": self.max_depth,
            "avg_depth": self.avg_depth,
            "top_dirs": self.top_dirs,
            "frameworks": self.frameworks,
            "project_type": format!("{:?}", self.project_type),
            "code_density": {
                "avg_line_length": self.avg_line_length,
                "empty_line_ratio": self.empty_line_ratio,
                "comment_ratio": self.comment_ratio,
            },
        })
    }

    /// Applies project-type, size, language, and density adjustments to a
    /// base configuration within the schema bounds of §6.
    pub fn recommended_config(&self) -> Value {
        let mut chunk_size: f64 = 1000.0;

        match self.primary_language {
            Language::Python => chunk_size *= 0.9,
            Language::Java | Language::CSharp => chunk_size *= 1.2,
            _ => {}
        }

        match self.size_bucket {
            SizeBucket::Small => chunk_size *= 0.9,
            SizeBucket::Large => chunk_size *= 1.1,
            SizeBucket::Medium => {}
        }

        if self.comment_ratio < 0.05 {
            chunk_size *= 1.05;
        }

        let chunk_size = chunk_size.clamp(100.0, 3000.0) as u64;

        json!({
            "context_management": {
                "optimization_interval": 60,
                "embedding": { "chunk_size": chunk_size, "chunk_overlap": (chunk_size as f64 * 0.2) as u64 },
                "search": { "bm25": { "k1": 1.2, "b": 0.75 } },
                "summarization": { "threshold": 1000, "compression_ratio": 0.5 },
                "importance_scoring": {
                    "code_weight": 1.0,
                    "comment_weight": 0.5,
                    "metadata_weight": 0.5,
                    "framework_weight": 0.8,
                },
            }
        })
    }
}

pub struct ProjectProfiler;

impl ProjectProfiler {
    pub fn new() -> Self {
        ProjectProfiler
    }

    /// Walks `root` once, skipping the ignored directory set and files over
    /// 10 MiB, and derives a deterministic profile of the filesystem state
    /// observed at call time.
    pub async fn profile(&self, root: &Path) -> std::io::Result<ProjectProfile> {
        let mut extension_counts: HashMap<String, (usize, u64)> = HashMap::new();
        let mut dir_counts: HashMap<String, usize> = HashMap::new();
        let mut total_files = 0usize;
        let mut total_size = 0u64;
        let mut max_depth = 0usize;
        let mut depth_sum = 0usize;
        let mut samples: HashMap<Language, Vec<PathBuf>> = HashMap::new();

        let mut stack = vec![(root.to_path_buf(), 0usize)];
        while let Some((dir, depth)) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(e) => e,
                Err(_) => continue,
            };

            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                let file_name = entry.file_name().to_string_lossy().to_string();

                let Ok(meta) = entry.metadata().await else { continue };
                if meta.is_dir() {
                    if IGNORED_DIRS.contains(&file_name.as_str()) {
                        continue;
                    }
                    *dir_counts.entry(file_name.clone()).or_insert(0) += 1;
                    max_depth = max_depth.max(depth + 1);
                    stack.push((path, depth + 1));
                    continue;
                }

                if meta.len() > MAX_FILE_BYTES {
                    continue;
                }

                total_files += 1;
                total_size += meta.len();
                depth_sum += depth;

                let ext = path
                    .extension()
                    .map(|e| e.to_string_lossy().to_ascii_lowercase())
                    .unwrap_or_default();
                let entry = extension_counts.entry(ext.clone()).or_insert((0, 0));
                entry.0 += 1;
                entry.1 += meta.len();

                let language = Language::from_extension(&ext);
                if language != Language::Unknown {
                    let bucket = samples.entry(language).or_default();
                    if bucket.len() < SAMPLE_FILES_PER_LANGUAGE {
                        bucket.push(path.clone());
                    }
                }
            }
        }

        let primary_language = extension_counts
            .iter()
            .max_by_key(|(_, (count, _))| *count)
            .map(|(ext, _)| Language::from_extension(ext))
            .unwrap_or(Language::Unknown);

        let size_bucket = if total_files < 100 {
            SizeBucket::Small
        } else if total_files < 1000 {
            SizeBucket::Medium
        } else {
            SizeBucket::Large
        };

        let avg_depth = if total_files > 0 {
            depth_sum as f64 / total_files as f64
        } else {
            0.0
        };

        let mut top_dirs: Vec<(String, usize)> = dir_counts.into_iter().collect();
        top_dirs.sort_by(|a, b| b.1.cmp(&a.1));
        top_dirs.truncate(20);

        let mut frameworks = Vec::new();
        let mut total_lines = 0usize;
        let mut total_line_len = 0usize;
        let mut empty_lines = 0usize;
        let mut comment_lines = 0usize;

        for paths in samples.values() {
            for path in paths {
                let Ok(content) = tokio::fs::read_to_string(path).await else { continue };
                let sampled: String = content.chars().take(SAMPLE_BYTES).collect();

                for pattern in FRAMEWORK_PATTERNS.iter() {
                    if pattern.re.is_match(&sampled) && !frameworks.contains(&pattern.name.to_string()) {
                        frameworks.push(pattern.name.to_string());
                    }
                }

                for line in sampled.lines() {
                    total_lines += 1;
                    total_line_len += line.chars().count();
                    if line.trim().is_empty() {
                        empty_lines += 1;
                    } else if line.trim_start().starts_with('#') || line.trim_start().starts_with("//") {
                        comment_lines += 1;
                    }
                }
            }
        }

        let avg_line_length = if total_lines > 0 { total_line_len as f64 / total_lines as f64 } else { 0.0 };
        let empty_line_ratio = if total_lines > 0 { empty_lines as f64 / total_lines as f64 } else { 0.0 };
        let comment_ratio = if total_lines > 0 { comment_lines as f64 / total_lines as f64 } else { 0.0 };

        let project_type = classify_project_type(&extension_counts, &frameworks, &top_dirs);

        Ok(ProjectProfile {
            total_files,
            total_size,
            extension_counts,
            primary_language,
            size_bucket,
            max_depth,
            avg_depth,
            top_dirs,
            frameworks,
            project_type,
            avg_line_length,
            empty_line_ratio,
            comment_ratio,
        })
    }
}

impl Default for ProjectProfiler {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_project_type(
    extension_counts: &HashMap<String, (usize, u64)>,
    frameworks: &[String],
    top_dirs: &[(String, usize)],
) -> ProjectType {
    let mut scores: HashMap<ProjectType, f64> = HashMap::new();

    for fw in frameworks {
        match fw.as_str() {
            "react" | "vue" | "angular" | "next" => *scores.entry(ProjectType::WebFrontend).or_insert(0.0) += 2.0,
            "django" | "flask" | "fastapi" | "express" => *scores.entry(ProjectType::WebBackend).or_insert(0.0) += 2.0,
            _ => {}
        }
    }

    if extension_counts.contains_key("ipynb") {
        *scores.entry(ProjectType::DataScience).or_insert(0.0) += 2.0;
    }
    if top_dirs.iter().any(|(d, _)| d == "notebooks" || d == "data") {
        *scores.entry(ProjectType::DataScience).or_insert(0.0) += 1.0;
    }
    if top_dirs.iter().any(|(d, _)| d == "bin" || d == "cmd") {
        *scores.entry(ProjectType::CliTool).or_insert(0.0) += 1.0;
    }
    if top_dirs.iter().any(|(d, _)| d == "src" && !extension_counts.contains_key("html")) {
        *scores.entry(ProjectType::Library).or_insert(0.0) += 0.5;
    }

    scores
        .into_iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(t, _)| t)
        .unwrap_or(ProjectType::Generic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn profiles_a_small_temp_project() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("main.py"), "import os\nprint('hi')\n").await.unwrap();
        tokio::fs::create_dir(dir.path().join("node_modules")).await.unwrap();
        tokio::fs::write(dir.path().join("node_modules/ignored.js"), "x").await.unwrap();

        let profiler = ProjectProfiler::new();
        let profile = profiler.profile(dir.path()).await.unwrap();

        assert_eq!(profile.total_files, 1);
        assert_eq!(profile.primary_language, Language::Python);
        assert_eq!(profile.size_bucket, SizeBucket::Small);
    }
}
