//! Collaborator trait contracts consumed by the engine facade. The core
//! never implements project indexing, language-model calls, or sandboxed
//! execution itself — hosts provide these.

use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait FileProvider: Send + Sync {
    async fn read_file(&self, path: &str) -> Option<String>;
    async fn list_files(&self, pattern: &str, recursive: bool) -> Vec<String>;
    fn get_workspace_root(&self) -> String;
}

#[async_trait]
pub trait CodeAnalyzer: Send + Sync {
    async fn analyze_file(&self, path: &str, tech_stack: &Value, root: &str) -> Value;
    async fn find_relevant_files(&self, query: &str) -> Vec<String>;
    async fn get_dependency_graph(&self) -> Value;
}

#[async_trait]
pub trait TechStackDetector: Send + Sync {
    async fn get_tech_stack(&self) -> Value;
    async fn get_frameworks(&self) -> Vec<String>;
    async fn get_dependencies(&self) -> Value;
}

#[async_trait]
pub trait MemoryProvider: Send + Sync {
    async fn add_memory(&self, text: &str, metadata: Option<Value>) -> String;
    async fn retrieve_memories(&self, query: &str, limit: Option<usize>) -> Vec<Value>;
}

#[async_trait]
pub trait TestFrameworkProvider: Send + Sync {
    async fn get_detected_frameworks(&self) -> Vec<String>;
    async fn get_test_files(&self) -> Vec<String>;
}

/// Minimal file provider reading from a fixed workspace root, enough to
/// give the demo binary *a* caller without reimplementing the project
/// indexer named out of scope.
pub struct LocalFileProvider {
    root: std::path::PathBuf,
}

impl LocalFileProvider {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        LocalFileProvider { root: root.into() }
    }
}

#[async_trait]
impl FileProvider for LocalFileProvider {
    async fn read_file(&self, path: &str) -> Option<String> {
        tokio::fs::read_to_string(self.root.join(path)).await.ok()
    }

    async fn list_files(&self, pattern: &str, recursive: bool) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![self.root.clone()];
        while let Some(dir) = stack.pop() {
            let Ok(mut entries) = tokio::fs::read_dir(&dir).await else { continue };
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if path.is_dir() {
                    if recursive {
                        stack.push(path);
                    }
                    continue;
                }
                let name = path.to_string_lossy().to_string();
                if pattern.is_empty() || name.contains(pattern) {
                    if let Ok(rel) = path.strip_prefix(&self.root) {
                        out.push(rel.to_string_lossy().to_string());
                    }
                }
            }
        }
        out
    }

    fn get_workspace_root(&self) -> String {
        self.root.to_string_lossy().to_string()
    }
}

/// In-process memory store keyed by generated UUIDs, enough to give the
/// demo binary a `MemoryProvider` without reimplementing the vector-backed
/// memory system named out of scope. Substring match only, no ranking.
pub struct InMemoryMemoryProvider {
    entries: std::sync::Mutex<Vec<(String, String, Option<Value>)>>,
}

impl InMemoryMemoryProvider {
    pub fn new() -> Self {
        InMemoryMemoryProvider { entries: std::sync::Mutex::new(Vec::new()) }
    }
}

impl Default for InMemoryMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryProvider for InMemoryMemoryProvider {
    async fn add_memory(&self, text: &str, metadata: Option<Value>) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.entries.lock().unwrap().push((id.clone(), text.to_string(), metadata));
        id
    }

    async fn retrieve_memories(&self, query: &str, limit: Option<usize>) -> Vec<Value> {
        let limit = limit.unwrap_or(10);
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, text, _)| query.is_empty() || text.contains(query))
            .take(limit)
            .map(|(id, text, metadata)| {
                serde_json::json!({ "id": id, "text": text, "metadata": metadata })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_file_provider_reads_and_lists_files() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.py"), "x = 1\n").await.unwrap();

        let provider = LocalFileProvider::new(dir.path());
        assert_eq!(provider.read_file("a.py").await, Some("x = 1\n".to_string()));
        let files = provider.list_files("", true).await;
        assert!(files.contains(&"a.py".to_string()));
    }

    #[tokio::test]
    async fn in_memory_provider_round_trips_by_id() {
        let provider = InMemoryMemoryProvider::new();
        let id = provider.add_memory("fixed a deadlock in the lock ordering check", None).await;
        assert!(!id.is_empty());

        let hits = provider.retrieve_memories("deadlock", None).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["id"], id);
    }
}
