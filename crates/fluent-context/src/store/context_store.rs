//! C8 — Context Store.
//!
//! The single mutable context tree, behind a `tokio::sync::RwLock` guarded
//! by `fluent_core`'s lock-timeout monitoring so contention and timeouts on
//! the one broadly shared mutable structure are observable.

use std::sync::Arc;

use fluent_core::error::{FluentError, LockTimeoutConfig};
use fluent_core::lock_timeout::{LockContentionMonitor, LockTimeoutUtils};
use serde_json::Value;

use crate::error::CoreError;
use crate::types::{empty_tree, get_path_in_map, set_path, ContextTree};

fn to_core_error(e: FluentError) -> CoreError {
    CoreError::Internal(e.to_string())
}

pub struct ContextStore {
    tree: Arc<tokio::sync::RwLock<ContextTree>>,
    timeout_config: LockTimeoutConfig,
    monitor: LockContentionMonitor,
}

impl ContextStore {
    pub fn new() -> Self {
        ContextStore {
            tree: Arc::new(tokio::sync::RwLock::new(empty_tree())),
            timeout_config: LockTimeoutConfig::default_timeout(),
            monitor: LockContentionMonitor::new(),
        }
    }

    /// Deep copy of the canonical tree under the read lock.
    pub async fn get_snapshot(&self) -> ContextTree {
        LockTimeoutUtils::execute_read_with_timeout_and_monitoring(
            &self.tree,
            "context_store.get_snapshot",
            &self.timeout_config,
            Some(&self.monitor),
            |tree| Ok(tree.clone()),
        )
        .await
        .unwrap_or_else(|e| {
            log::warn!("get_snapshot degraded to a fresh empty tree after a lock timeout: {e}");
            empty_tree()
        })
    }

    pub async fn get_path(&self, path: &str) -> Option<Value> {
        let tree = self.get_snapshot().await;
        get_path_in_map(&tree, path).cloned()
    }

    /// Writes each `(dotted_path, value)` pair in `patch`, creating missing
    /// intermediate objects as needed.
    pub async fn update(&self, patch: &ContextTree) -> Result<(), CoreError> {
        let patch = patch.clone();
        LockTimeoutUtils::execute_write_with_timeout_and_monitoring(
            &self.tree,
            "context_store.update",
            &self.timeout_config,
            Some(&self.monitor),
            |tree| {
                for (path, value) in &patch {
                    set_path(tree, path, value.clone());
                }
                Ok(())
            },
        )
        .await
        .map_err(to_core_error)
    }

    pub async fn clear(&self) -> Result<(), CoreError> {
        LockTimeoutUtils::execute_write_with_timeout_and_monitoring(
            &self.tree,
            "context_store.clear",
            &self.timeout_config,
            Some(&self.monitor),
            |tree| {
                *tree = empty_tree();
                Ok(())
            },
        )
        .await
        .map_err(to_core_error)
    }

    /// Atomically swaps in a newly computed tree — used by the Background
    /// Optimizer, which computes off-lock and reacquires only to install.
    pub async fn replace(&self, new_tree: ContextTree) -> Result<(), CoreError> {
        LockTimeoutUtils::execute_write_with_timeout_and_monitoring(
            &self.tree,
            "context_store.replace",
            &self.timeout_config,
            Some(&self.monitor),
            |tree| {
                *tree = new_tree.clone();
                Ok(())
            },
        )
        .await
        .map_err(to_core_error)
    }

    pub fn contention_stats(&self) -> fluent_core::lock_timeout::LockContentionStats {
        self.monitor.get_stats()
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn update_then_snapshot_observes_patch() {
        let store = ContextStore::new();
        let mut patch = empty_tree();
        patch.insert("code_context.a.py".to_string(), json!("x = 1"));
        store.update(&patch).await.unwrap();

        let snapshot = store.get_snapshot().await;
        assert_eq!(
            get_path_in_map(&snapshot, "code_context.a.py"),
            Some(&json!("x = 1"))
        );
    }

    #[tokio::test]
    async fn clear_resets_to_empty() {
        let store = ContextStore::new();
        let mut patch = empty_tree();
        patch.insert("metadata".to_string(), json!("note"));
        store.update(&patch).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.get_snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_readers_and_writers_do_not_deadlock() {
        let store = Arc::new(ContextStore::new());
        let mut handles = Vec::new();

        for i in 0..16 {
            let s = store.clone();
            handles.push(tokio::spawn(async move {
                let mut patch = empty_tree();
                patch.insert(format!("metadata.k{i}"), json!(i));
                s.update(&patch).await.unwrap();
            }));
        }
        for i in 0..16 {
            let s = store.clone();
            handles.push(tokio::spawn(async move {
                let _ = s.get_path(&format!("metadata.k{i}")).await;
            }));
        }

        for h in handles {
            h.await.unwrap();
        }
    }
}
