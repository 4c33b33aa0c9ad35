//! C13 — Adaptive Config Manager.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::config::schema;
use crate::config::templates::ConfigTemplateManager;
use crate::error::{CoreError, CoreResult};
use crate::metrics::MetricsCollector;
use crate::profiler::{ProjectProfiler, ProjectType, SizeBucket};
use crate::types::{get_path, set_path};

const DEFAULT_OPTIMIZATION_INTERVAL_SECS: f64 = 3600.0;
const MAX_VERSIONS_RETAINED: usize = 10;

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn timestamp_suffix() -> String {
    chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

struct ConfigState {
    active_config: Value,
    version: u64,
    last_optimization: f64,
    optimization_in_progress: bool,
}

pub struct AdaptiveConfigManager {
    state: Mutex<ConfigState>,
    config_dir: PathBuf,
    repo_path: PathBuf,
    metrics: Arc<MetricsCollector>,
    optimization_interval: f64,
}

fn template_names_for(profile_type: ProjectType, size: SizeBucket) -> (&'static str, &'static str) {
    let size_name = match size {
        SizeBucket::Small => "small",
        SizeBucket::Medium => "default",
        SizeBucket::Large => "large",
    };
    let project_name = match profile_type {
        ProjectType::WebFrontend => "web_frontend",
        ProjectType::WebBackend => "web_backend",
        ProjectType::DataScience => "data_science",
        ProjectType::CliTool => "cli_tool",
        ProjectType::Library => "library",
        ProjectType::Generic => "default",
    };
    (size_name, project_name)
}

impl AdaptiveConfigManager {
    /// Constructs the manager without touching disk; call `bootstrap()`
    /// once before use.
    pub fn new(repo_path: impl Into<PathBuf>, config_dir: impl Into<PathBuf>, metrics: Arc<MetricsCollector>) -> Self {
        AdaptiveConfigManager {
            state: Mutex::new(ConfigState {
                active_config: Value::Null,
                version: 0,
                last_optimization: now_secs(),
                optimization_in_progress: false,
            }),
            config_dir: config_dir.into(),
            repo_path: repo_path.into(),
            metrics,
            optimization_interval: DEFAULT_OPTIMIZATION_INTERVAL_SECS,
        }
    }

    fn active_config_path(&self) -> PathBuf {
        self.config_dir.join("active_config.json")
    }

    /// Loads `active_config.json` if present; otherwise profiles the repo,
    /// creates an initial configuration from the template set, validates
    /// it, and persists it as version 1.
    pub async fn bootstrap(&self) -> CoreResult<()> {
        if let Ok(content) = tokio::fs::read_to_string(self.active_config_path()).await {
            if let Ok(value) = serde_json::from_str::<Value>(&content) {
                let (ok, errors) = schema::validate(&value);
                if ok {
                    let mut state = self.state.lock().await;
                    state.active_config = value;
                    state.version = self.latest_persisted_version().await.unwrap_or(1);
                    return Ok(());
                }
                log::warn!("active_config.json failed validation, reprofiling: {errors:?}");
            }
        }

        let config = self.profile_and_create_config().await;
        self.persist_initial(config).await
    }

    async fn profile_and_create_config(&self) -> Value {
        let profiler = ProjectProfiler::new();
        match profiler.profile(&self.repo_path).await {
            Ok(profile) => {
                let manager = ConfigTemplateManager::new();
                let (size_name, project_name) = template_names_for(profile.project_type.clone(), profile.size_bucket);
                let language_name = format!("{:?}", profile.primary_language).to_ascii_lowercase();
                let candidate = if manager.get(&language_name).is_some() {
                    manager.create_for(size_name, project_name, &language_name)
                } else {
                    manager.merge(&[size_name, project_name])
                };
                candidate
            }
            Err(e) => {
                log::warn!("project profiling failed, falling back to default config: {e}");
                ConfigTemplateManager::new().get_default()
            }
        }
    }

    async fn persist_initial(&self, config: Value) -> CoreResult<()> {
        let (ok, errors) = schema::validate(&config);
        if !ok {
            return Err(CoreError::ValidationFailed(errors));
        }

        {
            let mut state = self.state.lock().await;
            state.active_config = config.clone();
            state.version = 1;
        }

        self.write_active(&config).await?;
        self.write_versioned(1, &config, "Initial configuration from project profile").await?;
        Ok(())
    }

    async fn write_active(&self, config: &Value) -> CoreResult<()> {
        tokio::fs::create_dir_all(&self.config_dir).await?;
        let content = serde_json::to_string_pretty(config)?;
        tokio::fs::write(self.active_config_path(), content).await?;
        Ok(())
    }

    async fn write_versioned(&self, version: u64, config: &Value, reason: &str) -> CoreResult<()> {
        tokio::fs::create_dir_all(&self.config_dir).await?;
        let record = json!({
            "config": config,
            "metadata": { "version": version, "timestamp": now_secs(), "reason": reason },
        });
        let filename = format!("config_v{version}_{}.json", timestamp_suffix());
        let content = serde_json::to_string_pretty(&record)?;
        tokio::fs::write(self.config_dir.join(filename), content).await?;
        self.retain_recent_versions().await;
        Ok(())
    }

    async fn retain_recent_versions(&self) {
        let Ok(mut entries) = tokio::fs::read_dir(&self.config_dir).await else { return };
        let mut files = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with("config_v") && name.ends_with(".json") {
                files.push(entry.path());
            }
        }
        files.sort();
        while files.len() > MAX_VERSIONS_RETAINED {
            let oldest = files.remove(0);
            let _ = tokio::fs::remove_file(oldest).await;
        }
    }

    async fn latest_persisted_version(&self) -> Option<u64> {
        let mut entries = tokio::fs::read_dir(&self.config_dir).await.ok()?;
        let mut max_version = None;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(rest) = name.strip_prefix("config_v") {
                if let Some((num, _)) = rest.split_once('_') {
                    if let Ok(v) = num.parse::<u64>() {
                        max_version = Some(max_version.map_or(v, |m: u64| m.max(v)));
                    }
                }
            }
        }
        max_version
    }

    pub async fn get_current_config(&self) -> Value {
        self.state.lock().await.active_config.clone()
    }

    pub async fn get_config_version(&self) -> u64 {
        self.state.lock().await.version
    }

    /// Validates, swaps the active config under lock, increments the
    /// version, and persists both the active file and a versioned record.
    /// Leaves the previous version active on any validation failure.
    pub async fn update_configuration(&self, new_config: Value, reason: &str) -> CoreResult<u64> {
        let (ok, errors) = schema::validate(&new_config);
        if !ok {
            return Err(CoreError::ValidationFailed(errors));
        }

        let new_version = {
            let mut state = self.state.lock().await;
            state.active_config = new_config.clone();
            state.version += 1;
            state.version
        };

        self.write_active(&new_config).await?;
        self.write_versioned(new_version, &new_config, reason).await?;
        Ok(new_version)
    }

    pub async fn check_optimization_needed(&self) -> bool {
        let state = self.state.lock().await;
        !state.optimization_in_progress && now_secs() - state.last_optimization >= self.optimization_interval
    }

    /// Pulls recommendations from the Metrics Collector, applies only
    /// `high`/`medium` confidence suggestions to a deep copy via
    /// dotted-path writes, and calls `update_configuration`. Declines
    /// (reverts) on any error rather than leaving a partial edit active.
    pub async fn optimize_configuration(&self) -> CoreResult<Option<u64>> {
        {
            let mut state = self.state.lock().await;
            if state.optimization_in_progress {
                return Err(CoreError::OptimizationBusy);
            }
            state.optimization_in_progress = true;
        }

        let result = self.run_optimization().await;

        {
            let mut state = self.state.lock().await;
            state.optimization_in_progress = false;
            state.last_optimization = now_secs();
        }

        result
    }

    async fn run_optimization(&self) -> CoreResult<Option<u64>> {
        let current = self.get_current_config().await;
        let suggestions = self.metrics.recommend_config_improvements(&current);

        let applicable: Vec<&Value> = suggestions
            .iter()
            .filter(|s| matches!(s.get("confidence").and_then(|c| c.as_str()), Some("high") | Some("medium")))
            .collect();

        if applicable.is_empty() {
            return Ok(None);
        }

        let mut candidate = current.clone();
        let mut applied_reasons = Vec::new();

        for suggestion in &applicable {
            let Some(path) = suggestion.get("path").and_then(|p| p.as_str()) else { continue };
            let Some(current_value) = get_path(&candidate, path).and_then(|v| v.as_f64()) else { continue };
            let ratio = suggestion.get("amount_ratio").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let action = suggestion.get("action").and_then(|v| v.as_str()).unwrap_or("increase");

            let new_value = match action {
                "increase" => current_value * (1.0 + ratio),
                "decrease" => current_value * (1.0 - ratio),
                _ => current_value,
            };

            if let Value::Object(ref mut map) = candidate {
                set_path(map, path, json!(new_value));
            }

            if let Some(reason) = suggestion.get("reason").and_then(|r| r.as_str()) {
                applied_reasons.push(reason.to_string());
            }
        }

        let (ok, errors) = schema::validate(&candidate);
        if !ok {
            log::warn!("automatic optimization produced an invalid config, declining update: {errors:?}");
            return Ok(None);
        }

        let reason = format!("Automatic optimization: {}", applied_reasons.join("; "));
        let version = self.update_configuration(candidate, &reason).await?;
        Ok(Some(version))
    }

    /// Loads a specific persisted version from disk and re-applies it as a
    /// new active version via `update_configuration`.
    pub async fn reset_to_version(&self, version: u64) -> CoreResult<u64> {
        let mut entries = tokio::fs::read_dir(&self.config_dir).await?;
        let prefix = format!("config_v{version}_");
        let mut found = None;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(&prefix) {
                found = Some(entry.path());
            }
        }

        let path = found.ok_or_else(|| CoreError::ResourceUnavailable(format!("no persisted config for version {version}")))?;
        let content = tokio::fs::read_to_string(&path).await?;
        let record: Value = serde_json::from_str(&content)?;
        let config = record
            .get("config")
            .cloned()
            .ok_or_else(|| CoreError::Internal(format!("malformed versioned record at {}", path.display())))?;

        self.update_configuration(config, &format!("Reset to version {version}")).await
    }

    pub async fn reset_to_default(&self) -> CoreResult<u64> {
        let config = self.profile_and_create_config().await;
        self.update_configuration(config, "Reset to profiled default").await
    }

    /// Versioned-record metadata (version, timestamp, reason) for every
    /// config still on disk, oldest first.
    pub async fn get_config_history(&self) -> CoreResult<Vec<Value>> {
        let mut entries = tokio::fs::read_dir(&self.config_dir).await?;
        let mut files = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with("config_v") && name.ends_with(".json") {
                files.push(entry.path());
            }
        }
        files.sort();

        let mut history = Vec::new();
        for path in files {
            if let Ok(content) = tokio::fs::read_to_string(&path).await {
                if let Ok(record) = serde_json::from_str::<Value>(&content) {
                    if let Some(metadata) = record.get("metadata") {
                        history.push(metadata.clone());
                    }
                }
            }
        }
        Ok(history)
    }

    pub async fn get_performance_summary(&self) -> Value {
        let current = self.get_current_config().await;
        self.metrics.analyze_config_performance(&current)
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> Arc<MetricsCollector> {
        Arc::new(MetricsCollector::new("/tmp/does-not-matter-metrics"))
    }

    #[tokio::test]
    async fn bootstrap_profiles_an_empty_repo_and_persists_version_one() {
        let repo = tempfile::tempdir().unwrap();
        let config_dir = tempfile::tempdir().unwrap();
        let manager = AdaptiveConfigManager::new(repo.path(), config_dir.path(), metrics());
        manager.bootstrap().await.unwrap();

        assert_eq!(manager.get_config_version().await, 1);
        let (ok, _) = schema::validate(&manager.get_current_config().await);
        assert!(ok);
        assert!(tokio::fs::metadata(config_dir.path().join("active_config.json")).await.is_ok());
    }

    #[tokio::test]
    async fn update_configuration_strictly_increments_version() {
        let repo = tempfile::tempdir().unwrap();
        let config_dir = tempfile::tempdir().unwrap();
        let manager = AdaptiveConfigManager::new(repo.path(), config_dir.path(), metrics());
        manager.bootstrap().await.unwrap();

        let v1 = manager.get_config_version().await;
        let config = manager.get_current_config().await;
        let v2 = manager.update_configuration(config, "test update").await.unwrap();
        assert_eq!(v2, v1 + 1);
    }

    #[tokio::test]
    async fn invalid_configuration_is_rejected_and_leaves_active_unchanged() {
        let repo = tempfile::tempdir().unwrap();
        let config_dir = tempfile::tempdir().unwrap();
        let manager = AdaptiveConfigManager::new(repo.path(), config_dir.path(), metrics());
        manager.bootstrap().await.unwrap();

        let before = manager.get_current_config().await;
        let mut bad = before.clone();
        if let Value::Object(ref mut map) = bad {
            set_path(map, "context_management.embedding.chunk_size", json!(1));
        }
        let result = manager.update_configuration(bad, "bad edit").await;
        assert!(result.is_err());
        assert_eq!(manager.get_current_config().await, before);
    }

    #[tokio::test]
    async fn s5_optimization_increases_chunk_overlap_when_relevance_is_low() {
        let repo = tempfile::tempdir().unwrap();
        let config_dir = tempfile::tempdir().unwrap();
        let m = metrics();
        for _ in 0..20 {
            m.log_context_relevance(0.55, "irrelevant-hash");
        }
        let manager = AdaptiveConfigManager::new(repo.path(), config_dir.path(), m);
        manager.bootstrap().await.unwrap();

        let before_overlap = get_path(&manager.get_current_config().await, "context_management.embedding.chunk_overlap")
            .and_then(|v| v.as_f64())
            .unwrap();

        let version = manager.optimize_configuration().await.unwrap();
        assert!(version.is_some());

        let history = manager.get_config_history().await.unwrap();
        let last = history.last().unwrap();
        assert!(last["reason"].as_str().unwrap().contains("Automatic optimization"));

        let after_overlap = get_path(&manager.get_current_config().await, "context_management.embedding.chunk_overlap")
            .and_then(|v| v.as_f64())
            .unwrap();
        assert!(after_overlap > before_overlap);
    }

    #[tokio::test]
    async fn reset_to_version_reapplies_a_stored_config() {
        let repo = tempfile::tempdir().unwrap();
        let config_dir = tempfile::tempdir().unwrap();
        let manager = AdaptiveConfigManager::new(repo.path(), config_dir.path(), metrics());
        manager.bootstrap().await.unwrap();

        let v1_config = manager.get_current_config().await;
        let mut v2_config = v1_config.clone();
        if let Value::Object(ref mut map) = v2_config {
            set_path(map, "context_management.embedding.chunk_size", json!(1500));
        }
        manager.update_configuration(v2_config, "bump chunk size").await.unwrap();

        let version = manager.reset_to_version(1).await.unwrap();
        assert_eq!(version, 3);
        let restored = get_path(&manager.get_current_config().await, "context_management.embedding.chunk_size")
            .and_then(|v| v.as_u64())
            .unwrap();
        let original = get_path(&v1_config, "context_management.embedding.chunk_size").and_then(|v| v.as_u64()).unwrap();
        assert_eq!(restored, original);
    }
}
