//! The host-facing facade: `AdaptiveContextEngine` wires the thirteen
//! components together behind the API of §6. Collaborators are injected
//! by the host; the engine itself never reads files, calls a model, or
//! executes code.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::background::BackgroundOptimizer;
use crate::budget::{AllocationStrategy, Budget, BudgetAllocator};
use crate::collaborators::{CodeAnalyzer, FileProvider, MemoryProvider, TechStackDetector, TestFrameworkProvider};
use crate::compression::CompressionManager;
use crate::config::{AdaptiveConfigManager, ConfigTemplateManager};
use crate::error::CoreResult;
use crate::metrics::MetricsCollector;
use crate::monitor::{SizeMonitor, ThresholdAlert};
use crate::pruning::PruningEngine;
use crate::store::ContextStore;
use crate::token::TokenEstimator;
use crate::types::{empty_tree, ContextTree, TaskType};

const DEFAULT_MAX_TOKENS: u64 = 8000;
const DEFAULT_RESERVED_TOKENS: u64 = 500;

pub struct AdaptiveContextEngine {
    store: Arc<ContextStore>,
    allocator: Arc<BudgetAllocator>,
    pruning: Arc<PruningEngine>,
    compression: Arc<CompressionManager>,
    monitor: Mutex<SizeMonitor>,
    metrics: Arc<MetricsCollector>,
    adaptive_config: RwLock<Arc<AdaptiveConfigManager>>,
    allocation_strategy: Mutex<AllocationStrategy>,
    background: Mutex<Option<BackgroundOptimizer>>,

    file_provider: Arc<dyn FileProvider>,
    code_analyzer: Option<Arc<dyn CodeAnalyzer>>,
    tech_stack_detector: Option<Arc<dyn TechStackDetector>>,
    memory_provider: Option<Arc<dyn MemoryProvider>>,
    test_framework_provider: Option<Arc<dyn TestFrameworkProvider>>,
}

pub struct EngineCollaborators {
    pub file_provider: Arc<dyn FileProvider>,
    pub code_analyzer: Option<Arc<dyn CodeAnalyzer>>,
    pub tech_stack_detector: Option<Arc<dyn TechStackDetector>>,
    pub memory_provider: Option<Arc<dyn MemoryProvider>>,
    pub test_framework_provider: Option<Arc<dyn TestFrameworkProvider>>,
}

impl AdaptiveContextEngine {
    pub async fn new(
        repo_path: impl Into<std::path::PathBuf>,
        config_dir: impl Into<std::path::PathBuf>,
        metrics_dir: impl Into<std::path::PathBuf>,
        collaborators: EngineCollaborators,
    ) -> CoreResult<Self> {
        let metrics = Arc::new(MetricsCollector::new(metrics_dir));
        let adaptive_config = Arc::new(AdaptiveConfigManager::new(repo_path, config_dir, metrics.clone()));
        adaptive_config.bootstrap().await?;

        let max_tokens = adaptive_config
            .get_current_config()
            .await
            .get("CONTEXT_BACKGROUND_OPT_TARGET_TOKENS")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        Ok(AdaptiveContextEngine {
            store: Arc::new(ContextStore::new()),
            allocator: Arc::new(BudgetAllocator::new()),
            pruning: Arc::new(PruningEngine::new()),
            compression: Arc::new(CompressionManager::new(Default::default(), 2000, 0.9)),
            monitor: Mutex::new(SizeMonitor::new(max_tokens)),
            metrics,
            adaptive_config: RwLock::new(adaptive_config),
            allocation_strategy: Mutex::new(AllocationStrategy::default()),
            background: Mutex::new(None),
            file_provider: collaborators.file_provider,
            code_analyzer: collaborators.code_analyzer,
            tech_stack_detector: collaborators.tech_stack_detector,
            memory_provider: collaborators.memory_provider,
            test_framework_provider: collaborators.test_framework_provider,
        })
    }

    fn budget_for(&self, max_tokens: Option<u64>) -> Budget {
        Budget {
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            reserved_tokens: DEFAULT_RESERVED_TOKENS,
        }
    }

    /// Assembles a context tree from the requested files plus task
    /// metadata, allocates it against the budget, installs the result as
    /// the canonical snapshot, and returns it.
    pub async fn gather_context(
        &self,
        task_description: Option<&str>,
        task_type: Option<&str>,
        task_keywords: &[String],
        current_files: &[String],
        related_files: &[String],
        max_tokens: Option<u64>,
    ) -> ContextTree {
        let mut tree = empty_tree();
        let mut code = serde_json::Map::new();

        for path in current_files.iter().chain(related_files.iter()) {
            if let Some(content) = self.file_provider.read_file(path).await {
                code.insert(path.clone(), Value::String(content));
            }
        }
        if !code.is_empty() {
            tree.insert("code_context".to_string(), Value::Object(code));
        }
        if let Some(desc) = task_description {
            tree.insert("metadata".to_string(), Value::String(desc.to_string()));
        }

        let task_type_parsed = task_type.map(TaskType::parse);
        let strategy = *self.allocation_strategy.lock().await;
        let effective_task_type = match strategy {
            AllocationStrategy::TaskAdaptive => task_type_parsed.as_ref(),
            AllocationStrategy::PriorityBased => None,
        };

        let budget = self.budget_for(max_tokens);
        let result = self.allocator.allocate(&tree, effective_task_type, task_keywords, false, budget);
        let mut optimized = result.optimized_context;

        if self.compression.need_compression(&optimized, None) {
            optimized = self.compression.compress(&optimized, None, false);
        }

        {
            let mut monitor = self.monitor.lock().await;
            let alerts = monitor.update(&optimized);
            for alert in alerts {
                self.log_threshold_alert(&alert);
            }
        }

        let mut patch = empty_tree();
        for (key, value) in &optimized {
            patch.insert(key.clone(), value.clone());
        }
        let _ = self.store.clear().await;
        let _ = self.store.update(&patch).await;

        optimized
    }

    fn log_threshold_alert(&self, alert: &ThresholdAlert) {
        log::warn!(
            "context size crossed {:.0}% of budget: {}/{} tokens",
            alert.ratio * 100.0,
            alert.current_usage,
            alert.max_tokens
        );
    }

    pub async fn update_context(&self, patch: &ContextTree) -> CoreResult<()> {
        self.store.update(patch).await.map_err(Into::into)
    }

    pub async fn get_context(&self) -> ContextTree {
        self.store.get_snapshot().await
    }

    pub async fn clear_context(&self) -> CoreResult<()> {
        self.store.clear().await.map_err(Into::into)
    }

    /// Pure transform: allocate, prune if still over budget, compress. Does
    /// not touch the Context Store.
    pub async fn optimize_context(&self, context: &ContextTree, max_tokens: Option<u64>) -> ContextTree {
        let budget = self.budget_for(max_tokens);
        let estimator = TokenEstimator::new();

        let allocation = self.allocator.allocate(context, None, &[], false, budget);
        let mut optimized = allocation.optimized_context;

        let current = estimator.estimate_context(&optimized)["total"].as_u64().unwrap_or(0);
        if current > budget.available() {
            self.pruning.prune(&mut optimized, current, budget.available());
        }

        if self.compression.need_compression(&optimized, None) {
            optimized = self.compression.compress(&optimized, None, false);
        }

        optimized
    }

    /// Runs the same pipeline directly against the live snapshot and
    /// installs the result.
    pub async fn optimize_context_immediately(&self) -> ContextTree {
        let snapshot = self.store.get_snapshot().await;
        let optimized = self.optimize_context(&snapshot, None).await;
        let _ = self.store.replace(optimized.clone()).await;
        optimized
    }

    pub async fn set_allocation_strategy(&self, strategy: AllocationStrategy) {
        *self.allocation_strategy.lock().await = strategy;
    }

    pub async fn set_adaptive_config_manager(&self, manager: Arc<AdaptiveConfigManager>) {
        *self.adaptive_config.write().await = manager;
    }

    pub async fn get_dependency_graph(&self) -> Value {
        match &self.code_analyzer {
            Some(analyzer) => analyzer.get_dependency_graph().await,
            None => Value::Object(Default::default()),
        }
    }

    pub async fn get_file_content(&self, path: &str) -> Option<String> {
        self.file_provider.read_file(path).await
    }

    pub async fn get_relevant_files(&self, query: &str) -> Vec<String> {
        match &self.code_analyzer {
            Some(analyzer) => analyzer.find_relevant_files(query).await,
            None => self.file_provider.list_files(query, true).await,
        }
    }

    pub fn memory_provider(&self) -> Option<&Arc<dyn MemoryProvider>> {
        self.memory_provider.as_ref()
    }

    pub fn tech_stack_detector(&self) -> Option<&Arc<dyn TechStackDetector>> {
        self.tech_stack_detector.as_ref()
    }

    pub fn test_framework_provider(&self) -> Option<&Arc<dyn TestFrameworkProvider>> {
        self.test_framework_provider.as_ref()
    }

    // --- Adaptive configuration surface ---

    pub async fn get_current_config(&self) -> Value {
        self.adaptive_config.read().await.get_current_config().await
    }

    pub async fn get_config_version(&self) -> u64 {
        self.adaptive_config.read().await.get_config_version().await
    }

    pub async fn update_configuration(&self, config: Value, reason: &str) -> CoreResult<u64> {
        self.adaptive_config.read().await.update_configuration(config, reason).await
    }

    pub async fn reset_to_version(&self, version: u64) -> CoreResult<u64> {
        self.adaptive_config.read().await.reset_to_version(version).await
    }

    pub async fn reset_to_default(&self) -> CoreResult<u64> {
        self.adaptive_config.read().await.reset_to_default().await
    }

    pub async fn get_config_history(&self) -> CoreResult<Vec<Value>> {
        self.adaptive_config.read().await.get_config_history().await
    }

    pub async fn get_performance_summary(&self) -> Value {
        self.adaptive_config.read().await.get_performance_summary().await
    }

    pub fn config_templates(&self) -> ConfigTemplateManager {
        ConfigTemplateManager::new()
    }

    // --- Metrics surface ---

    pub fn log_token_usage(&self, section: &str, tokens: u64) {
        self.metrics.log_token_usage(section, tokens);
    }

    pub fn log_search_relevance(&self, query: &str, relevance: f64) {
        self.metrics.log_search_relevance(query, relevance);
    }

    pub fn log_summarization_quality(&self, path: &str, compression_ratio: f64) {
        self.metrics.log_summarization_quality(path, compression_ratio);
    }

    pub fn log_response_latency(&self, operation: &str, seconds: f64) {
        self.metrics.log_response_latency(operation, seconds);
    }

    pub fn log_embedding_latency(&self, seconds: f64) {
        self.metrics.log_embedding_latency(seconds);
    }

    pub fn log_optimization_duration(&self, seconds: f64) {
        self.metrics.log_optimization_duration(seconds);
    }

    pub fn log_context_relevance(&self, relevance: f64, config_hash: &str) {
        self.metrics.log_context_relevance(relevance, config_hash);
    }

    pub fn get_metrics_summary(&self) -> Value {
        self.metrics.get_metrics_summary()
    }

    pub fn recommend_config_improvements(&self, config: &Value) -> Vec<Value> {
        self.metrics.recommend_config_improvements(config)
    }

    pub fn analyze_config_performance(&self, config: &Value) -> Value {
        self.metrics.analyze_config_performance(config)
    }

    pub fn calculate_trend(&self, kind: &str, field: &str) -> Value {
        self.metrics.calculate_trend(kind, field)
    }

    // --- Background optimizer lifecycle ---

    pub async fn start_background_optimizer(&self, interval: Duration, target_tokens: u64) {
        let mut guard = self.background.lock().await;
        if guard.is_some() {
            return;
        }
        *guard = Some(BackgroundOptimizer::spawn(
            self.store.clone(),
            self.allocator.clone(),
            self.pruning.clone(),
            self.compression.clone(),
            interval,
            target_tokens,
            Duration::from_secs(5),
        ));
    }

    pub async fn stop_background_optimizer(&self) {
        let optimizer = self.background.lock().await.take();
        if let Some(optimizer) = optimizer {
            optimizer.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::LocalFileProvider;

    fn collaborators(root: &std::path::Path) -> EngineCollaborators {
        EngineCollaborators {
            file_provider: Arc::new(LocalFileProvider::new(root)),
            code_analyzer: None,
            tech_stack_detector: None,
            memory_provider: None,
            test_framework_provider: None,
        }
    }

    #[tokio::test]
    async fn gather_context_reads_files_and_installs_snapshot() {
        let repo = tempfile::tempdir().unwrap();
        let config_dir = tempfile::tempdir().unwrap();
        let metrics_dir = tempfile::tempdir().unwrap();
        tokio::fs::write(repo.path().join("a.py"), "x = 1\n").await.unwrap();

        let engine = AdaptiveContextEngine::new(repo.path(), config_dir.path(), metrics_dir.path(), collaborators(repo.path()))
            .await
            .unwrap();

        let tree = engine.gather_context(Some("investigate bug"), None, &[], &["a.py".to_string()], &[], None).await;
        assert!(tree["code_context"]["a.py"].is_string());

        let snapshot = engine.get_context().await;
        assert_eq!(snapshot, tree);
    }

    #[tokio::test]
    async fn update_configuration_round_trips_through_engine() {
        let repo = tempfile::tempdir().unwrap();
        let config_dir = tempfile::tempdir().unwrap();
        let metrics_dir = tempfile::tempdir().unwrap();

        let engine = AdaptiveContextEngine::new(repo.path(), config_dir.path(), metrics_dir.path(), collaborators(repo.path()))
            .await
            .unwrap();

        let v1 = engine.get_config_version().await;
        let config = engine.get_current_config().await;
        let v2 = engine.update_configuration(config, "manual test update").await.unwrap();
        assert_eq!(v2, v1 + 1);
    }
}
