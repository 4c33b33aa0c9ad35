//! End-to-end scenarios driven through `AdaptiveContextEngine` rather than
//! a single component in isolation.

use std::sync::Arc;
use std::time::Duration;

use fluent_context::budget::AllocationStrategy;
use fluent_context::collaborators::LocalFileProvider;
use fluent_context::engine::EngineCollaborators;
use fluent_context::AdaptiveContextEngine;

fn collaborators(root: &std::path::Path) -> EngineCollaborators {
    EngineCollaborators {
        file_provider: Arc::new(LocalFileProvider::new(root)),
        code_analyzer: None,
        tech_stack_detector: None,
        memory_provider: None,
        test_framework_provider: None,
    }
}

async fn engine_over(
    repo: &std::path::Path,
    config_dir: &std::path::Path,
    metrics_dir: &std::path::Path,
) -> AdaptiveContextEngine {
    AdaptiveContextEngine::new(repo, config_dir, metrics_dir, collaborators(repo))
        .await
        .unwrap()
}

/// S1 — gathering more files than the budget allows truncates the lowest-
/// value ones rather than failing, and the store reflects what shipped.
#[tokio::test]
async fn s1_gather_context_respects_a_tight_budget() {
    let repo = tempfile::tempdir().unwrap();
    let config_dir = tempfile::tempdir().unwrap();
    let metrics_dir = tempfile::tempdir().unwrap();

    for i in 0..10 {
        let body = format!("def handler_{i}():\n    return {i}\n").repeat(40);
        tokio::fs::write(repo.path().join(format!("f{i}.py")), body).await.unwrap();
    }
    let files: Vec<String> = (0..10).map(|i| format!("f{i}.py")).collect();

    let engine = engine_over(repo.path(), config_dir.path(), metrics_dir.path()).await;
    let tree = engine
        .gather_context(Some("refactor handlers"), None, &[], &files, &[], Some(600))
        .await;

    let estimator = fluent_context::token::TokenEstimator::new();
    let estimate = estimator.estimate_context(&tree);
    let total = estimate["total"].as_u64().unwrap_or(0);
    assert!(total <= 600, "expected allocator to respect the budget, got {total} tokens");

    let snapshot = engine.get_context().await;
    assert_eq!(snapshot, tree, "store snapshot must match what gather_context returned");
}

/// S6 — repeatedly running the optimizer pipeline against an over-budget
/// snapshot converges: each pass is no larger than the last, and it
/// eventually settles under budget without oscillating back up.
#[tokio::test]
async fn s6_repeated_optimization_converges_under_budget() {
    let repo = tempfile::tempdir().unwrap();
    let config_dir = tempfile::tempdir().unwrap();
    let metrics_dir = tempfile::tempdir().unwrap();

    for i in 0..6 {
        let body = format!("class Service{i}:\n").repeat(1) + &"    def run(self):\n        pass\n".repeat(60);
        tokio::fs::write(repo.path().join(format!("s{i}.py")), body).await.unwrap();
    }
    let files: Vec<String> = (0..6).map(|i| format!("s{i}.py")).collect();

    let engine = engine_over(repo.path(), config_dir.path(), metrics_dir.path()).await;
    engine.set_allocation_strategy(AllocationStrategy::PriorityBased).await;

    let first = engine.gather_context(None, None, &[], &files, &[], Some(400)).await;
    let estimator = fluent_context::token::TokenEstimator::new();
    let mut previous = estimator.estimate_context(&first)["total"].as_u64().unwrap_or(0);
    assert!(previous <= 400);

    for _ in 0..3 {
        let optimized = engine.optimize_context_immediately().await;
        let current = estimator.estimate_context(&optimized)["total"].as_u64().unwrap_or(0);
        assert!(current <= previous.max(400), "optimization pass grew the context: {previous} -> {current}");
        previous = current;
    }
}

/// Property: 32 concurrent readers and writers against the same engine's
/// context store for a sustained window neither deadlock nor panic.
#[tokio::test]
async fn sustained_concurrent_readers_and_writers_do_not_deadlock() {
    let repo = tempfile::tempdir().unwrap();
    let config_dir = tempfile::tempdir().unwrap();
    let metrics_dir = tempfile::tempdir().unwrap();

    let engine = Arc::new(engine_over(repo.path(), config_dir.path(), metrics_dir.path()).await);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);

    let mut handles = Vec::new();
    for i in 0..16 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let mut n = 0u64;
            while tokio::time::Instant::now() < deadline {
                let mut patch = fluent_context::types::empty_tree();
                patch.insert(format!("metadata.writer{i}"), serde_json::json!(n));
                engine.update_context(&patch).await.unwrap();
                n += 1;
                tokio::task::yield_now().await;
            }
        }));
    }
    for _ in 0..16 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            while tokio::time::Instant::now() < deadline {
                let _ = engine.get_context().await;
                tokio::task::yield_now().await;
            }
        }));
    }

    for h in handles {
        h.await.unwrap();
    }
}
