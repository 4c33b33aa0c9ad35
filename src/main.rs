use std::sync::Arc;

use clap::{Parser, Subcommand};
use fluent_context::collaborators::{InMemoryMemoryProvider, LocalFileProvider};
use fluent_context::engine::EngineCollaborators;
use fluent_context::{AdaptiveContextEngine, MemoryProvider};

/// Minimal driver for the adaptive context engine: wires a local file
/// provider into the engine and exposes a couple of commands for manual
/// exercising. Not a replacement for a host's own command dispatch.
#[derive(Parser)]
#[command(name = "fluent-context-demo")]
struct Cli {
    /// Repository root to operate against; defaults to the current directory.
    #[arg(long, default_value = ".")]
    repo: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Gather context from the given files and print the resulting
    /// token-estimate tree.
    Gather {
        #[arg(long)]
        task: Option<String>,
        #[arg(long = "file")]
        files: Vec<String>,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Record a short note in the in-process memory store and immediately
    /// recall it, to exercise the memory-provider collaborator seam.
    Remember {
        text: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the currently active configuration.
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let repo_path = std::path::PathBuf::from(&cli.repo);
    let config_dir = repo_path.join(".agent_s3").join("config");
    let metrics_dir = repo_path.join(".agent_s3").join("metrics");

    let memory_provider = Arc::new(InMemoryMemoryProvider::new());

    let collaborators = EngineCollaborators {
        file_provider: Arc::new(LocalFileProvider::new(&repo_path)),
        code_analyzer: None,
        tech_stack_detector: None,
        memory_provider: Some(memory_provider.clone()),
        test_framework_provider: None,
    };

    let engine = AdaptiveContextEngine::new(&repo_path, &config_dir, &metrics_dir, collaborators)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    match cli.command {
        Command::Gather { task, files } => {
            let tree = engine.gather_context(task.as_deref(), None, &[], &files, &[], None).await;
            let estimator = fluent_context::token::TokenEstimator::new();
            let estimate = estimator.estimate_context(&tree);
            println!("{}", serde_json::to_string_pretty(&estimate)?);
        }
        Command::Config { action } => match action {
            ConfigAction::Show => {
                let config = engine.get_current_config().await;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        },
        Command::Remember { text } => {
            let id = memory_provider.add_memory(&text, None).await;
            let hits = memory_provider.retrieve_memories(&text, Some(5)).await;
            println!("stored as {id}");
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
    }

    Ok(())
}
