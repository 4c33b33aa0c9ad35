//! The Adaptive Context Management Engine: token estimation, importance
//! scoring, budget allocation, pruning, compression, the context store,
//! background optimization, project profiling, and adaptive configuration.

pub mod background;
pub mod budget;
pub mod collaborators;
pub mod compression;
pub mod config;
pub mod engine;
pub mod error;
pub mod importance;
pub mod metrics;
pub mod monitor;
pub mod pruning;
pub mod profiler;
pub mod store;
pub mod token;
pub mod types;

pub use collaborators::{CodeAnalyzer, FileProvider, MemoryProvider, TechStackDetector, TestFrameworkProvider};
pub use engine::{AdaptiveContextEngine, EngineCollaborators};
pub use error::{CoreError, CoreResult};
pub use types::{ContextTree, TaskType};
