//! Error taxonomy for the adaptive context engine.
//!
//! Mirrors the failure-and-recovery policy the engine follows: most public
//! operations degrade rather than propagate, so `CoreError` is reserved for
//! the cases that genuinely stop an operation in its tracks (schema
//! rejection, an unknown strategy name, an unreadable encoding table).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration rejected by schema: {0:?}")]
    ValidationFailed(Vec<String>),

    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("compression strategy failed: {0}")]
    StrategyFailed(String),

    #[error("optimization already in progress")]
    OptimizationBusy,

    #[error("pruning blocked: all remaining candidates are protected")]
    PruningBlocked,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Internal(e.to_string())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::ResourceUnavailable(e.to_string())
    }
}
