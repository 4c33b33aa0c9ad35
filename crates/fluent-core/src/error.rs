use std::fmt;
use std::time::Duration;

/// Shared error type for the fluent-core utility layer.
///
/// Downstream crates (notably `fluent-context`) define their own richer
/// error taxonomies; this enum only covers the concerns fluent-core itself
/// implements: configuration loading, validation, caching, and the
/// concurrency-safety helpers (lock timeouts, deadlock ordering, poison
/// recovery).
#[derive(Debug)]
pub enum FluentError {
    /// Configuration-related errors
    Config(ConfigError),

    /// Input validation errors
    Validation(ValidationError),

    /// Cache-related errors
    Cache(CacheError),

    /// A lock could not be acquired within its configured timeout
    LockTimeout(String),

    /// Internal system errors
    Internal(String),
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
    /// Missing required configuration parameter
    MissingParameter(String),

    /// Invalid configuration value
    InvalidValue {
        parameter: String,
        value: String,
        expected: String,
    },

    /// Configuration file not found
    FileNotFound(String),

    /// Invalid configuration format
    InvalidFormat(String),
}

/// Input validation errors
#[derive(Debug)]
pub enum ValidationError {
    /// Invalid input format
    InvalidFormat { input: String, expected: String },

    /// Input too long
    TooLong {
        input: String,
        length: usize,
        max_length: usize,
    },

    /// Required field missing
    MissingField(String),

    /// JSON validation failed
    JsonValidation(String),
}

/// Cache-related errors
#[derive(Debug)]
pub enum CacheError {
    /// Cache miss
    Miss(String),

    /// Cache write failed
    WriteFailed(String),

    /// Cache eviction failed
    EvictionFailed(String),
}

impl fmt::Display for FluentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FluentError::Config(e) => write!(f, "configuration error: {}", e),
            FluentError::Validation(e) => write!(f, "validation error: {}", e),
            FluentError::Cache(e) => write!(f, "cache error: {}", e),
            FluentError::LockTimeout(msg) => write!(f, "lock timeout: {}", msg),
            FluentError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingParameter(param) => {
                write!(f, "missing required parameter: {}", param)
            }
            ConfigError::InvalidValue {
                parameter,
                value,
                expected,
            } => write!(
                f,
                "invalid value '{}' for parameter '{}', expected: {}",
                value, parameter, expected
            ),
            ConfigError::FileNotFound(file) => write!(f, "configuration file not found: {}", file),
            ConfigError::InvalidFormat(msg) => write!(f, "invalid configuration format: {}", msg),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidFormat { input, expected } => {
                write!(f, "invalid format for input '{}', expected: {}", input, expected)
            }
            ValidationError::TooLong {
                input,
                length,
                max_length,
            } => write!(
                f,
                "input '{}' too long: {} characters (max: {})",
                input, length, max_length
            ),
            ValidationError::MissingField(field) => write!(f, "required field missing: {}", field),
            ValidationError::JsonValidation(msg) => write!(f, "JSON validation failed: {}", msg),
        }
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Miss(key) => write!(f, "cache miss for key: {}", key),
            CacheError::WriteFailed(msg) => write!(f, "cache write failed: {}", msg),
            CacheError::EvictionFailed(msg) => write!(f, "cache eviction failed: {}", msg),
        }
    }
}

impl std::error::Error for FluentError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for ValidationError {}
impl std::error::Error for CacheError {}

/// Result type alias for fluent-core operations
pub type FluentResult<T> = Result<T, FluentError>;

impl From<anyhow::Error> for FluentError {
    fn from(err: anyhow::Error) -> Self {
        FluentError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for FluentError {
    fn from(err: serde_json::Error) -> Self {
        FluentError::Validation(ValidationError::JsonValidation(err.to_string()))
    }
}

/// Strategy used when a `std::sync::Mutex` is found poisoned by a panicked holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoisonRecoveryStrategy {
    /// Recover the data left behind by the panicked holder and continue.
    RecoverData,
    /// Treat poisoning as a hard failure.
    Fail,
}

/// Configuration for poison-recovery behavior.
#[derive(Debug, Clone)]
pub struct PoisonHandlingConfig {
    pub strategy: PoisonRecoveryStrategy,
    pub log_poison_events: bool,
}

impl PoisonHandlingConfig {
    /// Recover and keep going; this is the default used throughout the core.
    pub fn recover_data() -> Self {
        Self {
            strategy: PoisonRecoveryStrategy::RecoverData,
            log_poison_events: true,
        }
    }
}

/// Configuration for lock-timeout monitoring.
#[derive(Debug, Clone)]
pub struct LockTimeoutConfig {
    pub timeout: Duration,
    pub max_waiters_warning_threshold: u32,
    pub log_timeout_events: bool,
}

impl LockTimeoutConfig {
    /// Generous default used for the Context Store's write lock.
    pub fn default_timeout() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_waiters_warning_threshold: 8,
            log_timeout_events: true,
        }
    }

    /// Short timeout, mainly useful in tests.
    pub fn short_timeout() -> Self {
        Self {
            timeout: Duration::from_millis(200),
            max_waiters_warning_threshold: 4,
            log_timeout_events: false,
        }
    }
}
