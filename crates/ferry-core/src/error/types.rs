//! Core error types and traits for the bridge

use thiserror::Error;

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Unified error trait that all bridge errors implement.
///
/// - error_code(): Unique code for programmatic error identification
/// - message(): Human-readable error message
/// - context(): Optional additional context
pub trait UnifiedError: std::error::Error + Send + Sync {
    /// Get the error code for programmatic handling
    fn error_code(&self) -> &str;

    /// Get the human-readable error message
    fn message(&self) -> &str;

    /// Get optional context about the error
    fn context(&self) -> Option<&str> {
        None
    }

    /// Check if this error is retryable
    fn is_retryable(&self) -> bool {
        false
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<C: std::fmt::Display>(self, context: C) -> BridgeResult<T>;

    /// Add context lazily (only evaluated on error)
    fn with_context<C: std::fmt::Display, F: FnOnce() -> C>(self, f: F) -> BridgeResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn context<C: std::fmt::Display>(self, context: C) -> BridgeResult<T> {
        self.map_err(|e| BridgeError::other(format!("{}: {}", context, e)))
    }

    fn with_context<C: std::fmt::Display, F: FnOnce() -> C>(self, f: F) -> BridgeResult<T> {
        self.map_err(|e| BridgeError::other(format!("{}: {}", f(), e)))
    }
}

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with context message
    fn context<C: std::fmt::Display>(self, context: C) -> BridgeResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn context<C: std::fmt::Display>(self, context: C) -> BridgeResult<T> {
        self.ok_or_else(|| BridgeError::other(context.to_string()))
    }
}

/// Main error type for the bridge
#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    /// Configuration related errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        context: Option<String>,
    },

    /// Wire protocol violations and peer-reported errors
    #[error("Protocol error: {message}")]
    Protocol {
        message: String,
        code: Option<i32>,
        context: Option<String>,
    },

    /// Byte stream failures (closed pipe, write error)
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        context: Option<String>,
    },

    /// Backend process failures
    #[error("Backend error: {message}")]
    Backend {
        message: String,
        context: Option<String>,
    },

    /// Unknown session identifier
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// Invalid input errors
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        field: Option<String>,
        context: Option<String>,
    },

    /// IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        path: Option<String>,
        context: Option<String>,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        context: Option<String>,
    },

    /// Operation timeout
    #[error("Operation timed out after {millis}ms")]
    Timeout {
        millis: u64,
        context: Option<String>,
    },

    /// Circuit breaker rejected the call
    #[error("Circuit is OPEN for {component}{}", last_error.as_ref().map(|e| format!(": {}", e)).unwrap_or_default())]
    CircuitOpen {
        component: String,
        last_error: Option<String>,
    },

    /// Operation was cancelled
    #[error("Operation was cancelled")]
    Cancelled,

    /// Generic error with context
    #[error("Error: {message}")]
    Other {
        message: String,
        context: Option<String>,
    },
}
