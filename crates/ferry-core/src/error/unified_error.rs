//! UnifiedError trait implementation for BridgeError

use super::types::{BridgeError, UnifiedError};

impl UnifiedError for BridgeError {
    fn error_code(&self) -> &str {
        match self {
            Self::Config { .. } => "FERRY_CONFIG",
            Self::Protocol { .. } => "FERRY_PROTOCOL",
            Self::Transport { .. } => "FERRY_TRANSPORT",
            Self::Backend { .. } => "FERRY_BACKEND",
            Self::SessionNotFound { .. } => "FERRY_SESSION_NOT_FOUND",
            Self::InvalidInput { .. } => "FERRY_INVALID_INPUT",
            Self::Io { .. } => "FERRY_IO",
            Self::Json { .. } => "FERRY_JSON",
            Self::Timeout { .. } => "FERRY_TIMEOUT",
            Self::CircuitOpen { .. } => "FERRY_CIRCUIT_OPEN",
            Self::Cancelled => "FERRY_CANCELLED",
            Self::Other { .. } => "FERRY_OTHER",
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::Config { message, .. } => message,
            Self::Protocol { message, .. } => message,
            Self::Transport { message, .. } => message,
            Self::Backend { message, .. } => message,
            Self::SessionNotFound { session_id } => session_id,
            Self::InvalidInput { message, .. } => message,
            Self::Io { message, .. } => message,
            Self::Json { message, .. } => message,
            Self::Timeout { .. } => "Operation timed out",
            Self::CircuitOpen { component, .. } => component,
            Self::Cancelled => "Operation was cancelled",
            Self::Other { message, .. } => message,
        }
    }

    fn context(&self) -> Option<&str> {
        match self {
            Self::Config { context, .. } => context.as_deref(),
            Self::Protocol { context, .. } => context.as_deref(),
            Self::Transport { context, .. } => context.as_deref(),
            Self::Backend { context, .. } => context.as_deref(),
            Self::InvalidInput { context, .. } => context.as_deref(),
            Self::Io { context, .. } => context.as_deref(),
            Self::Json { context, .. } => context.as_deref(),
            Self::Timeout { context, .. } => context.as_deref(),
            Self::Other { context, .. } => context.as_deref(),
            Self::SessionNotFound { .. } | Self::CircuitOpen { .. } | Self::Cancelled => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Timeout { .. } | Self::CircuitOpen { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(BridgeError::config("x").error_code(), "FERRY_CONFIG");
        assert_eq!(
            BridgeError::session_not_found("s1").error_code(),
            "FERRY_SESSION_NOT_FOUND"
        );
        assert_eq!(BridgeError::Cancelled.error_code(), "FERRY_CANCELLED");
    }

    #[test]
    fn test_circuit_open_display() {
        let err = BridgeError::circuit_open("backend-probe", Some("spawn failed".into()));
        assert_eq!(
            err.to_string(),
            "Circuit is OPEN for backend-probe: spawn failed"
        );
        assert!(err.is_retryable());

        let bare = BridgeError::circuit_open("backend-probe", None);
        assert_eq!(bare.to_string(), "Circuit is OPEN for backend-probe");
    }

    #[test]
    fn test_context_is_exposed() {
        let err = BridgeError::backend_with_context("exited", "while starting chat");
        assert_eq!(err.context(), Some("while starting chat"));
        assert_eq!(err.message(), "exited");
    }
}
