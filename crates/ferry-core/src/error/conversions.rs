//! From trait implementations for BridgeError conversions

use serde_json::json;

use super::types::BridgeError;
use crate::protocol::RpcError;
use crate::recovery::circuit_breaker::CircuitBreakerError;

impl From<std::io::Error> for BridgeError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(error: serde_json::Error) -> Self {
        Self::json(error.to_string())
    }
}

impl From<RpcError> for BridgeError {
    fn from(error: RpcError) -> Self {
        let details = error
            .data
            .as_ref()
            .and_then(|data| data.get("details"))
            .and_then(|details| details.as_str())
            .map(str::to_string);
        Self::Protocol {
            message: error.message,
            code: Some(error.code),
            context: details,
        }
    }
}

impl From<CircuitBreakerError<BridgeError>> for BridgeError {
    fn from(error: CircuitBreakerError<BridgeError>) -> Self {
        match error {
            CircuitBreakerError::Open {
                component,
                last_error,
            } => Self::circuit_open(component, last_error),
            CircuitBreakerError::Timeout { after, .. } => Self::timeout(after.as_millis() as u64),
            CircuitBreakerError::OperationFailed(inner) => inner,
        }
    }
}

/// Map a local failure onto the wire error taxonomy.
impl From<BridgeError> for RpcError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::InvalidInput { message, .. } => RpcError::invalid_params(Some(message)),
            BridgeError::Protocol {
                code: Some(code),
                message,
                context,
            } => {
                let error = RpcError::new(code, message);
                match context {
                    Some(details) => error.with_data(json!({ "details": details })),
                    None => error,
                }
            }
            other => RpcError::internal_error(Some(other.to_string())),
        }
    }
}
