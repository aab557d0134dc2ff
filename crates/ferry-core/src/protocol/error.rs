//! Errors exchanged with the peer

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::BridgeError;

/// Fixed error codes understood by ACP peers
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    pub const AUTH_REQUIRED: i32 = -32000;
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Create a new error
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Add data to the error
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    fn with_details(code: i32, message: impl Into<String>, details: Option<String>) -> Self {
        let error = Self::new(code, message);
        match details {
            Some(details) => error.with_data(json!({ "details": details })),
            None => error,
        }
    }

    /// Parse error (-32700)
    ///
    /// Completes the error table for peers; the connection itself logs and
    /// skips undecodable lines rather than answering them.
    pub fn parse_error(details: Option<String>) -> Self {
        Self::with_details(error_codes::PARSE_ERROR, "Parse error", details)
    }

    /// Invalid request (-32600), sent for frames that carry an `id` but are
    /// not well-formed requests
    pub fn invalid_request(details: Option<String>) -> Self {
        Self::with_details(error_codes::INVALID_REQUEST, "Invalid request", details)
    }

    /// Method not found (-32601), naming the method when known
    pub fn method_not_found(method: Option<&str>) -> Self {
        Self::with_details(
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", method.unwrap_or("unknown")),
            method.map(str::to_string),
        )
    }

    /// Invalid params (-32602)
    pub fn invalid_params(details: Option<String>) -> Self {
        Self::with_details(error_codes::INVALID_PARAMS, "Invalid params", details)
    }

    /// Internal error (-32603)
    pub fn internal_error(details: Option<String>) -> Self {
        Self::with_details(error_codes::INTERNAL_ERROR, "Internal error", details)
    }

    /// Authentication required (-32000)
    pub fn auth_required(details: Option<String>) -> Self {
        Self::with_details(error_codes::AUTH_REQUIRED, "Authentication required", details)
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}

/// Structured description of a payload that failed validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub message: String,
    /// Payload being validated (method name or response kind)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            target: None,
            line: None,
            column: None,
        }
    }

    /// Build from a serde failure while decoding `target`
    pub fn from_serde(target: impl Into<String>, error: &serde_json::Error) -> Self {
        // Value-level decoding reports 0:0, which carries no information
        let position = (error.line() > 0).then_some((error.line(), error.column()));
        Self {
            message: error.to_string(),
            target: Some(target.into()),
            line: position.map(|(line, _)| line),
            column: position.map(|(_, column)| column),
        }
    }

    /// Invalid params error carrying this description as data
    pub fn into_rpc_error(self) -> RpcError {
        let data = serde_json::to_value(&self).unwrap_or(Value::Null);
        RpcError::new(error_codes::INVALID_PARAMS, "Invalid params").with_data(data)
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.target {
            Some(target) => write!(f, "invalid {}: {}", target, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Failure returned by an inbound method handler
///
/// The connection maps each kind to exactly one error response.
#[derive(Debug, Clone)]
pub enum HandlerError {
    /// A structured protocol error, sent as is
    Rpc(RpcError),
    /// Parameters failed validation
    Validation(ValidationError),
    /// Anything else; reported as an internal error
    Internal(String),
}

impl HandlerError {
    pub fn into_rpc_error(self) -> RpcError {
        match self {
            Self::Rpc(error) => error,
            Self::Validation(error) => error.into_rpc_error(),
            Self::Internal(message) => RpcError::internal_error(Some(message)),
        }
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rpc(error) => write!(f, "{}", error),
            Self::Validation(error) => write!(f, "{}", error),
            Self::Internal(message) => write!(f, "{}", message),
        }
    }
}

impl From<RpcError> for HandlerError {
    fn from(error: RpcError) -> Self {
        Self::Rpc(error)
    }
}

impl From<ValidationError> for HandlerError {
    fn from(error: ValidationError) -> Self {
        Self::Validation(error)
    }
}

impl From<BridgeError> for HandlerError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::InvalidInput { message, field, .. } => {
                Self::Validation(ValidationError {
                    message,
                    target: field,
                    line: None,
                    column: None,
                })
            }
            BridgeError::Protocol { code: Some(_), .. } => Self::Rpc(error.into()),
            other => Self::Internal(other.to_string()),
        }
    }
}
