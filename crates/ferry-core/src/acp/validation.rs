//! Payload validation
//!
//! Shape checking is serde's job; [`Validate`] adds the few semantic rules a
//! type cannot express. Failures carry a structured [`ValidationError`] so the
//! peer sees which payload was rejected and why.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::schema::{
    AuthenticateRequest, CancelNotification, InitializeRequest, LoadSessionRequest,
    NewSessionRequest, PromptRequest,
};
use crate::error::{BridgeError, BridgeResult};
use crate::protocol::ValidationError;

/// Semantic checks beyond the payload's shape
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError {
            target: Some(field.to_string()),
            ..ValidationError::new(format!("{} must not be empty", field))
        });
    }
    Ok(())
}

impl Validate for InitializeRequest {}

impl Validate for AuthenticateRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty(&self.method_id, "methodId")
    }
}

impl Validate for NewSessionRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.cwd.is_absolute() {
            return Err(ValidationError {
                target: Some("cwd".into()),
                ..ValidationError::new(format!(
                    "cwd must be an absolute path, got {}",
                    self.cwd.display()
                ))
            });
        }
        Ok(())
    }
}

impl Validate for LoadSessionRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty(&self.session_id, "sessionId")
    }
}

impl Validate for PromptRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty(&self.session_id, "sessionId")
    }
}

impl Validate for CancelNotification {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty(&self.session_id, "sessionId")
    }
}

/// Decode and validate inbound parameters for `method`
pub fn parse_params<T>(method: &str, params: Option<Value>) -> Result<T, ValidationError>
where
    T: DeserializeOwned + Validate,
{
    let value = params.unwrap_or(Value::Null);
    let parsed: T =
        serde_json::from_value(value).map_err(|e| ValidationError::from_serde(method, &e))?;
    parsed.validate()?;
    Ok(parsed)
}

/// Decode the peer's response to a request we sent
///
/// A malformed response surfaces as invalid input naming the method.
pub fn parse_response<T>(method: &str, result: Value) -> BridgeResult<T>
where
    T: DeserializeOwned,
{
    serde_json::from_value(result).map_err(|e| {
        BridgeError::invalid_input_field(
            format!("malformed response to {}: {}", method, e),
            method,
        )
    })
}
