//! Wire message types
//!
//! Every inbound line is classified exactly once into a request, response or
//! notification; dispatch then matches on the resulting variant.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::RpcError;

/// JSON-RPC version
pub const JSONRPC_VERSION: &str = "2.0";

/// Request ID (can be string or number)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Number ID
    Number(i64),
    /// String ID
    String(String),
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => write!(f, "{}", s),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Request expecting exactly one response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    /// Create a new request
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params: None,
        }
    }

    /// Add parameters to the request
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }
}

/// Response to a request, carrying either a result or an error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    /// `null` only when answering a request whose id could not be read
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// Create a success response
    pub fn success(id: impl Into<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id.into()),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: impl Into<RequestId>, error: RpcError) -> Self {
        Self::rejection(Some(id.into()), error)
    }

    /// Error response that may carry a `null` id
    pub fn rejection(id: Option<RequestId>, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Check if this is a success response
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Get the result, consuming the response
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Fire-and-forget message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcNotification {
    /// Create a new notification
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: None,
        }
    }

    /// Add parameters
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }
}

/// A classified wire message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RpcMessage {
    Request(RpcRequest),
    Response(RpcResponse),
    Notification(RpcNotification),
}

/// Why an inbound line could not be turned into a message
#[derive(Debug)]
pub enum DecodeError {
    /// Not valid JSON; logged and skipped
    Parse(serde_json::Error),
    /// Valid JSON that is none of the three message shapes; logged and skipped
    Invalid(String),
    /// Carries an `id` (possibly `null`) but is not a well-formed request;
    /// the peer is owed an invalid request error
    InvalidRequest {
        id: Option<RequestId>,
        reason: String,
    },
}

impl DecodeError {
    /// The error frame owed to the peer, if any
    pub fn reply(&self) -> Option<RpcResponse> {
        match self {
            Self::InvalidRequest { id, reason } => Some(RpcResponse::rejection(
                id.clone(),
                RpcError::invalid_request(Some(reason.clone())),
            )),
            Self::Parse(_) | Self::Invalid(_) => None,
        }
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "malformed JSON: {}", e),
            Self::Invalid(reason) => write!(f, "not a request, response or notification: {}", reason),
            Self::InvalidRequest { reason, .. } => write!(f, "invalid request: {}", reason),
        }
    }
}

/// Every field any of the three shapes may carry
///
/// `id` distinguishes an absent key (`None`) from an explicit `null`
/// (`Some(None)`).
#[derive(Deserialize)]
struct Envelope {
    #[serde(default, with = "::serde_with::rust::double_option")]
    id: Option<Option<RequestId>>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

impl RpcMessage {
    /// Decode and classify one frame
    pub fn from_line(line: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(line).map_err(DecodeError::Parse)?;

        let has_id = value.get("id").is_some();
        let is_reply = value.get("method").is_none()
            && (value.get("result").is_some() || value.get("error").is_some());
        let readable_id = value
            .get("id")
            .and_then(|id| RequestId::deserialize(id).ok());

        let envelope: Envelope = match serde_json::from_value(value) {
            Ok(envelope) => envelope,
            Err(e) if has_id && !is_reply => {
                return Err(DecodeError::InvalidRequest {
                    id: readable_id,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(DecodeError::Invalid(e.to_string())),
        };

        let message = match (envelope.id, envelope.method) {
            (Some(Some(id)), Some(method)) => Self::Request(RpcRequest {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id,
                method,
                params: envelope.params,
            }),
            (Some(None), Some(_)) => {
                return Err(DecodeError::InvalidRequest {
                    id: None,
                    reason: "request id must not be null".to_string(),
                });
            }
            (None, Some(method)) => Self::Notification(RpcNotification {
                jsonrpc: JSONRPC_VERSION.to_string(),
                method,
                params: envelope.params,
            }),
            (Some(id), None) if id.is_some() || is_reply => Self::Response(RpcResponse {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id,
                result: envelope.result,
                error: envelope.error,
            }),
            (None, None) if is_reply => Self::Response(RpcResponse {
                jsonrpc: JSONRPC_VERSION.to_string(),
                id: None,
                result: envelope.result,
                error: envelope.error,
            }),
            (Some(_), None) => {
                return Err(DecodeError::InvalidRequest {
                    id: None,
                    reason: "missing method".to_string(),
                });
            }
            (None, None) => return Err(DecodeError::Invalid("no id or method".to_string())),
        };

        Ok(message)
    }

    /// Encode as one newline-terminated frame
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Get the message ID if present
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(req) => Some(&req.id),
            Self::Response(res) => res.id.as_ref(),
            Self::Notification(_) => None,
        }
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(req) => Some(&req.method),
            Self::Notification(n) => Some(&n.method),
            Self::Response(_) => None,
        }
    }
}

impl From<RpcRequest> for RpcMessage {
    fn from(request: RpcRequest) -> Self {
        Self::Request(request)
    }
}

impl From<RpcResponse> for RpcMessage {
    fn from(response: RpcResponse) -> Self {
        Self::Response(response)
    }
}

impl From<RpcNotification> for RpcMessage {
    fn from(notification: RpcNotification) -> Self {
        Self::Notification(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_request() {
        let msg = RpcMessage::from_line(r#"{"jsonrpc":"2.0","id":7,"method":"initialize","params":{}}"#)
            .unwrap();
        match msg {
            RpcMessage::Request(req) => {
                assert_eq!(req.id, RequestId::Number(7));
                assert_eq!(req.method, "initialize");
                assert_eq!(req.params, Some(json!({})));
            }
            other => panic!("expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_notification() {
        let msg = RpcMessage::from_line(r#"{"jsonrpc":"2.0","method":"session/cancel"}"#).unwrap();
        assert!(matches!(msg, RpcMessage::Notification(_)));
        assert!(msg.id().is_none());
        assert_eq!(msg.method(), Some("session/cancel"));
    }

    #[test]
    fn test_classify_responses() {
        let ok = RpcMessage::from_line(r#"{"jsonrpc":"2.0","id":"a","result":{"x":1}}"#).unwrap();
        let RpcMessage::Response(ok) = ok else {
            panic!("expected response");
        };
        assert_eq!(ok.id, Some(RequestId::from("a")));
        assert_eq!(ok.into_result().unwrap(), json!({"x": 1}));

        let null = RpcMessage::from_line(r#"{"jsonrpc":"2.0","id":3,"result":null}"#).unwrap();
        let RpcMessage::Response(null) = null else {
            panic!("expected response");
        };
        assert_eq!(null.into_result().unwrap(), Value::Null);

        let err = RpcMessage::from_line(
            r#"{"jsonrpc":"2.0","id":4,"error":{"code":-32601,"message":"Method not found: x"}}"#,
        )
        .unwrap();
        let RpcMessage::Response(err) = err else {
            panic!("expected response");
        };
        assert_eq!(err.into_result().unwrap_err().code, -32601);
    }

    #[test]
    fn test_malformed_and_shapeless_lines() {
        assert!(matches!(
            RpcMessage::from_line("{not json"),
            Err(DecodeError::Parse(_))
        ));
        assert!(matches!(
            RpcMessage::from_line(r#"{"jsonrpc":"2.0"}"#),
            Err(DecodeError::Invalid(_))
        ));
        assert!(matches!(RpcMessage::from_line("[1, 2]"), Err(DecodeError::Invalid(_))));
        assert!(RpcMessage::from_line("{not json").unwrap_err().reply().is_none());
    }

    #[test]
    fn test_null_id_request_is_invalid() {
        let err = RpcMessage::from_line(r#"{"jsonrpc":"2.0","id":null,"method":"session/prompt"}"#)
            .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidRequest { id: None, .. }));

        let reply = serde_json::to_value(err.reply().unwrap()).unwrap();
        assert_eq!(reply["id"], Value::Null);
        assert_eq!(reply["error"]["code"], crate::protocol::error::error_codes::INVALID_REQUEST);
    }

    #[test]
    fn test_wrong_field_types_keep_the_id() {
        let err = RpcMessage::from_line(r#"{"jsonrpc":"2.0","id":12,"method":42}"#).unwrap_err();
        match &err {
            DecodeError::InvalidRequest { id, .. } => assert_eq!(*id, Some(RequestId::Number(12))),
            other => panic!("expected invalid request, got {:?}", other),
        }
        let reply = serde_json::to_value(err.reply().unwrap()).unwrap();
        assert_eq!(reply["id"], 12);
        assert_eq!(reply["error"]["message"], "Invalid request");
    }

    #[test]
    fn test_error_reply_with_null_id_is_a_response() {
        let msg = RpcMessage::from_line(
            r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32700,"message":"Parse error"}}"#,
        )
        .unwrap();
        let RpcMessage::Response(response) = msg else {
            panic!("expected response");
        };
        assert!(response.id.is_none());
        assert_eq!(response.into_result().unwrap_err().code, -32700);
    }

    #[test]
    fn test_to_line_is_newline_terminated() {
        let line = RpcMessage::from(RpcNotification::new("session/update").with_params(json!({"a": 1})))
            .to_line()
            .unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        assert_eq!(
            serde_json::from_str::<Value>(line.trim()).unwrap(),
            json!({"jsonrpc": "2.0", "method": "session/update", "params": {"a": 1}})
        );
    }

    #[test]
    fn test_success_response_keeps_null_result() {
        let json = serde_json::to_value(RpcResponse::success(1i64, Value::Null)).unwrap();
        assert_eq!(json, json!({"jsonrpc": "2.0", "id": 1, "result": null}));
    }
}
