//! Line-delimited JSON-RPC connection engine
//!
//! Provides the wire message types, the error taxonomy returned to the peer,
//! incremental line framing, and [`Connection`], which multiplexes requests,
//! responses and notifications over one inbound and one outbound byte stream.

pub mod codec;
pub mod connection;
pub mod error;
pub mod message;

pub use codec::LineDecoder;
pub use connection::{Connection, MethodHandler};
pub use error::{HandlerError, RpcError, ValidationError, error_codes};
pub use message::{
    DecodeError, JSONRPC_VERSION, RequestId, RpcMessage, RpcNotification, RpcRequest,
    RpcResponse,
};
