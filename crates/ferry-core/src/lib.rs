//! Ferry Core Library
//!
//! This crate provides the core of the Ferry ACP bridge: the JSON-RPC
//! connection engine, the ACP schema, the session orchestrator, context
//! window accounting, circuit breaking, and the backend CLI driver.

pub mod acp;
pub mod agent;
pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod protocol;
pub mod recovery;

// Re-export commonly used types
pub use acp::{Agent, AgentSideConnection, Client, ClientHandle};
pub use agent::{BridgeAgent, ExecutionPlan, PermissionMode, Session};
pub use backend::{Backend, BackendEvent, BackendFactory, CliBackend, CliBackendFactory};
pub use config::{BridgeConfig, ConfigLoader, ConfigOverrides};
pub use context::{ContextConfig, ContextMonitor};
pub use error::{BridgeError, BridgeResult, UnifiedError};
pub use protocol::{Connection, MethodHandler, RpcError};
pub use recovery::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
