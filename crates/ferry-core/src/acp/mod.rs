//! Agent Client Protocol surface
//!
//! Typed payloads for every ACP method the bridge speaks, parameter
//! validation, and the glue that binds an [`Agent`] implementation to a
//! [`Connection`](crate::protocol::Connection).

pub mod agent_side;
pub mod schema;
pub mod validation;

pub use agent_side::{Agent, AgentSideConnection, Client, ClientHandle};
pub use schema::*;
pub use validation::{Validate, parse_params, parse_response};
