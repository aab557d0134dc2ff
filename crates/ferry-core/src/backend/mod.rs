//! The interactive CLI that actually does the work
//!
//! A backend is driven through a small handle: start a chat, write prompt
//! text, end the chat. Everything it prints comes back as [`BackendEvent`]s
//! on a channel that the owner drains, so output never re-enters the caller
//! through a callback.

pub mod ansi;
pub mod cli;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::BridgeResult;

pub use ansi::{clean_output, extract_content, is_connect_prompt};
pub use cli::{CliBackend, CliBackendFactory};

/// Output of a running backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// Cleaned, non-empty output text
    Message(String),
    /// Diagnostic output or a process failure
    Error(String),
    /// The interactive process exited
    Ended(Option<i32>),
}

/// Handle to one backend instance
#[async_trait]
pub trait Backend: Send + Sync {
    /// Spawn the interactive process
    async fn start_interactive_session(&self) -> BridgeResult<()>;

    /// Write one prompt to the running session
    async fn send(&self, text: &str) -> BridgeResult<()>;

    /// Terminate the running session, if any
    async fn end(&self) -> BridgeResult<()>;

    /// Whether the backend is installed and answers
    async fn check_available(&self) -> bool;

    /// Run the backend's own login flow
    async fn login(&self) -> BridgeResult<()>;

    /// Take the event receiver; only the first call gets it
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<BackendEvent>>;
}

/// Creates backends scoped to a working directory
pub trait BackendFactory: Send + Sync {
    fn create(&self, cwd: &Path) -> Arc<dyn Backend>;
}
