//! Context window accounting for bridged conversations
//!
//! The backend CLI owns the real model context, so the bridge can only
//! approximate usage. This module keeps a per-session token estimate of
//! everything exchanged and raises threshold events when the budget runs low.
//!
//! # Example
//!
//! ```rust,ignore
//! use ferry_core::context::{ContextConfig, ContextMessage, ContextMonitor};
//!
//! let mut monitor = ContextMonitor::new(ContextConfig::default());
//! monitor.create_context_window("session-1");
//! monitor.add_message("session-1", ContextMessage::assistant("Done."))?;
//! println!("{:.1}% used", monitor.token_percentage("session-1"));
//! ```

pub mod config;
pub mod estimator;
pub mod monitor;
pub mod types;

pub use config::ContextConfig;
pub use estimator::TokenEstimator;
pub use monitor::ContextMonitor;
pub use types::{
    ContextEvent, ContextMessage, ContextWindow, MessageRole, ThresholdLevel, ToolCallRecord,
};
