//! Context window data types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

/// Author of an exchanged message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A tool invocation attached to a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub arguments: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

/// One message retained in a context window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
}

impl ContextMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn with_tool_call(mut self, call: ToolCallRecord) -> Self {
        self.tool_calls.push(call);
        self
    }
}

/// Token accounting for one session
///
/// `current_tokens` always equals the summed estimate of `messages`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextWindow {
    pub max_tokens: usize,
    pub current_tokens: usize,
    pub messages: VecDeque<ContextMessage>,
}

impl ContextWindow {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            current_tokens: 0,
            messages: VecDeque::new(),
        }
    }

    /// Percentage of the budget in use
    pub fn percentage(&self) -> f64 {
        if self.max_tokens == 0 {
            return 0.0;
        }
        (self.current_tokens as f64 * 100.0) / self.max_tokens as f64
    }
}

/// Severity of a threshold crossing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdLevel {
    Warning,
    Critical,
}

/// Events published by the context monitor
#[derive(Debug, Clone, PartialEq)]
pub enum ContextEvent {
    /// Token total changed
    Updated {
        session_id: String,
        current_tokens: usize,
        max_tokens: usize,
    },
    /// Usage reached the warning threshold
    Warning {
        session_id: String,
        message: String,
        current_tokens: usize,
        max_tokens: usize,
    },
    /// Usage reached the critical threshold
    Critical {
        session_id: String,
        message: String,
        current_tokens: usize,
        max_tokens: usize,
    },
}
