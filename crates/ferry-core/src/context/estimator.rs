//! Token estimation for exchanged messages
//!
//! The backend's tokenizer is unknown to the bridge, so we use a flat
//! per-character rate. Each term is rounded up independently.

use super::types::{ContextMessage, ToolCallRecord};

/// Overhead tokens per message (role, formatting)
pub const MESSAGE_OVERHEAD: usize = 4;

/// Token estimator for context messages
#[derive(Debug, Clone)]
pub struct TokenEstimator {
    /// Estimated tokens per character
    tokens_per_char: f64,
    /// Overhead tokens per message
    message_overhead: usize,
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new(0.4)
    }
}

impl TokenEstimator {
    /// Create an estimator with the given per-character rate
    pub fn new(tokens_per_char: f64) -> Self {
        Self {
            tokens_per_char,
            message_overhead: MESSAGE_OVERHEAD,
        }
    }

    /// Estimate tokens for a single message
    pub fn estimate_message(&self, message: &ContextMessage) -> usize {
        let content_tokens = self.estimate_string(&message.content);
        let tool_tokens: usize = message
            .tool_calls
            .iter()
            .map(|tc| self.estimate_tool_call(tc))
            .sum();

        content_tokens + tool_tokens + self.message_overhead
    }

    /// Estimate tokens for a tool call
    fn estimate_tool_call(&self, tool_call: &ToolCallRecord) -> usize {
        let name_tokens = self.estimate_string(&tool_call.name);
        let args_str = serde_json::to_string(&tool_call.arguments).unwrap_or_default();
        let args_tokens = self.estimate_string(&args_str);
        let result_tokens = tool_call
            .result
            .as_deref()
            .map(|r| self.estimate_string(r))
            .unwrap_or(0);
        name_tokens + args_tokens + result_tokens
    }

    /// Estimate tokens for a list of messages
    pub fn estimate_conversation<'a>(
        &self,
        messages: impl IntoIterator<Item = &'a ContextMessage>,
    ) -> usize {
        messages.into_iter().map(|m| self.estimate_message(m)).sum()
    }

    /// Estimate tokens for a string
    pub fn estimate_string(&self, text: &str) -> usize {
        (text.chars().count() as f64 * self.tokens_per_char).ceil() as usize
    }
}
