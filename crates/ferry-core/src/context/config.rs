//! Context monitoring configuration

use serde::{Deserialize, Serialize};

/// Default token budget per session
pub const DEFAULT_MAX_TOKENS: usize = 200_000;

/// Budget and thresholds for a session's context window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Maximum tokens per session
    pub max_tokens: usize,
    /// Emit a warning at or above this percentage of the budget
    pub warn_at_percentage: f64,
    /// Emit a critical event at or above this percentage of the budget
    pub critical_at_percentage: f64,
    /// Estimated tokens per character of text
    pub tokens_per_char: f64,
    /// Where automatic cleanup trims the window to, as a percentage
    pub cleanup_target_percentage: f64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            warn_at_percentage: 80.0,
            critical_at_percentage: 95.0,
            tokens_per_char: 0.4,
            cleanup_target_percentage: 50.0,
        }
    }
}

impl ContextConfig {
    /// Config with a custom budget and default thresholds
    pub fn with_max_tokens(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            ..Self::default()
        }
    }
}
