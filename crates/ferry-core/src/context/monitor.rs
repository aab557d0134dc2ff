//! Per-session context window monitor

use std::collections::HashMap;

use tokio::sync::broadcast;

use super::config::ContextConfig;
use super::estimator::TokenEstimator;
use super::types::{ContextEvent, ContextMessage, ContextWindow, ThresholdLevel};
use crate::error::{BridgeError, BridgeResult};

const EVENT_CAPACITY: usize = 64;

/// Tracks estimated token usage for one or more sessions
///
/// Events are published on a broadcast channel; having no subscribers is
/// not an error.
#[derive(Debug)]
pub struct ContextMonitor {
    config: ContextConfig,
    estimator: TokenEstimator,
    windows: HashMap<String, ContextWindow>,
    events: broadcast::Sender<ContextEvent>,
}

impl ContextMonitor {
    pub fn new(config: ContextConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            estimator: TokenEstimator::new(config.tokens_per_char),
            config,
            windows: HashMap::new(),
            events,
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Subscribe to threshold and update events
    pub fn subscribe(&self) -> broadcast::Receiver<ContextEvent> {
        self.events.subscribe()
    }

    /// Create (or replace) an empty window for a session
    pub fn create_context_window(&mut self, session_id: &str) -> &ContextWindow {
        self.windows
            .insert(session_id.to_string(), ContextWindow::new(self.config.max_tokens));
        &self.windows[session_id]
    }

    pub fn context_window(&self, session_id: &str) -> Option<&ContextWindow> {
        self.windows.get(session_id)
    }

    /// Append a message, returning the threshold reached, if any
    pub fn add_message(
        &mut self,
        session_id: &str,
        message: ContextMessage,
    ) -> BridgeResult<Option<ThresholdLevel>> {
        let tokens = self.estimator.estimate_message(&message);
        let window = self
            .windows
            .get_mut(session_id)
            .ok_or_else(|| BridgeError::session_not_found(session_id))?;

        window.messages.push_back(message);
        window.current_tokens += tokens;

        self.publish_update(session_id);
        Ok(self.check_thresholds(session_id))
    }

    /// Replace the whole message list and recompute the total
    pub fn update_context(
        &mut self,
        session_id: &str,
        messages: Vec<ContextMessage>,
    ) -> BridgeResult<Option<ThresholdLevel>> {
        let total = self.estimator.estimate_conversation(&messages);
        let window = self
            .windows
            .get_mut(session_id)
            .ok_or_else(|| BridgeError::session_not_found(session_id))?;

        window.messages = messages.into();
        window.current_tokens = total;

        self.publish_update(session_id);
        Ok(self.check_thresholds(session_id))
    }

    /// Percentage of the budget in use; 0 for unknown sessions
    pub fn token_percentage(&self, session_id: &str) -> f64 {
        self.windows
            .get(session_id)
            .map(ContextWindow::percentage)
            .unwrap_or(0.0)
    }

    /// Drop oldest messages until usage is at or below `target_percentage`
    ///
    /// Returns the number of messages removed.
    pub fn cleanup_context(&mut self, session_id: &str, target_percentage: f64) -> usize {
        let Some(window) = self.windows.get_mut(session_id) else {
            return 0;
        };

        let target = (window.max_tokens as f64 * target_percentage / 100.0).floor() as usize;
        let mut removed = 0;

        while window.current_tokens > target {
            let Some(oldest) = window.messages.pop_front() else {
                break;
            };
            let tokens = self.estimator.estimate_message(&oldest);
            window.current_tokens = window.current_tokens.saturating_sub(tokens);
            removed += 1;
        }

        if removed > 0 {
            tracing::debug!(
                session_id,
                removed,
                current_tokens = window.current_tokens,
                "Trimmed context window"
            );
            self.publish_update(session_id);
        }

        removed
    }

    pub fn remove_context_window(&mut self, session_id: &str) -> bool {
        self.windows.remove(session_id).is_some()
    }

    fn publish_update(&self, session_id: &str) {
        if let Some(window) = self.windows.get(session_id) {
            let _ = self.events.send(ContextEvent::Updated {
                session_id: session_id.to_string(),
                current_tokens: window.current_tokens,
                max_tokens: window.max_tokens,
            });
        }
    }

    fn check_thresholds(&self, session_id: &str) -> Option<ThresholdLevel> {
        let window = self.windows.get(session_id)?;
        let percentage = window.percentage();
        let current_tokens = window.current_tokens;
        let max_tokens = window.max_tokens;

        if percentage >= self.config.critical_at_percentage {
            let message = format!(
                "Context window critical: {:.1}% used ({}/{} tokens)",
                percentage, current_tokens, max_tokens
            );
            tracing::warn!(session_id, "{}", message);
            let _ = self.events.send(ContextEvent::Critical {
                session_id: session_id.to_string(),
                message,
                current_tokens,
                max_tokens,
            });
            Some(ThresholdLevel::Critical)
        } else if percentage >= self.config.warn_at_percentage {
            let message = format!(
                "Context window warning: {:.1}% used ({}/{} tokens)",
                percentage, current_tokens, max_tokens
            );
            tracing::info!(session_id, "{}", message);
            let _ = self.events.send(ContextEvent::Warning {
                session_id: session_id.to_string(),
                message,
                current_tokens,
                max_tokens,
            });
            Some(ThresholdLevel::Warning)
        } else {
            None
        }
    }
}
