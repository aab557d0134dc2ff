//! Bridge configuration model

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::context::ContextConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::recovery::CircuitBreakerConfig;

/// How much the backend may do without asking the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Ask before edits and commands
    #[default]
    Default,
    /// Apply file edits without asking
    AcceptEdits,
    /// Never ask
    BypassPermissions,
    /// Plan only, make no changes
    Plan,
}

impl PermissionMode {
    pub const ALL: [PermissionMode; 4] = [
        PermissionMode::Default,
        PermissionMode::AcceptEdits,
        PermissionMode::BypassPermissions,
        PermissionMode::Plan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::BypassPermissions => "bypassPermissions",
            Self::Plan => "plan",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Default => "Ask for permission before file edits and commands",
            Self::AcceptEdits => "Apply file edits automatically, ask for everything else",
            Self::BypassPermissions => "Never ask for permission",
            Self::Plan => "Analyse and plan only, without making changes",
        }
    }
}

impl fmt::Display for PermissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                BridgeError::config(format!(
                    "Invalid permission mode \"{}\" (expected one of: default, acceptEdits, bypassPermissions, plan)",
                    s
                ))
            })
    }
}

/// The interactive CLI the bridge drives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Executable name or path
    pub executable: String,
    /// Extra arguments appended after the model flag
    pub args: Vec<String>,
    /// Model passed as `--model`
    pub model: Option<String>,
    /// Extra environment for the child process
    pub env: HashMap<String, String>,
    /// Bound on `--version` probes
    pub probe_timeout_secs: u64,
    /// Bound on the interactive login flow
    pub login_timeout_secs: u64,
    /// Answer the editor-connection prompt automatically
    pub auto_dismiss_prompts: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            executable: "qwen".to_string(),
            args: Vec::new(),
            model: None,
            env: HashMap::new(),
            probe_timeout_secs: 30,
            login_timeout_secs: 300,
            auto_dismiss_prompts: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (pretty, json)
    pub format: String,
    /// Write logs here instead of stderr
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            log_file: None,
        }
    }
}

/// Top-level bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub backend: BackendConfig,
    pub permission_mode: PermissionMode,
    /// Prompts accepted per session; 0 means unlimited
    pub max_turns: u32,
    /// Emit thought chunks for complex prompts
    pub thought_streaming: bool,
    pub context: ContextConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub logging: LoggingConfig,
    pub debug: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            permission_mode: PermissionMode::default(),
            max_turns: 100,
            thought_streaming: true,
            context: ContextConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            logging: LoggingConfig::default(),
            debug: false,
        }
    }
}

impl BridgeConfig {
    /// Effective log level, with `debug` taking precedence
    pub fn log_level(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.logging.level
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> BridgeResult<()> {
        if self.backend.executable.trim().is_empty() {
            return Err(BridgeError::config("backend.executable must not be empty"));
        }

        let context = &self.context;
        if context.max_tokens == 0 {
            return Err(BridgeError::config("context.max_tokens must be greater than 0"));
        }
        if context.tokens_per_char <= 0.0 {
            return Err(BridgeError::config(
                "context.tokens_per_char must be greater than 0",
            ));
        }
        for (name, value) in [
            ("warn_at_percentage", context.warn_at_percentage),
            ("critical_at_percentage", context.critical_at_percentage),
            ("cleanup_target_percentage", context.cleanup_target_percentage),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(BridgeError::config(format!(
                    "context.{} must be between 0 and 100, got {}",
                    name, value
                )));
            }
        }
        if context.warn_at_percentage >= context.critical_at_percentage {
            return Err(BridgeError::config(format!(
                "context.warn_at_percentage ({}) must be below critical_at_percentage ({})",
                context.warn_at_percentage, context.critical_at_percentage
            )));
        }

        if self.circuit_breaker.failure_threshold == 0 {
            return Err(BridgeError::config(
                "circuit_breaker.failure_threshold must be greater than 0",
            ));
        }
        if self.circuit_breaker.monitor_interval.is_zero() {
            return Err(BridgeError::config(
                "circuit_breaker.monitor_interval must be greater than 0",
            ));
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(BridgeError::config(format!(
                "Unknown log format '{}' (expected pretty or json)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_are_valid() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.backend.executable, "qwen");
        assert_eq!(config.max_turns, 100);
        assert!(config.thought_streaming);
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn test_permission_mode_wire_spelling() {
        assert_eq!(
            serde_json::to_value(PermissionMode::BypassPermissions).unwrap(),
            json!("bypassPermissions")
        );
        assert_eq!(
            "acceptedits".parse::<PermissionMode>().unwrap(),
            PermissionMode::AcceptEdits
        );
        assert!("yolo".parse::<PermissionMode>().is_err());
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config: BridgeConfig = serde_json::from_value(json!({
            "permission_mode": "plan",
            "context": { "max_tokens": 1000 },
            "circuit_breaker": { "request_timeout": 0 }
        }))
        .unwrap();

        assert_eq!(config.permission_mode, PermissionMode::Plan);
        assert_eq!(config.context.max_tokens, 1000);
        assert_eq!(config.context.warn_at_percentage, 80.0);
        assert!(config.circuit_breaker.request_timeout().is_none());
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let mut config = BridgeConfig::default();
        config.context.warn_at_percentage = 96.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("warn_at_percentage"));
    }

    #[test]
    fn test_validate_rejects_zero_budget_and_threshold() {
        let mut config = BridgeConfig::default();
        config.context.max_tokens = 0;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.circuit_breaker.failure_threshold = 0;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.backend.executable = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_overrides_level() {
        let config = BridgeConfig {
            debug: true,
            ..BridgeConfig::default()
        };
        assert_eq!(config.log_level(), "debug");
    }
}
