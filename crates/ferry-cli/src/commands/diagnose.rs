//! Backend health check (`ferry diagnose`)
//!
//! The report goes to stderr so running it under an editor never corrupts
//! a protocol stream.

use colored::*;
use ferry_core::backend::Backend;
use ferry_core::{BridgeConfig, CliBackend};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// One line of the report
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

impl CheckResult {
    fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(CheckStatus::Pass, name, message)
    }

    fn warn(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(CheckStatus::Warn, name, message)
    }

    fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(CheckStatus::Fail, name, message)
    }

    fn with_status(status: CheckStatus, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
            hint: None,
        }
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    fn icon(&self) -> ColoredString {
        match self.status {
            CheckStatus::Pass => "✓".green().bold(),
            CheckStatus::Warn => "⚠".yellow().bold(),
            CheckStatus::Fail => "✗".red().bold(),
        }
    }
}

/// Run every check and print the report. Returns the process exit code.
pub async fn diagnose(config: &BridgeConfig, config_path: Option<&Path>) -> i32 {
    eprintln!();
    eprintln!("{}", "Ferry Health Check".bold().underline());
    eprintln!("{}", "=".repeat(50).dimmed());
    eprintln!();

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let backend = CliBackend::new(config.backend.clone(), cwd);

    let mut checks = vec![check_config_file(config_path)];
    checks.extend(check_backend(&backend, &config.backend.executable).await);
    checks.push(check_settings(config));

    for check in &checks {
        eprintln!("{} {} - {}", check.icon(), check.name.bold(), check.message);
        if let Some(hint) = &check.hint {
            eprintln!("    {} {}", "→".dimmed(), hint.dimmed());
        }
    }

    let failures = checks
        .iter()
        .filter(|c| c.status == CheckStatus::Fail)
        .count();
    let warnings = checks
        .iter()
        .filter(|c| c.status == CheckStatus::Warn)
        .count();

    eprintln!();
    eprintln!(
        "{} passed, {} warnings, {} failed",
        (checks.len() - failures - warnings).to_string().green(),
        warnings.to_string().yellow(),
        failures.to_string().red()
    );

    if failures > 0 { 1 } else { 0 }
}

fn check_config_file(path: Option<&Path>) -> CheckResult {
    match path {
        Some(path) if path.exists() => {
            CheckResult::pass("Config file", format!("Loaded {}", path.display()))
        }
        Some(path) => CheckResult::warn(
            "Config file",
            format!("{} not found, using defaults", path.display()),
        ),
        None => CheckResult::warn("Config file", "No config directory, using defaults"),
    }
}

async fn check_backend(backend: &CliBackend, executable: &str) -> Vec<CheckResult> {
    if !backend.check_available().await {
        return vec![
            CheckResult::fail("Backend", format!("`{}` is not available", executable))
                .with_hint(format!(
                    "Install {} or point --backend / FERRY_BACKEND at it",
                    executable
                )),
        ];
    }

    let version = match backend.version().await {
        Ok(version) => CheckResult::pass("Backend version", version),
        Err(e) => CheckResult::warn("Backend version", e.to_string()),
    };
    vec![
        CheckResult::pass("Backend", format!("`{}` responds", executable)),
        version,
    ]
}

fn check_settings(config: &BridgeConfig) -> CheckResult {
    let turns = match config.max_turns {
        0 => "unlimited turns".to_string(),
        n => format!("{} turns", n),
    };
    CheckResult::pass(
        "Settings",
        format!(
            "permission mode {}, {}, {} token context",
            config.permission_mode, turns, config.context.max_tokens
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_file_check() {
        let file = NamedTempFile::new().unwrap();
        assert_eq!(check_config_file(Some(file.path())).status, CheckStatus::Pass);

        let missing = file.path().with_extension("missing");
        assert_eq!(check_config_file(Some(&missing)).status, CheckStatus::Warn);
        assert_eq!(check_config_file(None).status, CheckStatus::Warn);
    }

    #[tokio::test]
    async fn test_missing_backend_fails() {
        let mut config = BridgeConfig::default();
        config.backend.executable = "ferry-no-such-backend-binary".to_string();
        let backend = CliBackend::new(config.backend.clone(), std::env::temp_dir());

        let checks = check_backend(&backend, &config.backend.executable).await;

        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].status, CheckStatus::Fail);
        assert!(checks[0].hint.is_some());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_responding_backend_reports_version() {
        let mut config = BridgeConfig::default();
        config.backend.executable = "echo".to_string();
        let backend = CliBackend::new(config.backend.clone(), std::env::temp_dir());

        let checks = check_backend(&backend, "echo").await;

        assert_eq!(checks.len(), 2);
        assert!(checks.iter().all(|c| c.status == CheckStatus::Pass));
        assert!(!checks[1].message.is_empty());
    }

    #[test]
    fn test_settings_summary() {
        let mut config = BridgeConfig::default();
        config.max_turns = 0;
        let check = check_settings(&config);
        assert!(check.message.contains("permission mode default"));
        assert!(check.message.contains("unlimited turns"));
    }
}
