//! Configuration loading and management

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::model::{BridgeConfig, PermissionMode};
use crate::error::{BridgeError, BridgeResult};

/// Values supplied on the command line; `None` leaves the loaded value alone
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub permission_mode: Option<PermissionMode>,
    pub debug: Option<bool>,
    pub log_file: Option<PathBuf>,
    pub backend: Option<String>,
}

/// Source of configuration data
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Configuration from a JSON or TOML file
    File(PathBuf),
    /// Configuration from environment variables
    Environment,
    /// Configuration from command line arguments
    CommandLine(ConfigOverrides),
    /// Default configuration
    Default,
}

/// Configuration loader with support for multiple sources
///
/// Sources are applied in the order they were added. A file replaces the
/// whole document (missing keys fall back to defaults); environment and
/// command line sources only touch the settings they name.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    sources: Vec<ConfigSource>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration source
    pub fn add_source(mut self, source: ConfigSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_defaults(self) -> Self {
        self.add_source(ConfigSource::Default)
    }

    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.add_source(ConfigSource::File(path.as_ref().to_path_buf()))
    }

    pub fn with_env(self) -> Self {
        self.add_source(ConfigSource::Environment)
    }

    pub fn with_overrides(self, overrides: ConfigOverrides) -> Self {
        self.add_source(ConfigSource::CommandLine(overrides))
    }

    /// Load configuration from all sources
    pub fn load(self) -> BridgeResult<BridgeConfig> {
        let mut config = BridgeConfig::default();

        for source in &self.sources {
            match source {
                ConfigSource::Default => {
                    tracing::debug!("Loading default config");
                    config = BridgeConfig::default();
                }
                ConfigSource::File(path) => {
                    tracing::debug!("Loading config from file: {}", path.display());
                    config = load_from_file(path)?;
                }
                ConfigSource::Environment => {
                    tracing::debug!("Loading config from environment");
                    apply_env(&mut config, |key| env::var(key).ok())?;
                }
                ConfigSource::CommandLine(overrides) => {
                    tracing::debug!("Loading config from command line");
                    apply_overrides(&mut config, overrides);
                }
            }
        }

        config.validate()?;
        Ok(config)
    }
}

/// `$XDG_CONFIG_HOME/ferry/config.json` or the platform equivalent
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ferry").join("config.json"))
}

/// Load configuration from a file; a missing file yields the defaults
pub fn load_from_file(path: &Path) -> BridgeResult<BridgeConfig> {
    if !path.exists() {
        tracing::debug!("Config file {} not found, using defaults", path.display());
        return Ok(BridgeConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|e| {
        BridgeError::config_with_context(
            format!("Failed to read config file: {}", e),
            format!("Reading configuration from '{}'", path.display()),
        )
    })?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|e| {
            BridgeError::config_with_context(
                format!("Failed to parse TOML config: {}", e),
                format!("Deserializing TOML configuration from '{}'", path.display()),
            )
        }),
        _ => serde_json::from_str(&content).map_err(|e| {
            BridgeError::config_with_context(
                format!("Failed to parse JSON config: {}", e),
                format!("Deserializing JSON configuration from '{}'", path.display()),
            )
        }),
    }
}

/// Apply `FERRY_*` variables, falling back to the legacy `ACP_*` names
fn apply_env<F>(config: &mut BridgeConfig, lookup: F) -> BridgeResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str, legacy: Option<&str>| {
        lookup(name)
            .or_else(|| legacy.and_then(&lookup))
            .filter(|value| !value.trim().is_empty())
    };

    if let Some(mode) = var("FERRY_PERMISSION_MODE", Some("ACP_PERMISSION_MODE")) {
        config.permission_mode = mode.parse()?;
    }

    if let Some(debug) = var("FERRY_DEBUG", Some("ACP_DEBUG")) {
        config.debug = matches!(debug.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
    }

    if let Some(file) = var("FERRY_LOG_FILE", Some("ACP_LOG_FILE")) {
        config.logging.log_file = Some(PathBuf::from(file));
    }

    if let Some(backend) = var("FERRY_BACKEND", None) {
        config.backend.executable = backend;
    }

    if let Some(turns) = var("FERRY_MAX_TURNS", None) {
        config.max_turns = turns
            .trim()
            .parse()
            .map_err(|_| BridgeError::config(format!("Invalid FERRY_MAX_TURNS value: {}", turns)))?;
    }

    Ok(())
}

fn apply_overrides(config: &mut BridgeConfig, overrides: &ConfigOverrides) {
    if let Some(mode) = overrides.permission_mode {
        config.permission_mode = mode;
    }
    if let Some(debug) = overrides.debug {
        config.debug = debug;
    }
    if let Some(file) = &overrides.log_file {
        config.logging.log_file = Some(file.clone());
    }
    if let Some(backend) = &overrides.backend {
        config.backend.executable = backend.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file(suffix: &str) -> NamedTempFile {
        tempfile::Builder::new().suffix(suffix).tempfile().unwrap()
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = load_from_file(Path::new("/nonexistent/ferry/config.json")).unwrap();
        assert_eq!(config.backend.executable, "qwen");
    }

    #[test]
    fn test_load_json_file() {
        let mut file = temp_file(".json");
        write!(
            file,
            r#"{{"permission_mode": "acceptEdits", "backend": {{"executable": "my-cli", "args": ["--yolo"]}}}}"#
        )
        .unwrap();

        let config = ConfigLoader::new().with_file(file.path()).load().unwrap();
        assert_eq!(config.permission_mode, PermissionMode::AcceptEdits);
        assert_eq!(config.backend.executable, "my-cli");
        assert_eq!(config.backend.args, vec!["--yolo"]);
        assert_eq!(config.backend.probe_timeout_secs, 30);
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = temp_file(".toml");
        writeln!(file, "max_turns = 5\ndebug = true\n\n[context]\nmax_tokens = 4000").unwrap();

        let config = ConfigLoader::new().with_file(file.path()).load().unwrap();
        assert_eq!(config.max_turns, 5);
        assert!(config.debug);
        assert_eq!(config.context.max_tokens, 4000);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let mut file = temp_file(".json");
        write!(file, "{{ not json").unwrap();

        let err = ConfigLoader::new().with_file(file.path()).load().unwrap_err();
        assert!(matches!(err, BridgeError::Config { .. }));
    }

    #[test]
    fn test_invalid_file_values_fail_validation() {
        let mut file = temp_file(".json");
        write!(file, r#"{{"context": {{"max_tokens": 0}}}}"#).unwrap();

        assert!(ConfigLoader::new().with_file(file.path()).load().is_err());
    }

    #[test]
    fn test_env_prefers_ferry_over_legacy_names() {
        let mut config = BridgeConfig::default();
        apply_env(
            &mut config,
            lookup(&[
                ("FERRY_PERMISSION_MODE", "plan"),
                ("ACP_PERMISSION_MODE", "acceptEdits"),
                ("ACP_DEBUG", "true"),
                ("ACP_LOG_FILE", "/tmp/ferry.log"),
                ("FERRY_MAX_TURNS", "7"),
            ]),
        )
        .unwrap();

        assert_eq!(config.permission_mode, PermissionMode::Plan);
        assert!(config.debug);
        assert_eq!(config.logging.log_file, Some(PathBuf::from("/tmp/ferry.log")));
        assert_eq!(config.max_turns, 7);
    }

    #[test]
    fn test_env_rejects_unknown_permission_mode() {
        let mut config = BridgeConfig::default();
        let err = apply_env(&mut config, lookup(&[("ACP_PERMISSION_MODE", "yolo")])).unwrap_err();
        assert!(err.to_string().contains("yolo"));
    }

    #[test]
    fn test_env_rejects_bad_turn_limit() {
        let mut config = BridgeConfig::default();
        assert!(apply_env(&mut config, lookup(&[("FERRY_MAX_TURNS", "many")])).is_err());
    }

    #[test]
    fn test_overrides_win_over_file() {
        let mut file = temp_file(".json");
        write!(file, r#"{{"permission_mode": "plan", "debug": false}}"#).unwrap();

        let config = ConfigLoader::new()
            .with_defaults()
            .with_file(file.path())
            .with_overrides(ConfigOverrides {
                permission_mode: Some(PermissionMode::BypassPermissions),
                debug: Some(true),
                backend: Some("other-cli".into()),
                ..ConfigOverrides::default()
            })
            .load()
            .unwrap();

        assert_eq!(config.permission_mode, PermissionMode::BypassPermissions);
        assert!(config.debug);
        assert_eq!(config.backend.executable, "other-cli");
    }
}
