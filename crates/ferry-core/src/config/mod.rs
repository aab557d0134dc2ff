//! Configuration management for the Ferry bridge

pub mod loader;
pub mod model;

pub use loader::{ConfigLoader, ConfigOverrides, ConfigSource, default_config_path, load_from_file};
pub use model::{BackendConfig, BridgeConfig, LoggingConfig, PermissionMode};
