//! CLI argument definitions using clap
//!
//! - ferry                      # Run the bridge on stdio (default)
//! - ferry serve                # Same, explicitly
//! - ferry diagnose             # Check that the backend CLI works
//! - ferry permissions          # List permission modes

use clap::{Parser, Subcommand};
use ferry_core::config::ConfigOverrides;
use ferry_core::PermissionMode;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ferry")]
#[command(about = "Ferry - Agent Client Protocol bridge for interactive coding CLIs")]
#[command(
    long_about = r#"Ferry - Agent Client Protocol bridge for interactive coding CLIs

Editors speak ACP to ferry over stdin/stdout; ferry drives the backend CLI.

USAGE:
  ferry                          # Serve ACP on stdio
  ferry --permission-mode plan   # Serve with a permission mode
  ferry diagnose                 # Check backend availability
  ferry permissions              # List permission modes"#
)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (JSON or TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Permission mode: default, acceptEdits, bypassPermissions, plan
    #[arg(long, global = true)]
    pub permission_mode: Option<PermissionMode>,

    /// Backend executable to drive
    #[arg(long, global = true)]
    pub backend: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run the ACP bridge on stdin/stdout
    Serve,

    /// Probe the backend CLI and report problems
    Diagnose,

    /// List the available permission modes
    Permissions,
}

impl Cli {
    /// Settings given on the command line, applied over file and environment
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            permission_mode: self.permission_mode,
            debug: self.debug.then_some(true),
            log_file: self.log_file.clone(),
            backend: self.backend.clone(),
        }
    }
}
