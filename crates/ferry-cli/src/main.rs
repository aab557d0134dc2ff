//! Ferry CLI application
//!
//! Bridges editors that speak the Agent Client Protocol to interactive
//! coding CLIs.
//!
//! # Installation
//!
//! ```bash
//! cargo install --path crates/ferry-cli
//! ```
//!
//! # Usage
//!
//! Point the editor's ACP agent command at `ferry`. The bridge reads
//! JSON-RPC frames on stdin, writes them on stdout and logs to stderr
//! (or `--log-file`).
//!
//! Configuration comes from `$XDG_CONFIG_HOME/ferry/config.json` (or
//! `--config`), then `FERRY_*` environment variables, then flags.

mod args;
mod commands;
mod logging;
mod signal_handler;

use anyhow::{Context, Result};
use args::{Cli, Commands};
use clap::Parser;
use ferry_core::config::{BridgeConfig, ConfigLoader, default_config_path};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().or_else(default_config_path);
    let config = load_config(&cli, config_path.clone())?;

    logging::init(&config)?;
    logging::install_panic_hook();

    let code = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            commands::serve(config).await?;
            0
        }
        Commands::Diagnose => commands::diagnose(&config, config_path.as_deref()).await,
        Commands::Permissions => {
            commands::show_permissions(config.permission_mode);
            0
        }
    };

    // The blocking stdin reader never finishes on its own, so leave without
    // waiting for the runtime to drain it.
    std::process::exit(code)
}

fn load_config(cli: &Cli, path: Option<PathBuf>) -> Result<BridgeConfig> {
    let mut loader = ConfigLoader::new().with_defaults();
    if let Some(path) = path {
        loader = loader.with_file(path);
    }
    loader
        .with_env()
        .with_overrides(cli.overrides())
        .load()
        .context("Failed to load configuration")
}
