//! `ferry serve`: the ACP bridge on stdin/stdout

use crate::signal_handler::{ShutdownSignals, signal_name};
use anyhow::{Context, Result};
use ferry_core::{AgentSideConnection, BridgeAgent, BridgeConfig, CliBackendFactory};
use std::sync::Arc;

/// Serve until the host hangs up or a shutdown signal arrives
pub async fn serve(config: BridgeConfig) -> Result<()> {
    let mut signals = ShutdownSignals::install().context("Failed to install signal handlers")?;

    let backends = Arc::new(CliBackendFactory::new(config.backend.clone()));
    let (agent, connection) = AgentSideConnection::new(
        |client| BridgeAgent::new(Arc::new(client), backends, config),
        tokio::io::stdout(),
        tokio::io::stdin(),
    );
    tracing::info!("Ferry bridge serving ACP on stdio");

    tokio::select! {
        result = connection.closed() => match result {
            Ok(()) => tracing::info!("Host closed the connection"),
            Err(e) => tracing::error!("Connection failed: {}", e),
        },
        Some(signal) = signals.recv() => {
            tracing::info!(signal = signal_name(signal), "Shutting down");
        }
    }

    agent.destroy().await;
    Ok(())
}
