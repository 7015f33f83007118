//! Guest agent event daemon.
//!
//! Configuration is read from the environment, see
//! [`event_gateway::config`] and [`event_gateway::logging`].

use std::process::ExitCode;

use event_gateway::{EventServer, GatewayConfig};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = event_gateway::logging::init_logging_from_env() {
        eprintln!("agent-eventd: {e}");
        return ExitCode::FAILURE;
    }

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let server = match EventServer::start(config).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start event gateway: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }

    tracing::info!("Shutting down");
    server.shutdown().await;
    ExitCode::SUCCESS
}
