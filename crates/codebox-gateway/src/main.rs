//! codebox-gateway: sandbox terminal and workspace server.
//!
//! Each WebSocket connection gets its own session: a workspace tree seeded
//! from the durable store and a shell running inside it.

use std::process::ExitCode;
use std::sync::Arc;

use codebox_gateway::{cli, serve, GatewayState};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("codebox-gateway: {e}");
            return ExitCode::FAILURE;
        }
    };

    // RUST_LOG wins over the configured level.
    let log_directive = config.logging.level.directive();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_directive.into()))
        .init();

    tracing::info!("codebox-gateway v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(ref path) = args.config {
        tracing::info!("Using config override: {}", path.display());
    }

    let bind = config.server.bind.clone();
    let state = match GatewayState::from_config(config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!(error = %e, "failed to set up durable store");
            return ExitCode::FAILURE;
        }
    };

    let listener = match TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %bind, error = %e, "failed to bind TCP listener");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("codebox-gateway listening on {}", bind);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received");
                signal.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "cannot listen for interrupt"),
        }
    });

    serve(listener, state, shutdown).await;
    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
