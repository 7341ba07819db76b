//! Accept loop.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::connection::handle_connection;
use crate::state::GatewayState;

/// Accept connections until `shutdown` fires, then close every session.
pub async fn serve(listener: TcpListener, state: Arc<GatewayState>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,

            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let _ = stream.set_nodelay(true);
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        handle_connection(stream, addr, state).await;
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            },
        }
    }

    let open = state.registry.len().await;
    tracing::info!(sessions = open, "shutting down");
    state.registry.close_all().await;
}
