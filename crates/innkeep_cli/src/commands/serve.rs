//! Serve command: an in-memory relational endpoint.

use super::CommandResult;
use innkeep_wire::{serve, MemorySqlServer};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Runs the serve command until interrupted.
///
/// Tables live in memory and are lost on exit.
pub async fn run(listen: &str) -> CommandResult {
    let listener = TcpListener::bind(listen).await?;
    info!(address = %listener.local_addr()?, "relational endpoint listening");
    let server = Arc::new(MemorySqlServer::new());

    tokio::select! {
        result = serve(listener, server) => result?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }
    Ok(())
}
