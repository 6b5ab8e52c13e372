//! Parley chat server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod config;
pub mod db;
pub mod session;
pub mod state;

use tokio::net::TcpListener;

use crate::state::AppState;

/// Accept loop: spawn one session actor per inbound connection.
/// Runs until the listener itself fails.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        tracing::debug!(%addr, "connection accepted");
        tokio::spawn(session::actor::run_connection(stream, state.clone(), addr));
    }
}
