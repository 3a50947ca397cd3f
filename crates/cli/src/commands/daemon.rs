// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use orchard_daemon::{listener, SessionManager};
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

/// Run the terminal daemon in the foreground (the `orchardd` binary is
/// the production entry point; this is the dev-friendly inline variant).
pub async fn run() -> anyhow::Result<()> {
    let manager = SessionManager::new();

    let url = super::daemon_url();
    let addr = url.trim_start_matches("ws://").to_string();
    let socket = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "daemon listening");
    println!("orchard daemon listening on {}", addr);

    let listener_task = tokio::spawn(listener::run(socket, std::sync::Arc::clone(&manager)));

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
    manager.destroy_all();
    listener_task.abort();
    Ok(())
}
