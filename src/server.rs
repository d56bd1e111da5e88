// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway server (C9): composes the session registry and transport layer
//! into an HTTP server, with coordinated shutdown.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::{AppEntry, GatewayConfig};
use crate::session::manager::SessionManager;
use crate::transport::{router, GatewayState};

/// Run the gateway until a shutdown signal arrives.
pub async fn run(config: GatewayConfig, apps: Vec<AppEntry>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let manager = Arc::new(SessionManager::new(apps));
    let state = Arc::new(GatewayState::new(Arc::clone(&manager)));

    let app = router(Arc::clone(&state));

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "termgate listening");

    spawn_shutdown_signal_handler(shutdown.clone());

    let shutdown_state = Arc::clone(&state);
    let shutdown_manager = Arc::clone(&manager);
    let graceful = async move {
        shutdown.cancelled().await;
        tracing::info!("shutdown signal received, draining sessions");
        // Close sockets before sessions so in-flight `on_data` calls see a
        // fast failure and release the loop promptly (§4.9, §9).
        shutdown_state.close_all_sockets().await;
        shutdown_manager.close_all().await;
    };

    axum::serve(listener, app).with_graceful_shutdown(graceful).await?;

    Ok(())
}

/// Install a Ctrl-C handler that cancels `shutdown`. Does not block the
/// caller; the signal handler itself must not block (§4.9).
fn spawn_shutdown_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });
}

/// Derive the WebSocket URL scheme/host/port a landing page would embed,
/// honouring reverse-proxy headers (§4.9). Exposed for the (out-of-scope)
/// landing page to consume.
pub fn derive_ws_url(
    forwarded_proto: Option<&str>,
    forwarded_host: Option<&str>,
    forwarded_port: Option<&str>,
    host_header: &str,
    is_secure: bool,
) -> String {
    let secure = forwarded_proto.map(|p| p == "https").unwrap_or(is_secure);
    let scheme = if secure { "wss" } else { "ws" };

    let host = forwarded_host.unwrap_or(host_header);
    let host = host.split(':').next().unwrap_or(host);

    match forwarded_port {
        Some(port) if (secure && port == "443") || (!secure && port == "80") => {
            format!("{scheme}://{host}")
        }
        Some(port) => format!("{scheme}://{host}:{port}"),
        None => format!("{scheme}://{host}"),
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
