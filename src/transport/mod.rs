// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport: per-connection dispatch (C7) and the
//! on-demand screenshot renderer (C8).

pub mod envelope;
pub mod screenshot;
pub mod ws;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::identity::RouteKey;
use crate::session::manager::SessionManager;

/// Shared state for the transport layer: the session registry plus the
/// single-socket-per-route-key bookkeeping used by C7.
pub struct GatewayState {
    pub manager: Arc<SessionManager>,
    connections: RwLock<HashMap<RouteKey, (CancellationToken, u64)>>,
    next_conn_id: AtomicU64,
}

impl GatewayState {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager, connections: RwLock::new(HashMap::new()), next_conn_id: AtomicU64::new(0) }
    }

    fn next_connection_id(&self) -> u64 {
        self.next_conn_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Cancel every registered socket in parallel (§4.9 shutdown step 1).
    pub async fn close_all_sockets(&self) {
        let mut connections = self.connections.write().await;
        for (_, (cancel, _)) in connections.drain() {
            cancel.cancel();
        }
    }
}

/// Build the gateway's `/ws` and `/screenshot` routes (C9 composes this
/// with the out-of-scope landing page and static assets).
pub fn router(state: Arc<GatewayState>) -> axum::Router {
    axum::Router::new()
        .route("/ws/{route_key}", axum::routing::get(ws::ws_handler))
        .route("/screenshot", axum::routing::get(screenshot::screenshot_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}
