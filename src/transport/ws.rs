// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection WebSocket dispatcher (C7).

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::GatewayError;
use crate::identity::RouteKey;
use crate::session::{Connector, ConnectorEvent};

use super::envelope::{parse_client_envelope, ClientEnvelope, ServerEnvelope};
use super::GatewayState;

/// Geometry a disconnected-but-still-running session is resized to, so a
/// backgrounded TUI re-flows and produces a replayable frame (§4.7).
pub const DISCONNECTED_GEOMETRY: (u16, u16) = (132, 45);

/// `GET /ws/{route_key}` — WebSocket upgrade.
pub async fn ws_handler(
    State(state): State<Arc<GatewayState>>,
    Path(route_key): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let route_key = RouteKey::new(route_key);
    ws.on_upgrade(move |socket| handle_ws(socket, state, route_key))
}

async fn handle_ws(socket: WebSocket, state: Arc<GatewayState>, route_key: RouteKey) {
    let cancel = CancellationToken::new();
    let conn_id = state.next_connection_id();

    // At most one live socket per route key (§4.7): cancel whatever was
    // registered before us.
    {
        let mut connections = state.connections.write().await;
        if let Some((prior_cancel, _)) = connections.insert(route_key.clone(), (cancel.clone(), conn_id)) {
            prior_cancel.cancel();
        }
    }

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (connector_tx, mut connector_rx) = mpsc::channel(1);
    let connector = Connector::new(connector_tx);

    if let Some(session) = state.manager.get_session_by_route_key(&route_key).await {
        session.update_connector(connector.clone()).await;
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            event = connector_rx.recv() => {
                match event {
                    Some(ConnectorEvent::Data(bytes)) => {
                        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                        if send_envelope(&mut ws_tx, ServerEnvelope::Stdout(encoded)).await.is_err() {
                            break;
                        }
                    }
                    Some(ConnectorEvent::Binary(bytes)) => {
                        if ws_tx.send(Message::Binary(bytes)).await.is_err() {
                            break;
                        }
                    }
                    Some(ConnectorEvent::Meta(meta)) => {
                        if send_envelope(&mut ws_tx, ServerEnvelope::Meta(meta)).await.is_err() {
                            break;
                        }
                    }
                    Some(ConnectorEvent::Close) => {
                        let _ = send_envelope(&mut ws_tx, ServerEnvelope::Exit).await;
                        break;
                    }
                    None => break,
                }
            }

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if !dispatch_text(&text, &route_key, &state, &connector, &mut ws_tx).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    // Disconnect without an explicit session close: re-flow the backgrounded
    // TUI instead of tearing the session down (§4.7).
    if let Some(session) = state.manager.get_session_by_route_key(&route_key).await {
        if session.state() != crate::session::ProcessState::Closed {
            let (cols, rows) = DISCONNECTED_GEOMETRY;
            session.set_terminal_size(cols, rows).await;
        }
    }

    let mut connections = state.connections.write().await;
    if connections.get(&route_key).is_some_and(|(_, id)| *id == conn_id) {
        connections.remove(&route_key);
    }
}

/// Dispatch one parsed text frame; returns `false` if the connection should
/// close.
async fn dispatch_text(
    text: &str,
    route_key: &RouteKey,
    state: &Arc<GatewayState>,
    connector: &Connector,
    ws_tx: &mut (impl futures_util::Sink<Message, Error = axum::Error> + Unpin),
) -> bool {
    let Some(envelope) = parse_client_envelope(text) else {
        // Invariant 6: malformed or non-two-element envelopes cause no
        // state change.
        return true;
    };

    match envelope {
        ClientEnvelope::Stdin(data) => {
            if let Some(session) = state.manager.get_session_by_route_key(route_key).await {
                session.send_bytes(bytes::Bytes::from(data.into_bytes())).await;
            }
        }
        ClientEnvelope::Resize { cols, rows } => {
            let session = match state.manager.get_session_by_route_key(route_key).await {
                Some(session) => Some(session),
                None => match state.manager.app_entry(route_key.as_str()).await {
                    Some(_) => {
                        let session_id = crate::identity::SessionId::generate();
                        match state
                            .manager
                            .new_session(route_key.clone(), session_id, route_key.as_str(), cols, rows, connector.clone())
                            .await
                        {
                            Ok(session) => Some(session),
                            Err(e) => {
                                tracing::warn!(error = %e, "failed to start session");
                                None
                            }
                        }
                    }
                    None => None,
                },
            };

            match session {
                Some(session) => {
                    session.update_connector(connector.clone()).await;
                    session.set_terminal_size(cols, rows).await;
                }
                None => {
                    return send_envelope(
                        ws_tx,
                        ServerEnvelope::Error(GatewayError::NoAppConfigured.as_str().to_owned()),
                    )
                    .await
                    .is_ok();
                }
            }
        }
        ClientEnvelope::Ping(payload) => {
            return send_envelope(ws_tx, ServerEnvelope::Pong(payload)).await.is_ok();
        }
        ClientEnvelope::Unrecognized => {}
    }

    true
}

async fn send_envelope(
    ws_tx: &mut (impl futures_util::Sink<Message, Error = axum::Error> + Unpin),
    envelope: ServerEnvelope,
) -> Result<(), axum::Error> {
    ws_tx.send(Message::Text(envelope.to_text().into())).await
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
