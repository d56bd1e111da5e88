use std::time::Duration;

use serial_test::serial;

use super::*;
use crate::config::AppEntry;
use crate::session::manager::SessionManager;

fn test_state() -> Arc<GatewayState> {
    let manager = Arc::new(SessionManager::new(vec![AppEntry {
        name: "Shell".to_owned(),
        slug: "demo".to_owned(),
        command: "/bin/sh".to_owned(),
        working_directory: "/tmp".to_owned(),
        terminal: true,
    }]));
    Arc::new(GatewayState::new(manager))
}

/// Poll until a session is registered for `route_key`, or time out.
async fn wait_for_session(state: &GatewayState, route_key: &RouteKey) -> bool {
    for _ in 0..50 {
        if state.manager.get_session_by_route_key(route_key).await.is_some() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[test]
fn disconnected_geometry_matches_default_screenshot_size() {
    assert_eq!(DISCONNECTED_GEOMETRY, (132, 45));
}

#[tokio::test]
async fn connection_ids_are_distinct_and_increasing() {
    let state = test_state();
    let a = state.next_connection_id();
    let b = state.next_connection_id();
    assert!(b > a);
}

#[tokio::test]
async fn close_all_sockets_cancels_every_registered_token() {
    let state = test_state();
    let token = CancellationToken::new();
    state.connections.write().await.insert(RouteKey::new("demo"), (token.clone(), 0));

    state.close_all_sockets().await;

    assert!(token.is_cancelled());
    assert!(state.connections.read().await.is_empty());
}

#[tokio::test]
#[serial]
async fn resize_lazily_creates_a_session_for_a_configured_slug() {
    let state = test_state();
    let route_key = RouteKey::new("demo");

    let server = axum_test::TestServer::builder()
        .http_transport()
        .build(super::super::router(Arc::clone(&state)))
        .expect("test server");

    assert!(state.manager.get_session_by_route_key(&route_key).await.is_none());

    let mut websocket = server.get_websocket("/ws/demo").await.into_websocket().await;
    websocket.send_text(r#"["resize",{"cols":80,"rows":24}]"#).await;

    assert!(wait_for_session(&state, &route_key).await, "resize must lazily start a session (S5)");
}

#[tokio::test]
#[serial]
async fn resize_against_an_unconfigured_slug_replies_with_an_error_envelope() {
    let state = test_state();

    let server = axum_test::TestServer::builder()
        .http_transport()
        .build(super::super::router(Arc::clone(&state)))
        .expect("test server");

    let mut websocket = server.get_websocket("/ws/no-such-app").await.into_websocket().await;
    websocket.send_text(r#"["resize",{"cols":80,"rows":24}]"#).await;

    let reply = websocket.receive_text().await;
    assert_eq!(reply, r#"["error","No app configured"]"#, "S6: no app configured");

    let route_key = RouteKey::new("no-such-app");
    assert!(state.manager.get_session_by_route_key(&route_key).await.is_none());
}
