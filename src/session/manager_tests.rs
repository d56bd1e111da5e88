use super::*;
use serial_test::serial;
use tokio::sync::mpsc;

fn sample_apps() -> Vec<AppEntry> {
    vec![
        AppEntry {
            name: "Shell".to_owned(),
            slug: "shell".to_owned(),
            command: "/bin/sh".to_owned(),
            working_directory: "/tmp".to_owned(),
            terminal: true,
        },
        AppEntry {
            name: "Echo App".to_owned(),
            slug: "echo-app".to_owned(),
            command: "printf '__GANGLION__\\n'".to_owned(),
            working_directory: "/tmp".to_owned(),
            terminal: false,
        },
    ]
}

fn make_connector() -> Connector {
    let (tx, _rx) = mpsc::channel(1);
    Connector::new(tx)
}

#[tokio::test]
async fn unknown_slug_is_rejected() {
    let manager = SessionManager::new(sample_apps());
    let result = manager
        .new_session(RouteKey::new("r1"), SessionId::generate(), "nope", 80, 24, make_connector())
        .await;
    assert!(result.is_err());
}

#[tokio::test]
#[serial]
async fn terminal_slug_is_registered_by_route_key_and_id() {
    let manager = SessionManager::new(sample_apps());
    let route = RouteKey::new("r2");
    let session = manager
        .new_session(route.clone(), SessionId::generate(), "shell", 80, 24, make_connector())
        .await
        .expect("create session");

    let found = manager.get_session_by_route_key(&route).await.expect("route registered");
    assert_eq!(found.id(), session.id());

    manager.close_all().await;
}

#[tokio::test]
#[serial]
async fn app_slug_spawns_framed_session() {
    let manager = SessionManager::new(sample_apps());
    let route = RouteKey::new("r3");
    let session = manager
        .new_session(route.clone(), SessionId::generate(), "echo-app", 80, 24, make_connector())
        .await
        .expect("create session");

    assert!(matches!(*session, Session::App(_)));
    manager.close_all().await;
}

#[tokio::test]
async fn missing_route_key_returns_none() {
    let manager = SessionManager::new(sample_apps());
    assert!(manager.get_session_by_route_key(&RouteKey::new("ghost")).await.is_none());
}
