use super::*;
use crate::identity::SessionId;
use serial_test::serial;
use tokio::sync::mpsc;

fn make_connector() -> (Connector, mpsc::Receiver<super::super::ConnectorEvent>) {
    let (tx, rx) = mpsc::channel(1);
    (Connector::new(tx), rx)
}

#[test]
fn split_command_honors_quotes() {
    let argv = split_command("echo 'hello world' foo");
    assert_eq!(argv, vec!["echo", "hello world", "foo"]);
}

#[test]
fn split_command_falls_back_to_sh_when_empty() {
    std::env::remove_var("SHELL");
    let argv = split_command("");
    assert_eq!(argv, vec!["/bin/sh".to_owned()]);
}

#[tokio::test]
#[serial]
async fn spawned_shell_echoes_output_to_connector() {
    let (connector, mut rx) = make_connector();
    let session = TerminalSession::spawn(
        SessionId::generate(),
        "/bin/sh -c 'echo hi; sleep 5'",
        "/tmp",
        80,
        24,
        connector,
    )
    .expect("spawn");

    let mut saw_hi = false;
    for _ in 0..20 {
        match tokio::time::timeout(std::time::Duration::from_millis(500), rx.recv()).await {
            Ok(Some(super::super::ConnectorEvent::Data(bytes))) => {
                if String::from_utf8_lossy(&bytes).contains("hi") {
                    saw_hi = true;
                    break;
                }
            }
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => break,
        }
    }
    assert!(saw_hi, "expected connector to observe child output");

    session.close().await;
    assert_eq!(session.state(), ProcessState::Closed);
}

#[tokio::test]
#[serial]
async fn close_is_idempotent_and_reaches_closed_state() {
    let (connector, _rx) = make_connector();
    let session =
        TerminalSession::spawn(SessionId::generate(), "/bin/sh", "/tmp", 80, 24, connector).expect("spawn");

    session.close().await;
    session.close().await;
    assert_eq!(session.state(), ProcessState::Closed);
}
