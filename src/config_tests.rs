use super::*;

#[test]
fn load_entries_parses_app_array() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("apps.json");
    std::fs::write(
        &path,
        r#"[{"name":"Shell","slug":"shell","command":"bash","workingDirectory":"/tmp","terminal":true}]"#,
    )
    .expect("write apps.json");

    let entries = load_entries(&path).expect("load_entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].slug, "shell");
    assert!(entries[0].terminal);
}

#[test]
fn load_entries_rejects_malformed_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("apps.json");
    std::fs::write(&path, "not json").expect("write apps.json");
    assert!(load_entries(&path).is_err());
}

#[test]
fn validate_rejects_zero_port() {
    let config = GatewayConfig {
        host: "127.0.0.1".into(),
        port: 0,
        apps: None,
        log_format: "text".into(),
    };
    assert!(config.validate().is_err());
}
