use super::*;

#[test]
fn defaults_to_ws_without_forwarded_proto() {
    let url = derive_ws_url(None, None, None, "localhost:8420", false);
    assert_eq!(url, "ws://localhost");
}

#[test]
fn forwarded_https_upgrades_to_wss() {
    let url = derive_ws_url(Some("https"), None, None, "localhost:8420", false);
    assert_eq!(url, "wss://localhost");
}

#[test]
fn forwarded_host_and_port_take_precedence() {
    let url = derive_ws_url(Some("https"), Some("gateway.example.com"), Some("8443"), "localhost:8420", false);
    assert_eq!(url, "wss://gateway.example.com:8443");
}

#[test]
fn default_wss_port_443_is_omitted() {
    let url = derive_ws_url(Some("https"), Some("gateway.example.com"), Some("443"), "localhost:8420", false);
    assert_eq!(url, "wss://gateway.example.com");
}

#[test]
fn default_ws_port_80_is_omitted() {
    let url = derive_ws_url(None, Some("gateway.example.com"), Some("80"), "localhost:8420", false);
    assert_eq!(url, "ws://gateway.example.com");
}

#[test]
fn locally_secure_connection_without_proxy_header_uses_wss() {
    let url = derive_ws_url(None, None, None, "localhost:8420", true);
    assert_eq!(url, "wss://localhost");
}
