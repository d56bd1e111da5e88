use proptest::prelude::*;

use super::*;

proptest! {
    #[test]
    fn resize_round_trips_for_any_geometry(cols in 1u16..=2000, rows in 1u16..=2000) {
        let text = format!(r#"["resize",{{"cols":{cols},"rows":{rows}}}]"#);
        let parsed = parse_client_envelope(&text);
        prop_assert_eq!(parsed, Some(ClientEnvelope::Resize { cols, rows }));
    }

    #[test]
    fn stdin_round_trips_through_encode_and_parse(data in "[a-zA-Z0-9 \n]{0,64}") {
        let encoded = serde_json::json!(["stdin", data]).to_string();
        let parsed = parse_client_envelope(&encoded);
        prop_assert_eq!(parsed, Some(ClientEnvelope::Stdin(data)));
    }
}

#[test]
fn parses_stdin_envelope() {
    let env = parse_client_envelope(r#"["stdin","ls\n"]"#).expect("parse");
    assert_eq!(env, ClientEnvelope::Stdin("ls\n".to_owned()));
}

#[test]
fn parses_resize_envelope() {
    let env = parse_client_envelope(r#"["resize",{"cols":90,"rows":25}]"#).expect("parse");
    assert_eq!(env, ClientEnvelope::Resize { cols: 90, rows: 25 });
}

#[test]
fn parses_ping_with_arbitrary_payload() {
    let env = parse_client_envelope(r#"["ping","abc123"]"#).expect("parse");
    assert_eq!(env, ClientEnvelope::Ping(Value::String("abc123".to_owned())));
}

#[test]
fn unknown_verb_is_unrecognized_not_rejected() {
    let env = parse_client_envelope(r#"["frobnicate",42]"#).expect("parse");
    assert_eq!(env, ClientEnvelope::Unrecognized);
}

#[test]
fn non_array_payload_is_rejected() {
    assert!(parse_client_envelope(r#"{"verb":"stdin"}"#).is_none());
}

#[test]
fn three_element_array_is_rejected() {
    assert!(parse_client_envelope(r#"["stdin","x","y"]"#).is_none());
}

#[test]
fn resize_missing_fields_is_rejected() {
    assert!(parse_client_envelope(r#"["resize",{"cols":90}]"#).is_none());
}

#[test]
fn exit_envelope_encodes_as_single_element_array() {
    assert_eq!(ServerEnvelope::Exit.to_text(), r#"["exit"]"#);
}

#[test]
fn error_envelope_round_trips_through_json() {
    let text = ServerEnvelope::Error("No app configured".to_owned()).to_text();
    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value, serde_json::json!(["error", "No app configured"]));
}

#[test]
fn pong_replies_verbatim() {
    let text = ServerEnvelope::Pong(Value::String("abc123".to_owned())).to_text();
    assert_eq!(text, r#"["pong","abc123"]"#);
}
