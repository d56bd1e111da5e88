// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire envelope for the browser-facing WebSocket: a two-element JSON
//! array `[verb, payload]` rather than the internally-tagged object shape
//! used elsewhere in this codebase, so parsing and encoding are handled by
//! hand rather than `#[serde(tag = ...)]`.

use serde_json::Value;

/// A parsed client-to-server envelope. `Unrecognized` covers verbs the
/// dispatcher doesn't know about — "ignore", not an error (§4.7).
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEnvelope {
    Stdin(String),
    Resize { cols: u16, rows: u16 },
    Ping(Value),
    Unrecognized,
}

/// Parse a text frame as a `[verb, payload]` envelope. Returns `None` for
/// anything that isn't a well-formed two-element JSON array or whose
/// payload doesn't match its verb's expected shape (invariant 6: no state
/// change results).
pub fn parse_client_envelope(text: &str) -> Option<ClientEnvelope> {
    let value: Value = serde_json::from_str(text).ok()?;
    let arr = value.as_array()?;
    if arr.len() != 2 {
        return None;
    }
    let verb = arr[0].as_str()?;
    let payload = &arr[1];

    match verb {
        "stdin" => Some(ClientEnvelope::Stdin(payload.as_str()?.to_owned())),
        "resize" => {
            let cols = payload.get("cols")?.as_u64()?;
            let rows = payload.get("rows")?.as_u64()?;
            Some(ClientEnvelope::Resize { cols: cols as u16, rows: rows as u16 })
        }
        "ping" => Some(ClientEnvelope::Ping(payload.clone())),
        _ => Some(ClientEnvelope::Unrecognized),
    }
}

/// A server-to-client envelope, encoded as `[verb, payload]` (or the
/// single-element `["exit"]` per §4.7).
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEnvelope {
    Stdout(String),
    Meta(Value),
    Pong(Value),
    Error(String),
    Exit,
}

impl ServerEnvelope {
    pub fn to_text(&self) -> String {
        let value = match self {
            Self::Stdout(b64) => Value::Array(vec![Value::String("stdout".into()), Value::String(b64.clone())]),
            Self::Meta(meta) => Value::Array(vec![Value::String("meta".into()), meta.clone()]),
            Self::Pong(payload) => Value::Array(vec![Value::String("pong".into()), payload.clone()]),
            Self::Error(message) => {
                Value::Array(vec![Value::String("error".into()), Value::String(message.clone())])
            }
            Self::Exit => Value::Array(vec![Value::String("exit".into())]),
        };
        value.to_string()
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
