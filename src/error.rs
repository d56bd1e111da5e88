// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire-facing error codes shared between the HTTP and WebSocket surfaces.
//! Errors internal to a session loop stay as `anyhow::Error`, logged and
//! converted to one of these at the boundary (see §7).

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayError {
    /// No `AppEntry` matches the slug at first resize.
    NoAppConfigured,
    /// The session exists but has already transitioned to `CLOSED`.
    Exited,
    /// A framing violation was observed in a C4 packet stream.
    FramingViolation,
    /// The PTY or child process could not be allocated (`forkpty`/`fork`
    /// failed, or the binary could not be exec'd).
    SpawnFailed,
    /// Malformed request (not applicable to a specific code above).
    BadRequest,
}

impl GatewayError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NoAppConfigured => 404,
            Self::Exited => 410,
            Self::FramingViolation => 400,
            Self::SpawnFailed => 500,
            Self::BadRequest => 400,
        }
    }

    /// The human-readable string sent as the payload of a WS `["error", ...]`
    /// envelope (§4.7, §7).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAppConfigured => "No app configured",
            Self::Exited => "Session exited",
            Self::FramingViolation => "Framing violation",
            Self::SpawnFailed => "Failed to start session",
            Self::BadRequest => "Bad request",
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for GatewayError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
