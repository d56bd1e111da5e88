// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway configuration: a minimal `clap` entry point plus the
//! already-materialised list of [`AppEntry`] records this crate consumes.
//! Parsing a richer config file format is an external collaborator (§1).

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// One configured application, addressed by `slug` via `/ws/<slug>`.
/// `terminal = true` selects a PTY-hosted shell (C5); otherwise the
/// command is treated as a framed co-process (C4). Immutable after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppEntry {
    pub name: String,
    pub slug: String,
    pub command: String,
    #[serde(rename = "workingDirectory")]
    pub working_directory: String,
    pub terminal: bool,
}

/// Minimal CLI surface for the gateway binary. Argument parsing beyond
/// these handful of flags, and the format of the `--apps` file, are
/// external collaborators (§1) — this struct is deliberately thin.
#[derive(Debug, Parser)]
#[command(name = "termgate", version, about = "Local HTTP/WebSocket terminal gateway.")]
pub struct GatewayConfig {
    /// Host address to bind to.
    #[arg(long, env = "TERMGATE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// HTTP port to listen on.
    #[arg(long, env = "TERMGATE_PORT", default_value = "8420")]
    pub port: u16,

    /// Path to a JSON file containing the list of `AppEntry` records.
    #[arg(long, env = "TERMGATE_APPS")]
    pub apps: Option<PathBuf>,

    /// Log format (json or text).
    #[arg(long, env = "TERMGATE_LOG_FORMAT", default_value = "text")]
    pub log_format: String,
}

impl GatewayConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.port == 0 {
            anyhow::bail!("--port must be nonzero");
        }
        Ok(())
    }
}

/// Load the app entry list from a JSON file.
pub fn load_entries(path: &std::path::Path) -> anyhow::Result<Vec<AppEntry>> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
    let entries: Vec<AppEntry> = serde_json::from_str(&data)
        .map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))?;
    Ok(entries)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
