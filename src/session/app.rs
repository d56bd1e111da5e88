// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Framed co-process session (C4): a child that speaks
//! `tag(1) | length_be32(4) | payload(length)` packets over stdin/stdout.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};

use crate::identity::SessionId;

use super::{Connector, ConnectorSlot, ProcessState, StateCell};

/// Child is expected to print this line before any packet (§4.4).
pub const READY_SENTINEL: &[u8] = b"__GANGLION__\n";

/// Implementation-chosen ceiling within the spec's mandated 1 MiB..=16 MiB
/// range (§4.4).
pub const MAX_PAYLOAD_SIZE: usize = 4 * 1024 * 1024;

const DATA_TAG: u8 = b'D';
const META_TAG: u8 = b'M';
const BINARY_TAG: u8 = b'P';

const CLOSE_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Encode a single packet: `tag | len_be32 | payload`.
pub fn encode_packet(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(5 + payload.len());
    out.push(tag);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Decode a single complete packet from the front of `buf`, for round-trip
/// testing (the live read loop parses incrementally off a socket instead).
pub fn decode_packet(buf: &[u8]) -> Option<(u8, &[u8])> {
    if buf.len() < 5 {
        return None;
    }
    let tag = buf[0];
    let len = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
    if buf.len() < 5 + len {
        return None;
    }
    Some((tag, &buf[5..5 + len]))
}

enum AppCommand {
    Data(Bytes),
    Meta(Value),
}

/// A child process that speaks the framed protocol over pipes (no PTY).
pub struct AppSession {
    id: SessionId,
    cmd_tx: mpsc::Sender<AppCommand>,
    connector: ConnectorSlot,
    state: StateCell,
    shutdown: Arc<tokio::sync::Notify>,
    join: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl AppSession {
    pub fn spawn(
        id: SessionId,
        command: &str,
        working_directory: &str,
        cols: u16,
        rows: u16,
        connector: Connector,
    ) -> anyhow::Result<Self> {
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .current_dir(working_directory)
            .env("COLUMNS", cols.to_string())
            .env("ROWS", rows.to_string())
            .env("TERMGATE", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().ok_or_else(|| anyhow::anyhow!("child stdin not piped"))?;
        let stdout = child.stdout.take().ok_or_else(|| anyhow::anyhow!("child stdout not piped"))?;
        let stderr = child.stderr.take();

        if let Some(mut stderr) = stderr {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf).await;
                if !buf.is_empty() {
                    tracing::debug!(bytes = buf.len(), "app session stderr output");
                }
            });
        }

        let connector_slot = ConnectorSlot::new(connector);
        let state = StateCell::new();
        let shutdown = Arc::new(tokio::sync::Notify::new());
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let task_connector = connector_slot.clone();
        let task_state = state.clone();
        let task_shutdown = Arc::clone(&shutdown);

        let join = tokio::spawn(run_loop(child, stdin, stdout, cmd_rx, task_connector, task_state, task_shutdown));

        Ok(Self {
            id,
            cmd_tx,
            connector: connector_slot,
            state,
            shutdown,
            join: Mutex::new(Some(join)),
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> ProcessState {
        self.state.get()
    }

    pub async fn send_bytes(&self, data: Bytes) -> bool {
        self.cmd_tx.send(AppCommand::Data(data)).await.is_ok()
    }

    pub async fn send_meta(&self, meta: Value) -> bool {
        self.cmd_tx.send(AppCommand::Meta(meta)).await.is_ok()
    }

    /// `set_terminal_size` sends a `{type:"resize", cols, rows}` meta
    /// packet; the child lays itself out (§4.4).
    pub async fn set_terminal_size(&self, cols: u16, rows: u16) {
        let meta = serde_json::json!({ "type": "resize", "cols": cols, "rows": rows });
        let _ = self.cmd_tx.send(AppCommand::Meta(meta)).await;
    }

    /// Framed apps manage their own redraw; the gateway keeps no terminal
    /// replay for this session kind (§2: "for C4, a no-op").
    pub fn get_replay_buffer(&self) -> Bytes {
        Bytes::new()
    }

    pub async fn update_connector(&self, connector: Connector) {
        self.connector.replace(connector).await;
    }

    pub async fn close(&self) {
        if self.state.get() == ProcessState::Closed {
            return;
        }
        self.state.set(ProcessState::Closing);
        self.shutdown.notify_one();
        self.wait_for_exit().await;
    }

    pub async fn wait_for_exit(&self) {
        let mut guard = self.join.lock().await;
        if let Some(handle) = guard.take() {
            let _ = tokio::time::timeout(CLOSE_JOIN_TIMEOUT, handle).await;
        }
    }
}

async fn read_packet<R: tokio::io::AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Option<(u8, Vec<u8>)>> {
    let mut tag_buf = [0u8; 1];
    match reader.read_exact(&mut tag_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_PAYLOAD_SIZE {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "declared payload exceeds MAX_PAYLOAD_SIZE"));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some((tag_buf[0], payload)))
}

async fn run_loop(
    mut child: Child,
    mut stdin: tokio::process::ChildStdin,
    stdout: tokio::process::ChildStdout,
    mut cmd_rx: mpsc::Receiver<AppCommand>,
    connector: ConnectorSlot,
    state: StateCell,
    shutdown: Arc<tokio::sync::Notify>,
) {
    let mut reader = BufReader::new(stdout);

    // Readiness: discard lines until the sentinel is observed (§4.4).
    loop {
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => {
                state.set(ProcessState::Closed);
                connector.current().await.on_close().await;
                return;
            }
            Ok(_) => {
                if line == READY_SENTINEL {
                    state.set(ProcessState::Running);
                    break;
                }
            }
            Err(_) => {
                state.set(ProcessState::Closed);
                connector.current().await.on_close().await;
                return;
            }
        }
    }

    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            cmd = cmd_rx.recv() => {
                let packet = match cmd {
                    Some(AppCommand::Data(data)) => encode_packet(DATA_TAG, &data),
                    Some(AppCommand::Meta(meta)) => {
                        let json = serde_json::to_vec(&meta).unwrap_or_default();
                        encode_packet(META_TAG, &json)
                    }
                    None => break,
                };
                if stdin.write_all(&packet).await.is_err() {
                    break;
                }
            }
            packet = read_packet(&mut reader) => {
                match packet {
                    Ok(Some((tag, payload))) => {
                        let bytes = Bytes::from(payload);
                        match tag {
                            DATA_TAG => {
                                connector.current().await.on_data(bytes).await;
                            }
                            META_TAG => {
                                match serde_json::from_slice::<Value>(&bytes) {
                                    Ok(meta) => {
                                        let is_exit = meta.get("type").and_then(Value::as_str) == Some("exit");
                                        connector.current().await.on_meta(meta).await;
                                        if is_exit {
                                            break;
                                        }
                                    }
                                    Err(_) => break,
                                }
                            }
                            BINARY_TAG => {
                                connector.current().await.on_binary_encoded_message(bytes).await;
                            }
                            _ => {}
                        }
                    }
                    Ok(None) => break,
                    Err(_) => break,
                }
            }
        }
    }

    state.set(ProcessState::Closing);
    let _ = tokio::time::timeout(Duration::from_secs(5), child.wait()).await;
    if child.try_wait().ok().flatten().is_none() {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }

    state.set(ProcessState::Closed);
    connector.current().await.on_close().await;
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
