// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY-hosted shell session (C5).

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::identity::SessionId;
use crate::pty::NativePty;
use crate::replay::ReplayBuffer;
use crate::screen::{expand_partial_clear, Screen};

use super::{Connector, ConnectorSlot, ProcessState, StateCell};

const READ_CHUNK: usize = 64 * 1024;
const CLOSE_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

enum Command {
    Write(Bytes),
    Resize(u16, u16),
}

/// A child process hosted under a pseudo-terminal, seen as a byte stream.
pub struct TerminalSession {
    id: SessionId,
    cmd_tx: mpsc::Sender<Command>,
    replay: Arc<ReplayBuffer>,
    connector: ConnectorSlot,
    state: StateCell,
    shutdown: Arc<tokio::sync::Notify>,
    join: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// Split `command` into argv using POSIX-ish shell word splitting (no
/// expansion, just whitespace splitting honoring simple quoting). Falls
/// back to `$SHELL`, then `/bin/sh`, when `command` is empty (§4.5).
pub fn split_command(command: &str) -> Vec<String> {
    if command.trim().is_empty() {
        let shell = std::env::var("SHELL").unwrap_or_default();
        if !shell.trim().is_empty() {
            return vec![shell];
        }
        return vec!["/bin/sh".to_owned()];
    }

    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = command.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            None => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    if words.is_empty() {
        words.push("/bin/sh".to_owned());
    }
    words
}

impl TerminalSession {
    pub fn spawn(
        id: SessionId,
        command: &str,
        working_directory: &str,
        cols: u16,
        rows: u16,
        connector: Connector,
    ) -> anyhow::Result<Self> {
        let argv = split_command(command);
        let env = [("COLUMNS", cols.to_string()), ("ROWS", rows.to_string()), ("TERM", "xterm-256color".to_owned())];
        let pty = NativePty::spawn(&argv, cols, rows, Some(working_directory), &env)?;

        let replay = Arc::new(ReplayBuffer::new());
        let connector_slot = ConnectorSlot::new(connector);
        let state = StateCell::new();
        let shutdown = Arc::new(tokio::sync::Notify::new());
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let task_replay = Arc::clone(&replay);
        let task_connector = connector_slot.clone();
        let task_state = state.clone();
        let task_shutdown = Arc::clone(&shutdown);

        let join = tokio::spawn(run_loop(pty, cols, rows, cmd_rx, task_replay, task_connector, task_state, task_shutdown));

        state.set(ProcessState::Running);

        Ok(Self {
            id,
            cmd_tx,
            replay,
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
        self.cmd_tx.send(Command::Write(data)).await.is_ok()
    }

    /// PTY sessions have no meta channel; the child re-lays out on its own
    /// via the terminal size, so this is a harmless no-op for C5.
    pub async fn send_meta(&self, _meta: Value) -> bool {
        false
    }

    pub async fn set_terminal_size(&self, cols: u16, rows: u16) {
        let _ = self.cmd_tx.send(Command::Resize(cols, rows)).await;
    }

    pub fn get_replay_buffer(&self) -> Bytes {
        self.replay.snapshot()
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

#[allow(clippy::too_many_arguments)]
async fn run_loop(
    mut pty: NativePty,
    cols: u16,
    rows: u16,
    mut cmd_rx: mpsc::Receiver<Command>,
    replay: Arc<ReplayBuffer>,
    connector: ConnectorSlot,
    state: StateCell,
    shutdown: Arc<tokio::sync::Notify>,
) {
    let mut screen = Screen::new(cols, rows);
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        tokio::select! {
            _ = shutdown.notified() => break,
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Write(data)) => {
                        if pty.write(&data).await.is_err() {
                            break;
                        }
                    }
                    Some(Command::Resize(c, r)) => {
                        let _ = pty.resize(c, r);
                        screen.resize(c, r);
                    }
                    None => break,
                }
            }
            result = pty.read(&mut buf) => {
                match result {
                    Ok(0) => break,
                    Ok(n) => {
                        // Ordering invariant (§5, §8 #1): emulator, replay
                        // buffer and connector must all observe the exact
                        // same byte sequence, in order.
                        let cursor_row = screen.cursor_row();
                        let processed = expand_partial_clear(&buf[..n], cursor_row);
                        screen.feed(&processed);
                        let bytes = Bytes::from(processed);
                        replay.append(bytes.clone());
                        connector.current().await.on_data(bytes).await;
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "pty read error, closing session");
                        break;
                    }
                }
            }
        }
    }

    pty.close().await;
    state.set(ProcessState::Closed);
    connector.current().await.on_close().await;
}

#[cfg(test)]
#[path = "terminal_tests.rs"]
mod tests;
