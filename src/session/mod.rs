// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session abstraction shared by the two backend kinds (§3, §4.4, §4.5):
//! [`app::AppSession`] (C4, framed co-process) and
//! [`terminal::TerminalSession`] (C5, PTY-hosted shell). Represented as an
//! enum with two concrete variants rather than a trait object — the only
//! state actually shared between the kinds is the connector slot and the
//! process-state flag, so an interface adds indirection without buying
//! anything (§9, "Polymorphic sessions").

pub mod app;
pub mod manager;
pub mod terminal;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};

use crate::identity::SessionId;

/// Finite states of a session's backing process. Transitions are one-way;
/// a session that reaches `Closed` is never reused (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Pending,
    Running,
    Closing,
    Closed,
}

impl ProcessState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Pending,
            1 => Self::Running,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Shared storage for a session's process state, swapped with `Ordering::SeqCst`
/// since transitions are rare and must be immediately visible across tasks.
#[derive(Clone)]
pub(crate) struct StateCell(Arc<AtomicU8>);

impl StateCell {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(ProcessState::Pending as u8)))
    }

    fn set(&self, state: ProcessState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    fn get(&self) -> ProcessState {
        ProcessState::from_u8(self.0.load(Ordering::SeqCst))
    }
}

/// Events a session delivers to whatever browser connection currently owns
/// it. `ConnectorEvent::Close` is delivered exactly once, at the end of a
/// session's life.
#[derive(Debug, Clone)]
pub enum ConnectorEvent {
    Data(Bytes),
    Meta(Value),
    Binary(Bytes),
    Close,
}

/// The sink a session pushes output events to. Backed by a bounded channel
/// of capacity 1 so that a slow browser socket naturally applies
/// backpressure to the session's read loop (§5: "there is no bounded queue
/// between child and connector — the loop *is* the queue"). Cheap to
/// clone; `update_connector` swaps the slot a session reads from rather
/// than passing connectors down call stacks (§9).
#[derive(Clone)]
pub struct Connector {
    tx: mpsc::Sender<ConnectorEvent>,
}

impl Connector {
    pub fn new(tx: mpsc::Sender<ConnectorEvent>) -> Self {
        Self { tx }
    }

    pub async fn on_data(&self, data: Bytes) {
        let _ = self.tx.send(ConnectorEvent::Data(data)).await;
    }

    pub async fn on_meta(&self, meta: Value) {
        let _ = self.tx.send(ConnectorEvent::Meta(meta)).await;
    }

    pub async fn on_binary_encoded_message(&self, data: Bytes) {
        let _ = self.tx.send(ConnectorEvent::Binary(data)).await;
    }

    pub async fn on_close(&self) {
        let _ = self.tx.send(ConnectorEvent::Close).await;
    }
}

/// Mutable slot holding the session's current connector, so reconnection
/// can atomically replace it without disturbing the child process (§3,
/// §4.5 `update_connector`).
#[derive(Clone)]
pub(crate) struct ConnectorSlot(Arc<RwLock<Connector>>);

impl ConnectorSlot {
    fn new(connector: Connector) -> Self {
        Self(Arc::new(RwLock::new(connector)))
    }

    async fn current(&self) -> Connector {
        self.0.read().await.clone()
    }

    async fn replace(&self, connector: Connector) {
        *self.0.write().await = connector;
    }
}

/// Polymorphic session handle, variant per backend kind (§3).
pub enum Session {
    Terminal(terminal::TerminalSession),
    App(app::AppSession),
}

impl Session {
    pub fn id(&self) -> &SessionId {
        match self {
            Self::Terminal(s) => s.id(),
            Self::App(s) => s.id(),
        }
    }

    pub fn state(&self) -> ProcessState {
        match self {
            Self::Terminal(s) => s.state(),
            Self::App(s) => s.state(),
        }
    }

    pub async fn send_bytes(&self, data: Bytes) -> bool {
        match self {
            Self::Terminal(s) => s.send_bytes(data).await,
            Self::App(s) => s.send_bytes(data).await,
        }
    }

    pub async fn send_meta(&self, meta: Value) -> bool {
        match self {
            Self::Terminal(s) => s.send_meta(meta).await,
            Self::App(s) => s.send_meta(meta).await,
        }
    }

    pub async fn set_terminal_size(&self, cols: u16, rows: u16) {
        match self {
            Self::Terminal(s) => s.set_terminal_size(cols, rows).await,
            Self::App(s) => s.set_terminal_size(cols, rows).await,
        }
    }

    pub fn get_replay_buffer(&self) -> Bytes {
        match self {
            Self::Terminal(s) => s.get_replay_buffer(),
            Self::App(s) => s.get_replay_buffer(),
        }
    }

    pub async fn update_connector(&self, connector: Connector) {
        match self {
            Self::Terminal(s) => s.update_connector(connector).await,
            Self::App(s) => s.update_connector(connector).await,
        }
    }

    pub async fn close(&self) {
        match self {
            Self::Terminal(s) => s.close().await,
            Self::App(s) => s.close().await,
        }
    }

    pub async fn wait_for_exit(&self) {
        match self {
            Self::Terminal(s) => s.wait_for_exit().await,
            Self::App(s) => s.wait_for_exit().await,
        }
    }
}
