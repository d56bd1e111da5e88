// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded replay buffer holding the most recent raw output bytes for a
//! session, so a reconnecting browser (or the screenshot renderer) can
//! re-hydrate without the child replaying anything itself.

use std::sync::Mutex;

use bytes::Bytes;

/// Hard cap on retained bytes. Trimming drops whole chunks from the head
/// once the total exceeds this; a single oversized append may push the
/// buffer briefly above the cap until the next trim.
pub const MAX_BYTES: usize = 64 * 1024;

#[derive(Default)]
struct Inner {
    chunks: std::collections::VecDeque<Bytes>,
    size: usize,
}

impl Inner {
    fn append(&mut self, data: Bytes) {
        if data.is_empty() {
            return;
        }
        self.size += data.len();
        self.chunks.push_back(data);
        while self.size > MAX_BYTES {
            match self.chunks.pop_front() {
                Some(chunk) => self.size -= chunk.len(),
                None => break,
            }
        }
    }

    fn snapshot(&self) -> Bytes {
        if self.chunks.len() == 1 {
            return self.chunks[0].clone();
        }
        let mut out = Vec::with_capacity(self.size);
        for chunk in &self.chunks {
            out.extend_from_slice(chunk);
        }
        Bytes::from(out)
    }
}

/// A rope of byte chunks rather than a single growing buffer: appending is
/// O(1) and trimming from the head is O(chunks dropped), not O(n).
/// Appends and reads are serialised by a per-session mutex (§5).
pub struct ReplayBuffer {
    inner: Mutex<Inner>,
}

impl ReplayBuffer {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }

    /// Append bytes observed from the child, trimming the head if the
    /// buffer now exceeds [`MAX_BYTES`].
    pub fn append(&self, data: impl Into<Bytes>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.append(data.into());
    }

    /// Concatenate all retained chunks into a single contiguous buffer.
    pub fn snapshot(&self) -> Bytes {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.snapshot()
    }

    /// Current retained size in bytes.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ReplayBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "replay_tests.rs"]
mod tests;
