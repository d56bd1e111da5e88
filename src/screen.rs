// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal emulator: a VT screen model extended with alternate-screen
//! save/restore and a pre-processor for partial erase-upward runs.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// One of the three alternate-screen DECSET/DECRST modes. Xterm treats
/// them as independent flags that can be set together (e.g. tmux sets
/// 1047 and 1049 close together); we track membership in a small set
/// rather than a single bool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum AltMode {
    M1047,
    M1048,
    M1049,
}

struct AltMarker {
    bytes: &'static [u8; 8],
    mode: AltMode,
    entering: bool,
}

const MARKERS: &[AltMarker] = &[
    AltMarker { bytes: b"\x1b[?1047h", mode: AltMode::M1047, entering: true },
    AltMarker { bytes: b"\x1b[?1047l", mode: AltMode::M1047, entering: false },
    AltMarker { bytes: b"\x1b[?1048h", mode: AltMode::M1048, entering: true },
    AltMarker { bytes: b"\x1b[?1048l", mode: AltMode::M1048, entering: false },
    AltMarker { bytes: b"\x1b[?1049h", mode: AltMode::M1049, entering: true },
    AltMarker { bytes: b"\x1b[?1049l", mode: AltMode::M1049, entering: false },
];

const MARKER_LEN: usize = 8;

/// Snapshot of the main screen taken the instant alternate-screen mode is
/// entered. Dropped without being applied if a resize lands before the
/// matching exit (see `Screen::resize`).
struct AltSnapshot {
    lines: Vec<String>,
    cursor: CursorPosition,
}

/// Opaque terminal screen backed by an avt virtual terminal.
pub struct Screen {
    vt: avt::Vt,
    seq: u64,
    changed: bool,
    alt_modes: HashSet<AltMode>,
    alt_snapshot: Option<AltSnapshot>,
    resize_since_alt: bool,
    /// Bytes carried across `feed()` calls: either an incomplete UTF-8
    /// tail or a prefix of an alt-screen marker that may still be
    /// completed by the next call.
    pending: Vec<u8>,
}

impl std::fmt::Debug for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screen")
            .field("seq", &self.seq)
            .field("changed", &self.changed)
            .field("alt_screen", &self.is_alt_screen())
            .finish()
    }
}

/// Returns the number of trailing bytes of `data` that form an incomplete
/// UTF-8 sequence (0 when the tail is complete or pure ASCII).
fn incomplete_utf8_tail_len(data: &[u8]) -> usize {
    let len = data.len();
    for i in 1..=len.min(3) {
        let byte = data[len - i];
        if byte < 0x80 {
            return 0;
        }
        if byte >= 0xC0 {
            let expected = if byte < 0xE0 {
                2
            } else if byte < 0xF0 {
                3
            } else {
                4
            };
            return if i < expected { i } else { 0 };
        }
    }
    0
}

/// Longest suffix of `data` that is a proper prefix of some alt-screen
/// marker — i.e. bytes we must hold back because the next `feed()` call
/// might complete a marker split across the boundary.
fn marker_prefix_overlap(data: &[u8]) -> usize {
    let max = data.len().min(MARKER_LEN - 1);
    for len in (1..=max).rev() {
        let suffix = &data[data.len() - len..];
        if MARKERS.iter().any(|m| &m.bytes[..len] == suffix) {
            return len;
        }
    }
    0
}

/// Find the earliest occurrence of any alt-screen marker in `data`,
/// returning its byte offset and which marker matched.
fn find_marker(data: &[u8]) -> Option<(usize, &'static AltMarker)> {
    if data.len() < MARKER_LEN {
        return None;
    }
    for i in 0..=data.len() - MARKER_LEN {
        for m in MARKERS {
            if &data[i..i + MARKER_LEN] == m.bytes.as_slice() {
                return Some((i, m));
            }
        }
    }
    None
}

impl Screen {
    /// Create a new screen with the given dimensions.
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            vt: avt::Vt::new(cols as usize, rows as usize),
            seq: 0,
            changed: false,
            alt_modes: HashSet::new(),
            alt_snapshot: None,
            resize_since_alt: false,
            pending: Vec::new(),
        }
    }

    /// Feed raw bytes from the child process into the virtual terminal.
    ///
    /// Alt-screen markers are intercepted and stripped before avt ever
    /// sees them: avt's own alternate-buffer handling has no notion of
    /// "discard the saved buffer on resize" (see `resize`), so save/clear/
    /// restore is performed here instead.
    pub fn feed(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        self.pending.extend_from_slice(data);

        loop {
            match find_marker(&self.pending) {
                Some((offset, marker)) => {
                    let text: Vec<u8> = self.pending.drain(..offset).collect();
                    self.feed_text(&text);
                    self.pending.drain(..MARKER_LEN);
                    self.apply_alt_marker(marker);
                }
                None => {
                    let overlap = marker_prefix_overlap(&self.pending);
                    let safe_len = self.pending.len() - overlap;
                    let tail_incomplete = incomplete_utf8_tail_len(&self.pending[..safe_len]);
                    let feed_len = safe_len - tail_incomplete;
                    let text: Vec<u8> = self.pending.drain(..feed_len).collect();
                    self.feed_text(&text);
                    break;
                }
            }
        }

        self.seq += 1;
        self.changed = true;
    }

    fn feed_text(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let s = String::from_utf8_lossy(data);
        let _ = self.vt.feed_str(&s);
    }

    fn apply_alt_marker(&mut self, marker: &AltMarker) {
        if marker.entering {
            if self.alt_modes.is_empty() {
                let cursor = self.vt.cursor();
                let lines: Vec<String> = self.vt.view().map(|line| line.text()).collect();
                self.alt_snapshot = Some(AltSnapshot {
                    lines,
                    cursor: CursorPosition { row: cursor.row as u16, col: cursor.col as u16 },
                });
                self.resize_since_alt = false;
            }
            self.alt_modes.insert(marker.mode);
            let _ = self.vt.feed_str("\x1b[2J\x1b[H");
        } else {
            self.alt_modes.remove(&marker.mode);
            if self.alt_modes.is_empty() {
                match self.alt_snapshot.take() {
                    Some(snap) if !self.resize_since_alt => self.restore_snapshot(&snap),
                    _ => {
                        let _ = self.vt.feed_str("\x1b[2J\x1b[H");
                    }
                }
            }
        }
    }

    fn restore_snapshot(&mut self, snap: &AltSnapshot) {
        let mut out = String::from("\x1b[2J\x1b[H");
        for (i, line) in snap.lines.iter().enumerate() {
            if i > 0 {
                out.push_str("\r\n");
            }
            out.push_str(line);
        }
        out.push_str(&format!("\x1b[{};{}H", snap.cursor.row + 1, snap.cursor.col + 1));
        let _ = self.vt.feed_str(&out);
    }

    /// Capture a point-in-time snapshot of the screen contents.
    pub fn snapshot(&self) -> ScreenSnapshot {
        let (cols, rows) = self.vt.size();
        let cursor = self.vt.cursor();
        let lines: Vec<String> = self.vt.view().map(|line| line.text()).collect();

        ScreenSnapshot {
            lines,
            cols: cols as u16,
            rows: rows as u16,
            alt_screen: self.is_alt_screen(),
            cursor: CursorPosition { row: cursor.row as u16, col: cursor.col as u16 },
            sequence: self.seq,
        }
    }

    /// Whether the terminal is in alternate-screen mode.
    pub fn is_alt_screen(&self) -> bool {
        !self.alt_modes.is_empty()
    }

    /// Whether the screen has been updated since the last `clear_changed`.
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Clear the changed flag.
    pub fn clear_changed(&mut self) {
        self.changed = false;
    }

    /// Current sequence number, incremented on each `feed`.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Resize the virtual terminal. If alternate-screen mode is active,
    /// the saved main-screen snapshot is discarded: the next exit from
    /// alternate-screen mode will not restore it, matching the reference
    /// implementation's "resize invalidates the saved buffer" behaviour.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        let _ = self.vt.resize(cols as usize, rows as usize);
        if !self.alt_modes.is_empty() {
            self.resize_since_alt = true;
            self.alt_snapshot = None;
        }
    }

    /// Current cursor row, used by the partial-clear pre-processor to
    /// decide how far a clear-upward run should be extended.
    pub fn cursor_row(&self) -> u16 {
        self.vt.cursor().row as u16
    }

    /// Capture the screen as runs of same-pen cells, for renderers that
    /// need SGR attributes rather than plain text (e.g. the SVG
    /// screenshot renderer).
    pub fn styled_lines(&self) -> Vec<Vec<CellSpan>> {
        self.vt
            .view()
            .map(|line| {
                line.chunks(|c1, c2| c1.pen() != c2.pen())
                    .map(|cells| {
                        let pen = cells[0].pen();
                        let mut fg = pen.foreground().map(|c| resolve_color(&c));
                        let mut bg = pen.background().map(|c| resolve_color(&c));
                        if pen.is_inverse() {
                            std::mem::swap(&mut fg, &mut bg);
                        }
                        CellSpan {
                            text: cells.iter().map(|c| c.char()).collect(),
                            fg,
                            bg,
                            bold: pen.is_bold(),
                            italic: pen.is_italic(),
                            underline: pen.is_underline(),
                            strikethrough: pen.is_strikethrough(),
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

/// One run of cells sharing the same pen, resolved to concrete colours.
#[derive(Debug, Clone, PartialEq)]
pub struct CellSpan {
    pub text: String,
    pub fg: Option<(u8, u8, u8)>,
    pub bg: Option<(u8, u8, u8)>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
}

fn resolve_color(color: &avt::Color) -> (u8, u8, u8) {
    match color {
        avt::Color::Indexed(n) => indexed_to_rgb(*n),
        avt::Color::RGB(rgb) => (rgb.r, rgb.g, rgb.b),
    }
}

/// Standard xterm 256-colour palette: 0-15 the named ANSI colours, 16-231
/// a 6x6x6 colour cube, 232-255 a 24-step greyscale ramp.
fn indexed_to_rgb(n: u8) -> (u8, u8, u8) {
    const BASE16: [(u8, u8, u8); 16] = [
        (0, 0, 0),
        (205, 0, 0),
        (0, 205, 0),
        (205, 205, 0),
        (0, 0, 238),
        (205, 0, 205),
        (0, 205, 205),
        (229, 229, 229),
        (127, 127, 127),
        (255, 0, 0),
        (0, 255, 0),
        (255, 255, 0),
        (92, 92, 255),
        (255, 0, 255),
        (0, 255, 255),
        (255, 255, 255),
    ];
    if (n as usize) < 16 {
        return BASE16[n as usize];
    }
    if n >= 232 {
        let level = 8 + (n as u16 - 232) * 10;
        return (level as u8, level as u8, level as u8);
    }
    const LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];
    let i = n as u16 - 16;
    let (r, g, b) = (i / 36, (i / 6) % 6, i % 6);
    (LEVELS[r as usize], LEVELS[g as usize], LEVELS[b as usize])
}

/// Point-in-time capture of the terminal screen contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenSnapshot {
    pub lines: Vec<String>,
    pub cols: u16,
    pub rows: u16,
    pub alt_screen: bool,
    pub cursor: CursorPosition,
    pub sequence: u64,
}

/// Row and column position of the terminal cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub row: u16,
    pub col: u16,
}

const CLEAR_UP_PAIR: &[u8] = b"\x1b[2K\x1b[1A";

/// Compensating layer for TUI frameworks that clear their rendered region
/// by emitting a run of `ESC[2K ESC[1A` (erase line, cursor up) pairs
/// shorter than the number of rows actually drawn. Runs of fewer than 3
/// pairs are left alone (ordinary single-line edits); runs that already
/// reach row 0 are left alone. A pure function over the byte stream plus
/// the cursor row *before* the run begins — it never touches emulator
/// state.
pub fn expand_partial_clear(data: &[u8], cursor_row: u16) -> Vec<u8> {
    let pair_len = CLEAR_UP_PAIR.len();
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        if data[i..].starts_with(CLEAR_UP_PAIR) {
            let mut count = 0usize;
            let mut j = i;
            while data[j..].starts_with(CLEAR_UP_PAIR) {
                count += 1;
                j += pair_len;
            }

            if count >= 3 && count < cursor_row as usize {
                for _ in 0..cursor_row {
                    out.extend_from_slice(CLEAR_UP_PAIR);
                }
            } else {
                out.extend_from_slice(&data[i..j]);
            }
            i = j;
        } else {
            out.push(data[i]);
            i += 1;
        }
    }

    out
}

#[cfg(test)]
#[path = "screen_tests.rs"]
mod tests;
