// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn feed_plain_text() {
    let mut screen = Screen::new(80, 24);
    screen.feed(b"hello world");
    let snap = screen.snapshot();
    assert!(snap.lines[0].contains("hello world"));
    assert_eq!(snap.sequence, 1);
}

#[test]
fn feed_ansi_color() {
    let mut screen = Screen::new(80, 24);
    // Red text "hi" then reset
    screen.feed(b"\x1b[31mhi\x1b[0m");
    let snap = screen.snapshot();
    assert!(snap.lines[0].contains("hi"));
}

#[test]
fn alt_screen_toggle() {
    let mut screen = Screen::new(80, 24);
    assert!(!screen.is_alt_screen());

    // Enter alt screen
    screen.feed(b"\x1b[?1049h");
    assert!(screen.is_alt_screen());

    // Leave alt screen
    screen.feed(b"\x1b[?1049l");
    assert!(!screen.is_alt_screen());
}

#[test]
fn resize() {
    let mut screen = Screen::new(80, 24);
    screen.resize(40, 10);
    let snap = screen.snapshot();
    assert_eq!(snap.cols, 40);
    assert_eq!(snap.rows, 10);
}

#[test]
fn changed_flag() {
    let mut screen = Screen::new(80, 24);
    assert!(!screen.changed());

    screen.feed(b"x");
    assert!(screen.changed());

    screen.clear_changed();
    assert!(!screen.changed());
}

#[test]
fn empty_feed_is_noop() {
    let mut screen = Screen::new(80, 24);
    screen.feed(b"");
    assert!(!screen.changed());
    assert_eq!(screen.seq(), 0);
}

#[test]
fn cursor_position() {
    let mut screen = Screen::new(80, 24);
    screen.feed(b"abc");
    let snap = screen.snapshot();
    assert_eq!(snap.cursor.col, 3);
    assert_eq!(snap.cursor.row, 0);
}

#[test]
fn alt_screen_toggle_split_across_chunks() {
    let screen = Screen::new(80, 24);
    assert!(!screen.is_alt_screen());

    // Split "\x1b[?1049h" across two feed() calls at every possible boundary.
    let seq = b"\x1b[?1049h";
    for split in 1..seq.len() {
        let mut s = Screen::new(80, 24);
        s.feed(&seq[..split]);
        s.feed(&seq[split..]);
        assert!(s.is_alt_screen(), "split at byte {split}: expected alt screen ON");
    }

    // Now test disable split: "\x1b[?1049l"
    let seq_off = b"\x1b[?1049l";
    for split in 1..seq_off.len() {
        let mut s = Screen::new(80, 24);
        s.feed(b"\x1b[?1049h"); // enter alt screen first
        assert!(s.is_alt_screen());

        s.feed(&seq_off[..split]);
        s.feed(&seq_off[split..]);
        assert!(!s.is_alt_screen(), "split at byte {split}: expected alt screen OFF");
    }
}

#[test]
fn alt_screen_toggle_with_surrounding_data() {
    let mut screen = Screen::new(80, 24);
    // Sequence embedded in surrounding output, split right before the final byte
    let chunk1 = b"hello\x1b[?1049".to_vec();
    let chunk2 = b"hworld";
    screen.feed(&chunk1);
    assert!(!screen.is_alt_screen(), "not yet complete");
    screen.feed(chunk2);
    assert!(screen.is_alt_screen(), "should detect split sequence");
}

#[test]
fn feed_split_utf8_two_byte() -> anyhow::Result<()> {
    let mut screen = Screen::new(80, 24);
    // é is U+00E9, encoded as [0xC3, 0xA9]
    screen.feed(&[0xC3]);
    screen.feed(&[0xA9]);
    let snap = screen.snapshot();
    assert!(snap.lines[0].contains('é'), "expected é, got: {}", snap.lines[0]);
    Ok(())
}

#[test]
fn feed_split_utf8_three_byte() -> anyhow::Result<()> {
    let mut screen = Screen::new(80, 24);
    // ★ is U+2605, encoded as [0xE2, 0x98, 0x85]
    screen.feed(&[0xE2]);
    screen.feed(&[0x98, 0x85]);
    let snap = screen.snapshot();
    assert!(snap.lines[0].contains('★'), "expected ★, got: {}", snap.lines[0]);
    Ok(())
}

#[test]
fn feed_split_utf8_four_byte() -> anyhow::Result<()> {
    let mut screen = Screen::new(80, 24);
    // 😀 is U+1F600, encoded as [0xF0, 0x9F, 0x98, 0x80]
    screen.feed(&[0xF0, 0x9F]);
    screen.feed(&[0x98, 0x80]);
    let snap = screen.snapshot();
    assert!(snap.lines[0].contains('😀'), "expected 😀, got: {}", snap.lines[0]);
    Ok(())
}

#[test]
fn feed_split_utf8_with_surrounding_ascii() -> anyhow::Result<()> {
    let mut screen = Screen::new(80, 24);
    // "abc" + first byte of é
    screen.feed(b"abc\xC3");
    // second byte of é + "def"
    screen.feed(b"\xA9def");
    let snap = screen.snapshot();
    assert!(snap.lines[0].contains("abcédef"), "expected abcédef, got: {}", snap.lines[0]);
    Ok(())
}

#[test]
fn decset_1049_enters_and_decrst_restores_screen() {
    let mut screen = Screen::new(20, 5);
    screen.feed(b"Line A\r\nLine B\r\n");
    let before = screen.snapshot();
    assert!(!before.alt_screen);

    screen.feed(b"\x1b[?1049h");
    assert!(screen.is_alt_screen());
    screen.feed(b"alt content");

    screen.feed(b"\x1b[?1049l");
    assert!(!screen.is_alt_screen());

    let after = screen.snapshot();
    assert_eq!(after.lines[0].trim_end(), before.lines[0].trim_end());
    assert_eq!(after.lines[1].trim_end(), before.lines[1].trim_end());
}

#[test]
fn decset_1047_and_1048_behave_like_1049() {
    for (on, off) in [
        (&b"\x1b[?1047h"[..], &b"\x1b[?1047l"[..]),
        (&b"\x1b[?1048h"[..], &b"\x1b[?1048l"[..]),
    ] {
        let mut screen = Screen::new(20, 5);
        screen.feed(b"main screen\r\n");
        let before = screen.snapshot();

        screen.feed(on);
        assert!(screen.is_alt_screen());
        screen.feed(b"scratch\r\n");

        screen.feed(off);
        assert!(!screen.is_alt_screen());

        let after = screen.snapshot();
        assert_eq!(after.lines[0].trim_end(), before.lines[0].trim_end());
    }
}

#[test]
fn resize_invalidates_saved_buffer() {
    let mut screen = Screen::new(20, 5);
    screen.feed(b"original content\r\n");

    screen.feed(b"\x1b[?1049h");
    assert!(screen.is_alt_screen());
    screen.feed(b"alt content\r\n");

    screen.resize(30, 10);

    screen.feed(b"\x1b[?1049l");
    assert!(!screen.is_alt_screen());

    let snap = screen.snapshot();
    // The restored screen must NOT contain the pre-entry content: resize
    // discarded the saved buffer, so exiting just clears instead.
    assert!(!snap.lines.iter().any(|l| l.contains("original content")));
}

#[test]
fn expand_partial_clear_leaves_short_runs_unchanged() {
    let data = CLEAR_UP_PAIR.repeat(2);
    let out = expand_partial_clear(&data, 20);
    assert_eq!(out, data);
}

#[test]
fn expand_partial_clear_leaves_full_height_runs_unchanged() {
    let data = CLEAR_UP_PAIR.repeat(20);
    let out = expand_partial_clear(&data, 20);
    assert_eq!(out, data);
}

#[test]
fn expand_partial_clear_extends_partial_runs_to_cursor_row() {
    let data = CLEAR_UP_PAIR.repeat(5);
    let out = expand_partial_clear(&data, 20);
    assert_eq!(out, CLEAR_UP_PAIR.repeat(20));
}

#[test]
fn expand_partial_clear_preserves_surrounding_bytes() {
    let mut data = b"before:".to_vec();
    data.extend_from_slice(&CLEAR_UP_PAIR.repeat(4));
    data.extend_from_slice(b":after");

    let out = expand_partial_clear(&data, 10);

    let mut expected = b"before:".to_vec();
    expected.extend_from_slice(&CLEAR_UP_PAIR.repeat(10));
    expected.extend_from_slice(b":after");

    assert_eq!(out, expected);
}

#[test]
fn partial_clear_then_fresh_prompt_leaves_one_line() {
    let mut screen = Screen::new(20, 25);
    for i in 0..20 {
        screen.feed(format!("old line {i}\r\n").as_bytes());
    }
    let cursor_row = screen.cursor_row();

    let clear = expand_partial_clear(&CLEAR_UP_PAIR.repeat(5), cursor_row);
    screen.feed(&clear);
    screen.feed(b"\x1b[2K\x1b[GFresh prompt\r\n");

    let snap = screen.snapshot();
    let non_empty: Vec<&String> = snap.lines.iter().filter(|l| !l.trim().is_empty()).collect();
    assert_eq!(non_empty.len(), 1);
    assert_eq!(non_empty[0].trim(), "Fresh prompt");
}
