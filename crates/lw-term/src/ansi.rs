// SPDX-License-Identifier: MIT
//
// ANSI control sequences written by the viewer, plus the frame buffer
// they are collected into.
//
// The viewer repaints with a deliberately tiny vocabulary: home, clear
// screen (first paint only), reset SGR, erase line, and CR LF between
// rows. No cursor addressing beyond home, no alternate screen, no scroll
// regions. Every function writes to any `impl Write`; in practice the
// target is a `FrameBuffer` so a whole paint leaves in one write.

use std::io::{self, Write};

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor to the top-left cell (CUP with no parameters).
#[inline]
pub fn cursor_home(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[H")
}

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Clear the entire screen (ED 2).
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

/// Erase the whole current line (EL 2). The cursor does not move.
#[inline]
pub fn clear_line(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2K")
}

/// Reset all SGR attributes (SGR 0).
#[inline]
pub fn reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0m")
}

/// Move to the start of the next row.
///
/// Explicit CR LF: the tty's output post-processing may be off, so a
/// bare LF is not guaranteed to return the carriage.
#[inline]
pub fn next_row(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\r\n")
}

// ─── FrameBuffer ─────────────────────────────────────────────────────────────

/// Byte buffer that holds one complete paint.
///
/// Writes never fail; [`flush_to`](Self::flush_to) pushes everything to
/// the real output in one `write_all` and clears the buffer, keeping its
/// allocation for the next frame.
pub struct FrameBuffer {
    buf: Vec<u8>,
}

const DEFAULT_CAPACITY: usize = 16_384;

impl FrameBuffer {
    /// Create an empty buffer with 16 KB preallocated.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    /// Number of bytes accumulated.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Discard accumulated bytes.
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Write accumulated output to `w`, flush it, and clear the buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to or flushing `w` fails. The buffer
    /// is cleared either way so a failed frame is not replayed.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let result = w.write_all(&self.buf).and_then(|()| w.flush());
        self.buf.clear();
        result
    }
}

impl Write for FrameBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Real flushing happens in flush_to().
        Ok(())
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
