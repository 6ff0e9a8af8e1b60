//! Lines and the assembler that cuts a byte stream into them.
//!
//! The data stream arrives in arbitrary chunks. [`LineAssembler`] keeps the
//! unterminated tail between chunks and emits a [`Line`] for every `\n`.
//! Trailing carriage returns are stripped and bytes are decoded leniently:
//! anything that is not UTF-8 becomes U+FFFD.
//!
//! # Safety cap
//!
//! Input that never contains a newline (a binary file, a stuck producer)
//! would otherwise grow the tail without bound. Once the pending bytes
//! exceed `cap`, the assembler cuts a line of at most `cap` bytes, backing
//! off to a UTF-8 boundary so a multibyte character is not split in two.
//! Lines longer than `cap` that do end in a newline are cut the same way.

use lw_term::{WidthSource, visible_width_with};

// ---------------------------------------------------------------------------
// Line
// ---------------------------------------------------------------------------

/// One display line: decoded text with escapes kept verbatim.
///
/// Immutable once built. The visible width is computed on construction so
/// the per-paint max-width scan only sums cached numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    text: String,
    width: usize,
}

impl Line {
    /// Build a line from already-decoded text.
    #[must_use]
    pub fn new(text: impl Into<String>, source: WidthSource) -> Self {
        let text = text.into();
        let width = visible_width_with(source, &text);
        Self { text, width }
    }

    /// Build a line from raw bytes: strip trailing `\r`, decode leniently.
    #[must_use]
    pub fn from_bytes(raw: &[u8], source: WidthSource) -> Self {
        let end = raw.iter().rposition(|&b| b != b'\r').map_or(0, |i| i + 1);
        Self::new(String::from_utf8_lossy(&raw[..end]), source)
    }

    /// The text, escapes included.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Columns occupied on screen.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }
}

impl AsRef<str> for Line {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

// ---------------------------------------------------------------------------
// LineAssembler
// ---------------------------------------------------------------------------

/// Incremental splitter from byte chunks to [`Line`]s.
#[derive(Debug)]
pub struct LineAssembler {
    pending: Vec<u8>,
    cap: usize,
    source: WidthSource,
}

impl LineAssembler {
    /// Assembler cutting lines at `cap` bytes (at least 1).
    #[must_use]
    pub fn new(cap: usize, source: WidthSource) -> Self {
        Self {
            pending: Vec::new(),
            cap: cap.max(1),
            source,
        }
    }

    /// Feed a chunk; returns the lines it completes, oldest first.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Line> {
        let mut lines = Vec::new();

        // Only the new bytes can hold a newline the tail doesn't know about.
        let scan_from = self.pending.len();
        self.pending.extend_from_slice(chunk);

        if let Some(i) = self.pending[scan_from..].iter().rposition(|&b| b == b'\n') {
            let last = scan_from + i;
            let complete: Vec<u8> = self.pending.drain(..=last).collect();
            for raw in complete[..last].split(|&b| b == b'\n') {
                self.emit(raw, &mut lines);
            }
        }

        while self.pending.len() > self.cap {
            let cut = split_point(&self.pending, self.cap);
            tracing::debug!(target: "input", bytes = cut, "forced line break on unterminated input");
            lines.push(Line::from_bytes(&self.pending[..cut], self.source));
            self.pending.drain(..cut);
        }

        lines
    }

    /// End of stream: the unterminated tail, if any, as a final line.
    pub fn finish(&mut self) -> Option<Line> {
        if self.pending.is_empty() {
            return None;
        }
        let line = Line::from_bytes(&self.pending, self.source);
        self.pending.clear();
        Some(line)
    }

    /// Bytes waiting for a newline.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Emit one newline-delimited segment, cutting it if it exceeds the cap.
    fn emit(&self, mut raw: &[u8], lines: &mut Vec<Line>) {
        while raw.len() > self.cap {
            let cut = split_point(raw, self.cap);
            tracing::debug!(target: "input", bytes = cut, "forced line break on oversized line");
            lines.push(Line::from_bytes(&raw[..cut], self.source));
            raw = &raw[cut..];
        }
        lines.push(Line::from_bytes(raw, self.source));
    }
}

/// Largest cut `<= cap` that does not land inside a UTF-8 sequence.
///
/// Backs off at most three bytes; if no boundary is found there (the data
/// is not UTF-8 anyway) the cut is `cap`.
fn split_point(bytes: &[u8], cap: usize) -> usize {
    let is_continuation = |b: u8| b & 0b1100_0000 == 0b1000_0000;
    (cap.saturating_sub(3)..=cap)
        .rev()
        .filter(|&cut| cut > 0)
        .find(|&cut| bytes.get(cut).is_none_or(|&b| !is_continuation(b)))
        .unwrap_or(cap)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
