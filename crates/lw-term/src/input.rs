// SPDX-License-Identifier: MIT
//
// Keyboard decoder.
//
// Turns raw bytes read from the controlling terminal into the three
// actions the viewer understands. Recognized forms:
//
// - ETX (0x03, Ctrl+C with ISIG off)        → Quit
// - CSI arrows  `ESC [ C` / `ESC [ D`       → ScrollRight / ScrollLeft
// - SS3 arrows  `ESC O C` / `ESC O D`       → ScrollRight / ScrollLeft
// - any CSI ending in C / D, e.g. `ESC [ 1 ; 5 C` (modified arrows)
// - optionally `h` / `l` / `q` (vi-style bindings)
//
// Everything else is consumed and dropped.
//
// # Split reads
//
// Keys can arrive a byte at a time, so a trailing run of bytes that
// could still grow into a recognized sequence (`ESC`, `ESC [`, `ESC O`,
// `ESC [ 1 ;`) is left unconsumed. [`decode`] hands it back as the
// remainder; [`KeyDecoder`] keeps it internally and prepends it to the
// next read.

/// What a keypress asks the viewer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Move the window one step toward column 0.
    ScrollLeft,
    /// Move the window one step right.
    ScrollRight,
    /// Leave the viewer.
    Quit,
}

const ETX: u8 = 0x03;
const ESC: u8 = 0x1B;

/// Longest undecided sequence kept across reads before it is dropped.
///
/// Real arrow sequences with modifiers are under 10 bytes; anything
/// longer that still has no final byte is noise.
const MAX_PENDING: usize = 32;

// ─── Stateless decoding ─────────────────────────────────────────────────────

/// Result of trying to decode one unit from the front of a buffer.
enum Parsed {
    /// An action, consuming `usize` bytes.
    Action(KeyAction, usize),
    /// The bytes could still become a recognized sequence.
    Incomplete,
    /// Unrecognized input, drop `usize` bytes.
    Skip(usize),
}

/// Decode as many actions as possible from `buf`.
///
/// Returns the actions in input order and the undecided tail, which the
/// caller must prepend to the next read.
#[must_use]
pub fn decode(buf: &[u8]) -> (Vec<KeyAction>, &[u8]) {
    decode_with(buf, false)
}

fn decode_with(buf: &[u8], vi_keys: bool) -> (Vec<KeyAction>, &[u8]) {
    let mut actions = Vec::new();
    let mut pos = 0;

    while pos < buf.len() {
        match try_parse(&buf[pos..], vi_keys) {
            Parsed::Action(action, n) => {
                actions.push(action);
                pos += n;
            }
            Parsed::Skip(n) => pos += n,
            Parsed::Incomplete => break,
        }
    }

    (actions, &buf[pos..])
}

fn try_parse(buf: &[u8], vi_keys: bool) -> Parsed {
    match buf[0] {
        ESC => parse_escape(buf),
        ETX => Parsed::Action(KeyAction::Quit, 1),
        b'h' if vi_keys => Parsed::Action(KeyAction::ScrollLeft, 1),
        b'l' if vi_keys => Parsed::Action(KeyAction::ScrollRight, 1),
        b'q' if vi_keys => Parsed::Action(KeyAction::Quit, 1),
        _ => Parsed::Skip(1),
    }
}

fn parse_escape(buf: &[u8]) -> Parsed {
    debug_assert_eq!(buf[0], ESC);

    match buf.get(1) {
        None => Parsed::Incomplete,
        Some(b'[') => parse_csi(buf),
        Some(b'O') => parse_ss3(buf),
        // ESC + anything else: drop the ESC, let the next byte stand alone.
        Some(_) => Parsed::Skip(1),
    }
}

fn parse_csi(buf: &[u8]) -> Parsed {
    // Parameter bytes 0x30..=0x3F, intermediates 0x20..=0x2F, final 0x40..=0x7E.
    for (i, &b) in buf.iter().enumerate().skip(2) {
        if (0x40..=0x7E).contains(&b) {
            return match b {
                b'C' => Parsed::Action(KeyAction::ScrollRight, i + 1),
                b'D' => Parsed::Action(KeyAction::ScrollLeft, i + 1),
                _ => Parsed::Skip(i + 1),
            };
        }
        if !(0x20..=0x3F).contains(&b) {
            // Broken sequence; keep the offending byte for the next pass.
            return Parsed::Skip(i);
        }
    }
    Parsed::Incomplete
}

fn parse_ss3(buf: &[u8]) -> Parsed {
    match buf.get(2) {
        None => Parsed::Incomplete,
        Some(b'C') => Parsed::Action(KeyAction::ScrollRight, 3),
        Some(b'D') => Parsed::Action(KeyAction::ScrollLeft, 3),
        Some(_) => Parsed::Skip(3),
    }
}

// ─── KeyDecoder ─────────────────────────────────────────────────────────────

/// Incremental decoder that carries undecided bytes between reads.
///
/// ```
/// use lw_term::input::{KeyAction, KeyDecoder};
///
/// let mut keys = KeyDecoder::new();
/// assert!(keys.advance(b"\x1b").is_empty());
/// assert_eq!(keys.advance(b"[C"), vec![KeyAction::ScrollRight]);
/// ```
#[derive(Debug, Default)]
pub struct KeyDecoder {
    pending: Vec<u8>,
    vi_keys: bool,
}

impl KeyDecoder {
    /// Decoder recognizing only ETX and arrow sequences.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that also maps `h`, `l` and `q`.
    #[must_use]
    pub fn with_vi_keys(vi_keys: bool) -> Self {
        Self {
            pending: Vec::new(),
            vi_keys,
        }
    }

    /// Feed freshly read bytes; returns the actions they complete.
    pub fn advance(&mut self, data: &[u8]) -> Vec<KeyAction> {
        self.pending.extend_from_slice(data);

        let (actions, rest) = decode_with(&self.pending, self.vi_keys);
        let consumed = self.pending.len() - rest.len();
        self.pending.drain(..consumed);

        if self.pending.len() > MAX_PENDING {
            tracing::trace!(target: "keys", dropped = self.pending.len(), "discarding unterminated sequence");
            self.pending.clear();
        }

        actions
    }

    /// Whether bytes are being held for the next read.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use KeyAction::{Quit, ScrollLeft, ScrollRight};

    fn actions(data: &[u8]) -> Vec<KeyAction> {
        decode(data).0
    }

    // ── Single forms ────────────────────────────────────────────────

    #[test]
    fn etx_quits() {
        assert_eq!(actions(b"\x03"), vec![Quit]);
    }

    #[test]
    fn csi_arrows() {
        assert_eq!(actions(b"\x1b[C"), vec![ScrollRight]);
        assert_eq!(actions(b"\x1b[D"), vec![ScrollLeft]);
    }

    #[test]
    fn ss3_arrows() {
        assert_eq!(actions(b"\x1bOC"), vec![ScrollRight]);
        assert_eq!(actions(b"\x1bOD"), vec![ScrollLeft]);
    }

    #[test]
    fn modified_arrows() {
        assert_eq!(actions(b"\x1b[1;5C"), vec![ScrollRight]);
        assert_eq!(actions(b"\x1b[1;2D"), vec![ScrollLeft]);
    }

    #[test]
    fn vertical_arrows_are_ignored() {
        let (acts, rest) = decode(b"\x1b[A\x1b[B\x1bOA");
        assert!(acts.is_empty());
        assert!(rest.is_empty());
    }

    #[test]
    fn tilde_keys_are_ignored() {
        let (acts, rest) = decode(b"\x1b[5~\x1b[3;2~");
        assert!(acts.is_empty());
        assert!(rest.is_empty());
    }

    #[test]
    fn plain_bytes_are_dropped() {
        let (acts, rest) = decode(b"hello q\r\n");
        assert!(acts.is_empty());
        assert!(rest.is_empty());
    }

    #[test]
    fn sequence_of_actions_keeps_order() {
        assert_eq!(
            actions(b"\x1b[Cx\x1bOD\x1b[C\x03"),
            vec![ScrollRight, ScrollLeft, ScrollRight, Quit]
        );
    }

    #[test]
    fn escape_then_other_byte_drops_escape_only() {
        assert_eq!(actions(b"\x1bx\x03"), vec![Quit]);
        assert_eq!(actions(b"\x1b\x1b[D"), vec![ScrollLeft]);
    }

    #[test]
    fn broken_csi_resyncs_on_next_escape() {
        assert_eq!(actions(b"\x1b[1\x1b[C"), vec![ScrollRight]);
    }

    #[test]
    fn unknown_ss3_consumes_three() {
        let (acts, rest) = decode(b"\x1bOPz");
        assert!(acts.is_empty());
        assert!(rest.is_empty());
    }

    // ── Remainders ──────────────────────────────────────────────────

    #[test]
    fn lone_escape_is_remainder() {
        let (acts, rest) = decode(b"\x1b[C\x1b");
        assert_eq!(acts, vec![ScrollRight]);
        assert_eq!(rest, b"\x1b");
    }

    #[test]
    fn partial_csi_is_remainder() {
        assert_eq!(decode(b"\x1b[").1, b"\x1b[");
        assert_eq!(decode(b"\x1b[1;").1, b"\x1b[1;");
    }

    #[test]
    fn partial_ss3_is_remainder() {
        assert_eq!(decode(b"\x1bO").1, b"\x1bO");
    }

    // ── KeyDecoder ──────────────────────────────────────────────────

    #[test]
    fn split_escape_yields_one_action() {
        let mut keys = KeyDecoder::new();
        assert!(keys.advance(b"\x1b").is_empty());
        assert!(keys.has_pending());
        assert_eq!(keys.advance(b"[C"), vec![ScrollRight]);
        assert!(!keys.has_pending());
    }

    #[test]
    fn byte_by_byte_modified_arrow() {
        let mut keys = KeyDecoder::new();
        let mut all = Vec::new();
        for b in b"\x1b[1;5D" {
            all.extend(keys.advance(std::slice::from_ref(b)));
        }
        assert_eq!(all, vec![ScrollLeft]);
    }

    #[test]
    fn runaway_sequence_is_discarded() {
        let mut keys = KeyDecoder::new();
        let mut junk = b"\x1b[".to_vec();
        junk.extend(std::iter::repeat_n(b'1', MAX_PENDING * 2));
        assert!(keys.advance(&junk).is_empty());
        assert!(!keys.has_pending());
        assert_eq!(keys.advance(b"\x1b[C"), vec![ScrollRight]);
    }

    #[test]
    fn vi_keys_off_by_default() {
        let mut keys = KeyDecoder::new();
        assert!(keys.advance(b"hlq").is_empty());
    }

    #[test]
    fn vi_keys_when_enabled() {
        let mut keys = KeyDecoder::with_vi_keys(true);
        assert_eq!(keys.advance(b"hlq"), vec![ScrollLeft, ScrollRight, Quit]);
    }
}
