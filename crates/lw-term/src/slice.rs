// SPDX-License-Identifier: MIT
//
// Horizontal slicing of ANSI-styled lines.
//
// Given a line, a starting column and a window width, produce the text
// that shows exactly that window while keeping the styling correct:
//
//   - Escape sequences seen before the window opens are collected into a
//     prefix and emitted right before the first visible character, so a
//     color that began off-screen still applies. An SGR reset in that
//     stretch cancels the SGR sequences buffered before it; the row
//     already starts from a reset, so the reset itself is not kept.
//   - Inside the window, tokens are copied verbatim.
//   - The output always ends with SGR 0, so a truncated row can never
//     bleed its style into the next one.
//
// A window with no visible character in it produces an empty string, not
// a lone reset.

use crate::token::{Token, tokenize};
use crate::width::WidthSource;

/// SGR reset appended to every non-empty slice.
pub const RESET: &str = "\x1b[0m";

/// Total display width of `line`, ignoring escape sequences.
#[must_use]
pub fn visible_width(line: &str) -> usize {
    visible_width_with(WidthSource::Database, line)
}

/// [`visible_width`] with an explicit width source.
#[must_use]
pub fn visible_width_with(source: WidthSource, line: &str) -> usize {
    tokenize(line)
        .map(|tok| match tok {
            Token::Escape(_) => 0,
            Token::Char(ch) => source.width(ch),
        })
        .sum()
}

/// Visible window `[start, start + width)` of `line`.
#[must_use]
pub fn slice(line: &str, start: usize, width: usize) -> String {
    slice_with(WidthSource::Database, line, start, width)
}

/// [`slice`] with an explicit width source.
#[must_use]
pub fn slice_with(source: WidthSource, line: &str, start: usize, width: usize) -> String {
    if width == 0 {
        return String::new();
    }

    let mut pos = 0;
    let mut taken = 0;
    let mut prefix: Vec<&str> = Vec::new();
    let mut out: Option<String> = None;

    for tok in tokenize(line) {
        match tok {
            Token::Escape(seq) => match out.as_mut() {
                Some(buf) => buf.push_str(seq),
                None => push_prefix(&mut prefix, seq),
            },
            Token::Char(ch) => {
                let w = source.width(ch);
                if w == 0 {
                    if let Some(buf) = out.as_mut() {
                        buf.push(ch);
                    }
                    continue;
                }

                if pos + w <= start {
                    pos += w;
                    continue;
                }

                let buf = out.get_or_insert_with(|| {
                    let mut s = String::with_capacity(line.len().min(width.saturating_mul(4)) + RESET.len());
                    prefix.iter().for_each(|seq| s.push_str(seq));
                    s
                });
                buf.push(ch);
                pos += w;
                taken += w;
                if taken >= width {
                    break;
                }
            }
        }
    }

    out.map_or_else(String::new, |mut buf| {
        buf.push_str(RESET);
        buf
    })
}

/// Buffer a pre-window escape, folding SGR resets.
fn push_prefix<'a>(prefix: &mut Vec<&'a str>, seq: &'a str) {
    match sgr_params(seq) {
        Some(params) if resets_first(params) => {
            prefix.retain(|s| sgr_params(s).is_none());
            if !is_pure_reset(params) {
                prefix.push(seq);
            }
        }
        _ => prefix.push(seq),
    }
}

/// Parameter bytes of an SGR sequence (`ESC [ params m`), if `seq` is one.
fn sgr_params(seq: &str) -> Option<&str> {
    seq.strip_prefix("\x1b[")?.strip_suffix('m')
}

fn resets_first(params: &str) -> bool {
    params.split(';').next().is_none_or(|p| p.is_empty() || p.bytes().all(|b| b == b'0'))
}

fn is_pure_reset(params: &str) -> bool {
    params.split(';').all(|p| p.is_empty() || p.bytes().all(|b| b == b'0'))
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const HELLO: &str = "\x1b[31mHELLO\x1b[0m WORLD";

    fn strip(s: &str) -> String {
        tokenize(s)
            .filter_map(|t| match t {
                Token::Char(c) => Some(c),
                Token::Escape(_) => None,
            })
            .collect()
    }

    // ── visible_width ───────────────────────────────────────────────

    #[test]
    fn width_ignores_escapes() {
        assert_eq!(visible_width(HELLO), 11);
    }

    #[test]
    fn width_counts_wide_chars() {
        assert_eq!(visible_width("a中b"), 4);
    }

    #[test]
    fn width_of_empty_line() {
        assert_eq!(visible_width(""), 0);
    }

    // ── slice: the canonical scenarios ───────────────────────────────

    #[test]
    fn slice_keeps_style_prefix() {
        assert_eq!(slice(HELLO, 0, 5), "\x1b[31mHELLO\x1b[0m");
    }

    #[test]
    fn slice_after_closed_style_has_no_prefix() {
        assert_eq!(slice(HELLO, 6, 5), "WORLD\x1b[0m");
    }

    #[test]
    fn reset_with_new_color_replaces_prefix() {
        let line = "\x1b[1m\x1b[31mab\x1b[0;32mcd";
        assert_eq!(slice(line, 3, 1), "\x1b[0;32md\x1b[0m");
    }

    #[test]
    fn non_sgr_prefix_survives_reset() {
        let line = "\x1b]8;;http://x\x1b\\\x1b[31mab\x1b[mcd";
        assert_eq!(slice(line, 2, 2), "\x1b]8;;http://x\x1b\\cd\x1b[0m");
    }

    #[test]
    fn style_set_after_reset_is_kept() {
        let line = "\x1b[31ma\x1b[0m\x1b[34mbc";
        assert_eq!(slice(line, 2, 1), "\x1b[34mc\x1b[0m");
    }

    #[test]
    fn slice_mid_style_run_keeps_color() {
        assert_eq!(slice(HELLO, 2, 2), "\x1b[31mLL\x1b[0m");
    }

    // ── slice: edges ─────────────────────────────────────────────────

    #[test]
    fn zero_width_window_is_empty() {
        assert_eq!(slice(HELLO, 0, 0), "");
    }

    #[test]
    fn window_past_end_is_empty() {
        assert_eq!(slice(HELLO, 11, 5), "");
        assert_eq!(slice("", 0, 80), "");
    }

    #[test]
    fn escape_only_line_is_empty() {
        assert_eq!(slice("\x1b[31m\x1b[0m", 0, 10), "");
    }

    #[test]
    fn short_line_is_emitted_whole() {
        assert_eq!(slice("abc", 0, 80), "abc\x1b[0m");
    }

    #[test]
    fn trailing_escapes_inside_window_are_kept() {
        assert_eq!(slice("ab\x1b[0m", 0, 80), "ab\x1b[0m\x1b[0m");
    }

    #[test]
    fn slicing_stops_at_width() {
        assert_eq!(slice("abcdef", 1, 3), "bcd\x1b[0m");
    }

    #[test]
    fn escapes_after_window_are_dropped() {
        assert_eq!(slice("ab\x1b[32mcd", 0, 2), "ab\x1b[0m");
    }

    #[test]
    fn wide_char_counts_two_columns() {
        assert_eq!(slice("中文字", 0, 4), "中文\x1b[0m");
    }

    #[test]
    fn wide_char_straddling_start_is_kept() {
        // '中' occupies columns 0-1; starting at 1 still shows it.
        assert_eq!(slice("中x", 1, 2), "中\x1b[0m");
    }

    #[test]
    fn wide_char_may_overrun_window() {
        assert_eq!(slice("a中", 0, 2), "a中\x1b[0m");
    }

    #[test]
    fn combining_mark_after_start_is_emitted() {
        assert_eq!(slice("e\u{301}x", 0, 2), "e\u{301}x\x1b[0m");
    }

    #[test]
    fn combining_mark_before_start_is_dropped() {
        assert_eq!(slice("e\u{301}x", 1, 1), "x\x1b[0m");
    }

    #[test]
    fn zero_width_right_after_window_fills_is_not_emitted() {
        assert_eq!(slice("ab\u{301}", 0, 2), "ab\x1b[0m");
    }

    #[test]
    fn heuristic_source_is_honored() {
        assert_eq!(slice_with(WidthSource::Heuristic, "中文", 0, 2), "中\x1b[0m");
        assert_eq!(visible_width_with(WidthSource::Heuristic, "中文"), 4);
    }

    // ── properties ───────────────────────────────────────────────────

    fn styled_line() -> impl Strategy<Value = String> {
        let piece = prop_oneof![
            "[ -~]{1,8}",
            Just("\x1b[31m".to_owned()),
            Just("\x1b[1;4m".to_owned()),
            Just("\x1b[0m".to_owned()),
            Just("\x1b]0;t\x07".to_owned()),
            Just("中".to_owned()),
            Just("e\u{301}".to_owned()),
        ];
        prop::collection::vec(piece, 0..16).prop_map(|v| v.concat())
    }

    proptest! {
        #[test]
        fn ascii_width_equals_length(s in "[ -~]{0,64}") {
            prop_assert_eq!(visible_width(&s), s.len());
        }

        #[test]
        fn ascii_slice_matches_substring(s in "[ -~]{0,64}", start in 0usize..70, width in 1usize..70) {
            let expected: String = s.chars().skip(start).take(width).collect();
            let out = slice(&s, start, width);
            if expected.is_empty() {
                prop_assert_eq!(out, "");
            } else {
                prop_assert_eq!(out, format!("{expected}{RESET}"));
            }
        }

        #[test]
        fn prefix_stability(s in "[ -~]{0,64}", w in 1usize..32, extra in 1usize..32) {
            prop_assume!(s.len() >= w + extra);
            let narrow = slice(&s, 0, w);
            let wide = slice(&s, 0, w + extra);
            let narrow_text = strip(&narrow);
            prop_assert!(strip(&wide).starts_with(&narrow_text));
            prop_assert_eq!(narrow_text.len(), w);
        }

        #[test]
        fn slices_never_break_escapes(line in styled_line(), start in 0usize..40, width in 1usize..40) {
            let out = slice(&line, start, width);
            if !out.is_empty() {
                let body = out.strip_suffix(RESET).expect("reset suffix");
                // Every escape token in the body must also appear in the source.
                for tok in tokenize(body) {
                    if let Token::Escape(seq) = tok {
                        prop_assert!(line.contains(seq), "{seq:?} not in {line:?}");
                    }
                }
            }
        }

        #[test]
        fn slice_width_is_bounded(line in styled_line(), start in 0usize..40, width in 1usize..40) {
            let out = slice(&line, start, width);
            // A trailing wide char may overrun by one column.
            prop_assert!(visible_width(&out) <= width + 1);
        }
    }
}
