// SPDX-License-Identifier: MIT
//
// ANSI tokenizer: splits a decoded line into escape sequences and
// single display characters.
//
// The recognition rules follow what a terminal does on ESC:
//
//   ESC [ ...  CSI: runs through the first final byte in '@'..='~'
//   ESC ] ...  OSC: runs through BEL or the string terminator ESC \
//   ESC ( ) # %: charset / line-attribute designators, one more char
//   ESC x: any other two-character form
//
// An unterminated sequence swallows the rest of the line. That can
// misrender a genuinely malformed tail, but it guarantees a token never
// carries half of a sequence that is actually complete in the line.
//
// `Tokens` borrows the line and holds only a cursor, so cloning it
// restarts iteration from the same point.

const ESC: char = '\x1b';
const BEL: u8 = 0x07;

/// One lexical unit of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// A complete (or line-terminated) escape sequence, verbatim.
    Escape(&'a str),
    /// A single display character.
    Char(char),
}

/// Iterator over the tokens of a line.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    line: &'a str,
    pos: usize,
}

impl<'a> Tokens<'a> {
    /// Start tokenizing `line` from its first byte.
    #[must_use]
    pub const fn new(line: &'a str) -> Self {
        Self { line, pos: 0 }
    }
}

/// Tokenize `line`.
#[inline]
#[must_use]
pub const fn tokenize(line: &str) -> Tokens<'_> {
    Tokens::new(line)
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.line[self.pos..];
        let ch = rest.chars().next()?;

        if ch == ESC {
            let len = escape_len(rest);
            self.pos += len;
            return Some(Token::Escape(&rest[..len]));
        }

        self.pos += ch.len_utf8();
        Some(Token::Char(ch))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.line.len() - self.pos;
        (usize::from(remaining > 0), Some(remaining))
    }
}

impl std::iter::FusedIterator for Tokens<'_> {}

/// Byte length of the escape sequence at the start of `s`.
///
/// `s` must begin with ESC. The result is always a char boundary.
fn escape_len(s: &str) -> usize {
    debug_assert!(s.starts_with(ESC));
    let bytes = s.as_bytes();

    let Some(intro) = s[1..].chars().next() else {
        return 1;
    };

    match intro {
        '[' => bytes[2..]
            .iter()
            .position(|b| (b'@'..=b'~').contains(b))
            .map_or(s.len(), |i| 2 + i + 1),
        ']' => osc_len(bytes),
        '(' | ')' | '#' | '%' => s[2..]
            .chars()
            .next()
            .map_or(s.len(), |c| 2 + c.len_utf8()),
        other => 1 + other.len_utf8(),
    }
}

fn osc_len(bytes: &[u8]) -> usize {
    let mut i = 2;
    while i < bytes.len() {
        if bytes[i] == BEL {
            return i + 1;
        }
        if bytes[i] == 0x1b && bytes.get(i + 1) == Some(&b'\\') {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
