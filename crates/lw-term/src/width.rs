// SPDX-License-Identifier: MIT
//
// Display width of a single character, in terminal columns.
//
// Two sources are available. The database path asks `unicode-width`,
// which carries the real East Asian Width and zero-width tables. The
// heuristic path is a small set of sorted range tables approximating the
// same classes (combining marks, format characters, wide/fullwidth
// blocks). The heuristic can be off by a column on rare codepoints; that
// is accepted.
//
// Neither source ever returns anything but 0, 1 or 2.

use unicode_width::UnicodeWidthChar;

// ─── Source Selection ───────────────────────────────────────────────────────

/// Which width tables to consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WidthSource {
    /// `unicode-width`'s generated tables.
    #[default]
    Database,
    /// Built-in range approximation.
    Heuristic,
}

impl WidthSource {
    /// Column width of `ch`: 0, 1 or 2.
    #[inline]
    #[must_use]
    pub fn width(self, ch: char) -> usize {
        if is_control(ch) {
            return 0;
        }
        match self {
            Self::Database => database_width(ch),
            Self::Heuristic => heuristic_width(ch),
        }
    }
}

/// C0 controls, DEL and the C1 range.
#[inline]
#[must_use]
pub const fn is_control(ch: char) -> bool {
    let cp = ch as u32;
    cp < 0x20 || (cp >= 0x7F && cp < 0xA0)
}

// ─── Database ───────────────────────────────────────────────────────────────

fn database_width(ch: char) -> usize {
    // `None` only happens for controls, which are handled above; clamp
    // anyway so a table change can never leak a 3 or a negative.
    ch.width().unwrap_or(0).min(2)
}

// ─── Heuristic ──────────────────────────────────────────────────────────────

/// Nonspacing / enclosing marks (Mn, Me), coarse blocks.
const COMBINING: &[(u32, u32)] = &[
    (0x0300, 0x036F),
    (0x0483, 0x0489),
    (0x0591, 0x05BD),
    (0x05BF, 0x05BF),
    (0x05C1, 0x05C2),
    (0x05C4, 0x05C5),
    (0x05C7, 0x05C7),
    (0x0610, 0x061A),
    (0x064B, 0x065F),
    (0x0670, 0x0670),
    (0x06D6, 0x06DC),
    (0x06DF, 0x06E4),
    (0x06E7, 0x06E8),
    (0x06EA, 0x06ED),
    (0x0711, 0x0711),
    (0x0730, 0x074A),
    (0x0900, 0x0902),
    (0x093A, 0x093A),
    (0x093C, 0x093C),
    (0x0941, 0x0948),
    (0x094D, 0x094D),
    (0x0951, 0x0957),
    (0x0E31, 0x0E31),
    (0x0E34, 0x0E3A),
    (0x0E47, 0x0E4E),
    (0x1AB0, 0x1AFF),
    (0x1DC0, 0x1DFF),
    (0x20D0, 0x20FF),
    (0x302A, 0x302D),
    (0x3099, 0x309A),
    (0xFE00, 0xFE0F),
    (0xFE20, 0xFE2F),
    (0xE0100, 0xE01EF),
];

/// Format characters (Cf).
const FORMAT: &[(u32, u32)] = &[
    (0x00AD, 0x00AD),
    (0x0600, 0x0605),
    (0x061C, 0x061C),
    (0x06DD, 0x06DD),
    (0x070F, 0x070F),
    (0x180E, 0x180E),
    (0x200B, 0x200F),
    (0x202A, 0x202E),
    (0x2060, 0x2064),
    (0x2066, 0x206F),
    (0xFEFF, 0xFEFF),
    (0xFFF9, 0xFFFB),
    (0xE0001, 0xE0001),
    (0xE0020, 0xE007F),
];

/// East Asian Wide (W) and Fullwidth (F).
const WIDE: &[(u32, u32)] = &[
    (0x1100, 0x115F),
    (0x231A, 0x231B),
    (0x2329, 0x232A),
    (0x23E9, 0x23EC),
    (0x25FD, 0x25FE),
    (0x2614, 0x2615),
    (0x2648, 0x2653),
    (0x26AA, 0x26AB),
    (0x26BD, 0x26BE),
    (0x26C4, 0x26C5),
    (0x26F2, 0x26F5),
    (0x2705, 0x2705),
    (0x270A, 0x270B),
    (0x2728, 0x2728),
    (0x274C, 0x274C),
    (0x2753, 0x2755),
    (0x2795, 0x2797),
    (0x2B1B, 0x2B1C),
    (0x2E80, 0x3029),
    (0x302E, 0x303E),
    (0x3041, 0x3098),
    (0x309B, 0x33FF),
    (0x3400, 0x4DBF),
    (0x4E00, 0x9FFF),
    (0xA000, 0xA4CF),
    (0xA960, 0xA97F),
    (0xAC00, 0xD7A3),
    (0xF900, 0xFAFF),
    (0xFE10, 0xFE19),
    (0xFE30, 0xFE6F),
    (0xFF00, 0xFF60),
    (0xFFE0, 0xFFE6),
    (0x16FE0, 0x16FE4),
    (0x17000, 0x18CFF),
    (0x1B000, 0x1B2FF),
    (0x1F004, 0x1F004),
    (0x1F0CF, 0x1F0CF),
    (0x1F18E, 0x1F18E),
    (0x1F191, 0x1F19A),
    (0x1F200, 0x1F251),
    (0x1F300, 0x1F320),
    (0x1F32D, 0x1F335),
    (0x1F337, 0x1F37C),
    (0x1F37E, 0x1F393),
    (0x1F3A0, 0x1F3CA),
    (0x1F3CF, 0x1F3D3),
    (0x1F3E0, 0x1F3F0),
    (0x1F3F4, 0x1F3F4),
    (0x1F3F8, 0x1F43E),
    (0x1F440, 0x1F440),
    (0x1F442, 0x1F4FC),
    (0x1F4FF, 0x1F53D),
    (0x1F54B, 0x1F54E),
    (0x1F550, 0x1F567),
    (0x1F57A, 0x1F57A),
    (0x1F595, 0x1F596),
    (0x1F5A4, 0x1F5A4),
    (0x1F5FB, 0x1F64F),
    (0x1F680, 0x1F6C5),
    (0x1F6CC, 0x1F6CC),
    (0x1F6D0, 0x1F6D2),
    (0x1F6D5, 0x1F6D7),
    (0x1F6EB, 0x1F6EC),
    (0x1F6F4, 0x1F6FC),
    (0x1F7E0, 0x1F7EB),
    (0x1F90C, 0x1F93A),
    (0x1F93C, 0x1F945),
    (0x1F947, 0x1F9FF),
    (0x1FA70, 0x1FAFF),
    (0x20000, 0x2FFFD),
    (0x30000, 0x3FFFD),
];

fn in_table(table: &[(u32, u32)], cp: u32) -> bool {
    table
        .binary_search_by(|&(lo, hi)| {
            if hi < cp {
                std::cmp::Ordering::Less
            } else if lo > cp {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        })
        .is_ok()
}

fn heuristic_width(ch: char) -> usize {
    let cp = ch as u32;
    if cp < 0x0300 && cp != 0x00AD {
        return 1;
    }
    if in_table(COMBINING, cp) || in_table(FORMAT, cp) {
        return 0;
    }
    if in_table(WIDE, cp) {
        return 2;
    }
    1
}

// ─── Tests ───────────────────────────────────────────────────────────────────
