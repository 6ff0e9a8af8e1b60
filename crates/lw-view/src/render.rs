//! Renderer: one full repaint from a line snapshot.
//!
//! No diffing: the screen is at most a few hundred short rows and every
//! scroll step shifts all of them anyway. Each paint is
//!
//! ```text
//! [ESC[2J]                       first paint only
//! ESC[H                          home
//! ESC[0m ESC[2K <slice>          row 0
//! \r\n ESC[0m ESC[2K <slice>     row 1
//! ...                            up to `rows`, no \r\n after the last
//! ```
//!
//! Rows without a line are still reset and erased, which wipes leftovers
//! from a taller previous frame. Rows are separated by `\r\n` rather than
//! addressed, and the last row gets no separator so the terminal never
//! scrolls.

use std::io::{self, Write};

use lw_term::{WidthSource, ansi, slice_with};

use crate::line::Line;
use crate::viewport::Viewport;

/// Paint `lines` (oldest first, top to bottom) into `out`.
///
/// # Errors
///
/// Whatever `out` returns; a [`FrameBuffer`](lw_term::ansi::FrameBuffer)
/// never fails.
pub fn render<'a>(
    out: &mut impl Write,
    lines: impl IntoIterator<Item = &'a Line>,
    viewport: &Viewport,
    first_paint: bool,
    source: WidthSource,
) -> io::Result<()> {
    if first_paint {
        ansi::clear_screen(out)?;
    }
    ansi::cursor_home(out)?;

    let mut lines = lines.into_iter();
    for row in 0..viewport.rows() {
        if row > 0 {
            ansi::next_row(out)?;
        }
        ansi::reset(out)?;
        ansi::clear_line(out)?;
        if let Some(line) = lines.next() {
            let visible = slice_with(source, line.as_str(), viewport.offset(), viewport.columns());
            out.write_all(visible.as_bytes())?;
        }
    }
    Ok(())
}
