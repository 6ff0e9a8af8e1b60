//! Viewer: the [`App`] the event loop drives.
//!
//! Owns all mutable viewer state: the assembler holding the unterminated
//! tail, the line buffer sized to the window, and the viewport. The loop
//! calls in with data, keys and resizes; the viewer decides what changed
//! and paints on request.

use std::io;

use lw_term::KeyAction;
use lw_term::ansi::FrameBuffer;
use lw_term::event_loop::{Action, App};
use lw_term::terminal::Size;

use crate::config::ViewerConfig;
use crate::line::LineAssembler;
use crate::line_buffer::LineBuffer;
use crate::render::render;
use crate::viewport::Viewport;

/// Horizontal-scrolling view over the tail of a line stream.
#[derive(Debug)]
pub struct Viewer {
    config: ViewerConfig,
    assembler: LineAssembler,
    lines: LineBuffer,
    viewport: Viewport,
}

impl Viewer {
    /// A viewer for a window of `size`.
    #[must_use]
    pub fn new(config: ViewerConfig, size: Size) -> Self {
        let columns = usize::from(size.cols);
        let rows = usize::from(size.rows);
        Self {
            assembler: LineAssembler::new(config.max_line_bytes, config.width_source),
            lines: LineBuffer::new(rows),
            viewport: Viewport::new(columns, rows),
            config,
        }
    }

    /// The retained lines.
    #[must_use]
    pub const fn lines(&self) -> &LineBuffer {
        &self.lines
    }

    /// The current viewport.
    #[must_use]
    pub const fn viewport(&self) -> &Viewport {
        &self.viewport
    }
}

impl App for Viewer {
    fn on_data(&mut self, chunk: &[u8]) {
        let lines = self.assembler.push(chunk);
        if !lines.is_empty() {
            tracing::trace!(target: "input", count = lines.len(), "lines appended");
            for line in lines {
                self.lines.append(line);
            }
            self.viewport.mark_dirty();
        }
    }

    fn on_eof(&mut self) {
        if let Some(line) = self.assembler.finish() {
            self.lines.append(line);
            self.viewport.mark_dirty();
        }
    }

    fn on_key(&mut self, key: KeyAction) -> Action {
        let step = self.config.scroll_step;
        match key {
            KeyAction::ScrollLeft => self.viewport.scroll_left(step),
            KeyAction::ScrollRight => {
                self.viewport.scroll_right(step, self.lines.max_visible_width());
            }
            KeyAction::Quit => return Action::Quit,
        }
        Action::Continue
    }

    fn on_resize(&mut self, size: Size) {
        let columns = usize::from(size.cols);
        let rows = usize::from(size.rows);
        self.viewport.set_size(columns, rows);
        self.lines.resize(rows);
    }

    fn needs_paint(&self) -> bool {
        self.viewport.is_dirty()
    }

    fn paint(&mut self, out: &mut FrameBuffer, first: bool) -> io::Result<()> {
        self.viewport.clamp(self.lines.max_visible_width());
        render(
            out,
            self.lines.snapshot(),
            &self.viewport,
            first,
            self.config.width_source,
        )?;
        self.viewport.mark_clean();
        tracing::trace!(target: "render", bytes = out.len(), offset = self.viewport.offset(), "painted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn viewer(cols: u16, rows: u16) -> Viewer {
        Viewer::new(ViewerConfig::default(), Size { cols, rows })
    }

    fn painted(v: &mut Viewer, first: bool) -> String {
        let mut frame = FrameBuffer::new();
        v.paint(&mut frame, first).unwrap();
        let mut out = Vec::new();
        frame.flush_to(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn texts(v: &Viewer) -> Vec<String> {
        v.lines().snapshot().map(|l| l.as_str().to_owned()).collect()
    }

    #[test]
    fn data_fills_buffer_up_to_rows() {
        let mut v = viewer(10, 3);
        v.on_data(b"A\nB\nC\nD\n");
        assert!(v.needs_paint());
        assert_eq!(texts(&v), vec!["B", "C", "D"]);
    }

    #[test]
    fn paint_clears_dirty() {
        let mut v = viewer(10, 3);
        v.on_data(b"A\n");
        painted(&mut v, true);
        assert!(!v.needs_paint());
        v.on_data(b"partial");
        assert!(!v.needs_paint(), "a fragment alone changes nothing on screen");
    }

    #[test]
    fn eof_flushes_fragment() {
        let mut v = viewer(10, 3);
        v.on_data(b"A\ntail");
        v.on_eof();
        assert_eq!(texts(&v), vec!["A", "tail"]);
    }

    #[test]
    fn scroll_is_bounded_by_widest_line() {
        let mut v = viewer(5, 2);
        v.on_data(b"0123456789\nab\n");
        for _ in 0..10 {
            assert_eq!(v.on_key(KeyAction::ScrollRight), Action::Continue);
        }
        assert_eq!(v.viewport().offset(), 5);
        let out = painted(&mut v, false);
        assert!(out.contains("56789\x1b[0m"));
    }

    #[test]
    fn scroll_left_at_zero_is_noop() {
        let mut v = viewer(5, 2);
        painted(&mut v, true);
        v.on_key(KeyAction::ScrollLeft);
        assert_eq!(v.viewport().offset(), 0);
        assert!(!v.needs_paint());
    }

    #[test]
    fn quit_key() {
        assert_eq!(viewer(5, 2).on_key(KeyAction::Quit), Action::Quit);
    }

    #[test]
    fn resize_shrinks_buffer_and_reclamps() {
        let mut v = viewer(5, 4);
        v.on_data(b"0123456789\na\nb\nc\n");
        v.on_key(KeyAction::ScrollRight);
        v.on_key(KeyAction::ScrollRight);
        assert_eq!(v.viewport().offset(), 2);

        v.on_resize(Size { cols: 5, rows: 2 });
        assert_eq!(texts(&v), vec!["b", "c"]);
        assert!(v.viewport().is_dirty());

        // The wide line is gone; the offset snaps back on paint.
        painted(&mut v, false);
        assert_eq!(v.viewport().offset(), 0);
    }

    #[test]
    fn resize_grow_keeps_lines() {
        let mut v = viewer(5, 2);
        v.on_data(b"a\nb\n");
        v.on_resize(Size { cols: 5, rows: 5 });
        v.on_data(b"c\n");
        assert_eq!(texts(&v), vec!["a", "b", "c"]);
        assert_eq!(v.lines().capacity(), 5);
    }

    #[test]
    fn colored_line_is_sliced_with_style() {
        let mut v = viewer(5, 1);
        v.on_data(b"\x1b[31mHELLO\x1b[0m WORLD\n");
        let out = painted(&mut v, true);
        assert!(out.ends_with("\x1b[2K\x1b[31mHELLO\x1b[0m"));
    }
}
