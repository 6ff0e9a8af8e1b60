//! Viewport: window size and horizontal scroll position.
//!
//! The only scroll axis is horizontal. The offset is kept within
//! `0..=max(0, content_width - columns)`: [`scroll_right`](Viewport::scroll_right)
//! stops at the right edge of the widest line, and [`clamp`](Viewport::clamp)
//! re-establishes the bound before every paint, since the widest line can
//! be evicted or the window can grow between key presses.

/// Visible area and horizontal offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    columns: usize,
    rows: usize,
    offset: usize,
    dirty: bool,
}

impl Viewport {
    /// A viewport of `columns` × `rows` (each at least 1), scrolled to 0.
    ///
    /// Starts dirty so the first paint happens.
    #[must_use]
    pub fn new(columns: usize, rows: usize) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
            offset: 0,
            dirty: true,
        }
    }

    /// Visible columns.
    #[must_use]
    pub const fn columns(&self) -> usize {
        self.columns
    }

    /// Visible rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// First visible column.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Whether something changed since the last [`mark_clean`](Self::mark_clean).
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Flag the screen for repaint.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clear the repaint flag after a paint.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Adopt a new window size. The offset is re-clamped at the next paint.
    pub fn set_size(&mut self, columns: usize, rows: usize) {
        self.columns = columns.max(1);
        self.rows = rows.max(1);
        self.dirty = true;
    }

    /// Largest valid offset for content `content_width` columns wide.
    #[must_use]
    pub const fn max_offset(&self, content_width: usize) -> usize {
        content_width.saturating_sub(self.columns)
    }

    /// Pull the offset back inside the valid range.
    pub fn clamp(&mut self, content_width: usize) {
        self.offset = self.offset.min(self.max_offset(content_width));
    }

    /// Move `step` columns toward column 0.
    pub fn scroll_left(&mut self, step: usize) {
        self.move_to(self.offset.saturating_sub(step));
    }

    /// Move `step` columns right, stopping at the right edge of the content.
    pub fn scroll_right(&mut self, step: usize, content_width: usize) {
        self.move_to(
            self.offset
                .saturating_add(step)
                .min(self.max_offset(content_width)),
        );
    }

    // Dirty only if the view actually moved.
    fn move_to(&mut self, offset: usize) {
        if offset != self.offset {
            self.offset = offset;
            self.dirty = true;
        }
    }
}
