//! The most recent N lines, N = terminal rows.
//!
//! A bounded ring over [`VecDeque`]. Appending at capacity evicts the
//! oldest line; resizing keeps the newest ones. Nothing older than what
//! fits on screen is retained.

use std::collections::VecDeque;
use std::collections::vec_deque;

use crate::line::Line;

/// Bounded, ordered store of the newest lines.
#[derive(Debug, Clone)]
pub struct LineBuffer {
    lines: VecDeque<Line>,
    capacity: usize,
}

impl LineBuffer {
    /// Empty buffer holding at most `capacity` lines (at least 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a line at the newest end, evicting the oldest if full.
    pub fn append(&mut self, line: Line) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Change the capacity. Shrinking drops the oldest lines.
    pub fn resize(&mut self, capacity: usize) {
        let capacity = capacity.max(1);
        if self.lines.len() > capacity {
            let excess = self.lines.len() - capacity;
            self.lines.drain(..excess);
        }
        self.capacity = capacity;
    }

    /// The lines, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> vec_deque::Iter<'_, Line> {
        self.lines.iter()
    }

    /// Number of lines held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether no line has been appended yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Maximum number of lines held.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Widest visible width among the held lines; 0 when empty.
    #[must_use]
    pub fn max_visible_width(&self) -> usize {
        self.lines.iter().map(Line::width).max().unwrap_or(0)
    }
}
