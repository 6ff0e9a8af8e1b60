//! Viewer configuration.
//!
//! One plain value, passed to [`Viewer::new`](crate::Viewer::new). There is
//! no config file and no environment lookup; the binary builds this with
//! defaults.

use lw_term::WidthSource;

/// Bytes a single line may hold before it is force-split.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Settings for a [`Viewer`](crate::Viewer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerConfig {
    /// Safety cap on an unterminated line, in bytes. Input that runs past
    /// it without a newline is cut into lines of at most this size.
    pub max_line_bytes: usize,

    /// Columns moved per arrow key.
    pub scroll_step: usize,

    /// How character widths are computed.
    pub width_source: WidthSource,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            scroll_step: 1,
            width_source: WidthSource::Database,
        }
    }
}
