//! # lw-view: viewer state for lognowrap
//!
//! Everything between the byte stream and the screen:
//!
//! - **[`config`]**: `ViewerConfig`, the line cap, scroll step and width source
//! - **[`line`]**: `Line` (text plus cached width) and the `LineAssembler`
//!   that cuts chunks into lines
//! - **[`line_buffer`]**: the newest N lines, N = window rows
//! - **[`viewport`]**: window size and horizontal offset
//! - **[`render`]**: one full repaint from a snapshot
//! - **[`viewer`]**: `Viewer`, the `lw_term` event-loop `App` tying it together

pub mod config;
pub mod line;
pub mod line_buffer;
pub mod render;
pub mod viewer;
pub mod viewport;

pub use config::ViewerConfig;
pub use line::{Line, LineAssembler};
pub use line_buffer::LineBuffer;
pub use viewer::Viewer;
pub use viewport::Viewport;
