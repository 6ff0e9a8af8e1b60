// SPDX-License-Identifier: MIT
//
// Error type for terminal plumbing.

use std::io;

use thiserror::Error;

/// Failures surfaced by `lw-term`.
#[derive(Error, Debug)]
pub enum Error {
    /// The controlling terminal could not be opened.
    #[error("/dev/tty is required for key input: {0}")]
    OpenTty(#[source] io::Error),

    /// Reading or changing terminal attributes failed.
    #[error("terminal attributes: {0}")]
    Termios(#[source] io::Error),

    /// Installing a signal handler or the wake-up pipe failed.
    #[error("signal setup: {0}")]
    Signal(#[source] io::Error),

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result alias for `lw-term` operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this is the "no controlling terminal" failure.
    #[must_use]
    pub const fn is_missing_tty(&self) -> bool {
        matches!(self, Self::OpenTty(_))
    }
}
