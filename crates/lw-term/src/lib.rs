// SPDX-License-Identifier: MIT
//
// lw-term: terminal plumbing for lognowrap.
//
// Everything that touches bytes on their way in or out of the terminal:
// measuring and slicing ANSI-colored text by display column, decoding
// arrow keys from the controlling tty, holding that tty in cbreak mode,
// turning signals into pollable events, and the single-threaded event
// loop that multiplexes piped data, keyboard and resize.
//
// The text half (`width`, `token`, `slice`, `ansi`, `input`) is pure and
// portable. The device half (`terminal`, `signal`, `event_loop`) talks to
// POSIX directly through libc and is Unix-only.

pub mod ansi;
pub mod error;
pub mod input;
pub mod slice;
pub mod token;
pub mod width;

#[cfg(unix)]
pub mod event_loop;
#[cfg(unix)]
pub mod signal;
#[cfg(unix)]
pub mod terminal;

pub use error::{Error, Result};
pub use input::{KeyAction, KeyDecoder};
pub use slice::{slice, slice_with, visible_width, visible_width_with};
pub use token::{Token, Tokens, tokenize};
pub use width::WidthSource;
