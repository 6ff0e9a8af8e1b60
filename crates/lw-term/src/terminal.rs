// SPDX-License-Identifier: MIT
//
// Controlling terminal: opening /dev/tty, size queries, and the cbreak
// mode guard.
//
// Safety: This module necessarily uses `unsafe` for termios (tcgetattr,
// tcsetattr), ioctl (TIOCGWINSZ), fcntl and raw fd writes. These are the
// standard POSIX interfaces for terminal control. Each unsafe block is
// minimal.
#![allow(unsafe_code)]
//
// stdin is usually a pipe here, so keys and window size come from
// /dev/tty, opened separately. The guard switches that tty into cbreak
// mode: no line buffering, no echo, but ISIG stays on so Ctrl+C still
// raises SIGINT (which the event loop turns into a clean shutdown).
//
// Restoration is layered:
//   1. `ModeGuard::drop` restores the saved termios on every scope exit.
//   2. A panic hook restores from a global backup, since the guard may
//      never get to drop if the panic aborts.
//   3. Signals never kill the process while the guard is held; the
//      event loop catches them and unwinds normally.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::{Mutex, Once};

use crate::ansi;
use crate::error::{Error, Result};

/// Path of the controlling terminal.
pub const TTY_PATH: &str = "/dev/tty";

/// Size used when no query succeeds.
pub const FALLBACK_SIZE: Size = Size { cols: 80, rows: 24 };

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    /// Number of columns.
    pub cols: u16,
    /// Number of rows.
    pub rows: u16,
}

impl Size {
    /// Clamp both dimensions to at least 1.
    #[must_use]
    pub fn at_least_one(self) -> Self {
        Self {
            cols: self.cols.max(1),
            rows: self.rows.max(1),
        }
    }
}

/// Query the window size of `fd` via `ioctl(TIOCGWINSZ)`.
///
/// Returns `None` if `fd` is not a terminal or reports a zero size.
#[must_use]
pub fn query_size(fd: RawFd) -> Option<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &raw mut ws) };

    if result == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        Some(Size {
            cols: ws.ws_col,
            rows: ws.ws_row,
        })
    } else {
        None
    }
}

/// Put `fd` into non-blocking mode.
///
/// # Errors
///
/// Returns the OS error if `fcntl` fails.
pub fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

// ─── Tty ────────────────────────────────────────────────────────────────────

/// Handle on the controlling terminal.
#[derive(Debug)]
pub struct Tty {
    file: File,
}

impl Tty {
    /// Open [`TTY_PATH`] for reading, non-blocking.
    ///
    /// # Errors
    ///
    /// [`Error::OpenTty`] if there is no controlling terminal.
    pub fn open() -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .open(TTY_PATH)
            .map_err(Error::OpenTty)?;
        set_nonblocking(file.as_raw_fd()).map_err(Error::OpenTty)?;
        tracing::debug!(target: "term", fd = file.as_raw_fd(), "opened controlling terminal");
        Ok(Self { file })
    }

    /// Current window size: the tty first, then stdout, then 80×24.
    #[must_use]
    pub fn size(&self) -> Size {
        query_size(self.file.as_raw_fd())
            .or_else(|| query_size(libc::STDOUT_FILENO))
            .unwrap_or(FALLBACK_SIZE)
            .at_least_one()
    }

    /// Enter cbreak mode for the lifetime of the returned guard.
    ///
    /// # Errors
    ///
    /// [`Error::Termios`] if the attributes cannot be read or set.
    pub fn cbreak(&self) -> Result<ModeGuard> {
        ModeGuard::acquire(self.file.as_raw_fd())
    }
}

impl AsRawFd for Tty {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

// ─── Panic-Safe Restore ─────────────────────────────────────────────────────

/// Saved attributes for the panic hook, which cannot reach the guard.
static TERMIOS_BACKUP: Mutex<Option<(RawFd, libc::termios)>> = Mutex::new(None);

/// Written straight to fd 1 on panic: reset SGR, show cursor.
const EMERGENCY_RESTORE: &[u8] = b"\x1b[0m\x1b[?25h\r\n";

static PANIC_HOOK_INSTALLED: Once = Once::new();

fn restore_termios_from_backup() {
    if let Ok(guard) = TERMIOS_BACKUP.lock() {
        if let Some((fd, ref original)) = *guard {
            unsafe {
                let _ = libc::tcsetattr(fd, libc::TCSANOW, original);
            }
        }
    }
}

/// Install (once) a panic hook that restores the tty before the message
/// is printed.
fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            // Bypass the stdout lock; the panic may have happened while
            // a frame was being written.
            unsafe {
                let _ = libc::write(
                    libc::STDOUT_FILENO,
                    EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
                    EMERGENCY_RESTORE.len(),
                );
            }
            restore_termios_from_backup();
            original(info);
        }));
    });
}

// ─── ModeGuard ──────────────────────────────────────────────────────────────

/// Scoped cbreak mode on a terminal fd.
///
/// Captures the attributes on acquisition and puts them back on
/// [`release`](Self::release) or drop, whichever comes first. Also hides
/// the cursor while held.
pub struct ModeGuard {
    fd: RawFd,
    original: Option<libc::termios>,
}

impl ModeGuard {
    /// Switch `fd` to cbreak mode, remembering the prior attributes.
    ///
    /// # Errors
    ///
    /// [`Error::Termios`] if `tcgetattr`/`tcsetattr` fails.
    pub fn acquire(fd: RawFd) -> Result<Self> {
        install_panic_hook();

        let mut termios: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &raw mut termios) } != 0 {
            return Err(Error::Termios(io::Error::last_os_error()));
        }
        let original = termios;

        if let Ok(mut backup) = TERMIOS_BACKUP.lock() {
            *backup = Some((fd, original));
        }

        // cbreak: keys arrive immediately and unechoed; signals still work.
        termios.c_lflag &= !(libc::ICANON | libc::ECHO);
        termios.c_cc[libc::VMIN] = 1;
        termios.c_cc[libc::VTIME] = 0;

        if unsafe { libc::tcsetattr(fd, libc::TCSAFLUSH, &raw const termios) } != 0 {
            let err = io::Error::last_os_error();
            clear_backup();
            return Err(Error::Termios(err));
        }

        let mut out = io::stdout().lock();
        let _ = ansi::cursor_hide(&mut out).and_then(|()| out.flush());

        tracing::debug!(target: "term", fd, "entered cbreak mode");
        Ok(Self {
            fd,
            original: Some(original),
        })
    }

    /// Restore the saved attributes now. Idempotent.
    ///
    /// # Errors
    ///
    /// [`Error::Termios`] if `tcsetattr` fails.
    pub fn release(&mut self) -> Result<()> {
        let Some(original) = self.original.take() else {
            return Ok(());
        };

        let mut out = io::stdout().lock();
        let _ = ansi::reset(&mut out)
            .and_then(|()| ansi::cursor_show(&mut out))
            .and_then(|()| out.flush());
        drop(out);

        let rc = unsafe { libc::tcsetattr(self.fd, libc::TCSADRAIN, &raw const original) };
        clear_backup();
        if rc != 0 {
            return Err(Error::Termios(io::Error::last_os_error()));
        }

        tracing::debug!(target: "term", fd = self.fd, "restored terminal mode");
        Ok(())
    }
}

impl Drop for ModeGuard {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            tracing::warn!(target: "term", %err, "failed to restore terminal mode");
        }
    }
}

fn clear_backup() {
    if let Ok(mut backup) = TERMIOS_BACKUP.lock() {
        *backup = None;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
