// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Signal watcher: resize and shutdown signals as pollable events.
//
// SIGWINCH, SIGINT, SIGTERM and SIGHUP all land in one handler that does
// two async-signal-safe things: set an atomic flag, and write a byte to
// the write end of a non-blocking pipe (the self-pipe trick). The read
// end sits in the event loop's poll set, so a signal wakes the loop
// immediately instead of waiting for the next timeout.
//
// If the pipe cannot be created the flags are still set; the loop polls
// them on every timeout wake, which bounds resize latency by the poll
// timeout. That path is a supported mode, not an error.
//
// Only one watcher can be live per process (there is one set of signal
// dispositions). Dropping it restores the previous handlers.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use crate::error::{Error, Result};
use crate::terminal::set_nonblocking;

/// Signals routed through the watcher.
const WATCHED: [libc::c_int; 4] = [libc::SIGWINCH, libc::SIGINT, libc::SIGTERM, libc::SIGHUP];

/// Write end of the wake pipe, or -1 when none is installed.
static WAKE_FD: AtomicI32 = AtomicI32::new(-1);
/// Set by SIGWINCH.
static RESIZED: AtomicBool = AtomicBool::new(false);
/// Set by SIGINT, SIGTERM or SIGHUP.
static SHUTDOWN: AtomicI32 = AtomicI32::new(0);

extern "C" fn on_signal(sig: libc::c_int) {
    if sig == libc::SIGWINCH {
        RESIZED.store(true, Ordering::Relaxed);
    } else {
        SHUTDOWN.store(sig, Ordering::Relaxed);
    }

    let fd = WAKE_FD.load(Ordering::Relaxed);
    if fd >= 0 {
        // write(2) may clobber errno in the interrupted code: a full pipe
        // fails with EAGAIN.
        let errno = errno_ptr();
        let saved = errno.map(|p| unsafe { *p });
        let byte = 1u8;
        let _ = unsafe { libc::write(fd, (&raw const byte).cast::<libc::c_void>(), 1) };
        if let (Some(p), Some(value)) = (errno, saved) {
            unsafe { *p = value };
        }
    }
}

// Where each libc keeps the thread's errno.
#[cfg(any(
    target_os = "linux",
    target_os = "emscripten",
    target_os = "fuchsia",
    target_os = "l4re",
    target_os = "hurd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "android",
    target_os = "redox",
    target_os = "solaris",
    target_os = "illumos",
    target_os = "freebsd",
    target_vendor = "apple",
))]
unsafe extern "C" {
    #[cfg_attr(
        any(
            target_os = "linux",
            target_os = "emscripten",
            target_os = "fuchsia",
            target_os = "l4re",
            target_os = "hurd",
        ),
        link_name = "__errno_location"
    )]
    #[cfg_attr(
        any(
            target_os = "netbsd",
            target_os = "openbsd",
            target_os = "android",
            target_os = "redox",
        ),
        link_name = "__errno"
    )]
    #[cfg_attr(any(target_os = "solaris", target_os = "illumos"), link_name = "___errno")]
    #[cfg_attr(any(target_os = "freebsd", target_vendor = "apple"), link_name = "__error")]
    safe fn errno_location() -> *mut libc::c_int;
}

#[cfg(any(
    target_os = "linux",
    target_os = "emscripten",
    target_os = "fuchsia",
    target_os = "l4re",
    target_os = "hurd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "android",
    target_os = "redox",
    target_os = "solaris",
    target_os = "illumos",
    target_os = "freebsd",
    target_vendor = "apple",
))]
fn errno_ptr() -> Option<*mut libc::c_int> {
    Some(errno_location())
}

/// Unknown libc: errno is left alone and may be clobbered.
#[cfg(not(any(
    target_os = "linux",
    target_os = "emscripten",
    target_os = "fuchsia",
    target_os = "l4re",
    target_os = "hurd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "android",
    target_os = "redox",
    target_os = "solaris",
    target_os = "illumos",
    target_os = "freebsd",
    target_vendor = "apple",
)))]
const fn errno_ptr() -> Option<*mut libc::c_int> {
    None
}

/// Installed signal handlers plus the optional wake pipe.
pub struct SignalWatcher {
    pipe: Option<(OwnedFd, OwnedFd)>,
    previous: Vec<(libc::c_int, libc::sigaction)>,
}

impl SignalWatcher {
    /// Install handlers for resize and shutdown signals.
    ///
    /// # Errors
    ///
    /// [`Error::Signal`] if `sigaction` itself fails. Failure to create
    /// the wake pipe is not an error; see [`has_wake_pipe`](Self::has_wake_pipe).
    pub fn install() -> Result<Self> {
        RESIZED.store(false, Ordering::Relaxed);
        SHUTDOWN.store(0, Ordering::Relaxed);

        let pipe = match make_pipe() {
            Ok(pair) => {
                WAKE_FD.store(pair.1.as_raw_fd(), Ordering::Relaxed);
                Some(pair)
            }
            Err(err) => {
                tracing::warn!(target: "signal", %err, "no wake pipe, falling back to timeout polling");
                None
            }
        };

        let mut watcher = Self {
            pipe,
            previous: Vec::with_capacity(WATCHED.len()),
        };

        for sig in WATCHED {
            let old = unsafe {
                let mut sa: libc::sigaction = std::mem::zeroed();
                sa.sa_sigaction = on_signal as *const () as usize;
                sa.sa_flags = libc::SA_RESTART;
                libc::sigemptyset(&raw mut sa.sa_mask);

                let mut old: libc::sigaction = std::mem::zeroed();
                if libc::sigaction(sig, &raw const sa, &raw mut old) != 0 {
                    // Drop restores whatever was already replaced.
                    return Err(Error::Signal(io::Error::last_os_error()));
                }
                old
            };
            watcher.previous.push((sig, old));
        }

        tracing::debug!(target: "signal", wake_pipe = watcher.pipe.is_some(), "signal handlers installed");
        Ok(watcher)
    }

    /// Whether signals wake the poll through a pipe.
    #[must_use]
    pub const fn has_wake_pipe(&self) -> bool {
        self.pipe.is_some()
    }

    /// Read end of the wake pipe, for the poll set.
    #[must_use]
    pub fn wake_fd(&self) -> Option<RawFd> {
        self.pipe.as_ref().map(|(read, _)| read.as_raw_fd())
    }

    /// Empty the wake pipe after it polled readable.
    pub fn drain(&self) {
        let Some((read, _)) = &self.pipe else { return };
        let mut buf = [0u8; 64];
        loop {
            let n = unsafe { libc::read(read.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
            if n <= 0 {
                break;
            }
        }
    }

    /// Whether a resize arrived since the last call.
    #[must_use]
    pub fn take_resize(&self) -> bool {
        RESIZED.swap(false, Ordering::Relaxed)
    }

    /// The shutdown signal received, if any. Sticky.
    #[must_use]
    pub fn shutdown_signal(&self) -> Option<libc::c_int> {
        match SHUTDOWN.load(Ordering::Relaxed) {
            0 => None,
            sig => Some(sig),
        }
    }
}

impl Drop for SignalWatcher {
    fn drop(&mut self) {
        for (sig, old) in self.previous.drain(..) {
            unsafe {
                libc::sigaction(sig, &raw const old, std::ptr::null_mut());
            }
        }
        WAKE_FD.store(-1, Ordering::Relaxed);
    }
}

fn make_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0 as libc::c_int; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    set_nonblocking(read.as_raw_fd())?;
    set_nonblocking(write.as_raw_fd())?;
    Ok((read, write))
}

// ─── Tests ───────────────────────────────────────────────────────────────────

/// Signal dispositions are process-wide; tests that install a watcher
/// hold this lock.
#[cfg(test)]
pub(crate) static TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
