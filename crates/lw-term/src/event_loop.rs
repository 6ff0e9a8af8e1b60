// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Event loop: multiplexes piped data, keyboard and signals.
//
// One thread, one `poll(2)`. The poll set holds up to three fds:
//
//   data   stdin, the stream being displayed (non-blocking)
//   keys   the controlling terminal (non-blocking, cbreak)
//   wake   read end of the signal self-pipe
//
// Each wake handles every ready source in that order, then repaints once
// if the app reports a change. Data is drained until EAGAIN so a burst of
// input costs one repaint, not one per chunk, but never for more than
// `max_reads_per_wake` reads: a producer that never pauses must not starve
// the keyboard, signals or the screen. A pending shutdown signal is also
// checked between reads.
//
// # Timeout
//
// The poll timeout (100 ms by default) is not a frame clock. It exists so
// resize is still noticed when signals cannot wake the poll: whenever a
// timeout passes, or a full timeout has elapsed since the last check under
// constant input, the window size is re-queried and compared with the
// cached one. The SIGWINCH flag is checked on every wake.
//
// # Shutdown
//
//   Idle → Running → ShuttingDown → Terminated
//
// Quit key, EOF on either input, a shutdown signal, or a closed output
// all move to ShuttingDown. On EOF of the data stream the app gets one
// final paint first. Terminated is reached after the mode guard (if the
// loop owns one) has been released, on every path including errors.

use std::io::{self, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

use bitflags::bitflags;

use crate::ansi::FrameBuffer;
use crate::error::Result;
use crate::input::{KeyAction, KeyDecoder};
use crate::signal::SignalWatcher;
use crate::terminal::{ModeGuard, Size, Tty};

// ─── Console ────────────────────────────────────────────────────────────────

/// The device keys are read from and the window size is asked of.
///
/// [`Tty`] is the real one; tests substitute a pipe.
pub trait Console: AsRawFd {
    /// Current window size, never zero in either dimension.
    fn size(&self) -> Size;
}

impl Console for Tty {
    fn size(&self) -> Size {
        Self::size(self)
    }
}

// ─── App Trait ───────────────────────────────────────────────────────────────

/// What the application tells the loop after a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Keep running.
    Continue,
    /// Leave the loop.
    Quit,
}

/// Application driven by the [`EventLoop`].
///
/// The app owns the repaint flag. Handlers record what changed; the loop
/// asks [`needs_paint`](Self::needs_paint) once per wake and calls
/// [`paint`](Self::paint), which is expected to clear it.
pub trait App {
    /// A chunk of bytes from the data stream.
    fn on_data(&mut self, chunk: &[u8]);

    /// The data stream ended. Called once, right before the final paint.
    fn on_eof(&mut self) {}

    /// A decoded key.
    fn on_key(&mut self, key: KeyAction) -> Action {
        match key {
            KeyAction::Quit => Action::Quit,
            KeyAction::ScrollLeft | KeyAction::ScrollRight => Action::Continue,
        }
    }

    /// The window size, once before the first paint and after each change.
    fn on_resize(&mut self, _size: Size) {}

    /// Whether anything changed since the last paint.
    fn needs_paint(&self) -> bool;

    /// Write a full frame into `out`. `first` is true exactly once.
    fn paint(&mut self, out: &mut FrameBuffer, first: bool) -> io::Result<()>;
}

// ─── Loop Config ─────────────────────────────────────────────────────────────

/// Timing and buffer sizes for the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    /// Upper bound on one `poll` wait.
    pub poll_timeout: Duration,
    /// Bytes per read from the data stream.
    pub read_chunk: usize,
    /// Data reads per wake before keys, signals and paint get a turn.
    pub max_reads_per_wake: usize,
    /// Bytes per read from the keyboard.
    pub key_chunk: usize,
    /// Map `h`, `l`, `q` in addition to arrows and Ctrl+C.
    pub vi_keys: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(100),
            read_chunk: 4096,
            max_reads_per_wake: 32,
            key_chunk: 1024,
            vi_keys: false,
        }
    }
}

// ─── States & Outcomes ───────────────────────────────────────────────────────

/// Lifecycle of an [`EventLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Constructed, not yet run.
    Idle,
    /// Inside [`EventLoop::run`].
    Running,
    /// Leaving: releasing the terminal.
    ShuttingDown,
    /// Done; the terminal mode has been restored.
    Terminated,
}

/// Why the loop stopped. Every variant is a successful exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The user asked to quit.
    Quit,
    /// The data stream reached end-of-file.
    EndOfInput,
    /// The keyboard device reached end-of-file.
    KeyboardClosed,
    /// A shutdown signal (SIGINT, SIGTERM, SIGHUP) arrived.
    Interrupted(i32),
    /// The output was closed underneath us.
    OutputClosed,
}

bitflags! {
    /// Sources found ready by one poll.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Ready: u8 {
        const DATA   = 0b001;
        const KEYS   = 0b010;
        const SIGNAL = 0b100;
    }
}

/// Outcome of draining the data stream.
enum Drained {
    /// Would block, or the read budget ran out.
    Open,
    Closed,
    Interrupted(i32),
}

/// Outcome of one keyboard read.
enum Keys {
    Handled,
    Quit,
    Closed,
}

// ─── EventLoop ───────────────────────────────────────────────────────────────

/// The input multiplexer.
///
/// ```no_run
/// use std::io::Write;
///
/// use lw_term::ansi::FrameBuffer;
/// use lw_term::event_loop::{App, EventLoop, LoopConfig};
/// use lw_term::signal::SignalWatcher;
/// use lw_term::terminal::Tty;
///
/// #[derive(Default)]
/// struct Echo {
///     seen: Vec<u8>,
///     dirty: bool,
/// }
///
/// impl App for Echo {
///     fn on_data(&mut self, chunk: &[u8]) {
///         self.seen.extend_from_slice(chunk);
///         self.dirty = true;
///     }
///
///     fn needs_paint(&self) -> bool {
///         self.dirty
///     }
///
///     fn paint(&mut self, out: &mut FrameBuffer, _first: bool) -> std::io::Result<()> {
///         self.dirty = false;
///         out.write_all(&self.seen)
///     }
/// }
///
/// let tty = Tty::open()?;
/// let guard = tty.cbreak()?;
/// let mut event_loop = EventLoop::new(LoopConfig::default(), 0, tty)
///     .with_guard(guard)
///     .with_signals(SignalWatcher::install()?);
/// let reason = event_loop.run(&mut Echo::default(), &mut std::io::stdout())?;
/// # let _ = reason;
/// # Ok::<(), lw_term::Error>(())
/// ```
pub struct EventLoop<C: Console> {
    config: LoopConfig,
    state: LoopState,
    // Declared before `console` so it drops (restores) first.
    guard: Option<ModeGuard>,
    signals: Option<SignalWatcher>,
    data_fd: RawFd,
    console: C,
    keys: KeyDecoder,
    size: Size,
    size_checked: Instant,
}

impl<C: Console> EventLoop<C> {
    /// Build a loop reading data from `data_fd` and keys from `console`.
    ///
    /// `data_fd` is switched to non-blocking mode on [`run`](Self::run).
    pub fn new(config: LoopConfig, data_fd: RawFd, console: C) -> Self {
        let size = console.size();
        Self {
            config,
            state: LoopState::Idle,
            guard: None,
            signals: None,
            data_fd,
            keys: KeyDecoder::with_vi_keys(config.vi_keys),
            console,
            size,
            size_checked: Instant::now(),
        }
    }

    /// Hand the terminal mode guard to the loop; released on termination.
    #[must_use]
    pub fn with_guard(mut self, guard: ModeGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Route resize and shutdown signals through `signals`.
    #[must_use]
    pub fn with_signals(mut self, signals: SignalWatcher) -> Self {
        self.signals = Some(signals);
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LoopState {
        self.state
    }

    /// Run until an exit condition; always releases the mode guard.
    ///
    /// # Errors
    ///
    /// Unexpected I/O failures from `poll`, reads, or writes other than
    /// a broken pipe; or a failure to restore the terminal.
    pub fn run(&mut self, app: &mut impl App, out: &mut impl Write) -> Result<ExitReason> {
        self.state = LoopState::Running;
        tracing::debug!(target: "input", cols = self.size.cols, rows = self.size.rows, "event loop running");

        let result = self.run_inner(app, out);

        self.state = LoopState::ShuttingDown;
        let released = self.guard.take().map_or(Ok(()), |mut guard| guard.release());
        self.state = LoopState::Terminated;

        match &result {
            Ok(reason) => tracing::info!(target: "input", ?reason, "event loop finished"),
            Err(err) => tracing::warn!(target: "input", %err, "event loop failed"),
        }

        let reason = result?;
        released?;
        Ok(reason)
    }

    fn run_inner(&mut self, app: &mut impl App, out: &mut impl Write) -> Result<ExitReason> {
        crate::terminal::set_nonblocking(self.data_fd)?;

        let mut frame = FrameBuffer::new();
        let mut buf = vec![0u8; self.config.read_chunk.max(1)];
        let mut first = true;

        app.on_resize(self.size);

        loop {
            if first || app.needs_paint() {
                if let Some(reason) = Self::repaint(app, &mut frame, out, first)? {
                    return Ok(reason);
                }
                first = false;
            }

            let ready = self.wait()?;

            if ready.contains(Ready::DATA) {
                match self.drain_data(app, &mut buf)? {
                    Drained::Open => {}
                    Drained::Closed => {
                        app.on_eof();
                        let closed = Self::repaint(app, &mut frame, out, first)?;
                        return Ok(closed.unwrap_or(ExitReason::EndOfInput));
                    }
                    Drained::Interrupted(sig) => return Ok(Self::interrupted(sig)),
                }
            }

            if ready.contains(Ready::KEYS) {
                match self.read_keys(app)? {
                    Keys::Handled => {}
                    Keys::Quit => return Ok(ExitReason::Quit),
                    Keys::Closed => return Ok(ExitReason::KeyboardClosed),
                }
            }

            if ready.contains(Ready::SIGNAL) {
                if let Some(signals) = &self.signals {
                    signals.drain();
                }
            }
            if let Some(sig) = self.pending_shutdown() {
                return Ok(Self::interrupted(sig));
            }

            if self.check_resize(ready.is_empty()) {
                app.on_resize(self.size);
            }
        }
    }

    /// Paint a frame; `Some` if the output has gone away.
    fn repaint(
        app: &mut impl App,
        frame: &mut FrameBuffer,
        out: &mut impl Write,
        first: bool,
    ) -> Result<Option<ExitReason>> {
        let result = app
            .paint(frame, first)
            .and_then(|()| frame.flush_to(out));
        match result {
            Ok(()) => Ok(None),
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                tracing::debug!(target: "render", "output closed");
                frame.clear();
                Ok(Some(ExitReason::OutputClosed))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn pending_shutdown(&self) -> Option<i32> {
        self.signals.as_ref().and_then(SignalWatcher::shutdown_signal)
    }

    fn interrupted(sig: i32) -> ExitReason {
        tracing::debug!(target: "signal", sig, "shutdown signal");
        ExitReason::Interrupted(sig)
    }

    /// Block in `poll` until a source is ready or the timeout passes.
    fn wait(&self) -> Result<Ready> {
        let mut fds = [pollfd(-1); 3];
        let mut tags = [Ready::empty(); 3];

        fds[0] = pollfd(self.data_fd);
        tags[0] = Ready::DATA;
        fds[1] = pollfd(self.console.as_raw_fd());
        tags[1] = Ready::KEYS;
        let mut n = 2;
        if let Some(fd) = self.signals.as_ref().and_then(SignalWatcher::wake_fd) {
            fds[n] = pollfd(fd);
            tags[n] = Ready::SIGNAL;
            n += 1;
        }

        let timeout = i32::try_from(self.config.poll_timeout.as_millis()).unwrap_or(i32::MAX);
        #[allow(clippy::cast_possible_truncation)] // n <= 3
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), n as libc::nfds_t, timeout) };

        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                // A signal landed mid-wait; its flag is checked by the caller.
                return Ok(Ready::empty());
            }
            return Err(err.into());
        }

        let mut ready = Ready::empty();
        for (pfd, tag) in fds.iter().zip(tags).take(n) {
            if pfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0 {
                ready |= tag;
            }
        }
        tracing::trace!(target: "input", ?ready, "poll wake");
        Ok(ready)
    }

    /// Read the data stream until it would block, ends, or the read budget
    /// for this wake is spent. A pending shutdown stops the drain early.
    fn drain_data(&mut self, app: &mut impl App, buf: &mut [u8]) -> Result<Drained> {
        for _ in 0..self.config.max_reads_per_wake.max(1) {
            if let Some(sig) = self.pending_shutdown() {
                return Ok(Drained::Interrupted(sig));
            }
            match read_fd(self.data_fd, buf) {
                Ok(0) => {
                    tracing::debug!(target: "input", "end of data stream");
                    return Ok(Drained::Closed);
                }
                Ok(n) => app.on_data(&buf[..n]),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(Drained::Open),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
        tracing::trace!(target: "input", "read budget spent, yielding");
        Ok(Drained::Open)
    }

    /// Read and decode one chunk of keys.
    fn read_keys(&mut self, app: &mut impl App) -> Result<Keys> {
        let mut buf = vec![0u8; self.config.key_chunk.max(1)];
        let n = loop {
            match read_fd(self.console.as_raw_fd(), &mut buf) {
                Ok(n) => break n,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(Keys::Handled),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        };

        if n == 0 {
            tracing::debug!(target: "keys", "keyboard closed");
            return Ok(Keys::Closed);
        }

        for key in self.keys.advance(&buf[..n]) {
            tracing::trace!(target: "keys", ?key, "key");
            if app.on_key(key) == Action::Quit {
                return Ok(Keys::Quit);
            }
        }
        if self.keys.has_pending() {
            tracing::trace!(target: "keys", "holding partial sequence for next read");
        }
        Ok(Keys::Handled)
    }

    /// Pick up a new window size: after SIGWINCH, after a poll timeout, or
    /// once a full timeout has passed since the last query.
    fn check_resize(&mut self, timed_out: bool) -> bool {
        let signalled = self.signals.as_ref().is_some_and(SignalWatcher::take_resize);
        let stale = self.size_checked.elapsed() >= self.config.poll_timeout;
        if !signalled && !timed_out && !stale {
            return false;
        }

        self.size_checked = Instant::now();
        let size = self.console.size();
        if size == self.size {
            return false;
        }
        tracing::debug!(target: "signal", cols = size.cols, rows = size.rows, signalled, "resize");
        self.size = size;
        true
    }
}

const fn pollfd(fd: RawFd) -> libc::pollfd {
    libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    }
}

fn read_fd(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    #[allow(clippy::cast_sign_loss)] // n >= 0 checked above.
    Ok(n as usize)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
