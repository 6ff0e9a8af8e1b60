// SPDX-License-Identifier: MIT
//
// lognowrap: show a stream of colored log lines without wrapping.
//
//   tail -f access.log | colorize | lognowrap
//
// This is the binary that wires the two crates together:
//
//   lw-term → tty, cbreak guard, signals, event loop, ANSI slicing
//   lw-view → line assembly, line buffer, viewport, renderer
//
// stdin carries the data, so keys come from /dev/tty. The Viewer
// implements lw-term's App trait; the event loop feeds it data, keys and
// resizes, and asks it to paint. Every normal way out (q, Ctrl+C, end of
// input, closed output, SIGTERM/SIGHUP) exits 0 with the terminal
// restored. No controlling terminal exits 1; a bad argument exits 2.
//
// Logging is off unless LOGNOWRAP_LOG names a file: stdout is the screen
// and stderr usually shares it.

use std::env;
use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Usage: lognowrap [OPTIONS]

Display ANSI-colored lines from stdin without wrapping.

Keys:
  Left, Right   scroll one column
  Ctrl+C        quit
  h, l, q       same as Left, Right, Ctrl+C
  Other keys are ignored.

Options:
  -h, --help       Print help
  -V, --version    Print version

Environment:
  LOGNOWRAP_LOG    Write a debug log to this file (filter via RUST_LOG)
";

/// Environment variable naming the log file.
const LOG_ENV: &str = "LOGNOWRAP_LOG";

// ─── Arguments ──────────────────────────────────────────────────────────────

/// What the command line asks for.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Run,
    Help,
    Version,
}

/// Parse arguments (program name excluded). `Err` carries the first
/// argument that was not understood.
fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command, String> {
    let mut command = Command::Run;
    for arg in args {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-V" | "--version" => command = Command::Version,
            _ => return Err(arg),
        }
    }
    Ok(command)
}

// ─── Logging ────────────────────────────────────────────────────────────────

/// Start file logging if `LOGNOWRAP_LOG` is set.
///
/// The returned guard flushes the background writer on drop and must live
/// until exit.
fn init_logging() -> Option<WorkerGuard> {
    let path = env::var_os(LOG_ENV)?;
    let path = Path::new(&path);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name()?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;

    tracing::info!(target: "runtime", version = env!("CARGO_PKG_VERSION"), "logging started");
    Some(guard)
}

/// Log panics before the default hook prints them.
///
/// Installed before the terminal guard adds its own restoring hook, so on
/// panic the terminal is restored first, then this runs.
fn install_panic_hook() {
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(target: "runtime.panic", %info, "panic");
        default_panic(info);
    }));
}

// ─── Run ────────────────────────────────────────────────────────────────────

/// Loop settings for the binary: the `h`, `l`, `q` keys from USAGE are on.
#[cfg(unix)]
fn loop_config() -> lw_term::event_loop::LoopConfig {
    lw_term::event_loop::LoopConfig {
        vi_keys: true,
        ..Default::default()
    }
}

#[cfg(unix)]
fn run() -> Result<()> {
    use std::io;
    use std::os::fd::AsRawFd;

    use anyhow::Context;
    use lw_term::event_loop::EventLoop;
    use lw_term::signal::SignalWatcher;
    use lw_term::terminal::Tty;
    use lw_view::{Viewer, ViewerConfig};

    let tty = Tty::open()?;
    let size = tty.size();
    tracing::debug!(target: "runtime", cols = size.cols, rows = size.rows, "initial size");

    let signals = SignalWatcher::install().context("installing signal handlers")?;
    let guard = tty.cbreak().context("entering cbreak mode")?;

    let mut viewer = Viewer::new(ViewerConfig::default(), size);
    let mut event_loop = EventLoop::new(loop_config(), io::stdin().as_raw_fd(), tty)
        .with_guard(guard)
        .with_signals(signals);

    let reason = event_loop.run(&mut viewer, &mut io::stdout().lock())?;
    tracing::info!(target: "runtime", ?reason, "exiting");
    Ok(())
}

#[cfg(not(unix))]
fn run() -> Result<()> {
    anyhow::bail!("a Unix terminal (/dev/tty) is required")
}

// ─── Entry point ────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    match parse_args(env::args().skip(1)) {
        Ok(Command::Run) => {}
        Ok(Command::Help) => {
            print!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Ok(Command::Version) => {
            println!("lognowrap {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        Err(arg) => {
            eprintln!("lognowrap: unexpected argument '{arg}'\n");
            eprint!("{USAGE}");
            return ExitCode::from(2);
        }
    }

    let _log_guard = init_logging();
    install_panic_hook();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(target: "runtime", error = %format!("{err:#}"), "fatal");
            eprintln!("lognowrap: {err:#}");
            ExitCode::FAILURE
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Result<Command, String> {
        parse_args(args.iter().map(|s| (*s).to_owned()))
    }

    #[test]
    fn no_args_runs() {
        assert_eq!(parse(&[]), Ok(Command::Run));
    }

    #[test]
    fn help_flags() {
        assert_eq!(parse(&["-h"]), Ok(Command::Help));
        assert_eq!(parse(&["--help"]), Ok(Command::Help));
        assert_eq!(parse(&["-V", "--help"]), Ok(Command::Help));
    }

    #[test]
    fn version_flags() {
        assert_eq!(parse(&["-V"]), Ok(Command::Version));
        assert_eq!(parse(&["--version"]), Ok(Command::Version));
    }

    #[test]
    fn unknown_argument_is_reported() {
        assert_eq!(parse(&["--wrap"]), Err("--wrap".to_owned()));
        assert_eq!(parse(&["-V", "file.log"]), Err("file.log".to_owned()));
    }

    #[test]
    fn usage_lists_every_flag() {
        for flag in ["-h", "--help", "-V", "--version", LOG_ENV] {
            assert!(USAGE.contains(flag), "usage is missing {flag}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn usage_matches_enabled_keys() {
        use lw_term::{KeyAction, KeyDecoder};

        for key in ["Left", "Right", "Ctrl+C", "h, l, q", "ignored"] {
            assert!(USAGE.contains(key), "usage is missing {key}");
        }

        let mut keys = KeyDecoder::with_vi_keys(loop_config().vi_keys);
        assert_eq!(
            keys.advance(b"hlqx"),
            vec![KeyAction::ScrollLeft, KeyAction::ScrollRight, KeyAction::Quit]
        );
    }
}
