//! External tool process spawning with line streaming and cooperative cancellation.
//!
//! Spawns FFmpeg or MP4Box as a child process with both output streams piped.
//! One background thread per stream splits output into lines and forwards them
//! over a channel; the calling thread delivers them to the caller's callbacks
//! and checks the cancel token at least once per poll interval.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
#[cfg(windows)]
use std::os::windows::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::error::AppError;

/// Upper bound on cancellation latency while the child is producing no output.
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Time a child gets to exit after an interrupt before it is killed.
const TERMINATE_GRACE: Duration = Duration::from_secs(5);
/// Keep only the last N lines per stream to avoid unbounded memory growth.
const MAX_CAPTURED_LINES: usize = 10_000;

enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Exit code and captured output of a finished process.
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub exit_code: i32,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout followed by stderr, one line each. Used as failure detail.
    pub fn log(&self) -> String {
        self.stdout
            .iter()
            .chain(self.stderr.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Splits on both `\n` and `\r`: FFmpeg terminates its status line with `\r`
/// until the final report.
fn read_stream<R: Read + Send + 'static>(
    mut reader: R,
    tx: Sender<OutputLine>,
    wrap: fn(String) -> OutputLine,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut chunk = [0u8; 4096];
        let mut pending: Vec<u8> = Vec::with_capacity(256);
        loop {
            let n = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            };
            for &byte in &chunk[..n] {
                if byte == b'\n' || byte == b'\r' {
                    if !pending.is_empty() {
                        let line = String::from_utf8_lossy(&pending).into_owned();
                        pending.clear();
                        if tx.send(wrap(line)).is_err() {
                            return;
                        }
                    }
                } else {
                    pending.push(byte);
                }
            }
        }
        if !pending.is_empty() {
            let _ = tx.send(wrap(String::from_utf8_lossy(&pending).into_owned()));
        }
    })
}

fn push_capped(lines: &mut VecDeque<String>, line: String) {
    lines.push_back(line);
    if lines.len() > MAX_CAPTURED_LINES {
        lines.pop_front();
    }
}

/// Interrupt first so the tool can flush and exit cleanly, then kill.
fn terminate(child: &mut Child, program: &str) {
    log::info!(
        target: "dash_encode::ffmpeg::runner",
        "Cancelling {} (pid {})",
        program,
        child.id()
    );
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        if let Ok(pid) = i32::try_from(child.id()) {
            let _ = kill(Pid::from_raw(pid), Signal::SIGINT);
        }
        let deadline = Instant::now() + TERMINATE_GRACE;
        while Instant::now() < deadline {
            match child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) => thread::sleep(EXIT_POLL_INTERVAL),
                Err(_) => break,
            }
        }
        log::warn!(
            target: "dash_encode::ffmpeg::runner",
            "{} ignored interrupt; killing",
            program
        );
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn wait_for_exit(
    child: &mut Child,
    program: &str,
    cancel: &CancelToken,
) -> Result<ExitStatus, AppError> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if cancel.is_cancelled() {
            terminate(child, program);
            return Err(AppError::cancelled());
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}

/// Run `program` with `args` and block until it exits or `cancel` trips.
///
/// Every stdout/stderr line is passed to the matching callback as it arrives.
/// Ordering between the two streams is not preserved.
///
/// Errors:
/// - `Cancelled` if the token is set before spawn (the process is never
///   started) or at any point while it runs. Takes precedence over exit status.
/// - `Spawn` if the process cannot be started.
///
/// A non-zero exit code is not an error here; callers decide what it means.
pub fn run_process(
    program: &Path,
    args: &[String],
    on_stdout: &mut dyn FnMut(&str),
    on_stderr: &mut dyn FnMut(&str),
    cancel: &CancelToken,
) -> Result<RunOutput, AppError> {
    cancel.check()?;

    let program_name = program.display().to_string();
    log::debug!(
        target: "dash_encode::ffmpeg::runner",
        "Spawning {}: args={}",
        program_name,
        args.join(" ")
    );

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(windows)]
    cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW
    let mut child = cmd.spawn().map_err(|source| AppError::Spawn {
        program: program_name.clone(),
        source,
    })?;

    let (tx, rx) = mpsc::channel();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(read_stream(stdout, tx.clone(), OutputLine::Stdout));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(read_stream(stderr, tx.clone(), OutputLine::Stderr));
    }
    drop(tx);

    let mut stdout_lines = VecDeque::new();
    let mut stderr_lines = VecDeque::new();
    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(OutputLine::Stdout(line)) => {
                log::trace!(target: "dash_encode::ffmpeg::runner", "[stdout] {}", line);
                on_stdout(&line);
                push_capped(&mut stdout_lines, line);
            }
            Ok(OutputLine::Stderr(line)) => {
                log::trace!(target: "dash_encode::ffmpeg::runner", "[stderr] {}", line);
                on_stderr(&line);
                push_capped(&mut stderr_lines, line);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if cancel.is_cancelled() {
            // Readers are left detached: a grandchild may still hold the pipes open.
            terminate(&mut child, &program_name);
            return Err(AppError::cancelled());
        }
    }
    for reader in readers {
        let _ = reader.join();
    }

    let status = wait_for_exit(&mut child, &program_name, cancel)?;
    cancel.check()?;

    let exit_code = status.code().unwrap_or(-1);
    if exit_code == 0 {
        log::debug!(
            target: "dash_encode::ffmpeg::runner",
            "{} completed successfully",
            program_name
        );
    } else {
        let err_preview = stderr_lines
            .iter()
            .rev()
            .take(3)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("; ");
        log::error!(
            target: "dash_encode::ffmpeg::runner",
            "{} failed (code={}): {}",
            program_name,
            exit_code,
            err_preview
        );
    }

    Ok(RunOutput {
        exit_code,
        stdout: stdout_lines.into(),
        stderr: stderr_lines.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn already_cancelled_token_never_spawns() {
        let token = CancelToken::new();
        token.cancel();
        let missing = PathBuf::from("/definitely/not/a/real/tool");
        let result = run_process(&missing, &[], &mut |_| {}, &mut |_| {}, &token);
        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let missing = PathBuf::from("/definitely/not/a/real/tool");
        let result = run_process(&missing, &[], &mut |_| {}, &mut |_| {}, &CancelToken::new());
        assert!(matches!(result, Err(AppError::Spawn { .. })));
    }

    #[test]
    fn push_capped_drops_oldest() {
        let mut lines = VecDeque::new();
        for i in 0..MAX_CAPTURED_LINES + 5 {
            push_capped(&mut lines, i.to_string());
        }
        assert_eq!(lines.len(), MAX_CAPTURED_LINES);
        assert_eq!(lines.front().map(String::as_str), Some("5"));
    }

    #[test]
    fn log_joins_stdout_then_stderr() {
        let output = RunOutput {
            exit_code: 1,
            stdout: args(&["out"]),
            stderr: args(&["err1", "err2"]),
        };
        assert!(!output.success());
        assert_eq!(output.log(), "out\nerr1\nerr2");
    }

    #[cfg(unix)]
    #[test]
    fn delivers_lines_from_both_streams() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        let result = run_process(
            Path::new("/bin/sh"),
            &args(&["-c", "echo one; echo two 1>&2; printf 'a\\rb\\r\\n'; exit 3"]),
            &mut |l| out.push(l.to_string()),
            &mut |l| err.push(l.to_string()),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(result.exit_code, 3);
        assert_eq!(out, vec!["one", "a", "b"]);
        assert_eq!(err, vec!["two"]);
        assert_eq!(result.stdout, out);
        assert_eq!(result.stderr, err);
    }
}
