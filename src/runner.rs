use serde::Serialize;
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Exit code for a process that could not be started or was abandoned on timeout
pub const NOT_RUN_EXIT_CODE: i32 = -1;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Result of an external command execution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub command: Vec<String>,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_seconds: f64,
}

impl RunResult {
    /// Zero-duration success for a command that was only previewed
    pub fn dry_run(command: Vec<String>) -> Self {
        Self {
            command,
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            duration_seconds: 0.0,
        }
    }

    /// Zero-duration success for a step with nothing to execute
    pub fn skipped(note: &str) -> Self {
        Self {
            command: vec!["(none)".to_string()],
            exit_code: 0,
            stdout: String::new(),
            stderr: note.to_string(),
            duration_seconds: 0.0,
        }
    }

    /// Synthetic failure for a command that never produced an exit status
    pub fn not_run(command: Vec<String>, reason: String, elapsed: Duration) -> Self {
        Self {
            command,
            exit_code: NOT_RUN_EXIT_CODE,
            stdout: String::new(),
            stderr: reason,
            duration_seconds: elapsed.as_secs_f64(),
        }
    }

    pub fn ok(&self) -> bool {
        self.exit_code == 0
    }

    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }

    pub fn summary(&self) -> String {
        let status = if self.ok() {
            "OK".to_string()
        } else {
            format!("FAILED (exit {})", self.exit_code)
        };
        format!(
            "[{}] {} ({:.1}s)",
            status,
            self.command_line(),
            self.duration_seconds
        )
    }

    /// First `max` characters of stderr, for one-line failure reports
    pub fn stderr_excerpt(&self, max: usize) -> String {
        self.stderr.chars().take(max).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Extra environment variables, merged over the inherited environment
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    /// Echo output live while still capturing it
    pub stream: bool,
}

impl RunOptions {
    pub fn with_env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.push((key.to_string(), value.into()));
        self
    }
}

#[derive(Clone, Copy)]
enum Echo {
    Stdout,
    Stderr,
}

/// Read a pipe to the end, optionally echoing each line as it arrives
fn drain<R: Read + Send + 'static>(pipe: R, echo: Option<Echo>) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut captured = Vec::new();
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    match echo {
                        Some(Echo::Stdout) => {
                            let mut out = std::io::stdout().lock();
                            let _ = out.write_all(&line);
                            let _ = out.flush();
                        }
                        Some(Echo::Stderr) => {
                            let _ = std::io::stderr().lock().write_all(&line);
                        }
                        None => {}
                    }
                    captured.extend_from_slice(&line);
                }
            }
        }
        let _ = tx.send(String::from_utf8_lossy(&captured).into_owned());
    });
    rx
}

/// Wait for a reader's output. `None` when the deadline passes first, which
/// happens when a background process inherited the pipe and keeps it open.
fn collect(reader: Option<Receiver<String>>, deadline: Option<Instant>) -> Option<String> {
    let Some(rx) = reader else {
        return Some(String::new());
    };
    let Some(deadline) = deadline else {
        return Some(rx.recv().unwrap_or_default());
    };
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(output) => Some(output),
        Err(RecvTimeoutError::Disconnected) => Some(String::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}

fn timed_out(command: Vec<String>, timeout: Duration, start: Instant) -> RunResult {
    tracing::debug!(command = %command.join(" "), "command timed out");
    RunResult::not_run(
        command,
        format!("Command timed out after {}s", timeout.as_secs_f64()),
        start.elapsed(),
    )
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Run an external command and capture its output.
///
/// Never fails: a missing binary or an expired timeout is reported as a
/// [`RunResult`] with [`NOT_RUN_EXIT_CODE`] and a descriptive stderr.
pub fn run_command(cmd: &[String], opts: &RunOptions) -> RunResult {
    let start = Instant::now();
    let command = cmd.to_vec();

    let Some((program, args)) = cmd.split_first() else {
        return RunResult::not_run(command, "Empty command".to_string(), start.elapsed());
    };

    tracing::debug!(command = %cmd.join(" "), stream = opts.stream, "running command");

    let mut process = Command::new(program);
    process
        .args(args)
        .envs(opts.env.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match process.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return RunResult::not_run(
                command,
                format!("Command not found: {}", program),
                start.elapsed(),
            );
        }
        Err(e) => {
            return RunResult::not_run(
                command,
                format!("Failed to start {}: {}", program, e),
                start.elapsed(),
            );
        }
    };

    let stdout_reader = child
        .stdout
        .take()
        .map(|pipe| drain(pipe, opts.stream.then_some(Echo::Stdout)));
    let stderr_reader = child
        .stderr
        .take()
        .map(|pipe| drain(pipe, opts.stream.then_some(Echo::Stderr)));

    let status = match opts.timeout {
        None => child.wait(),
        Some(timeout) => loop {
            match child.try_wait() {
                Ok(Some(status)) => break Ok(status),
                Ok(None) if start.elapsed() >= timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    // Reader threads are left detached: a grandchild may still
                    // hold the pipes open.
                    return timed_out(command, timeout, start);
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => break Err(e),
            }
        },
    };

    let status = match status {
        Ok(status) => status,
        Err(e) => {
            return RunResult::not_run(
                command,
                format!("Failed to wait for {}: {}", program, e),
                start.elapsed(),
            );
        }
    };

    // The deadline covers draining the pipes too, not only the direct child
    let deadline = opts.timeout.map(|timeout| start + timeout);
    let (Some(stdout), Some(stderr)) = (
        collect(stdout_reader, deadline),
        collect(stderr_reader, deadline),
    ) else {
        let timeout = opts.timeout.unwrap_or_default();
        return timed_out(command, timeout, start);
    };

    let result = RunResult {
        command,
        exit_code: exit_code(status),
        stdout,
        stderr,
        duration_seconds: start.elapsed().as_secs_f64(),
    };
    tracing::debug!(summary = %result.summary(), "command finished");
    result
}
