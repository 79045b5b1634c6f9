//! Process execution with output capture, timeouts, and cancellation.

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often a running child is polled for exit, timeout, and cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Result of executing a process.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether the process succeeded (exit code 0).
    pub success: bool,

    /// Whether the process was killed after its timeout elapsed.
    pub timed_out: bool,

    /// Whether cancellation was requested and the process stopped without success.
    pub cancelled: bool,
}

impl CommandResult {
    /// Create a success result.
    pub fn success(stdout: String, stderr: String, duration: Duration) -> Self {
        Self {
            exit_code: Some(0),
            stdout,
            stderr,
            duration,
            success: true,
            timed_out: false,
            cancelled: false,
        }
    }

    /// Create a failure result.
    pub fn failure(
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        duration: Duration,
    ) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            duration,
            success: false,
            timed_out: false,
            cancelled: false,
        }
    }
}

/// Cooperative cancellation flag shared between the coordinator and workers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options for process execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Environment variables (merged with system env).
    pub env: HashMap<String, String>,

    /// Kill the process after this long (None = no timeout).
    pub timeout: Option<Duration>,

    /// Cancellation token; when set the process is asked to stop.
    pub cancel: Option<CancelToken>,
}

/// Output line from process execution.
#[derive(Debug, Clone)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Callback for streaming output.
pub type OutputCallback = Arc<dyn Fn(OutputLine) + Send + Sync>;

/// Run a program to completion, capturing its output.
///
/// Returns an error only if the process could not be started.
pub fn execute(program: &str, args: &[String], options: &CommandOptions) -> io::Result<CommandResult> {
    execute_streaming(program, args, options, None)
}

/// Run a program to completion, forwarding each output line to `callback`.
pub fn execute_streaming(
    program: &str,
    args: &[String],
    options: &CommandOptions,
    callback: Option<OutputCallback>,
) -> io::Result<CommandResult> {
    let start = Instant::now();

    let mut cmd = Command::new(program);
    cmd.args(args);

    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }

    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    // Own process group, so timeouts and cancellation reach forked children.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = cmd.spawn()?;

    let stdout_handle = child
        .stdout
        .take()
        .map(|out| spawn_reader(out, OutputLine::Stdout, callback.clone()));
    let stderr_handle = child
        .stderr
        .take()
        .map(|err| spawn_reader(err, OutputLine::Stderr, callback));

    let deadline = options.timeout.map(|t| start + t);
    let mut timed_out = false;
    let mut stop_requested = false;

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            tracing::debug!("Process {} exceeded its timeout, killing", child.id());
            timed_out = true;
            kill_group(&mut child);
            break child.wait()?;
        }

        if !stop_requested && options.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            tracing::debug!("Cancellation requested for process {}", child.id());
            request_stop(&child);
            stop_requested = true;
        }

        thread::sleep(POLL_INTERVAL);
    };

    let stdout = stdout_handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default();
    let stderr = stderr_handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default();

    let duration = start.elapsed();

    if status.success() {
        return Ok(CommandResult::success(stdout, stderr, duration));
    }

    let mut result = CommandResult::failure(status.code(), stdout, stderr, duration);
    result.timed_out = timed_out;
    result.cancelled = stop_requested && !timed_out;
    Ok(result)
}

fn spawn_reader<R>(
    source: R,
    wrap: fn(String) -> OutputLine,
    callback: Option<OutputCallback>,
) -> JoinHandle<String>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let reader = BufReader::new(source);
        let mut output = String::new();
        for line in reader.lines().map_while(std::result::Result::ok) {
            output.push_str(&line);
            output.push('\n');
            if let Some(cb) = &callback {
                cb(wrap(line));
            }
        }
        output
    })
}

/// Ask a child to stop without forcing it.
///
/// On unix this sends SIGTERM once to the child's process group; a process
/// that handles the signal may keep running to completion. Elsewhere there
/// is no cooperative signal and the child is left to finish.
fn request_stop(child: &Child) {
    #[cfg(unix)]
    {
        // SAFETY: killpg() on the group led by a child we spawned and have not reaped
        unsafe {
            libc::killpg(child.id() as libc::pid_t, libc::SIGTERM);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child;
    }
}

/// Forcibly stop a child and everything it started.
fn kill_group(child: &mut Child) {
    #[cfg(unix)]
    {
        // SAFETY: killpg() on the group led by a child we spawned and have not reaped
        unsafe {
            libc::killpg(child.id() as libc::pid_t, libc::SIGKILL);
        }
    }
    let _ = child.kill();
}
