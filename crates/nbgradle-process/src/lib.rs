//! Launching the build tool for a model fetch.
//!
//! A fetch runs a full Gradle build, which can print a lot. Output is streamed
//! line by line to optional sinks while at most `max_bytes` per stream is kept
//! in memory. There is no timeout: a run ends when the process exits or when
//! the caller's [`CancellationToken`] fires, in which case the whole process
//! tree is terminated.

use std::{
    fmt,
    io::{self, Read, Write},
    path::PathBuf,
    process::{Child, Command, ExitStatus, Stdio},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

pub use tokio_util::sync::CancellationToken;

/// Receives the output of a running process, one line at a time.
pub trait OutputSink: Send + Sync {
    fn line(&self, line: &str);
}

impl<F> OutputSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn line(&self, line: &str) {
        self(line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { command: String },
    Cancelled,
    Finished { success: bool },
}

/// Observes the lifecycle of a run.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

impl<F> ProgressListener for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Captured stdout/stderr, each truncated to `max_bytes`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundedOutput {
    pub stdout: String,
    pub stderr: String,
    /// Set when either stream had more bytes than were captured.
    pub truncated: bool,
}

/// A full process invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSpec {
    pub cwd: PathBuf,
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Added to the inherited environment.
    pub env: Vec<(String, String)>,
    /// Written to the process's stdin, which is then closed. `None` connects
    /// stdin to the null device.
    pub stdin: Option<Vec<u8>>,
}

impl ProcessSpec {
    pub fn new(cwd: impl Into<PathBuf>, program: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for ProcessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Readable, not shell round-trippable.
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.contains(' ') || arg.contains('\t') {
                write!(f, " \"{}\"", arg.replace('"', "\\\""))?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct RunOptions {
    /// Maximum bytes kept in memory per stream. Sinks still see every line.
    pub max_bytes: usize,
    pub cancellation: Option<CancellationToken>,
    /// Time between the graceful termination signal and the forced kill.
    pub kill_grace: Duration,
    pub stdout_sink: Option<Arc<dyn OutputSink>>,
    pub stderr_sink: Option<Arc<dyn OutputSink>>,
    pub progress: Vec<Arc<dyn ProgressListener>>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_bytes: 64 * 1024 * 1024,
            cancellation: None,
            kill_grace: Duration::from_millis(250),
            stdout_sink: None,
            stderr_sink: None,
            progress: Vec::new(),
        }
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("max_bytes", &self.max_bytes)
            .field("cancellation", &self.cancellation.is_some())
            .field("kill_grace", &self.kill_grace)
            .field("stdout_sink", &self.stdout_sink.is_some())
            .field("stderr_sink", &self.stderr_sink.is_some())
            .field("progress", &self.progress.len())
            .finish()
    }
}

impl RunOptions {
    fn notify(&self, event: ProgressEvent) {
        for listener in &self.progress {
            listener.on_progress(&event);
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub output: BoundedOutput,
    pub cancelled: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RunCommandError {
    #[error("failed to run `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` was cancelled")]
    Cancelled { command: String },

    #[error("`{command}` exited with {status}{}", render_stderr(.output))]
    Failed {
        command: String,
        status: ExitStatus,
        output: BoundedOutput,
    },
}

fn render_stderr(output: &BoundedOutput) -> String {
    if output.stderr.trim().is_empty() {
        String::new()
    } else {
        format!("\nstderr:\n{}", output.stderr.trim_end())
    }
}

/// Runs `spec` to completion or cancellation.
pub fn run_process(spec: &ProcessSpec, opts: &RunOptions) -> io::Result<ProcessOutput> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .current_dir(&spec.cwd)
        .envs(spec.env.iter().map(|(key, value)| (key, value)))
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // Own process group so cancellation reaches the daemon-spawning wrapper
    // script and everything it started.
    #[cfg(unix)]
    unsafe {
        use std::os::unix::process::CommandExt;

        cmd.pre_exec(|| {
            // SAFETY: `setpgid` is async-signal-safe and does not allocate.
            if libc::setpgid(0, 0) != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let command = spec.to_string();
    tracing::debug!(
        target = "nbgradle.process",
        command = %command,
        cwd = %spec.cwd.display(),
        "spawning process"
    );
    let mut child = cmd.spawn()?;
    opts.notify(ProgressEvent::Started { command });

    if let (Some(input), Some(mut stdin)) = (spec.stdin.clone(), child.stdin.take()) {
        // Writing on a separate thread keeps a full stdin pipe from
        // blocking the output readers.
        thread::spawn(move || {
            if let Err(err) = stdin.write_all(&input) {
                tracing::debug!(
                    target = "nbgradle.process",
                    error = %err,
                    bytes = input.len(),
                    "failed to write process stdin"
                );
            }
        });
    }

    let Some(stdout) = child.stdout.take() else {
        return Err(io::Error::other("child stdout was not captured"));
    };
    let Some(stderr) = child.stderr.take() else {
        return Err(io::Error::other("child stderr was not captured"));
    };

    let max_bytes = opts.max_bytes;
    let stdout_sink = opts.stdout_sink.clone();
    let stderr_sink = opts.stderr_sink.clone();
    let stdout_handle = thread::spawn(move || read_lines_bounded(stdout, max_bytes, stdout_sink));
    let stderr_handle = thread::spawn(move || read_lines_bounded(stderr, max_bytes, stderr_sink));

    let mut cancelled = false;
    let status = match opts.cancellation.as_ref() {
        Some(token) => loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if token.is_cancelled() {
                cancelled = true;
                tracing::debug!(
                    target = "nbgradle.process",
                    pid = child.id(),
                    "cancelling process tree"
                );
                break terminate_process_tree(&mut child, opts.kill_grace)?;
            }
            thread::sleep(Duration::from_millis(50));
        },
        None => child.wait()?,
    };

    let (stdout_bytes, stdout_truncated) = join_reader(stdout_handle, "stdout")??;
    let (stderr_bytes, stderr_truncated) = join_reader(stderr_handle, "stderr")??;

    if cancelled {
        opts.notify(ProgressEvent::Cancelled);
    } else {
        opts.notify(ProgressEvent::Finished {
            success: status.success(),
        });
    }

    Ok(ProcessOutput {
        status,
        output: BoundedOutput {
            stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
            truncated: stdout_truncated || stderr_truncated,
        },
        cancelled,
    })
}

/// Like [`run_process`], treating cancellation and non-zero exits as errors.
pub fn run_process_checked(
    spec: &ProcessSpec,
    opts: &RunOptions,
) -> Result<ProcessOutput, RunCommandError> {
    let result = run_process(spec, opts).map_err(|source| RunCommandError::Io {
        command: spec.to_string(),
        source,
    })?;

    if result.cancelled {
        return Err(RunCommandError::Cancelled {
            command: spec.to_string(),
        });
    }
    if !result.status.success() {
        return Err(RunCommandError::Failed {
            command: spec.to_string(),
            status: result.status,
            output: result.output,
        });
    }
    Ok(result)
}

fn terminate_process_tree(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        // The child leads its own process group (see `pre_exec`).
        let pgid = child.id() as i32;
        unsafe {
            let _ = libc::kill(-pgid, libc::SIGTERM);
        }

        let start = Instant::now();
        while start.elapsed() < grace {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            thread::sleep(Duration::from_millis(25));
        }

        unsafe {
            let _ = libc::kill(-pgid, libc::SIGKILL);
        }
        child.wait()
    }

    #[cfg(windows)]
    {
        let _ = grace;
        // `gradlew.bat` starts a JVM that inherits our pipes; killing only the
        // wrapper would leave the readers blocked.
        let pid = child.id().to_string();
        let _ = Command::new("taskkill")
            .args(["/PID", &pid, "/T", "/F"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        let _ = child.kill();
        child.wait()
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = grace;
        let _ = child.kill();
        child.wait()
    }
}

fn join_reader(
    handle: thread::JoinHandle<io::Result<(Vec<u8>, bool)>>,
    stream: &'static str,
) -> io::Result<io::Result<(Vec<u8>, bool)>> {
    handle
        .join()
        .map_err(|_| io::Error::other(format!("{stream} reader thread panicked")))
}

/// Bytes requested from a pipe per read.
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Longest line handed to an [`OutputSink`]. The rest of an overlong line is
/// dropped, so memory stays bounded even for output without newlines.
pub const MAX_SINK_LINE_BYTES: usize = 64 * 1024;

fn read_lines_bounded(
    mut reader: impl Read,
    max_bytes: usize,
    sink: Option<Arc<dyn OutputSink>>,
) -> io::Result<(Vec<u8>, bool)> {
    let mut buf = [0u8; READ_CHUNK_BYTES];
    let mut out = Vec::new();
    let mut truncated = false;
    let mut lines = sink.map(LineSplitter::new);

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        let chunk = &buf[..n];

        let remaining = max_bytes.saturating_sub(out.len());
        let to_store = remaining.min(n);
        out.extend_from_slice(&chunk[..to_store]);
        if to_store < n {
            truncated = true;
        }

        if let Some(lines) = &mut lines {
            lines.push(chunk);
        }
    }

    if let Some(lines) = &mut lines {
        lines.finish();
    }
    Ok((out, truncated))
}

/// Reassembles lines across read chunks for a sink.
struct LineSplitter {
    sink: Arc<dyn OutputSink>,
    pending: Vec<u8>,
}

impl LineSplitter {
    fn new(sink: Arc<dyn OutputSink>) -> Self {
        Self {
            sink,
            pending: Vec::new(),
        }
    }

    fn push(&mut self, mut chunk: &[u8]) {
        while let Some(pos) = chunk.iter().position(|byte| *byte == b'\n') {
            self.append(&chunk[..pos]);
            self.emit();
            chunk = &chunk[pos + 1..];
        }
        self.append(chunk);
    }

    fn append(&mut self, bytes: &[u8]) {
        let room = MAX_SINK_LINE_BYTES.saturating_sub(self.pending.len());
        self.pending.extend_from_slice(&bytes[..room.min(bytes.len())]);
    }

    fn emit(&mut self) {
        let text = String::from_utf8_lossy(&self.pending);
        self.sink.line(text.trim_end_matches('\r'));
        self.pending.clear();
    }

    fn finish(&mut self) {
        if !self.pending.is_empty() {
            self.emit();
        }
    }
}
