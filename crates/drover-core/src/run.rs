//! Agent process supervision.
//!
//! One run wires up three child processes around a named pipe and races the
//! agent against a wall-clock deadline:
//!
//! ```text
//! prompt file --> cat (feeder) --> named pipe --> cat (reader) --> agent stdin
//!                                                 agent stdout --> formatter --> console
//!                                                              \-> raw chunks --> RunOutcome
//! ```
//!
//! The pipe write end and the agent's stdin are pumped by in-process tasks,
//! so a stall in any worker never blocks the supervisor itself. The only
//! long await is the completion race; after it resolves, cleanup always
//! runs: SIGTERM to the workers, bounded pump joins, pipe removal.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{RunConfig, timeout_from_minutes};
use crate::error::RunError;
use crate::output;
use crate::pipe::{self, PipeChannel};

/// Exit code reported when the deadline elapses before the agent finishes.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Window between SIGTERM and SIGKILL when the deadline has elapsed.
const GRACE_PERIOD: Duration = Duration::from_secs(5);

/// How long to wait for the agent's stdout to reach EOF after the agent
/// itself is terminal. A leftover grandchild holding the descriptor open
/// must not stall the run.
const OUTPUT_DRAIN_WAIT: Duration = Duration::from_secs(2);

/// How long cleanup waits for a worker process or pump task to wind down.
const WORKER_EXIT_WAIT: Duration = Duration::from_secs(1);

/// Terminal result of one agent run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// 0 on success, the agent's own code on failure, 124 on timeout.
    pub exit_code: i32,
    /// Raw agent stdout, every chunk in arrival order, unformatted.
    pub output: Vec<u8>,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// The accumulated output as text (lossy for any invalid UTF-8).
    pub fn output_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.output)
    }
}

/// Drives a single agent invocation end to end.
#[derive(Debug, Clone)]
pub struct AgentRunner {
    /// Agent binary. Defaults to `"claude"` (found via `$PATH`).
    binary: String,
    pipe_path: PathBuf,
    timeout: Duration,
    grace: Duration,
}

impl Default for AgentRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRunner {
    pub fn new() -> Self {
        Self {
            binary: "claude".to_string(),
            pipe_path: pipe::default_pipe_path(),
            timeout: timeout_from_minutes(None),
            grace: GRACE_PERIOD,
        }
    }

    /// Use a custom agent binary path.
    pub fn with_binary(mut self, path: impl Into<String>) -> Self {
        self.binary = path.into();
        self
    }

    /// Use a custom pipe path, e.g. [`pipe::unique_pipe_path`] for
    /// collision-free concurrent runs.
    pub fn with_pipe_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.pipe_path = path.into();
        self
    }

    /// Override the wall-clock deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the SIGTERM-to-SIGKILL grace window. Tests use this to keep
    /// the forced-kill path fast.
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Run the agent once.
    ///
    /// Returns `Err` only when the prompt pipe cannot be created. Every
    /// other failure resolves to a `RunOutcome`: the agent's own exit code,
    /// 1 when the agent could not be spawned or waited on, or
    /// [`TIMEOUT_EXIT_CODE`] when the deadline elapsed.
    pub async fn run(&self, config: &RunConfig) -> Result<RunOutcome, RunError> {
        let pipe = PipeChannel::create(&self.pipe_path)?;
        let outcome = self.supervise(&pipe, config).await;
        pipe.cleanup();
        info!(code = outcome.exit_code, "agent run finished");
        Ok(outcome)
    }

    async fn supervise(&self, pipe: &PipeChannel, config: &RunConfig) -> RunOutcome {
        match std::fs::metadata(&config.prompt_path) {
            Ok(meta) => {
                info!(path = %config.prompt_path.display(), bytes = meta.len(), "streaming prompt");
            }
            Err(e) => {
                warn!(path = %config.prompt_path.display(), error = %e, "could not stat prompt file");
            }
        }

        // Feeder: cat the prompt file; an in-process pump moves its stdout
        // into the pipe's write end. Non-fatal if it never starts.
        let mut feeder = match spawn_cat(&config.prompt_path) {
            Ok(child) => Some(child),
            Err(e) => {
                warn!(error = %RunError::Feeder(e), "feeder process failed to start");
                None
            }
        };
        let feeder_stdout = feeder.as_mut().and_then(|c| c.stdout.take());
        let feeder_pump = tokio::spawn({
            let pipe_path = pipe.path().to_path_buf();
            async move {
                match feed_pipe(pipe_path, feeder_stdout).await {
                    Ok(bytes) => debug!(bytes, "prompt streamed into pipe"),
                    Err(e) => {
                        warn!(error = %e, "prompt delivery failed; agent may see a truncated prompt");
                    }
                }
            }
        });

        // Agent: spawn failure maps to exit code 1, not an error.
        let mut agent = match self.spawn_agent(config) {
            Ok(child) => Some(child),
            Err(e) => {
                error!(error = %e, "agent failed to start");
                None
            }
        };
        let agent_pid = agent.as_ref().and_then(|c| c.id());
        let agent_stdin = agent.as_mut().and_then(|c| c.stdin.take());
        let agent_stdout = agent.as_mut().and_then(|c| c.stdout.take());

        // Reader: cat the pipe into the agent's stdin. Spawned even when
        // the agent is gone so the feeder side still drains to EOF.
        let mut reader = match spawn_cat(pipe.path()) {
            Ok(child) => Some(child),
            Err(e) => {
                warn!(error = %RunError::Reader(e), "reader process failed to start");
                None
            }
        };
        let reader_stdout = reader.as_mut().and_then(|c| c.stdout.take());
        let reader_pump = tokio::spawn(async move {
            match forward_prompt(reader_stdout, agent_stdin).await {
                Ok(bytes) => debug!(bytes, "prompt forwarded to agent"),
                Err(e) => {
                    warn!(error = %e, "prompt forwarding failed; asking the agent to stop");
                    if let Some(pid) = agent_pid {
                        send_sigterm(pid);
                    }
                }
            }
        });

        // Output tap: prints formatted text live and ships raw chunks back
        // over a channel so the buffer survives even an abandoned drain.
        let (chunk_tx, mut chunk_rx) = mpsc::unbounded_channel();
        let mut tap = tokio::spawn(tap_output(agent_stdout, chunk_tx));

        // The completion race: agent exit vs. deadline. Exactly one branch
        // decides the exit code.
        let exit_code = match agent.as_mut() {
            Some(child) => match await_agent(child, self.timeout, self.grace).await {
                Ok(code) => {
                    info!(code, "agent exited");
                    code
                }
                Err(RunError::DeadlineExceeded(_)) => TIMEOUT_EXIT_CODE,
                Err(e) => {
                    error!(error = %e, "agent run failed");
                    1
                }
            },
            None => 1,
        };

        // Collect whatever output arrived.
        match tokio::time::timeout(OUTPUT_DRAIN_WAIT, &mut tap).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "output tap task failed"),
            Err(_) => {
                warn!("agent stdout still open after exit; abandoning the rest of the stream");
                tap.abort();
            }
        }
        let mut output = Vec::new();
        while let Ok(chunk) = chunk_rx.try_recv() {
            output.extend_from_slice(&chunk);
        }

        // Cleanup always runs: stop the workers, then reel in the pumps.
        shutdown_worker(feeder.take(), "feeder").await;
        shutdown_worker(reader.take(), "reader").await;
        join_pump(feeder_pump, "feeder").await;
        join_pump(reader_pump, "reader").await;

        RunOutcome { exit_code, output }
    }

    fn spawn_agent(&self, config: &RunConfig) -> Result<Child, RunError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&config.agent_args);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        // Diagnostics go straight to the operator's console.
        cmd.stderr(Stdio::inherit());
        cmd.spawn().map_err(|error| RunError::AgentSpawn {
            binary: self.binary.clone(),
            error,
        })
    }
}

fn spawn_cat(path: &Path) -> std::io::Result<Child> {
    Command::new("cat")
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
}

/// Open the pipe's write end and move the feeder's stdout into it.
///
/// Opening a FIFO for writing blocks until a reader opens the other side;
/// the reader `cat` is always spawned, so this resolves. Closing the write
/// end on every path is what gives the agent EOF on its prompt.
async fn feed_pipe(
    pipe_path: PathBuf,
    feeder_stdout: Option<ChildStdout>,
) -> Result<u64, RunError> {
    let mut write_end = tokio::fs::OpenOptions::new()
        .write(true)
        .open(&pipe_path)
        .await
        .map_err(RunError::Feeder)?;
    let Some(mut stdout) = feeder_stdout else {
        // No feeder; an immediate close hands the agent an empty prompt.
        return Ok(0);
    };
    let bytes = tokio::io::copy(&mut stdout, &mut write_end)
        .await
        .map_err(RunError::Feeder)?;
    write_end.shutdown().await.map_err(RunError::Feeder)?;
    // Convert to a std handle so the close happens now, not in the
    // background; the reader's EOF depends on it.
    drop(write_end.into_std().await);
    Ok(bytes)
}

/// Move the reader's stdout into the agent's stdin, closing stdin at EOF.
async fn forward_prompt(
    reader_stdout: Option<ChildStdout>,
    agent_stdin: Option<ChildStdin>,
) -> Result<u64, RunError> {
    let Some(mut stdout) = reader_stdout else {
        return Ok(0);
    };
    match agent_stdin {
        Some(mut stdin) => {
            let bytes = tokio::io::copy(&mut stdout, &mut stdin)
                .await
                .map_err(RunError::Reader)?;
            stdin.shutdown().await.map_err(RunError::Reader)?;
            Ok(bytes)
        }
        // Agent never started; drain the pipe so the feeder side unblocks.
        None => tokio::io::copy(&mut stdout, &mut tokio::io::sink())
            .await
            .map_err(RunError::Reader),
    }
}

/// Print formatted output live and ship every raw chunk over `chunk_tx`.
async fn tap_output(stdout: Option<ChildStdout>, chunk_tx: mpsc::UnboundedSender<Vec<u8>>) {
    let Some(stdout) = stdout else { return };
    let mut chunks = output::chunk_stream(stdout);
    let mut console = tokio::io::stdout();
    while let Some(chunk) = chunks.next().await {
        let formatted = output::format_chunk(&String::from_utf8_lossy(&chunk));
        if !formatted.is_empty() {
            if let Err(e) = console.write_all(formatted.as_bytes()).await {
                warn!(error = %e, "failed to write formatted output to console");
            } else if let Err(e) = console.flush().await {
                warn!(error = %e, "failed to flush console");
            }
        }
        if chunk_tx.send(chunk).is_err() {
            break; // receiver gone, the run is over
        }
    }
}

/// Wait for the agent, bounded by the deadline.
///
/// On deadline expiry the agent gets SIGTERM, the grace window, then
/// SIGKILL; the returned error still reports the timeout regardless of how
/// the process ended up dying, so the 124 outcome is unconditional.
async fn await_agent(
    child: &mut Child,
    deadline: Duration,
    grace: Duration,
) -> Result<i32, RunError> {
    match tokio::time::timeout(deadline, child.wait()).await {
        // A status with no code means the agent died to a signal; the
        // original contract maps that to 0.
        Ok(Ok(status)) => Ok(status.code().unwrap_or(0)),
        Ok(Err(e)) => Err(RunError::AgentRuntime(e)),
        Err(_elapsed) => {
            error!(
                timeout_secs = deadline.as_secs(),
                "agent did not finish before the deadline"
            );
            terminate_with_grace(child, grace).await;
            Err(RunError::DeadlineExceeded(deadline))
        }
    }
}

/// Two-phase termination: SIGTERM, a grace window, then SIGKILL.
async fn terminate_with_grace(child: &mut Child, grace: Duration) {
    if let Some(pid) = child.id() {
        send_sigterm(pid);
    }
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(_status)) => {
            debug!("agent exited within the grace period");
        }
        _ => {
            // Still running or error waiting -- force kill.
            debug!("agent did not exit after SIGTERM, sending SIGKILL");
            if let Err(e) = child.kill().await {
                warn!(error = %e, "SIGKILL failed; agent may already be gone");
            }
        }
    }
}

/// SIGTERM a worker and reap it, escalating to SIGKILL if it lingers.
/// Cleanup only; every failure here is logged and swallowed.
async fn shutdown_worker(child: Option<Child>, role: &'static str) {
    let Some(mut child) = child else { return };
    let Some(pid) = child.id() else {
        debug!(role, "worker already reaped");
        return;
    };
    send_sigterm(pid);
    match tokio::time::timeout(WORKER_EXIT_WAIT, child.wait()).await {
        Ok(Ok(_status)) => debug!(role, pid, "worker exited"),
        Ok(Err(e)) => warn!(role, pid, error = %e, "error waiting for worker"),
        Err(_) => {
            debug!(role, pid, "worker ignored SIGTERM, killing");
            let _ = child.kill().await;
        }
    }
}

async fn join_pump(mut pump: JoinHandle<()>, role: &'static str) {
    match tokio::time::timeout(WORKER_EXIT_WAIT, &mut pump).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(role, error = %e, "pump task failed"),
        Err(_) => {
            debug!(role, "pump still blocked at shutdown, aborting");
            pump.abort();
        }
    }
}

#[cfg(unix)]
fn send_sigterm(pid: u32) {
    // SAFETY: pid is a valid u32 from a child we spawned.
    let ret = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
    if ret != 0 {
        debug!(pid, "SIGTERM delivery failed (process already gone?)");
    }
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) {}
