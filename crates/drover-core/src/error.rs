//! Typed error kinds for an agent run.
//!
//! Only pipe creation is fatal: without a usable input channel there is no
//! run. Agent spawn failures, runtime failures, and deadline expiry
//! determine the run's exit code but are not propagated as errors; feeder,
//! reader, and persistence failures are logged and absorbed. `is_fatal`
//! encodes that split so callers do not have to re-derive it.

use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while driving an agent run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The prompt pipe could not be created. Aborts the run.
    #[error("failed to create prompt pipe at {}: {error}", .path.display())]
    PipeCreate { path: PathBuf, error: std::io::Error },

    /// The feeder process or the pipe's write end failed mid-delivery.
    #[error("prompt feeder failed: {0}")]
    Feeder(std::io::Error),

    /// The reader process or the agent's stdin failed mid-forwarding.
    #[error("pipe reader failed: {0}")]
    Reader(std::io::Error),

    /// The agent binary could not be started at all.
    #[error("could not spawn agent binary {binary:?}: {error}")]
    AgentSpawn { binary: String, error: std::io::Error },

    /// Waiting on the agent process failed.
    #[error("agent process error: {0}")]
    AgentRuntime(std::io::Error),

    /// The agent did not reach a terminal state before the deadline.
    #[error("agent did not finish within {}s", .0.as_secs())]
    DeadlineExceeded(Duration),

    /// A run artifact (raw output or execution log) could not be written.
    #[error("failed to persist execution log at {}: {error}", .path.display())]
    LogPersist { path: PathBuf, error: std::io::Error },
}

impl RunError {
    /// Whether this error aborts the whole run instead of degrading it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RunError::PipeCreate { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pipe_creation_is_fatal() {
        let fatal = RunError::PipeCreate {
            path: PathBuf::from("/tmp/p"),
            error: std::io::Error::other("boom"),
        };
        assert!(fatal.is_fatal());

        let absorbed = [
            RunError::Feeder(std::io::Error::other("x")),
            RunError::Reader(std::io::Error::other("x")),
            RunError::AgentSpawn {
                binary: "claude".into(),
                error: std::io::Error::other("x"),
            },
            RunError::AgentRuntime(std::io::Error::other("x")),
            RunError::DeadlineExceeded(Duration::from_secs(600)),
            RunError::LogPersist {
                path: PathBuf::from("/tmp/log"),
                error: std::io::Error::other("x"),
            },
        ];
        for err in absorbed {
            assert!(!err.is_fatal(), "{err} should not be fatal");
        }
    }

    #[test]
    fn deadline_message_names_the_limit() {
        let err = RunError::DeadlineExceeded(Duration::from_secs(600));
        assert_eq!(err.to_string(), "agent did not finish within 600s");
    }
}
