//! Core orchestration for driving a coding agent as a CI pipeline step.
//!
//! The library owns everything between "here is a prompt file" and "here is
//! an exit code plus the agent's output": argument assembly, the named-pipe
//! input channel, supervision of the feeder/reader/agent processes, the
//! deadline race with two-phase termination, live output re-formatting, and
//! artifact persistence.

pub mod config;
pub mod error;
pub mod execution_log;
pub mod output;
pub mod pipe;
pub mod run;

pub use config::{AgentOptions, DEFAULT_TIMEOUT_MINUTES, RunConfig, timeout_from_minutes};
pub use error::RunError;
pub use run::{AgentRunner, RunOutcome, TIMEOUT_EXIT_CODE};
