//! Run configuration: the agent argument vector and the run deadline.

use std::path::PathBuf;
use std::time::Duration;

/// Flags every agent invocation starts with, in this exact order.
pub const BASE_AGENT_ARGS: [&str; 4] = ["-p", "--verbose", "--output-format", "stream-json"];

/// Deadline applied when `timeout_minutes` is unset or does not parse.
pub const DEFAULT_TIMEOUT_MINUTES: u64 = 10;

/// Optional per-run agent options. An empty string counts as absent.
#[derive(Debug, Clone, Default)]
pub struct AgentOptions {
    pub allowed_tools: Option<String>,
    pub disallowed_tools: Option<String>,
    pub max_turns: Option<String>,
    pub mcp_config: Option<String>,
}

/// Immutable per-invocation configuration: the full agent argument vector
/// and the prompt file to stream.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub agent_args: Vec<String>,
    pub prompt_path: PathBuf,
}

impl RunConfig {
    /// Build the argument vector: base flags first, then one `--flag value`
    /// pair per present, non-empty option, in declared option order.
    ///
    /// Values pass through untouched. They only ever reach the agent as
    /// argv entries, never through a shell, so no escaping is needed.
    pub fn prepare(prompt_path: impl Into<PathBuf>, options: &AgentOptions) -> Self {
        let mut agent_args: Vec<String> =
            BASE_AGENT_ARGS.iter().map(|s| s.to_string()).collect();

        let optional_flags = [
            ("--allowedTools", &options.allowed_tools),
            ("--disallowedTools", &options.disallowed_tools),
            ("--max-turns", &options.max_turns),
            ("--mcp-config", &options.mcp_config),
        ];
        for (flag, value) in optional_flags {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                agent_args.push(flag.to_string());
                agent_args.push(value.to_string());
            }
        }

        Self {
            agent_args,
            prompt_path: prompt_path.into(),
        }
    }
}

/// Resolve the run deadline from a raw `timeout_minutes` value.
///
/// Unset, empty, or unparsable values silently fall back to
/// [`DEFAULT_TIMEOUT_MINUTES`]; no validation error is raised.
pub fn timeout_from_minutes(raw: Option<&str>) -> Duration {
    let minutes = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_TIMEOUT_MINUTES);
    Duration::from_secs(minutes.saturating_mul(60))
}
