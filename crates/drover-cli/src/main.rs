mod actions;
mod env;
mod oauth;
mod prompt;
#[cfg(test)]
mod test_util;

use anyhow::Result;
use clap::Parser;

use drover_core::execution_log;
use drover_core::pipe;
use drover_core::{AgentOptions, AgentRunner, RunConfig, timeout_from_minutes};

#[derive(Parser)]
#[command(name = "drover", about = "Drives the Claude Code agent as a CI pipeline step")]
struct Cli {
    /// Inline prompt text (mutually exclusive with --prompt-file)
    #[arg(long, env = "INPUT_PROMPT")]
    prompt: Option<String>,

    /// Path to a file containing the prompt
    #[arg(long, env = "INPUT_PROMPT_FILE")]
    prompt_file: Option<String>,

    /// Comma-separated tools the agent may use
    #[arg(long, env = "INPUT_ALLOWED_TOOLS")]
    allowed_tools: Option<String>,

    /// Comma-separated tools the agent must not use
    #[arg(long, env = "INPUT_DISALLOWED_TOOLS")]
    disallowed_tools: Option<String>,

    /// Maximum number of agent turns
    #[arg(long, env = "INPUT_MAX_TURNS")]
    max_turns: Option<String>,

    /// MCP configuration passed through to the agent
    #[arg(long, env = "INPUT_MCP_CONFIG")]
    mcp_config: Option<String>,

    /// Wall-clock limit in minutes; unset or unparsable values default to 10
    #[arg(long, env = "INPUT_TIMEOUT_MINUTES")]
    timeout_minutes: Option<String>,

    /// Agent binary to launch
    #[arg(long, env = "DROVER_AGENT_BINARY", default_value = "claude")]
    agent_binary: String,

    /// Derive a per-run pipe path so concurrent runs on one host cannot collide
    #[arg(long, env = "DROVER_UNIQUE_PIPE")]
    unique_pipe: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        actions::set_failed(&format!("Action failed with error: {e:#}"));
        actions::set_output("conclusion", "failure");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    env::validate_environment()?;

    if env::flag_enabled("CLAUDE_CODE_USE_OAUTH") {
        let credentials = oauth::OAuthCredentials::from_env()?;
        oauth::setup_oauth_credentials(&credentials)?;
    }

    let prompt_path = prompt::prepare_prompt(cli.prompt.as_deref(), cli.prompt_file.as_deref())?;

    let options = AgentOptions {
        allowed_tools: cli.allowed_tools,
        disallowed_tools: cli.disallowed_tools,
        max_turns: cli.max_turns,
        mcp_config: cli.mcp_config,
    };
    let config = RunConfig::prepare(&prompt_path, &options);

    let mut runner = AgentRunner::new()
        .with_binary(&cli.agent_binary)
        .with_timeout(timeout_from_minutes(cli.timeout_minutes.as_deref()));
    if cli.unique_pipe {
        runner = runner.with_pipe_path(pipe::unique_pipe_path());
    }

    // Only a pipe-creation failure surfaces here; it rides up to main's
    // failure handler. Everything else is already folded into the outcome.
    let outcome = runner.run(&config).await?;

    let raw_path = execution_log::default_raw_output_path();
    let log_path = execution_log::default_execution_log_path();

    if outcome.success() {
        match execution_log::write_execution_log(&raw_path, &log_path, &outcome.output) {
            Ok(()) => {
                println!("Log saved to {}", log_path.display());
                actions::set_output("execution_file", &log_path.to_string_lossy());
            }
            Err(e) => actions::warning(&format!("Failed to persist execution log: {e}")),
        }
        actions::set_output("conclusion", "success");
        Ok(())
    } else {
        actions::set_output("conclusion", "failure");
        if !outcome.output.is_empty() {
            match execution_log::write_execution_log(&raw_path, &log_path, &outcome.output) {
                Ok(()) => actions::set_output("execution_file", &log_path.to_string_lossy()),
                Err(e) => tracing::warn!(error = %e, "could not persist output of failed run"),
            }
        }
        std::process::exit(outcome.exit_code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    #[tokio::test]
    async fn run_publishes_success_outputs_end_to_end() {
        let _lock = lock_env();
        crate::test_util::clear_auth_env();

        let tmp = tempfile::TempDir::new().unwrap();
        let prompt_file = tmp.path().join("prompt.txt");
        std::fs::write(&prompt_file, "end-to-end prompt").unwrap();
        let agent = drover_test_utils::echo_agent(tmp.path());
        let out_file = tmp.path().join("github_output");

        let orig_key = std::env::var("ANTHROPIC_API_KEY").ok();
        let orig_out = std::env::var("GITHUB_OUTPUT").ok();
        unsafe { std::env::set_var("ANTHROPIC_API_KEY", "sk-test") };
        unsafe { std::env::set_var("GITHUB_OUTPUT", &out_file) };

        let cli = Cli {
            prompt: None,
            prompt_file: Some(prompt_file.to_string_lossy().into_owned()),
            allowed_tools: None,
            disallowed_tools: None,
            max_turns: None,
            mcp_config: None,
            timeout_minutes: Some("1".to_string()),
            agent_binary: agent.to_string_lossy().into_owned(),
            unique_pipe: true,
        };

        let result = run(cli).await;
        let outputs = std::fs::read_to_string(&out_file);

        // Restore env before asserting, to avoid poisoning the mutex on failure.
        match orig_key {
            Some(v) => unsafe { std::env::set_var("ANTHROPIC_API_KEY", v) },
            None => unsafe { std::env::remove_var("ANTHROPIC_API_KEY") },
        }
        match orig_out {
            Some(v) => unsafe { std::env::set_var("GITHUB_OUTPUT", v) },
            None => unsafe { std::env::remove_var("GITHUB_OUTPUT") },
        }

        result.unwrap();
        let outputs = outputs.unwrap();
        assert!(
            outputs.lines().any(|l| l.starts_with("execution_file=")),
            "missing execution_file output: {outputs}"
        );
        assert!(outputs.lines().any(|l| l == "conclusion=success"));

        let log_path = execution_log::default_execution_log_path();
        let log: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&log_path).unwrap()).unwrap();
        let events = log.as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1]["subtype"], "success");
    }

    #[tokio::test]
    async fn run_rejects_a_broken_environment() {
        let _lock = lock_env();
        crate::test_util::clear_auth_env();

        let cli = Cli {
            prompt: Some("hello".to_string()),
            prompt_file: None,
            allowed_tools: None,
            disallowed_tools: None,
            max_turns: None,
            mcp_config: None,
            timeout_minutes: None,
            agent_binary: "claude".to_string(),
            unique_pipe: true,
        };

        let err = run(cli).await.unwrap_err();
        assert!(format!("{err}").contains("Environment variable validation failed"));
    }
}
