//! Pre-flight validation of authentication environment variables.
//!
//! Exactly one authentication method must be configured before the agent
//! is launched: direct Anthropic API, OAuth, AWS Bedrock, or Google
//! Vertex AI. Each method pulls in its own set of required variables,
//! and every missing one is reported in a single pass.

use anyhow::{Result, bail};

/// True when the named provider flag is set to the literal string "1".
pub fn flag_enabled(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| v == "1")
}

fn nonempty(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| !v.is_empty())
}

/// Check that the environment carries a complete, unambiguous
/// authentication setup. Collects every problem before failing so the
/// operator can fix the whole set in one go.
pub fn validate_environment() -> Result<()> {
    let use_bedrock = flag_enabled("CLAUDE_CODE_USE_BEDROCK");
    let use_vertex = flag_enabled("CLAUDE_CODE_USE_VERTEX");
    let use_oauth = flag_enabled("CLAUDE_CODE_USE_OAUTH");

    let mut errors: Vec<String> = Vec::new();

    let selected = [use_bedrock, use_vertex, use_oauth]
        .iter()
        .filter(|&&flag| flag)
        .count();
    if selected > 1 {
        errors.push(
            "Cannot use multiple authentication methods simultaneously. \
             Please set only one of: use_bedrock, use_vertex, or use_oauth."
                .to_string(),
        );
    } else if use_oauth {
        for var in ["CLAUDE_ACCESS_TOKEN", "CLAUDE_REFRESH_TOKEN", "CLAUDE_EXPIRES_AT"] {
            if !nonempty(var) {
                errors.push(format!("{var} is required when using OAuth authentication."));
            }
        }
    } else if use_bedrock {
        for var in ["AWS_REGION", "AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"] {
            if !nonempty(var) {
                errors.push(format!("{var} is required when using AWS Bedrock."));
            }
        }
    } else if use_vertex {
        for var in ["ANTHROPIC_VERTEX_PROJECT_ID", "CLOUD_ML_REGION"] {
            if !nonempty(var) {
                errors.push(format!("{var} is required when using Google Vertex AI."));
            }
        }
    } else if !nonempty("ANTHROPIC_API_KEY") {
        errors.push("ANTHROPIC_API_KEY is required when using direct Anthropic API.".to_string());
    }

    if errors.is_empty() {
        return Ok(());
    }

    let bullets: Vec<String> = errors.iter().map(|e| format!("  - {e}")).collect();
    bail!("Environment variable validation failed:\n{}", bullets.join("\n"));
}
