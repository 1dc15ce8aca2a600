//! OAuth credential installation for the agent.
//!
//! When OAuth authentication is selected, the agent expects a credentials
//! file at `~/.claude/.credentials.json`. This module materializes that
//! file from the `CLAUDE_*` environment variables before the agent starts.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

// -----------------------------------------------------------------------
// Credential types
// -----------------------------------------------------------------------

/// Scopes granted to the installed credentials.
const OAUTH_SCOPES: [&str; 2] = ["user:inference", "user:profile"];

/// Raw OAuth material pulled from the environment.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: String,
}

impl OAuthCredentials {
    /// Read the three `CLAUDE_*` variables. Validation has already checked
    /// presence, so a miss here means the environment changed under us.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            access_token: require_env("CLAUDE_ACCESS_TOKEN")?,
            refresh_token: require_env("CLAUDE_REFRESH_TOKEN")?,
            expires_at: require_env("CLAUDE_EXPIRES_AT")?,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} is not set"))
}

/// On-disk layout of `.credentials.json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsFile {
    claude_ai_oauth: ClaudeAiOauth,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClaudeAiOauth {
    access_token: String,
    refresh_token: String,
    expires_at: i64,
    scopes: Vec<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Directory the agent reads credentials from: `~/.claude`.
pub fn credentials_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    Ok(home.join(".claude"))
}

/// Full path of the credentials file.
pub fn credentials_path() -> Result<PathBuf> {
    Ok(credentials_dir()?.join(".credentials.json"))
}

// -----------------------------------------------------------------------
// Installation
// -----------------------------------------------------------------------

/// Serialize and write the credentials file, creating `~/.claude` as needed.
/// Sets file permissions to 0600 on Unix.
pub fn setup_oauth_credentials(credentials: &OAuthCredentials) -> Result<()> {
    let expires_at: i64 = credentials.expires_at.trim().parse().with_context(|| {
        format!(
            "CLAUDE_EXPIRES_AT must be a unix timestamp in milliseconds, got {:?}",
            credentials.expires_at
        )
    })?;

    let file = CredentialsFile {
        claude_ai_oauth: ClaudeAiOauth {
            access_token: credentials.access_token.clone(),
            refresh_token: credentials.refresh_token.clone(),
            expires_at,
            scopes: OAUTH_SCOPES.iter().map(|s| s.to_string()).collect(),
        },
    };

    let dir = credentials_dir()?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create credentials directory {}", dir.display()))?;

    let path = credentials_path()?;
    let contents =
        serde_json::to_string_pretty(&file).context("failed to serialize credentials")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write credentials file at {}", path.display()))?;

    // Set permissions to 0600 (owner read/write only) on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    println!("OAuth credentials written to {}", path.display());
    Ok(())
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
