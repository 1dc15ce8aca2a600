//! Minimal GitHub Actions workflow integration.
//!
//! Step outputs go to the file named by `$GITHUB_OUTPUT` when the runner
//! provides one, falling back to the legacy `::set-output` workflow
//! command. Warnings and failures are emitted as workflow commands on
//! stdout, which the runner lifts into job annotations.

use std::io::Write;

/// Percent-escape a value for embedding in a workflow command.
fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Publish a step output under `name`.
pub fn set_output(name: &str, value: &str) {
    if let Ok(path) = std::env::var("GITHUB_OUTPUT") {
        if !path.is_empty() {
            let result = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .and_then(|mut f| writeln!(f, "{name}={value}"));
            if let Err(e) = result {
                tracing::warn!(error = %e, path = %path, "could not append to GITHUB_OUTPUT");
            }
            return;
        }
    }
    println!("::set-output name={name}::{}", escape_data(value));
}

/// Emit a non-fatal warning annotation.
pub fn warning(message: &str) {
    println!("::warning::{}", escape_data(message));
}

/// Emit an error annotation marking the step as failed.
pub fn set_failed(message: &str) {
    println!("::error::{}", escape_data(message));
}
