//! Prompt source resolution.
//!
//! The adapter accepts either an inline prompt string or a path to a
//! prompt file. Both arrive as optional inputs; exactly one must be set.
//! Inline prompts are spooled to a temp file so the runner always works
//! from a path it can hand to the feeder process.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// File name used when spooling an inline prompt to disk.
const INLINE_PROMPT_NAME: &str = "drover-prompt.txt";

/// Resolve the prompt inputs to a file path the runner can stream from.
///
/// Empty strings count as absent, matching how CI action inputs arrive
/// when left blank.
pub fn prepare_prompt(prompt: Option<&str>, prompt_file: Option<&str>) -> Result<PathBuf> {
    let prompt = prompt.filter(|p| !p.is_empty());
    let prompt_file = prompt_file.filter(|p| !p.is_empty());

    match (prompt, prompt_file) {
        (Some(_), Some(_)) => {
            bail!("Cannot specify both prompt and prompt_file. Please provide only one prompt source.")
        }
        (None, None) => bail!("Either prompt or prompt_file must be provided."),
        (None, Some(file)) => {
            let path = Path::new(file);
            if !path.exists() {
                bail!("Prompt file not found: {file}");
            }
            Ok(path.to_path_buf())
        }
        (Some(text), None) => spool_inline_prompt(text),
    }
}

fn spool_inline_prompt(text: &str) -> Result<PathBuf> {
    let path = std::env::temp_dir().join(INLINE_PROMPT_NAME);
    std::fs::write(&path, text)
        .with_context(|| format!("failed to write inline prompt to {}", path.display()))?;
    Ok(path)
}
