//! Persisting a run's accumulated output as reviewable artifacts.
//!
//! Two files per run: the raw agent output byte-for-byte, and an execution
//! log holding a JSON array of every line that parsed as a JSON event.
//! Lines that do not parse are skipped, so one garbled line never costs the
//! whole log.

use std::path::{Path, PathBuf};

use crate::error::RunError;

const RAW_OUTPUT_NAME: &str = "drover-raw-output.txt";
const EXECUTION_LOG_NAME: &str = "drover-execution-output.json";

/// Default location of the verbatim raw-output file.
pub fn default_raw_output_path() -> PathBuf {
    std::env::temp_dir().join(RAW_OUTPUT_NAME)
}

/// Default location of the JSON-array execution log.
pub fn default_execution_log_path() -> PathBuf {
    std::env::temp_dir().join(EXECUTION_LOG_NAME)
}

/// Write the raw output verbatim to `raw_path`, then the parsed event
/// array (pretty-printed) to `log_path`.
pub fn write_execution_log(
    raw_path: &Path,
    log_path: &Path,
    output: &[u8],
) -> Result<(), RunError> {
    std::fs::write(raw_path, output).map_err(|error| RunError::LogPersist {
        path: raw_path.to_path_buf(),
        error,
    })?;
    tracing::debug!(path = %raw_path.display(), bytes = output.len(), "wrote raw agent output");

    let events = parse_events(&String::from_utf8_lossy(output));
    let mut rendered = serde_json::to_vec_pretty(&serde_json::Value::Array(events))
        .map_err(|e| RunError::LogPersist {
            path: log_path.to_path_buf(),
            error: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
    rendered.push(b'\n');
    std::fs::write(log_path, rendered).map_err(|error| RunError::LogPersist {
        path: log_path.to_path_buf(),
        error,
    })?;
    tracing::debug!(path = %log_path.display(), "wrote execution log");
    Ok(())
}

fn parse_events(raw: &str) -> Vec<serde_json::Value> {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(error = %e, "skipping non-JSON line in execution log");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_to_tempdir(output: &[u8]) -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.txt");
        let log = dir.path().join("log.json");
        write_execution_log(&raw, &log, output).unwrap();
        (dir, raw, log)
    }

    #[test]
    fn raw_file_is_byte_exact() {
        // Includes a non-UTF8 byte; the raw file must still match exactly.
        let output = b"{\"a\":1}\nhalf a chunk \xff\n";
        let (_dir, raw, _log) = write_to_tempdir(output);
        assert_eq!(std::fs::read(raw).unwrap(), output);
    }

    #[test]
    fn log_collects_one_element_per_json_line() {
        let output = b"{\"type\":\"start\"}\nnoise line\n\n{\"type\":\"result\"}\n";
        let (_dir, _raw, log) = write_to_tempdir(output);
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(log).unwrap()).unwrap();
        let events = parsed.as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["type"], "start");
        assert_eq!(events[1]["type"], "result");
    }

    #[test]
    fn empty_output_produces_an_empty_array() {
        let (_dir, _raw, log) = write_to_tempdir(b"");
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(log).unwrap()).unwrap();
        assert_eq!(parsed, serde_json::json!([]));
    }

    #[test]
    fn unwritable_log_path_reports_log_persist() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.txt");
        let err = write_execution_log(&raw, Path::new("/proc/no/log.json"), b"{}\n").unwrap_err();
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("execution log"));
    }
}
