//! Named-pipe lifecycle for prompt delivery.
//!
//! The pipe decouples prompt production (feeder) from consumption (reader)
//! across a process boundary. Creation always removes a stale pipe first so
//! a crashed previous run cannot wedge the next one. The default path is
//! fixed, which means two concurrent runs on one host would collide; callers
//! that need concurrency use [`unique_pipe_path`].

use std::io;
use std::path::{Path, PathBuf};

use crate::error::RunError;

const DEFAULT_PIPE_NAME: &str = "drover_prompt_pipe";

const PIPE_MODE: u32 = 0o600;

/// The fixed, well-known pipe path under the system temp directory.
pub fn default_pipe_path() -> PathBuf {
    std::env::temp_dir().join(DEFAULT_PIPE_NAME)
}

/// A per-run pipe path, safe for concurrent invocations on one host.
pub fn unique_pipe_path() -> PathBuf {
    std::env::temp_dir().join(format!("{DEFAULT_PIPE_NAME}_{}", uuid::Uuid::new_v4()))
}

/// Remove the file at `path`, treating "not found" as success.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// A named FIFO owned by the supervisor for the duration of one run.
#[derive(Debug)]
pub struct PipeChannel {
    path: PathBuf,
}

impl PipeChannel {
    /// Remove any stale pipe at `path`, then create a fresh one.
    ///
    /// This is the one fatal operation of a run: if no pipe exists there is
    /// no input channel, so the error propagates instead of degrading.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, RunError> {
        let path = path.into();
        if let Err(e) = remove_if_exists(&path) {
            // mkfifo below will fail with EEXIST and report the real problem.
            tracing::warn!(path = %path.display(), error = %e, "could not remove stale prompt pipe");
        }
        mkfifo(&path, PIPE_MODE).map_err(|error| RunError::PipeCreate {
            path: path.clone(),
            error,
        })?;
        tracing::debug!(path = %path.display(), "created prompt pipe");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best-effort teardown. Errors are logged, never escalated.
    pub fn cleanup(&self) {
        if let Err(e) = remove_if_exists(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove prompt pipe");
        }
    }
}

#[cfg(unix)]
fn mkfifo(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::ffi::OsStrExt;
    let c_path = std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pipe path contains NUL"))?;
    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
    let ret = unsafe { libc::mkfifo(c_path.as_ptr(), mode as libc::mode_t) };
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn mkfifo(_path: &Path, _mode: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "named pipes require a Unix platform",
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::FileTypeExt;

    #[test]
    fn removing_a_missing_pipe_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove_if_exists(&dir.path().join("never-created")).is_ok());
    }

    #[test]
    fn create_produces_a_fifo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipe");
        let pipe = PipeChannel::create(&path).unwrap();
        let file_type = std::fs::metadata(pipe.path()).unwrap().file_type();
        assert!(file_type.is_fifo());
        pipe.cleanup();
        assert!(!path.exists());
    }

    #[test]
    fn create_replaces_a_stale_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipe");
        std::fs::write(&path, b"leftover from a crashed run").unwrap();
        let pipe = PipeChannel::create(&path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().file_type().is_fifo());
        pipe.cleanup();
    }

    #[test]
    fn create_fails_in_an_unwritable_location() {
        let err = PipeChannel::create("/proc/no-such-dir/pipe").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn cleanup_twice_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let pipe = PipeChannel::create(dir.path().join("pipe")).unwrap();
        pipe.cleanup();
        pipe.cleanup();
    }

    #[test]
    fn unique_paths_differ_between_calls() {
        assert_ne!(unique_pipe_path(), unique_pipe_path());
    }
}
