//! Shared test fixtures: fake agent binaries implemented as shell scripts.
//!
//! Integration tests drive the runner against these scripts instead of a
//! real `claude` binary. Each helper writes an executable script into a
//! caller-owned directory (usually a `tempfile::TempDir`) and returns its
//! path, so tests stay parallel-safe.

use std::path::{Path, PathBuf};

/// Write `body` to `dir/name` and mark it executable.
///
/// Panics on I/O failure, which in a test fixture is the right behavior.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("write fake agent script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("mark fake agent script executable");
    }
    path
}

/// Agent that reads its whole prompt from stdin, then emits two JSON lines,
/// the first echoing the prompt back. Exits 0.
pub fn echo_agent(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "fake-agent-echo",
        r#"#!/bin/sh
prompt=$(cat)
printf '{"type":"user","prompt":"%s"}\n' "$prompt"
printf '{"type":"result","subtype":"success"}\n'
"#,
    )
}

/// Agent that drains stdin, then prints each of `lines` on its own line.
///
/// Lines must not contain single quotes (they are embedded in a shell
/// script single-quoted).
pub fn jsonl_agent(dir: &Path, lines: &[&str]) -> PathBuf {
    let mut body = String::from("#!/bin/sh\ncat >/dev/null\n");
    for line in lines {
        body.push_str(&format!("printf '%s\\n' '{line}'\n"));
    }
    write_script(dir, "fake-agent-jsonl", &body)
}

/// Agent that drains stdin and exits with `code`, printing nothing.
pub fn exit_code_agent(dir: &Path, code: i32) -> PathBuf {
    write_script(
        dir,
        "fake-agent-exit",
        &format!("#!/bin/sh\ncat >/dev/null\nexit {code}\n"),
    )
}

/// Agent that drains stdin, then sleeps far past any test deadline.
/// `exec` keeps the sleep in the agent's own pid so SIGTERM lands on it.
pub fn hanging_agent(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "fake-agent-hang",
        "#!/bin/sh\ncat >/dev/null\nexec sleep 600\n",
    )
}

/// Agent that ignores SIGTERM and loops until killed outright.
pub fn stubborn_agent(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "fake-agent-stubborn",
        "#!/bin/sh\ntrap '' TERM\ncat >/dev/null\nwhile true; do sleep 1; done\n",
    )
}

/// Agent that drains stdin and reports its own argv as a JSON line.
pub fn args_reporting_agent(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "fake-agent-args",
        r#"#!/bin/sh
cat >/dev/null
printf '{"args":"%s"}\n' "$*"
"#,
    )
}

/// Agent that terminates itself with SIGTERM after draining stdin, so its
/// exit status carries a signal instead of a code.
pub fn self_signaling_agent(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "fake-agent-signal",
        "#!/bin/sh\ncat >/dev/null\nkill -TERM $$\n",
    )
}
