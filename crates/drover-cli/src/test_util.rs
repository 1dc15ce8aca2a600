//! Shared helpers for tests that touch process environment variables.

use std::sync::{Mutex, MutexGuard, OnceLock};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Serialize tests that read or mutate environment variables.
///
/// `std::env::set_var` is process-global, so concurrent tests would race
/// without this. A poisoned lock is reusable here; each test restores the
/// environment before asserting.
pub fn lock_env() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Remove every variable the authentication validator looks at, so a test
/// starts from a clean slate regardless of the host environment.
pub fn clear_auth_env() {
    for var in [
        "CLAUDE_CODE_USE_BEDROCK",
        "CLAUDE_CODE_USE_VERTEX",
        "CLAUDE_CODE_USE_OAUTH",
        "ANTHROPIC_API_KEY",
        "CLAUDE_ACCESS_TOKEN",
        "CLAUDE_REFRESH_TOKEN",
        "CLAUDE_EXPIRES_AT",
        "AWS_REGION",
        "AWS_ACCESS_KEY_ID",
        "AWS_SECRET_ACCESS_KEY",
        "ANTHROPIC_VERTEX_PROJECT_ID",
        "CLOUD_ML_REGION",
    ] {
        unsafe { std::env::remove_var(var) };
    }
}
