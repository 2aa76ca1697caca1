//! Architectural Enforcement Integration Tests
//!
//! Source scans over the relay crates that keep the streaming path async:
//! - No sleeping outside retry backoff and scripted test latency
//! - No blocking I/O inside async functions
//!
//! The scans live under `tests/`; this library only shares the path helpers.

use std::path::PathBuf;

/// Absolute path of a directory relative to the workspace root
#[must_use]
pub fn workspace_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join(relative)
}

/// Production source directories that the scans cover
pub const PRODUCTION_DIRS: &[&str] = &["relay/core/src", "relay/cli/src"];
