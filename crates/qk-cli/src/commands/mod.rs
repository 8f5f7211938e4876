//! Command handler modules for qk-cli.
//!
//! Shared utilities used by multiple command paths live here.

pub mod backtest;

use std::process::Command;

/// Best-effort git hash (short).
pub fn get_git_hash() -> Option<String> {
    let out = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let s = String::from_utf8(out.stdout).ok()?;
    Some(s.trim().to_string())
}
