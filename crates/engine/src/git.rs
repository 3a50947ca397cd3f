// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! git subprocess helpers.
//!
//! Every invocation gets a timeout and a scrubbed environment
//! (`GIT_DIR`/`GIT_WORK_TREE` removed) so worktree commands resolve
//! against the directory we point them at, not inherited state.

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;

use crate::error::EngineError;

pub const GIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Run `git <args>` in `dir`, returning stdout on success.
pub async fn run_git(dir: &Path, args: &[&str]) -> Result<String, EngineError> {
    let output = run_git_raw(dir, args).await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(EngineError::Git(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or(""),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run git and report success/failure without treating failure as an
/// error (for probes like `merge-base --is-ancestor`).
pub async fn git_succeeds(dir: &Path, args: &[&str]) -> Result<bool, EngineError> {
    let output = run_git_raw(dir, args).await?;
    Ok(output.status.success())
}

/// Run git capturing combined output regardless of status (for merge,
/// whose conflict diagnostics arrive on stdout with a failing status).
pub async fn run_git_combined(
    dir: &Path,
    args: &[&str],
) -> Result<(bool, String), EngineError> {
    let output = run_git_raw(dir, args).await?;
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok((output.status.success(), combined))
}

async fn run_git_raw(dir: &Path, args: &[&str]) -> Result<std::process::Output, EngineError> {
    let mut cmd = Command::new("git");
    cmd.arg("-C")
        .arg(dir)
        .args(args)
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE")
        .kill_on_drop(true);
    match tokio::time::timeout(GIT_TIMEOUT, cmd.output()).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(EngineError::Git(format!(
            "git {} timed out after {:?}",
            args.first().copied().unwrap_or(""),
            GIT_TIMEOUT
        ))),
    }
}
