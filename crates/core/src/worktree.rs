// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worktree records and the derived file-lock view.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::id::{ProjectId, WorktreeId};

/// Working-tree counters from `git status`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitStatus {
    pub ahead: u32,
    pub behind: u32,
    pub modified: u32,
    pub staged: u32,
    pub untracked: u32,
}

impl GitStatus {
    /// No local changes of any kind.
    pub fn is_clean(&self) -> bool {
        self.modified == 0 && self.staged == 0 && self.untracked == 0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorktreeMode {
    Normal,
    Plan,
}

/// A git worktree tied to a branch; the unit of concurrent agent work.
///
/// `id` is deterministic (see [`WorktreeId::derive`]), so persisted
/// references stay valid across restarts. `merged` is derived during
/// load and cached here; readers must treat a stale value as a hint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Worktree {
    pub id: WorktreeId,
    pub project_id: ProjectId,
    pub path: PathBuf,
    pub branch: String,
    pub is_main: bool,
    pub merged: bool,
    pub archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<WorktreeMode>,
    pub status: GitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit_ms: Option<u64>,
    pub created_at_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileLockStatus {
    Modified,
    Staged,
    Untracked,
}

/// Derived (never stored) claim of a file by a worktree. Two worktrees
/// holding locks on the same path is an overlap warning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileLock {
    pub file_path: String,
    pub worktree_id: WorktreeId,
    pub branch: String,
    pub status: FileLockStatus,
    pub last_modified_ms: u64,
}
