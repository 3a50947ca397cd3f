// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-conflict tracker.
//!
//! Derives per-worktree modified-file sets from git status (locks are
//! never stored) and reports files claimed by two or more worktrees.

use std::collections::HashMap;
use std::path::Path;

use serde_json::json;
use tracing::debug;

use orchard_core::{
    epoch_ms_now, ActivityCategory, ActivityType, FileLock, FileLockStatus, Worktree, WorktreeId,
};

use crate::activity::ActivityService;
use crate::error::EngineError;
use crate::git::run_git;

/// A file claimed by two or more worktrees.
#[derive(Debug, Clone, PartialEq)]
pub struct FileConflict {
    pub file_path: String,
    pub worktree_ids: Vec<WorktreeId>,
}

#[derive(Default)]
pub struct FileConflictTracker;

impl FileConflictTracker {
    pub fn new() -> Self {
        Self
    }

    /// Union of modified ∪ staged ∪ untracked files for every non-main,
    /// non-archived worktree. Status probe failures are logged and the
    /// worktree skipped.
    pub async fn derive_file_locks(&self, worktrees: &[Worktree]) -> Vec<FileLock> {
        let mut locks = Vec::new();
        for worktree in worktrees {
            if worktree.is_main || worktree.archived {
                continue;
            }
            match self.locks_for_worktree(worktree).await {
                Ok(mut worktree_locks) => locks.append(&mut worktree_locks),
                Err(e) => {
                    debug!(worktree_id = %worktree.id, error = %e, "lock probe failed");
                }
            }
        }
        locks
    }

    /// Group locks by path; a path held by ≥2 worktrees is a conflict.
    pub fn find_conflicts(&self, locks: &[FileLock]) -> Vec<FileConflict> {
        let mut by_path: HashMap<&str, Vec<WorktreeId>> = HashMap::new();
        for lock in locks {
            let holders = by_path.entry(&lock.file_path).or_default();
            if !holders.contains(&lock.worktree_id) {
                holders.push(lock.worktree_id);
            }
        }
        let mut conflicts: Vec<FileConflict> = by_path
            .into_iter()
            .filter(|(_, holders)| holders.len() >= 2)
            .map(|(file_path, worktree_ids)| FileConflict {
                file_path: file_path.to_string(),
                worktree_ids,
            })
            .collect();
        conflicts.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        conflicts
    }

    /// Which of `new_files` are already locked elsewhere, and by whom.
    pub fn check_for_overlaps(
        &self,
        new_files: &[String],
        locks: &[FileLock],
    ) -> (Vec<String>, Vec<WorktreeId>) {
        let mut overlapping_files = Vec::new();
        let mut worktrees = Vec::new();
        for file in new_files {
            let holders: Vec<WorktreeId> = locks
                .iter()
                .filter(|lock| &lock.file_path == file)
                .map(|lock| lock.worktree_id)
                .collect();
            if !holders.is_empty() {
                overlapping_files.push(file.clone());
                for holder in holders {
                    if !worktrees.contains(&holder) {
                        worktrees.push(holder);
                    }
                }
            }
        }
        (overlapping_files, worktrees)
    }

    /// Log conflicts as `event/worktree` activity with a structured
    /// details block.
    pub fn log_conflicts(
        &self,
        activity: &ActivityService,
        conflicts: &[FileConflict],
    ) -> Result<(), EngineError> {
        for conflict in conflicts {
            activity.log(
                ActivityType::Event,
                ActivityCategory::Worktree,
                &format!(
                    "file conflict: {} modified in {} worktrees",
                    conflict.file_path,
                    conflict.worktree_ids.len()
                ),
                json!({
                    "file": conflict.file_path,
                    "worktrees": conflict.worktree_ids,
                }),
                None,
            )?;
        }
        Ok(())
    }

    async fn locks_for_worktree(&self, worktree: &Worktree) -> Result<Vec<FileLock>, EngineError> {
        let porcelain = run_git(&worktree.path, &["status", "--porcelain"]).await?;
        let mut locks = Vec::new();
        for line in porcelain.lines() {
            let mut chars = line.chars();
            let x = chars.next().unwrap_or(' ');
            let y = chars.next().unwrap_or(' ');
            let raw_path = line.get(3..).unwrap_or("").trim();
            // Renames list "old -> new"; the new path is the claim.
            let file_path = raw_path.rsplit(" -> ").next().unwrap_or(raw_path);
            if file_path.is_empty()
                || file_path == ".mcp.json"
                || file_path.starts_with(".claude/")
            {
                continue;
            }
            let status = if x == '?' && y == '?' {
                FileLockStatus::Untracked
            } else if x != ' ' {
                FileLockStatus::Staged
            } else {
                FileLockStatus::Modified
            };
            locks.push(FileLock {
                file_path: file_path.to_string(),
                worktree_id: worktree.id,
                branch: worktree.branch.clone(),
                status,
                last_modified_ms: file_mtime_ms(&worktree.path.join(file_path)),
            });
        }
        Ok(locks)
    }
}

fn file_mtime_ms(path: &Path) -> u64 {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|mtime| mtime.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(epoch_ms_now)
}

#[cfg(test)]
#[path = "conflicts_tests.rs"]
mod tests;
