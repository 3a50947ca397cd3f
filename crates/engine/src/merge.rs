// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merge queue service: FIFO of completed branches and the `--no-ff`
//! merge into the default branch.

use tracing::info;

use orchard_core::{MergeQueueEntry, Project, WorktreeId};
use orchard_storage::{ProjectDb, StorageError};

use crate::error::EngineError;
use crate::git::{run_git, run_git_combined};

pub struct MergeService {
    db: ProjectDb,
    project: Project,
}

impl MergeService {
    pub fn new(db: ProjectDb, project: Project) -> Self {
        Self { db, project }
    }

    /// Enqueue (or re-enqueue) a completed branch.
    pub fn enqueue(
        &self,
        worktree_id: &WorktreeId,
        branch: &str,
        summary: &str,
        has_commits: bool,
    ) -> Result<MergeQueueEntry, EngineError> {
        Ok(self
            .db
            .upsert_merge_queue_entry(worktree_id, branch, summary, has_commits)?)
    }

    /// Unmerged entries, oldest first.
    pub fn queue(&self) -> Result<Vec<MergeQueueEntry>, EngineError> {
        Ok(self.db.get_merge_queue()?)
    }

    /// Pop the oldest unmerged entry (select-and-delete, exactly-once).
    pub fn pop(&self) -> Result<Option<MergeQueueEntry>, EngineError> {
        Ok(self.db.pop_from_merge_queue()?)
    }

    /// Merge a queued branch into the default branch in the main
    /// worktree, then mark the entry merged. `squash` collapses the
    /// branch into a single commit instead of a merge commit.
    ///
    /// Git output containing `CONFLICT` or `Automatic merge failed`
    /// surfaces as [`EngineError::MergeConflict`] (409 at the boundary);
    /// an already-merged entry surfaces as "Already merged".
    pub async fn merge_worktree(
        &self,
        worktree_id: &WorktreeId,
        default_branch: &str,
        squash: bool,
    ) -> Result<MergeQueueEntry, EngineError> {
        let entry = self
            .db
            .get_merge_queue_entry(worktree_id)?
            .ok_or_else(|| {
                EngineError::NotFound(format!("merge queue entry for {}", worktree_id))
            })?;
        if entry.merged {
            return Err(EngineError::Validation("Already merged".to_string()));
        }

        run_git(&self.project.path, &["checkout", default_branch]).await?;

        let message = format!("Merge branch '{}'", entry.branch);
        let args: Vec<&str> = if squash {
            vec!["merge", &entry.branch, "--squash"]
        } else {
            vec!["merge", &entry.branch, "--no-ff", "-m", &message]
        };
        let (success, output) = run_git_combined(&self.project.path, &args).await?;
        if !success {
            if output.contains("CONFLICT") || output.contains("Automatic merge failed") {
                // Leave the tree clean for the next attempt.
                let _ = run_git(&self.project.path, &["merge", "--abort"]).await;
                let _ = run_git(&self.project.path, &["reset", "--merge"]).await;
                return Err(EngineError::MergeConflict(output.trim().to_string()));
            }
            return Err(EngineError::Git(output.trim().to_string()));
        }
        if squash {
            run_git(&self.project.path, &["commit", "--no-verify", "-m", &message]).await?;
        }

        match self.db.mark_merge_queue_entry_merged(worktree_id) {
            Ok(()) => {}
            Err(StorageError::InvalidTransition(msg)) => {
                return Err(EngineError::Validation(msg))
            }
            Err(e) => return Err(e.into()),
        }
        info!(worktree_id = %worktree_id, branch = %entry.branch, "branch merged");
        Ok(MergeQueueEntry {
            merged: true,
            ..entry
        })
    }
}

#[cfg(test)]
#[path = "merge_tests.rs"]
mod tests;
