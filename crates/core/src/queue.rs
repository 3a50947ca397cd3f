// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merge-queue entries.

use serde::{Deserialize, Serialize};

use crate::id::WorktreeId;

/// A completed branch awaiting merge into the default branch.
///
/// Keyed by worktree: re-queueing the same worktree replaces the entry
/// (upsert) rather than duplicating it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergeQueueEntry {
    pub worktree_id: WorktreeId,
    pub branch: String,
    pub completed_at_ms: u64,
    pub summary: String,
    pub has_commits: bool,
    pub merged: bool,
}
