// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merge-queue rows: idempotent FIFO keyed by worktree.

use rusqlite::{params, OptionalExtension};

use orchard_core::{epoch_ms_now, MergeQueueEntry, WorktreeId};

use crate::{ProjectDb, Result, StorageError};

impl ProjectDb {
    /// Enqueue a completed branch. Re-queueing the same worktree resets
    /// `completed_at`, `summary`, `has_commits`, and clears `merged`.
    pub fn upsert_merge_queue_entry(
        &self,
        worktree_id: &WorktreeId,
        branch: &str,
        summary: &str,
        has_commits: bool,
    ) -> Result<MergeQueueEntry> {
        let entry = MergeQueueEntry {
            worktree_id: *worktree_id,
            branch: branch.to_string(),
            completed_at_ms: epoch_ms_now(),
            summary: summary.to_string(),
            has_commits,
            merged: false,
        };
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO merge_queue (worktree_id, branch, completed_at, summary, has_commits, merged)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)
             ON CONFLICT(worktree_id) DO UPDATE SET
                 branch = excluded.branch,
                 completed_at = excluded.completed_at,
                 summary = excluded.summary,
                 has_commits = excluded.has_commits,
                 merged = 0",
            params![
                entry.worktree_id.as_str(),
                entry.branch,
                entry.completed_at_ms as i64,
                entry.summary,
                entry.has_commits,
            ],
        )?;
        Ok(entry)
    }

    /// Unmerged entries, oldest first.
    pub fn get_merge_queue(&self) -> Result<Vec<MergeQueueEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE merged = 0 ORDER BY completed_at ASC",
            SELECT_ENTRY
        ))?;
        let rows = stmt.query_map([], row_to_entry)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn get_merge_queue_entry(
        &self,
        worktree_id: &WorktreeId,
    ) -> Result<Option<MergeQueueEntry>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                &format!("{} WHERE worktree_id = ?1", SELECT_ENTRY),
                params![worktree_id.as_str()],
                row_to_entry,
            )
            .optional()?)
    }

    /// Return and atomically delete the oldest unmerged entry.
    ///
    /// Select-and-delete run in one transaction, so concurrent poppers
    /// never receive the same entry.
    pub fn pop_from_merge_queue(&self) -> Result<Option<MergeQueueEntry>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let entry = tx
            .query_row(
                &format!(
                    "{} WHERE merged = 0 ORDER BY completed_at ASC LIMIT 1",
                    SELECT_ENTRY
                ),
                [],
                row_to_entry,
            )
            .optional()?;
        if let Some(ref entry) = entry {
            tx.execute(
                "DELETE FROM merge_queue WHERE worktree_id = ?1",
                params![entry.worktree_id.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(entry)
    }

    /// Mark an entry merged. Errors if the entry is unknown or was
    /// already merged (the caller maps that to "Already merged").
    pub fn mark_merge_queue_entry_merged(&self, worktree_id: &WorktreeId) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE merge_queue SET merged = 1 WHERE worktree_id = ?1 AND merged = 0",
            params![worktree_id.as_str()],
        )?;
        if changed == 0 {
            return Err(StorageError::InvalidTransition(format!(
                "merge queue entry for {} is missing or already merged",
                worktree_id
            )));
        }
        Ok(())
    }
}

const SELECT_ENTRY: &str = "SELECT worktree_id, branch, completed_at, summary, has_commits, merged \
     FROM merge_queue";

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<MergeQueueEntry> {
    Ok(MergeQueueEntry {
        worktree_id: WorktreeId::from_string(row.get::<_, String>(0)?),
        branch: row.get(1)?,
        completed_at_ms: row.get::<_, i64>(2)? as u64,
        summary: row.get(3)?,
        has_commits: row.get(4)?,
        merged: row.get(5)?,
    })
}

#[cfg(test)]
#[path = "merge_queue_tests.rs"]
mod tests;
