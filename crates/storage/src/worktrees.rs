// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worktree rows.
//!
//! The `merged` column is a cache of the derived value computed during
//! load; the loader refreshes it on every sync.

use std::path::PathBuf;

use rusqlite::{params, OptionalExtension};

use orchard_core::{GitStatus, ProjectId, Worktree, WorktreeId, WorktreeMode};

use crate::{ProjectDb, Result, StorageError};

impl ProjectDb {
    /// Insert or refresh a worktree row by id.
    pub fn upsert_worktree(&self, worktree: &Worktree) -> Result<()> {
        let status = serde_json::to_string(&worktree.status)
            .unwrap_or_else(|_| "{}".to_string());
        let mode = worktree.mode.map(|m| match m {
            WorktreeMode::Normal => "normal",
            WorktreeMode::Plan => "plan",
        });
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO worktrees
                 (id, project_id, path, branch, is_main, merged, archived, mode,
                  status, last_commit_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                 branch = excluded.branch,
                 is_main = excluded.is_main,
                 merged = excluded.merged,
                 archived = excluded.archived,
                 mode = excluded.mode,
                 status = excluded.status,
                 last_commit_at = excluded.last_commit_at",
            params![
                worktree.id.as_str(),
                worktree.project_id.as_str(),
                worktree.path.display().to_string(),
                worktree.branch,
                worktree.is_main,
                worktree.merged,
                worktree.archived,
                mode,
                status,
                worktree.last_commit_ms.map(|ms| ms as i64),
                worktree.created_at_ms as i64,
            ],
        )?;
        Ok(())
    }

    pub fn get_worktree(&self, id: &WorktreeId) -> Result<Worktree> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{} WHERE id = ?1", SELECT_WORKTREE),
            params![id.as_str()],
            row_to_worktree,
        )
        .optional()?
        .ok_or_else(|| StorageError::NotFound(format!("worktree {}", id)))
    }

    pub fn list_worktrees(&self, project_id: &ProjectId) -> Result<Vec<Worktree>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE project_id = ?1 ORDER BY created_at",
            SELECT_WORKTREE
        ))?;
        let rows = stmt.query_map(params![project_id.as_str()], row_to_worktree)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Archive is one-way; only [`ProjectDb::mark_worktree_active`] undoes it.
    pub fn set_worktree_archived(&self, id: &WorktreeId) -> Result<()> {
        self.update_worktree_flags(id, None, Some(true))
    }

    /// Clear both `merged` and `archived`, restoring the worktree to the
    /// active set.
    pub fn mark_worktree_active(&self, id: &WorktreeId) -> Result<()> {
        self.update_worktree_flags(id, Some(false), Some(false))
    }

    pub fn delete_worktree_row(&self, id: &WorktreeId) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM worktrees WHERE id = ?1",
            params![id.as_str()],
        )?;
        Ok(())
    }

    fn update_worktree_flags(
        &self,
        id: &WorktreeId,
        merged: Option<bool>,
        archived: Option<bool>,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let changed = match (merged, archived) {
            (Some(m), Some(a)) => conn.execute(
                "UPDATE worktrees SET merged = ?1, archived = ?2 WHERE id = ?3",
                params![m, a, id.as_str()],
            )?,
            (None, Some(a)) => conn.execute(
                "UPDATE worktrees SET archived = ?1 WHERE id = ?2",
                params![a, id.as_str()],
            )?,
            (Some(m), None) => conn.execute(
                "UPDATE worktrees SET merged = ?1 WHERE id = ?2",
                params![m, id.as_str()],
            )?,
            (None, None) => 0,
        };
        if changed == 0 {
            return Err(StorageError::NotFound(format!("worktree {}", id)));
        }
        Ok(())
    }
}

const SELECT_WORKTREE: &str = "SELECT id, project_id, path, branch, is_main, merged, \
     archived, mode, status, last_commit_at, created_at FROM worktrees";

fn row_to_worktree(row: &rusqlite::Row<'_>) -> rusqlite::Result<Worktree> {
    let status_json: String = row.get(8)?;
    let status: GitStatus = serde_json::from_str(&status_json).unwrap_or_default();
    let mode = row
        .get::<_, Option<String>>(7)?
        .and_then(|m| match m.as_str() {
            "normal" => Some(WorktreeMode::Normal),
            "plan" => Some(WorktreeMode::Plan),
            _ => None,
        });
    Ok(Worktree {
        id: WorktreeId::from_string(row.get::<_, String>(0)?),
        project_id: ProjectId::from_string(row.get::<_, String>(1)?),
        path: PathBuf::from(row.get::<_, String>(2)?),
        branch: row.get(3)?,
        is_main: row.get(4)?,
        merged: row.get(5)?,
        archived: row.get(6)?,
        mode,
        status,
        last_commit_ms: row.get::<_, Option<i64>>(9)?.map(|ms| ms as u64),
        created_at_ms: row.get::<_, i64>(10)? as u64,
    })
}

#[cfg(test)]
#[path = "worktrees_tests.rs"]
mod tests;
