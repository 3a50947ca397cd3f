// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Print-session rows and their append-only output chunks.

use rusqlite::{params, OptionalExtension};

use orchard_core::{
    epoch_ms_now, PrintSession, PrintSessionId, PrintSessionStatus, ProjectId,
    TerminalOutputChunk, WorktreeId,
};

use crate::{ProjectDb, Result, StorageError};

impl ProjectDb {
    pub fn insert_print_session(&self, session: &PrintSession) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO print_sessions
                 (id, worktree_id, project_id, task, status, exit_code, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                session.id.as_str(),
                session.worktree_id.as_str(),
                session.project_id.as_str(),
                session.task,
                session.status.as_str(),
                session.exit_code,
                session.started_at_ms as i64,
                session.completed_at_ms.map(|ms| ms as i64),
            ],
        )?;
        Ok(())
    }

    pub fn get_print_session(&self, id: &PrintSessionId) -> Result<PrintSession> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{} WHERE id = ?1", SELECT_SESSION),
            params![id.as_str()],
            row_to_session,
        )
        .optional()?
        .ok_or_else(|| StorageError::NotFound(format!("print session {}", id)))
    }

    pub fn list_print_sessions_by_status(
        &self,
        status: PrintSessionStatus,
    ) -> Result<Vec<PrintSession>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE status = ?1 ORDER BY started_at",
            SELECT_SESSION
        ))?;
        let rows = stmt.query_map(params![status.as_str()], row_to_session)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn list_print_sessions_for_worktree(
        &self,
        worktree_id: &WorktreeId,
    ) -> Result<Vec<PrintSession>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE worktree_id = ?1 ORDER BY started_at",
            SELECT_SESSION
        ))?;
        let rows = stmt.query_map(params![worktree_id.as_str()], row_to_session)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Finalize a session. Exit code 0 maps to `completed`; anything
    /// else (including the negative interruption codes) maps to `failed`.
    pub fn finish_print_session(&self, id: &PrintSessionId, exit_code: i32) -> Result<()> {
        let status = if exit_code == 0 {
            PrintSessionStatus::Completed
        } else {
            PrintSessionStatus::Failed
        };
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE print_sessions SET status = ?1, exit_code = ?2, completed_at = ?3
             WHERE id = ?4",
            params![
                status.as_str(),
                exit_code,
                epoch_ms_now() as i64,
                id.as_str()
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("print session {}", id)));
        }
        Ok(())
    }

    /// Stamp an interruption code onto a session without touching rows
    /// that already finished.
    pub fn mark_print_session_interrupted(
        &self,
        id: &PrintSessionId,
        exit_code: i32,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE print_sessions SET status = 'failed', exit_code = ?1, completed_at = ?2
             WHERE id = ?3 AND status = 'running'",
            params![exit_code, epoch_ms_now() as i64, id.as_str()],
        )?;
        Ok(())
    }

    /// Re-stamp the exit code of an already-failed session (used to flip
    /// `-1` interrupted to `-2` interrupted-handled).
    pub fn set_print_session_exit_code(
        &self,
        id: &PrintSessionId,
        exit_code: i32,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE print_sessions SET exit_code = ?1 WHERE id = ?2",
            params![exit_code, id.as_str()],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("print session {}", id)));
        }
        Ok(())
    }

    pub fn append_terminal_chunk(&self, session_id: &PrintSessionId, chunk: &str) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO terminal_output (session_id, chunk, timestamp) VALUES (?1, ?2, ?3)",
            params![session_id.as_str(), chunk, epoch_ms_now() as i64],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Chunks with id strictly greater than `after_id`, ascending.
    pub fn terminal_chunks_after(
        &self,
        session_id: &PrintSessionId,
        after_id: i64,
    ) -> Result<Vec<TerminalOutputChunk>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, session_id, chunk, timestamp FROM terminal_output
             WHERE session_id = ?1 AND id > ?2 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![session_id.as_str(), after_id], |row| {
            Ok(TerminalOutputChunk {
                id: row.get(0)?,
                session_id: PrintSessionId::from_string(row.get::<_, String>(1)?),
                chunk: row.get(2)?,
                timestamp_ms: row.get::<_, i64>(3)? as u64,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Concatenation of all chunks in id order.
    pub fn full_terminal_output(&self, session_id: &PrintSessionId) -> Result<String> {
        let chunks = self.terminal_chunks_after(session_id, 0)?;
        Ok(chunks.into_iter().map(|c| c.chunk).collect())
    }
}

const SELECT_SESSION: &str = "SELECT id, worktree_id, project_id, task, status, exit_code, \
     started_at, completed_at FROM print_sessions";

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<PrintSession> {
    let status_str: String = row.get(4)?;
    let status = PrintSessionStatus::parse(&status_str).unwrap_or(PrintSessionStatus::Failed);
    Ok(PrintSession {
        id: PrintSessionId::from_string(row.get::<_, String>(0)?),
        worktree_id: WorktreeId::from_string(row.get::<_, String>(1)?),
        project_id: ProjectId::from_string(row.get::<_, String>(2)?),
        task: row.get(3)?,
        status,
        exit_code: row.get(5)?,
        started_at_ms: row.get::<_, i64>(6)? as u64,
        completed_at_ms: row.get::<_, Option<i64>>(7)?.map(|ms| ms as u64),
    })
}

#[cfg(test)]
#[path = "print_sessions_tests.rs"]
mod tests;
