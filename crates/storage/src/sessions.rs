// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-session rows.
//!
//! UNIQUE `worktree_id` is the database-side enforcement of the
//! one-session-per-worktree invariant. The registry deletes the old row
//! before inserting a replacement; the constraint catches anything that
//! slips past it.

use std::path::PathBuf;

use rusqlite::{params, OptionalExtension};

use orchard_core::{
    epoch_ms_now, AgentSession, AgentSessionStatus, ProjectId, SessionId, WorktreeId,
};

use crate::{ProjectDb, Result, StorageError};

impl ProjectDb {
    pub fn insert_agent_session(&self, session: &AgentSession) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO agent_sessions
                 (id, worktree_id, project_id, command, cwd, conversation_resume_id,
                  status, created_at, last_activity_at, resume_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                session.id.as_str(),
                session.worktree_id.as_str(),
                session.project_id.as_str(),
                session.command,
                session.cwd.display().to_string(),
                session.conversation_resume_id,
                session.status.as_str(),
                session.created_at_ms as i64,
                session.last_activity_ms as i64,
                session.resume_count,
            ],
        )?;
        Ok(())
    }

    pub fn get_agent_session(&self, id: &SessionId) -> Result<AgentSession> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{} WHERE id = ?1", SELECT_SESSION),
            params![id.as_str()],
            row_to_session,
        )
        .optional()?
        .ok_or_else(|| StorageError::NotFound(format!("session {}", id)))
    }

    pub fn get_session_for_worktree(
        &self,
        worktree_id: &WorktreeId,
    ) -> Result<Option<AgentSession>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                &format!("{} WHERE worktree_id = ?1", SELECT_SESSION),
                params![worktree_id.as_str()],
                row_to_session,
            )
            .optional()?)
    }

    pub fn list_agent_sessions(&self, project_id: &ProjectId) -> Result<Vec<AgentSession>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE project_id = ?1 ORDER BY created_at",
            SELECT_SESSION
        ))?;
        let rows = stmt.query_map(params![project_id.as_str()], row_to_session)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn delete_session_for_worktree(&self, worktree_id: &WorktreeId) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "DELETE FROM agent_sessions WHERE worktree_id = ?1",
            params![worktree_id.as_str()],
        )?;
        Ok(changed > 0)
    }

    pub fn update_session_status(
        &self,
        id: &SessionId,
        status: AgentSessionStatus,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE agent_sessions SET status = ?1, last_activity_at = ?2 WHERE id = ?3",
            params![status.as_str(), epoch_ms_now() as i64, id.as_str()],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("session {}", id)));
        }
        Ok(())
    }

    /// Bulk transition, e.g. all `active` → `disconnected` on daemon loss.
    /// Returns the number of rows moved.
    pub fn transition_sessions(
        &self,
        from: AgentSessionStatus,
        to: AgentSessionStatus,
    ) -> Result<usize> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE agent_sessions SET status = ?1, last_activity_at = ?2 WHERE status = ?3",
            params![to.as_str(), epoch_ms_now() as i64, from.as_str()],
        )?;
        Ok(changed)
    }

    /// Swap in a fresh daemon session id after a resume, bumping
    /// `resume_count` and marking the row `resumed`. One transaction so
    /// a crash mid-resume never leaves a half-swapped row.
    pub fn replace_session_id(
        &self,
        old_id: &SessionId,
        new_id: &SessionId,
        conversation_resume_id: Option<&str>,
    ) -> Result<AgentSession> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE agent_sessions
                 SET id = ?1,
                     status = 'resumed',
                     resume_count = resume_count + 1,
                     conversation_resume_id = COALESCE(?2, conversation_resume_id),
                     last_activity_at = ?3
             WHERE id = ?4",
            params![
                new_id.as_str(),
                conversation_resume_id,
                epoch_ms_now() as i64,
                old_id.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("session {}", old_id)));
        }
        let session = tx
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_SESSION),
                params![new_id.as_str()],
                row_to_session,
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound(format!("session {}", new_id)))?;
        tx.commit()?;
        Ok(session)
    }

    /// Drop terminated audit rows older than `cutoff_ms`.
    pub fn prune_terminated_sessions(&self, cutoff_ms: u64) -> Result<usize> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "DELETE FROM agent_sessions WHERE status = 'terminated' AND last_activity_at < ?1",
            params![cutoff_ms as i64],
        )?;
        Ok(changed)
    }
}

const SELECT_SESSION: &str = "SELECT id, worktree_id, project_id, command, cwd, \
     conversation_resume_id, status, created_at, last_activity_at, resume_count \
     FROM agent_sessions";

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<AgentSession> {
    let status_str: String = row.get(6)?;
    let status = AgentSessionStatus::parse(&status_str).unwrap_or(AgentSessionStatus::Terminated);
    Ok(AgentSession {
        id: SessionId::from_string(row.get::<_, String>(0)?),
        worktree_id: WorktreeId::from_string(row.get::<_, String>(1)?),
        project_id: ProjectId::from_string(row.get::<_, String>(2)?),
        command: row.get(3)?,
        cwd: PathBuf::from(row.get::<_, String>(4)?),
        conversation_resume_id: row.get(5)?,
        status,
        created_at_ms: row.get::<_, i64>(7)? as u64,
        last_activity_ms: row.get::<_, i64>(8)? as u64,
        resume_count: row.get(9)?,
    })
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
