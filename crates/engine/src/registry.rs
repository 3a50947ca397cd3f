// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session registry: one interactive agent per worktree.
//!
//! The database enforces the invariant (UNIQUE `worktree_id`); this
//! service owns the daemon side of the contract, destroying the old
//! PTY session before a replacement is created, reconciling with the
//! daemon after reconnects, and re-spawning crashed sessions with the
//! conversation resume flag.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use orchard_client::{ClientError, DaemonClient};
use orchard_core::{
    epoch_ms_now, AgentSession, AgentSessionStatus, Project, SessionId, WorktreeId,
};
use orchard_daemon::protocol::SessionInfo;
use orchard_storage::ProjectDb;

use crate::error::EngineError;

/// Audit rows for terminated sessions are kept this long.
pub const TERMINATED_RETENTION_MS: u64 = 7 * 24 * 60 * 60 * 1000;

/// Daemon sessions whose worktree id carries this prefix belong to the
/// orchestrator itself and are never reported as orphans.
pub const ORCHESTRATOR_PREFIX: &str = "orchestrator-";

/// Outcome of [`SessionRegistry::validate_all_sessions`].
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub active: Vec<SessionId>,
    pub disconnected: Vec<SessionId>,
    /// Daemon sessions with no registry row.
    pub orphaned: Vec<SessionInfo>,
}

pub struct SessionRegistry {
    db: ProjectDb,
    client: Arc<DaemonClient>,
    project: Project,
}

impl SessionRegistry {
    pub fn new(db: ProjectDb, client: Arc<DaemonClient>, project: Project) -> Self {
        Self {
            db,
            client,
            project,
        }
    }

    /// Create a daemon session for the worktree and persist the record.
    ///
    /// Any pre-existing session for the worktree is destroyed first
    /// (RPC destroy, then row delete) so the one-per-worktree invariant
    /// holds before the insert.
    pub async fn register_session(
        &self,
        worktree_id: WorktreeId,
        cwd: &Path,
        command: &str,
        conversation_resume_id: Option<String>,
    ) -> Result<AgentSession, EngineError> {
        if let Some(existing) = self.db.get_session_for_worktree(&worktree_id)? {
            self.destroy_daemon_session(existing.id).await;
            self.db.delete_session_for_worktree(&worktree_id)?;
            info!(worktree_id = %worktree_id, old_session = %existing.id,
                  "replaced pre-existing session");
        }

        let info = self
            .client
            .create_session(worktree_id, &self.project.path, cwd, Some(command.to_string()))
            .await?;

        let session = AgentSession {
            id: info.id,
            worktree_id,
            project_id: self.project.id,
            command: command.to_string(),
            cwd: cwd.to_path_buf(),
            conversation_resume_id,
            status: AgentSessionStatus::Active,
            created_at_ms: epoch_ms_now(),
            last_activity_ms: epoch_ms_now(),
            resume_count: 0,
        };
        self.db.insert_agent_session(&session)?;
        Ok(session)
    }

    /// Destroy the worktree's session and mark the row terminated
    /// (kept for audit until pruned).
    pub async fn unregister_session(&self, worktree_id: &WorktreeId) -> Result<(), EngineError> {
        let session = self
            .db
            .get_session_for_worktree(worktree_id)?
            .ok_or_else(|| EngineError::NotFound(format!("session for {}", worktree_id)))?;
        self.destroy_daemon_session(session.id).await;
        self.db
            .update_session_status(&session.id, AgentSessionStatus::Terminated)?;
        Ok(())
    }

    pub fn get_for_worktree(
        &self,
        worktree_id: &WorktreeId,
    ) -> Result<Option<AgentSession>, EngineError> {
        Ok(self.db.get_session_for_worktree(worktree_id)?)
    }

    pub fn list(&self) -> Result<Vec<AgentSession>, EngineError> {
        Ok(self.db.list_agent_sessions(&self.project.id)?)
    }

    /// Worktrees with a live (non-terminated) session.
    pub fn active_worktrees(&self) -> Result<HashSet<WorktreeId>, EngineError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|s| s.status.is_live())
            .map(|s| s.worktree_id)
            .collect())
    }

    /// Daemon connection lost: every `active` row becomes
    /// `disconnected`, records preserved for resumption.
    pub fn on_daemon_disconnected(&self) -> Result<usize, EngineError> {
        let moved = self
            .db
            .transition_sessions(AgentSessionStatus::Active, AgentSessionStatus::Disconnected)?;
        if moved > 0 {
            warn!(sessions = moved, "daemon lost; sessions marked disconnected");
        }
        Ok(moved)
    }

    /// Daemon (re)connected: reconcile the registry against the
    /// daemon's session list.
    pub async fn validate_all_sessions(&self) -> Result<ValidationReport, EngineError> {
        let daemon_sessions = self.client.list_sessions().await?;
        let daemon_ids: HashSet<SessionId> = daemon_sessions.iter().map(|s| s.id).collect();

        let mut report = ValidationReport::default();
        for session in self.list()? {
            if !session.status.is_live() {
                continue;
            }
            if daemon_ids.contains(&session.id) {
                self.db
                    .update_session_status(&session.id, AgentSessionStatus::Active)?;
                report.active.push(session.id);
            } else {
                self.db
                    .update_session_status(&session.id, AgentSessionStatus::Disconnected)?;
                report.disconnected.push(session.id);
            }
        }

        let known: HashSet<SessionId> = self.list()?.iter().map(|s| s.id).collect();
        for info in daemon_sessions {
            if known.contains(&info.id) {
                continue;
            }
            if info.worktree_id.as_str().starts_with(ORCHESTRATOR_PREFIX) {
                continue;
            }
            report.orphaned.push(info);
        }
        Ok(report)
    }

    /// Re-spawn a disconnected session in the same cwd with the same
    /// command. When a conversation id is on file and the command has
    /// no resume flag, the flag is appended so the agent re-attaches to
    /// its previous conversation.
    pub async fn restore_session(
        &self,
        worktree_id: &WorktreeId,
    ) -> Result<AgentSession, EngineError> {
        let session = self
            .db
            .get_session_for_worktree(worktree_id)?
            .ok_or_else(|| EngineError::NotFound(format!("session for {}", worktree_id)))?;
        if !session.status.is_live() {
            return Err(EngineError::Validation(format!(
                "session for {} is terminated",
                worktree_id
            )));
        }

        let command = resume_command(&session.command, session.conversation_resume_id.as_deref());
        let info = self
            .client
            .create_session(
                *worktree_id,
                &self.project.path,
                &session.cwd,
                Some(command),
            )
            .await?;

        let restored = self.db.replace_session_id(&session.id, &info.id, None)?;
        info!(worktree_id = %worktree_id, old = %session.id, new = %info.id,
              resume_count = restored.resume_count, "session restored");
        Ok(restored)
    }

    /// Engine-startup hygiene: drop terminated audit rows older than
    /// [`TERMINATED_RETENTION_MS`].
    pub fn prune_audit_rows(&self) -> Result<usize, EngineError> {
        let cutoff = epoch_ms_now().saturating_sub(TERMINATED_RETENTION_MS);
        Ok(self.db.prune_terminated_sessions(cutoff)?)
    }

    async fn destroy_daemon_session(&self, id: SessionId) {
        match self.client.destroy_session(id).await {
            Ok(()) => {}
            // The daemon not knowing the session is the desired state.
            Err(ClientError::Daemon(_)) => {}
            Err(e) => warn!(session_id = %id, error = %e, "destroy RPC failed"),
        }
    }
}

/// Append ` --resume <conversation-id>` unless the command already
/// carries a resume flag.
fn resume_command(command: &str, conversation_resume_id: Option<&str>) -> String {
    match conversation_resume_id {
        Some(conversation) if !command.contains("--resume") => {
            format!("{} --resume {}", command, conversation)
        }
        _ => command.to_string(),
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
