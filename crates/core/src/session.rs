// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted agent-session records.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::id::{ProjectId, SessionId, WorktreeId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentSessionStatus {
    /// Live in the daemon.
    Active,
    /// Daemon lost; record kept for resumption.
    Disconnected,
    /// Re-spawned with the same conversation.
    Resumed,
    /// Unregistered; retained for audit only.
    Terminated,
}

impl AgentSessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentSessionStatus::Active => "active",
            AgentSessionStatus::Disconnected => "disconnected",
            AgentSessionStatus::Resumed => "resumed",
            AgentSessionStatus::Terminated => "terminated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AgentSessionStatus::Active),
            "disconnected" => Some(AgentSessionStatus::Disconnected),
            "resumed" => Some(AgentSessionStatus::Resumed),
            "terminated" => Some(AgentSessionStatus::Terminated),
            _ => None,
        }
    }

    /// A session still counts against the one-per-worktree invariant
    /// unless it has been terminated.
    pub fn is_live(&self) -> bool {
        !matches!(self, AgentSessionStatus::Terminated)
    }
}

impl std::fmt::Display for AgentSessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One interactive agent tied to a worktree.
///
/// Invariant: at most one non-terminated session per worktree (UNIQUE
/// `worktree_id` in the sessions table).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSession {
    pub id: SessionId,
    pub worktree_id: WorktreeId,
    pub project_id: ProjectId,
    pub command: String,
    pub cwd: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_resume_id: Option<String>,
    pub status: AgentSessionStatus,
    pub created_at_ms: u64,
    pub last_activity_ms: u64,
    pub resume_count: u32,
}
