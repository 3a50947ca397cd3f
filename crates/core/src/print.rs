// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Print-session records: one-shot agent invocations with a streamed,
//! typed output trace.

use serde::{Deserialize, Serialize};

use crate::id::{PrintSessionId, ProjectId, WorktreeId};

/// Process died with state unknown (detected on next startup).
pub const EXIT_INTERRUPTED: i32 = -1;
/// Interruption seen and resolved (a newer session superseded it).
pub const EXIT_INTERRUPTED_HANDLED: i32 = -2;
/// Worktree was archived while the session was still running.
pub const EXIT_ORPHANED: i32 = -3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PrintSessionStatus {
    Running,
    Completed,
    Failed,
}

impl PrintSessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrintSessionStatus::Running => "running",
            PrintSessionStatus::Completed => "completed",
            PrintSessionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(PrintSessionStatus::Running),
            "completed" => Some(PrintSessionStatus::Completed),
            "failed" => Some(PrintSessionStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for PrintSessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrintSession {
    pub id: PrintSessionId,
    pub worktree_id: WorktreeId,
    pub project_id: ProjectId,
    pub task: String,
    pub status: PrintSessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
}

/// Append-only slice of a print session's output stream. `id` is the
/// autoincrement ordering key; concatenating chunks by ascending id
/// reconstructs the full output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TerminalOutputChunk {
    pub id: i64,
    pub session_id: PrintSessionId,
    pub chunk: String,
    pub timestamp_ms: u64,
}
