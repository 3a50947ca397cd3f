// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Detected terminal-output patterns.

use serde::{Deserialize, Serialize};

use crate::id::{PatternId, ProjectId, SessionId, WorktreeId};

/// Longest pattern excerpt persisted with a detection.
pub const PATTERN_CONTENT_MAX: usize = 500;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    TaskComplete,
    Question,
    Error,
    RateLimit,
    Ready,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::TaskComplete => "task_complete",
            PatternType::Question => "question",
            PatternType::Error => "error",
            PatternType::RateLimit => "rate_limit",
            PatternType::Ready => "ready",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "task_complete" => Some(PatternType::TaskComplete),
            "question" => Some(PatternType::Question),
            "error" => Some(PatternType::Error),
            "rate_limit" => Some(PatternType::RateLimit),
            "ready" => Some(PatternType::Ready),
            _ => None,
        }
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One debounced signal observed in a session's output. `handled` flips
/// once the orchestrator has acted on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectedPattern {
    pub id: PatternId,
    pub pattern_type: PatternType,
    pub session_id: SessionId,
    pub worktree_id: WorktreeId,
    pub project_id: ProjectId,
    pub timestamp_ms: u64,
    /// Matched excerpt, truncated to [`PATTERN_CONTENT_MAX`] chars.
    pub content: String,
    pub handled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handled_at_ms: Option<u64>,
}
