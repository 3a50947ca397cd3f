// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error kinds, by disposition.

use orchard_core::PrintSessionId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Project/worktree/session lookup miss; surfaced to the caller.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate running task, path collision, and similar 409s.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A running print session already owns the worktree; carries the
    /// diagnostic fields the route layer returns with the 409.
    #[error("task already running (session {session_id}, started at {started_at_ms})")]
    TaskAlreadyRunning {
        session_id: PrintSessionId,
        started_at_ms: u64,
    },

    /// `git merge` reported CONFLICT / automatic merge failure.
    #[error("merge conflict: {0}")]
    MergeConflict(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("llm error: {0}")]
    Llm(String),

    #[error(transparent)]
    Storage(#[from] orchard_storage::StorageError),

    #[error(transparent)]
    Client(#[from] orchard_client::ClientError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
