// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol: JSON frames over WebSocket.
//!
//! Requests carry `{type, requestId, …}`; replies echo the same
//! `requestId`. Terminal and agent frames are unsolicited events with no
//! request id. Frame `type` strings use the `family:verb` convention
//! (`session:create`, `terminal:data`, `agent:ready`).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use orchard_core::{SessionId, WorktreeId};

/// Client → daemon frames.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    #[serde(rename = "ping")]
    #[serde(rename_all = "camelCase")]
    Ping { request_id: String },

    #[serde(rename = "daemon:status")]
    #[serde(rename_all = "camelCase")]
    Status { request_id: String },

    #[serde(rename = "session:create")]
    #[serde(rename_all = "camelCase")]
    SessionCreate {
        request_id: String,
        worktree_id: WorktreeId,
        project_path: PathBuf,
        cwd: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial_command: Option<String>,
    },

    #[serde(rename = "session:destroy")]
    #[serde(rename_all = "camelCase")]
    SessionDestroy {
        request_id: String,
        session_id: SessionId,
    },

    #[serde(rename = "session:list")]
    #[serde(rename_all = "camelCase")]
    SessionList { request_id: String },

    #[serde(rename = "session:get")]
    #[serde(rename_all = "camelCase")]
    SessionGet {
        request_id: String,
        session_id: SessionId,
    },

    #[serde(rename = "terminal:subscribe")]
    #[serde(rename_all = "camelCase")]
    Subscribe {
        request_id: String,
        session_id: SessionId,
    },

    /// Fire-and-forget: no reply frame.
    #[serde(rename = "terminal:unsubscribe")]
    #[serde(rename_all = "camelCase")]
    Unsubscribe { session_id: SessionId },

    /// Fire-and-forget: no reply frame.
    #[serde(rename = "terminal:input")]
    #[serde(rename_all = "camelCase")]
    Input {
        session_id: SessionId,
        data: String,
    },

    #[serde(rename = "terminal:resize")]
    #[serde(rename_all = "camelCase")]
    Resize {
        session_id: SessionId,
        cols: u16,
        rows: u16,
    },

    #[serde(rename = "terminal:ack")]
    #[serde(rename_all = "camelCase")]
    Ack {
        session_id: SessionId,
        count: u32,
    },

    /// Agent-side notifications (posted by the worktree tool server);
    /// the daemon fans them out to every other connected client.
    #[serde(rename = "agent:task-complete")]
    #[serde(rename_all = "camelCase")]
    AgentTaskComplete {
        session_id: SessionId,
        worktree_id: WorktreeId,
    },

    #[serde(rename = "agent:rate-limited")]
    #[serde(rename_all = "camelCase")]
    AgentRateLimited { rate_limit: RateLimitInfo },

    #[serde(rename = "agent:rate-limit-cleared")]
    #[serde(rename_all = "camelCase")]
    AgentRateLimitCleared {
        session_id: SessionId,
        worktree_id: WorktreeId,
    },

    #[serde(rename = "agent:ready")]
    #[serde(rename_all = "camelCase")]
    AgentReady {
        session_id: SessionId,
        worktree_id: WorktreeId,
    },
}

/// Daemon → client frames: replies and unsolicited events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "pong")]
    #[serde(rename_all = "camelCase")]
    Pong { request_id: String },

    #[serde(rename = "daemon:status")]
    #[serde(rename_all = "camelCase")]
    Status {
        request_id: String,
        session_count: usize,
        uptime_ms: u64,
    },

    #[serde(rename = "session:created")]
    #[serde(rename_all = "camelCase")]
    SessionCreated {
        request_id: String,
        session: SessionInfo,
    },

    #[serde(rename = "session:destroyed")]
    #[serde(rename_all = "camelCase")]
    SessionDestroyed {
        request_id: String,
        session_id: SessionId,
    },

    #[serde(rename = "session:list")]
    #[serde(rename_all = "camelCase")]
    SessionList {
        request_id: String,
        sessions: Vec<SessionInfo>,
    },

    #[serde(rename = "session:info")]
    #[serde(rename_all = "camelCase")]
    SessionInfo {
        request_id: String,
        session: SessionInfo,
    },

    #[serde(rename = "session:error")]
    #[serde(rename_all = "camelCase")]
    SessionError {
        request_id: String,
        error: String,
    },

    #[serde(rename = "terminal:data")]
    #[serde(rename_all = "camelCase")]
    TerminalData {
        session_id: SessionId,
        data: String,
        seq: u64,
    },

    #[serde(rename = "terminal:scrollback")]
    #[serde(rename_all = "camelCase")]
    TerminalScrollback {
        request_id: String,
        session_id: SessionId,
        lines: Vec<String>,
    },

    #[serde(rename = "terminal:exit")]
    #[serde(rename_all = "camelCase")]
    TerminalExit {
        session_id: SessionId,
        exit_code: i32,
    },

    #[serde(rename = "terminal:error")]
    #[serde(rename_all = "camelCase")]
    TerminalError {
        session_id: SessionId,
        error: String,
    },

    #[serde(rename = "agent:task-complete")]
    #[serde(rename_all = "camelCase")]
    AgentTaskComplete {
        session_id: SessionId,
        worktree_id: WorktreeId,
    },

    #[serde(rename = "agent:rate-limited")]
    #[serde(rename_all = "camelCase")]
    AgentRateLimited { rate_limit: RateLimitInfo },

    #[serde(rename = "agent:rate-limit-cleared")]
    #[serde(rename_all = "camelCase")]
    AgentRateLimitCleared {
        session_id: SessionId,
        worktree_id: WorktreeId,
    },

    #[serde(rename = "agent:ready")]
    #[serde(rename_all = "camelCase")]
    AgentReady {
        session_id: SessionId,
        worktree_id: WorktreeId,
    },
}

impl Event {
    /// The `type` tag this frame serialises with, for bus routing.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Event::Pong { .. } => "pong",
            Event::Status { .. } => "daemon:status",
            Event::SessionCreated { .. } => "session:created",
            Event::SessionDestroyed { .. } => "session:destroyed",
            Event::SessionList { .. } => "session:list",
            Event::SessionInfo { .. } => "session:info",
            Event::SessionError { .. } => "session:error",
            Event::TerminalData { .. } => "terminal:data",
            Event::TerminalScrollback { .. } => "terminal:scrollback",
            Event::TerminalExit { .. } => "terminal:exit",
            Event::TerminalError { .. } => "terminal:error",
            Event::AgentTaskComplete { .. } => "agent:task-complete",
            Event::AgentRateLimited { .. } => "agent:rate-limited",
            Event::AgentRateLimitCleared { .. } => "agent:rate-limit-cleared",
            Event::AgentReady { .. } => "agent:ready",
        }
    }

    /// Request id for reply-family frames, `None` for unsolicited events.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Event::Pong { request_id }
            | Event::Status { request_id, .. }
            | Event::SessionCreated { request_id, .. }
            | Event::SessionDestroyed { request_id, .. }
            | Event::SessionList { request_id, .. }
            | Event::SessionInfo { request_id, .. }
            | Event::SessionError { request_id, .. }
            | Event::TerminalScrollback { request_id, .. } => Some(request_id),
            _ => None,
        }
    }

    /// Session the frame concerns, when any.
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            Event::TerminalData { session_id, .. }
            | Event::TerminalScrollback { session_id, .. }
            | Event::TerminalExit { session_id, .. }
            | Event::TerminalError { session_id, .. }
            | Event::AgentTaskComplete { session_id, .. }
            | Event::AgentRateLimitCleared { session_id, .. }
            | Event::AgentReady { session_id, .. } => Some(*session_id),
            Event::AgentRateLimited { rate_limit } => Some(rate_limit.session_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    pub session_id: SessionId,
    pub worktree_id: WorktreeId,
}

/// Public view of a live PTY session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: SessionId,
    pub worktree_id: WorktreeId,
    pub cwd: PathBuf,
    pub created_at_ms: u64,
    pub subscriber_count: usize,
    pub scrollback_len: usize,
    pub seq: u64,
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
