// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User ↔ orchestrator chat messages.

use serde::{Deserialize, Serialize};

use crate::id::{MessageId, ProjectId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatSender {
    User,
    Orchestrator,
}

impl ChatSender {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatSender::User => "user",
            ChatSender::Orchestrator => "orchestrator",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(ChatSender::User),
            "orchestrator" => Some(ChatSender::Orchestrator),
            _ => None,
        }
    }
}

/// Message lifecycle. Transitions are monotonic:
/// `unread → read → working → resolved`, never backwards.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    Unread,
    Read,
    Working,
    Resolved,
}

impl ChatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatStatus::Unread => "unread",
            ChatStatus::Read => "read",
            ChatStatus::Working => "working",
            ChatStatus::Resolved => "resolved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unread" => Some(ChatStatus::Unread),
            "read" => Some(ChatStatus::Read),
            "working" => Some(ChatStatus::Working),
            "resolved" => Some(ChatStatus::Resolved),
            _ => None,
        }
    }

    /// Whether moving to `next` respects the monotonic state machine.
    pub fn can_transition_to(self, next: ChatStatus) -> bool {
        next >= self
    }
}

impl std::fmt::Display for ChatStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub project_id: ProjectId,
    pub timestamp_ms: u64,
    pub sender: ChatSender,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
    pub processed: bool,
    pub status: ChatStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions_are_monotonic() {
        assert!(ChatStatus::Unread.can_transition_to(ChatStatus::Read));
        assert!(ChatStatus::Read.can_transition_to(ChatStatus::Working));
        assert!(ChatStatus::Working.can_transition_to(ChatStatus::Resolved));
        assert!(ChatStatus::Unread.can_transition_to(ChatStatus::Resolved));
        assert!(ChatStatus::Working.can_transition_to(ChatStatus::Working));

        assert!(!ChatStatus::Resolved.can_transition_to(ChatStatus::Working));
        assert!(!ChatStatus::Read.can_transition_to(ChatStatus::Unread));
    }
}
