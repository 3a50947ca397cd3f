// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only activity log records.
//!
//! Structured records are primary; formatted log lines are a derived
//! view rendered by the CLI.

use serde::{Deserialize, Serialize};

use crate::id::ProjectId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Tick,
    Action,
    Event,
    Decision,
    Error,
    LlmRequest,
    LlmResponse,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Tick => "tick",
            ActivityType::Action => "action",
            ActivityType::Event => "event",
            ActivityType::Decision => "decision",
            ActivityType::Error => "error",
            ActivityType::LlmRequest => "llm_request",
            ActivityType::LlmResponse => "llm_response",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tick" => Some(ActivityType::Tick),
            "action" => Some(ActivityType::Action),
            "event" => Some(ActivityType::Event),
            "decision" => Some(ActivityType::Decision),
            "error" => Some(ActivityType::Error),
            "llm_request" => Some(ActivityType::LlmRequest),
            "llm_response" => Some(ActivityType::LlmResponse),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivityCategory {
    System,
    Orchestrator,
    Agent,
    Worktree,
    User,
}

impl ActivityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityCategory::System => "system",
            ActivityCategory::Orchestrator => "orchestrator",
            ActivityCategory::Agent => "agent",
            ActivityCategory::Worktree => "worktree",
            ActivityCategory::User => "user",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(ActivityCategory::System),
            "orchestrator" => Some(ActivityCategory::Orchestrator),
            "agent" => Some(ActivityCategory::Agent),
            "worktree" => Some(ActivityCategory::Worktree),
            "user" => Some(ActivityCategory::User),
            _ => None,
        }
    }
}

/// One activity record. `correlation_id` groups an LLM request with the
/// tool executions and results it caused.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEntry {
    pub id: i64,
    pub project_id: ProjectId,
    pub timestamp_ms: u64,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub category: ActivityCategory,
    pub summary: String,
    pub details: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ActivityEntry {
    /// One-line rendering for the derived log view.
    pub fn format_line(&self) -> String {
        let ts = chrono::DateTime::from_timestamp_millis(self.timestamp_ms as i64)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| self.timestamp_ms.to_string());
        match &self.correlation_id {
            Some(corr) => format!(
                "{} [{}/{}] {} ({})",
                ts,
                self.kind.as_str(),
                self.category.as_str(),
                self.summary,
                corr
            ),
            None => format!(
                "{} [{}/{}] {}",
                ts,
                self.kind.as_str(),
                self.category.as_str(),
                self.summary
            ),
        }
    }
}
