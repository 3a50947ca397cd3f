// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The orchestrator's tool set: definitions handed to the LLM and the
//! typed decoding of the calls it makes.

use serde::Deserialize;
use serde_json::{json, Value};

use orchard_core::{MessageId, ProjectId, WorktreeId};

use super::llm::ToolDefinition;
use crate::error::EngineError;

/// A decoded tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    CreateWorktree {
        project_id: ProjectId,
        name: String,
        task: Option<String>,
        start_agent: bool,
    },
    SendTask {
        worktree_id: WorktreeId,
        message: String,
    },
    MergeWorktree {
        project_id: ProjectId,
        worktree_id: WorktreeId,
        squash: bool,
        delete_after: bool,
    },
    ArchiveWorktree {
        worktree_id: WorktreeId,
        delete_files: bool,
    },
    SendMessage {
        project_id: ProjectId,
        message: String,
        reply_to: Option<MessageId>,
    },
    NudgeAgent {
        worktree_id: WorktreeId,
        message: Option<String>,
    },
    CheckStatus {
        project_id: ProjectId,
        worktree_id: Option<WorktreeId>,
    },
    RespondToQuestion {
        worktree_id: WorktreeId,
        response: String,
    },
    LogActivity {
        summary: String,
        category: String,
        details: Option<Value>,
    },
    GetPendingMessages,
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::CreateWorktree { .. } => "CREATE_WORKTREE",
            ToolCall::SendTask { .. } => "SEND_TASK",
            ToolCall::MergeWorktree { .. } => "MERGE_WORKTREE",
            ToolCall::ArchiveWorktree { .. } => "ARCHIVE_WORKTREE",
            ToolCall::SendMessage { .. } => "SEND_MESSAGE",
            ToolCall::NudgeAgent { .. } => "NUDGE_AGENT",
            ToolCall::CheckStatus { .. } => "CHECK_STATUS",
            ToolCall::RespondToQuestion { .. } => "RESPOND_TO_QUESTION",
            ToolCall::LogActivity { .. } => "LOG_ACTIVITY",
            ToolCall::GetPendingMessages => "GET_PENDING_MESSAGES",
        }
    }

    /// Decode a model-requested call into a typed value. Missing or
    /// malformed parameters are validation errors.
    pub fn parse(name: &str, input: &Value) -> Result<Self, EngineError> {
        match name {
            "CREATE_WORKTREE" => {
                #[derive(Deserialize)]
                #[serde(rename_all = "camelCase")]
                struct Params {
                    project_id: String,
                    name: String,
                    #[serde(default)]
                    task: Option<String>,
                    #[serde(default)]
                    start_agent: bool,
                }
                let p: Params = from_input(name, input)?;
                Ok(ToolCall::CreateWorktree {
                    project_id: ProjectId::from_string(p.project_id),
                    name: p.name,
                    task: p.task,
                    start_agent: p.start_agent,
                })
            }
            "SEND_TASK" => {
                #[derive(Deserialize)]
                #[serde(rename_all = "camelCase")]
                struct Params {
                    worktree_id: String,
                    message: String,
                }
                let p: Params = from_input(name, input)?;
                Ok(ToolCall::SendTask {
                    worktree_id: WorktreeId::from_string(p.worktree_id),
                    message: p.message,
                })
            }
            "MERGE_WORKTREE" => {
                #[derive(Deserialize)]
                #[serde(rename_all = "camelCase")]
                struct Params {
                    project_id: String,
                    worktree_id: String,
                    #[serde(default)]
                    squash: bool,
                    #[serde(default)]
                    delete_after: bool,
                }
                let p: Params = from_input(name, input)?;
                Ok(ToolCall::MergeWorktree {
                    project_id: ProjectId::from_string(p.project_id),
                    worktree_id: WorktreeId::from_string(p.worktree_id),
                    squash: p.squash,
                    delete_after: p.delete_after,
                })
            }
            "ARCHIVE_WORKTREE" => {
                #[derive(Deserialize)]
                #[serde(rename_all = "camelCase")]
                struct Params {
                    worktree_id: String,
                    #[serde(default)]
                    delete_files: bool,
                }
                let p: Params = from_input(name, input)?;
                Ok(ToolCall::ArchiveWorktree {
                    worktree_id: WorktreeId::from_string(p.worktree_id),
                    delete_files: p.delete_files,
                })
            }
            "SEND_MESSAGE" => {
                #[derive(Deserialize)]
                #[serde(rename_all = "camelCase")]
                struct Params {
                    project_id: String,
                    message: String,
                    #[serde(default)]
                    reply_to: Option<String>,
                }
                let p: Params = from_input(name, input)?;
                Ok(ToolCall::SendMessage {
                    project_id: ProjectId::from_string(p.project_id),
                    message: p.message,
                    reply_to: p.reply_to.map(MessageId::from_string),
                })
            }
            "NUDGE_AGENT" => {
                #[derive(Deserialize)]
                #[serde(rename_all = "camelCase")]
                struct Params {
                    worktree_id: String,
                    #[serde(default)]
                    message: Option<String>,
                }
                let p: Params = from_input(name, input)?;
                Ok(ToolCall::NudgeAgent {
                    worktree_id: WorktreeId::from_string(p.worktree_id),
                    message: p.message,
                })
            }
            "CHECK_STATUS" => {
                #[derive(Deserialize)]
                #[serde(rename_all = "camelCase")]
                struct Params {
                    project_id: String,
                    #[serde(default)]
                    worktree_id: Option<String>,
                }
                let p: Params = from_input(name, input)?;
                Ok(ToolCall::CheckStatus {
                    project_id: ProjectId::from_string(p.project_id),
                    worktree_id: p.worktree_id.map(WorktreeId::from_string),
                })
            }
            "RESPOND_TO_QUESTION" => {
                #[derive(Deserialize)]
                #[serde(rename_all = "camelCase")]
                struct Params {
                    worktree_id: String,
                    response: String,
                }
                let p: Params = from_input(name, input)?;
                Ok(ToolCall::RespondToQuestion {
                    worktree_id: WorktreeId::from_string(p.worktree_id),
                    response: p.response,
                })
            }
            "LOG_ACTIVITY" => {
                #[derive(Deserialize)]
                #[serde(rename_all = "camelCase")]
                struct Params {
                    summary: String,
                    category: String,
                    #[serde(default)]
                    details: Option<Value>,
                }
                let p: Params = from_input(name, input)?;
                Ok(ToolCall::LogActivity {
                    summary: p.summary,
                    category: p.category,
                    details: p.details,
                })
            }
            "GET_PENDING_MESSAGES" => Ok(ToolCall::GetPendingMessages),
            other => Err(EngineError::Validation(format!("unknown tool: {}", other))),
        }
    }
}

fn from_input<'a, T: Deserialize<'a>>(name: &str, input: &'a Value) -> Result<T, EngineError> {
    T::deserialize(input)
        .map_err(|e| EngineError::Validation(format!("bad parameters for {}: {}", name, e)))
}

/// The fixed tool set handed to the model each tick.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    let tool = |name: &str, description: &str, schema: Value| ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: schema,
    };
    vec![
        tool(
            "CREATE_WORKTREE",
            "Create a new git worktree (and optionally start an agent or task in it).",
            json!({
                "type": "object",
                "properties": {
                    "projectId": { "type": "string" },
                    "name": { "type": "string", "description": "Short feature name; becomes feature/<slug>" },
                    "task": { "type": "string", "description": "Task to run immediately in the new worktree" },
                    "startAgent": { "type": "boolean" }
                },
                "required": ["projectId", "name"]
            }),
        ),
        tool(
            "SEND_TASK",
            "Run a one-shot agent task in an existing worktree.",
            json!({
                "type": "object",
                "properties": {
                    "worktreeId": { "type": "string" },
                    "message": { "type": "string" }
                },
                "required": ["worktreeId", "message"]
            }),
        ),
        tool(
            "MERGE_WORKTREE",
            "Merge a completed worktree's branch into the default branch.",
            json!({
                "type": "object",
                "properties": {
                    "projectId": { "type": "string" },
                    "worktreeId": { "type": "string" },
                    "squash": { "type": "boolean" },
                    "deleteAfter": { "type": "boolean" }
                },
                "required": ["projectId", "worktreeId"]
            }),
        ),
        tool(
            "ARCHIVE_WORKTREE",
            "Archive a worktree; optionally delete its files.",
            json!({
                "type": "object",
                "properties": {
                    "worktreeId": { "type": "string" },
                    "deleteFiles": { "type": "boolean" }
                },
                "required": ["worktreeId"]
            }),
        ),
        tool(
            "SEND_MESSAGE",
            "Send a chat message to the user.",
            json!({
                "type": "object",
                "properties": {
                    "projectId": { "type": "string" },
                    "message": { "type": "string" },
                    "replyTo": { "type": "string" }
                },
                "required": ["projectId", "message"]
            }),
        ),
        tool(
            "NUDGE_AGENT",
            "Prompt an idle agent; defaults to asking for a status update.",
            json!({
                "type": "object",
                "properties": {
                    "worktreeId": { "type": "string" },
                    "message": { "type": "string" }
                },
                "required": ["worktreeId"]
            }),
        ),
        tool(
            "CHECK_STATUS",
            "Snapshot worktrees, sessions, and the merge queue.",
            json!({
                "type": "object",
                "properties": {
                    "projectId": { "type": "string" },
                    "worktreeId": { "type": "string" }
                },
                "required": ["projectId"]
            }),
        ),
        tool(
            "RESPOND_TO_QUESTION",
            "Answer a question an agent asked in its terminal.",
            json!({
                "type": "object",
                "properties": {
                    "worktreeId": { "type": "string" },
                    "response": { "type": "string" }
                },
                "required": ["worktreeId", "response"]
            }),
        ),
        tool(
            "LOG_ACTIVITY",
            "Record a decision or observation in the activity log.",
            json!({
                "type": "object",
                "properties": {
                    "summary": { "type": "string" },
                    "category": { "type": "string", "enum": ["system", "orchestrator", "agent", "worktree", "user"] },
                    "details": { "type": "object" }
                },
                "required": ["summary", "category"]
            }),
        ),
        tool(
            "GET_PENDING_MESSAGES",
            "Fetch unread user chat messages.",
            json!({ "type": "object", "properties": {} }),
        ),
    ]
}

#[cfg(test)]
#[path = "tools_tests.rs"]
mod tests;
