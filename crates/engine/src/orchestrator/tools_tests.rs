// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn test_definitions_cover_the_tool_set() {
    let names: Vec<String> = tool_definitions().into_iter().map(|t| t.name).collect();
    assert_eq!(
        names,
        vec![
            "CREATE_WORKTREE",
            "SEND_TASK",
            "MERGE_WORKTREE",
            "ARCHIVE_WORKTREE",
            "SEND_MESSAGE",
            "NUDGE_AGENT",
            "CHECK_STATUS",
            "RESPOND_TO_QUESTION",
            "LOG_ACTIVITY",
            "GET_PENDING_MESSAGES",
        ]
    );
}

#[test]
fn test_parse_create_worktree() {
    let call = ToolCall::parse(
        "CREATE_WORKTREE",
        &json!({
            "projectId": "prj-x",
            "name": "Add Auth",
            "task": "implement login",
            "startAgent": true
        }),
    )
    .unwrap();
    assert_eq!(
        call,
        ToolCall::CreateWorktree {
            project_id: ProjectId::from_string("prj-x"),
            name: "Add Auth".to_string(),
            task: Some("implement login".to_string()),
            start_agent: true,
        }
    );
    assert_eq!(call.name(), "CREATE_WORKTREE");
}

#[test]
fn test_parse_defaults_optional_fields() {
    let call = ToolCall::parse(
        "MERGE_WORKTREE",
        &json!({ "projectId": "prj-x", "worktreeId": "wt-a" }),
    )
    .unwrap();
    assert_eq!(
        call,
        ToolCall::MergeWorktree {
            project_id: ProjectId::from_string("prj-x"),
            worktree_id: WorktreeId::from_string("wt-a"),
            squash: false,
            delete_after: false,
        }
    );
}

#[test]
fn test_parse_nudge_without_message() {
    let call = ToolCall::parse("NUDGE_AGENT", &json!({ "worktreeId": "wt-a" })).unwrap();
    assert_eq!(
        call,
        ToolCall::NudgeAgent {
            worktree_id: WorktreeId::from_string("wt-a"),
            message: None,
        }
    );
}

#[test]
fn test_parse_get_pending_messages_ignores_input() {
    let call = ToolCall::parse("GET_PENDING_MESSAGES", &json!({})).unwrap();
    assert_eq!(call, ToolCall::GetPendingMessages);
}

#[test]
fn test_parse_rejects_missing_required_params() {
    let err = ToolCall::parse("SEND_TASK", &json!({ "worktreeId": "wt-a" })).unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[test]
fn test_parse_rejects_unknown_tool() {
    let err = ToolCall::parse("DELETE_EVERYTHING", &json!({})).unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}
