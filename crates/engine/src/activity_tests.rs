// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use orchard_core::ProjectId;

fn service() -> ActivityService {
    let project = Project {
        id: ProjectId::from_string("prj-test"),
        path: std::path::PathBuf::from("/tmp/test"),
        name: "test".to_string(),
        repo_url: None,
        created_at_ms: epoch_ms_now(),
    };
    ActivityService::new(ProjectDb::open_in_memory().unwrap(), project)
}

#[tokio::test]
async fn test_execute_action_brackets_success() {
    let service = service();
    let corr = ActivityService::new_correlation_id();

    let result = service
        .execute_action("SEND_TASK", json!({"worktree": "wt-a"}), &corr, || async {
            Ok(json!({"queued": true}))
        })
        .await
        .unwrap();
    assert_eq!(result, json!({"queued": true}));

    let filter = ActivityFilter {
        correlation_id: Some(corr),
        ..Default::default()
    };
    let entries = service.query(&filter, 10).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].summary, "SEND_TASK: start");
    assert_eq!(entries[1].summary, "SEND_TASK: complete");
    assert!(entries[1].details["duration_ms"].is_u64());
}

#[tokio::test]
async fn test_execute_action_logs_errors() {
    let service = service();
    let corr = ActivityService::new_correlation_id();

    let err = service
        .execute_action("MERGE_WORKTREE", json!({}), &corr, || async {
            Err(EngineError::Validation("Already merged".to_string()))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let filter = ActivityFilter {
        kind: Some(ActivityType::Error),
        category: None,
        correlation_id: Some(corr),
    };
    let errors = service.query(&filter, 10).unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].summary.contains("Already merged"));
}

#[test]
fn test_chat_flow_user_to_orchestrator() {
    let service = service();

    let question = service.send_user_message("should we ship?").unwrap();
    assert_eq!(service.pending_user_messages().unwrap().len(), 1);

    service
        .consume_messages(&[question.clone()])
        .unwrap();
    assert!(service.pending_user_messages().unwrap().is_empty());

    let reply = service
        .send_orchestrator_message("shipping now", Some(question.id))
        .unwrap();
    assert_eq!(reply.reply_to, Some(question.id));

    let messages = service.recent_messages(10).unwrap();
    assert_eq!(messages.len(), 2);
    let original = messages.iter().find(|m| m.id == question.id).unwrap();
    assert_eq!(original.status, ChatStatus::Resolved);
    assert!(original.processed);
}

#[test]
fn test_orchestrator_messages_never_pending() {
    let service = service();
    service.send_orchestrator_message("hello", None).unwrap();
    assert!(service.pending_user_messages().unwrap().is_empty());
}

#[test]
fn test_formatted_log_is_derived_view() {
    let service = service();
    service
        .log(
            ActivityType::Tick,
            ActivityCategory::Orchestrator,
            "tick 1",
            json!({}),
            Some("corr-x"),
        )
        .unwrap();

    let lines = service.formatted_log(10).unwrap();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("[tick/orchestrator]"));
    assert!(lines[0].contains("tick 1"));
    assert!(lines[0].contains("corr-x"));
}
