// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sample(worktree: &str) -> AgentSession {
    AgentSession {
        id: SessionId::new(),
        worktree_id: WorktreeId::from_string(worktree),
        project_id: ProjectId::from_string("prj-test"),
        command: "claude".to_string(),
        cwd: PathBuf::from("/repo/.worktrees/feature-x"),
        conversation_resume_id: None,
        status: AgentSessionStatus::Active,
        created_at_ms: epoch_ms_now(),
        last_activity_ms: epoch_ms_now(),
        resume_count: 0,
    }
}

#[test]
fn test_insert_and_get() {
    let db = ProjectDb::open_in_memory().unwrap();
    let session = sample("wt-a");
    db.insert_agent_session(&session).unwrap();
    let fetched = db.get_agent_session(&session.id).unwrap();
    assert_eq!(fetched, session);
}

#[test]
fn test_worktree_id_is_unique() {
    let db = ProjectDb::open_in_memory().unwrap();
    db.insert_agent_session(&sample("wt-a")).unwrap();
    let dup = sample("wt-a");
    assert!(db.insert_agent_session(&dup).is_err());
}

#[test]
fn test_delete_then_insert_same_worktree() {
    let db = ProjectDb::open_in_memory().unwrap();
    let first = sample("wt-a");
    db.insert_agent_session(&first).unwrap();
    assert!(db.delete_session_for_worktree(&first.worktree_id).unwrap());
    db.insert_agent_session(&sample("wt-a")).unwrap();
}

#[test]
fn test_bulk_transition_on_daemon_loss() {
    let db = ProjectDb::open_in_memory().unwrap();
    db.insert_agent_session(&sample("wt-a")).unwrap();
    db.insert_agent_session(&sample("wt-b")).unwrap();
    let mut terminated = sample("wt-c");
    terminated.status = AgentSessionStatus::Terminated;
    db.insert_agent_session(&terminated).unwrap();

    let moved = db
        .transition_sessions(AgentSessionStatus::Active, AgentSessionStatus::Disconnected)
        .unwrap();
    assert_eq!(moved, 2);

    let project = ProjectId::from_string("prj-test");
    let sessions = db.list_agent_sessions(&project).unwrap();
    let disconnected = sessions
        .iter()
        .filter(|s| s.status == AgentSessionStatus::Disconnected)
        .count();
    assert_eq!(disconnected, 2);
}

#[test]
fn test_replace_session_id_bumps_resume_count() {
    let db = ProjectDb::open_in_memory().unwrap();
    let session = sample("wt-a");
    db.insert_agent_session(&session).unwrap();

    let new_id = SessionId::new();
    let resumed = db
        .replace_session_id(&session.id, &new_id, Some("conv-123"))
        .unwrap();
    assert_eq!(resumed.id, new_id);
    assert_eq!(resumed.status, AgentSessionStatus::Resumed);
    assert_eq!(resumed.resume_count, 1);
    assert_eq!(resumed.conversation_resume_id.as_deref(), Some("conv-123"));

    assert!(matches!(
        db.get_agent_session(&session.id),
        Err(StorageError::NotFound(_))
    ));
}

#[test]
fn test_replace_keeps_existing_conversation_id() {
    let db = ProjectDb::open_in_memory().unwrap();
    let mut session = sample("wt-a");
    session.conversation_resume_id = Some("conv-orig".to_string());
    db.insert_agent_session(&session).unwrap();

    let resumed = db
        .replace_session_id(&session.id, &SessionId::new(), None)
        .unwrap();
    assert_eq!(resumed.conversation_resume_id.as_deref(), Some("conv-orig"));
}

#[test]
fn test_prune_terminated() {
    let db = ProjectDb::open_in_memory().unwrap();
    let mut old = sample("wt-old");
    old.status = AgentSessionStatus::Terminated;
    old.last_activity_ms = 1000;
    db.insert_agent_session(&old).unwrap();
    let mut live = sample("wt-live");
    live.last_activity_ms = 1000;
    db.insert_agent_session(&live).unwrap();

    let pruned = db.prune_terminated_sessions(epoch_ms_now()).unwrap();
    assert_eq!(pruned, 1);
    assert!(db.get_agent_session(&live.id).is_ok());
}
