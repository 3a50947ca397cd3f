// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use orchard_core::ProjectId;
use std::time::Duration;

fn test_project(path: &Path) -> Project {
    Project {
        id: ProjectId::from_string("prj-test"),
        path: path.to_path_buf(),
        name: "test".to_string(),
        repo_url: None,
        created_at_ms: epoch_ms_now(),
    }
}

/// Real daemon on an ephemeral port plus a connected client.
async fn harness() -> (SessionRegistry, Arc<DaemonClient>, tempfile::TempDir) {
    let manager = orchard_daemon::SessionManager::new();
    let socket = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(orchard_daemon::listener::run(socket, manager));

    let client = DaemonClient::connect(format!("ws://{}", addr));
    client.wait_connected(Duration::from_secs(5)).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let registry = SessionRegistry::new(
        ProjectDb::open_in_memory().unwrap(),
        Arc::clone(&client),
        test_project(dir.path()),
    );
    (registry, client, dir)
}

#[test]
fn test_resume_command_appends_flag_once() {
    assert_eq!(
        resume_command("claude", Some("conv-1")),
        "claude --resume conv-1"
    );
    assert_eq!(
        resume_command("claude --resume conv-0", Some("conv-1")),
        "claude --resume conv-0"
    );
    assert_eq!(resume_command("claude", None), "claude");
}

#[tokio::test]
async fn test_register_replaces_existing_session() {
    let (registry, client, dir) = harness().await;
    let worktree = WorktreeId::from_string("wt-a");

    let first = registry
        .register_session(worktree, dir.path(), "sleep 300", None)
        .await
        .unwrap();
    let second = registry
        .register_session(worktree, dir.path(), "sleep 300", None)
        .await
        .unwrap();
    assert_ne!(first.id, second.id);

    // The old id is gone from the daemon; the new one is live.
    let daemon_ids: Vec<_> = client
        .list_sessions()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert!(!daemon_ids.contains(&first.id));
    assert!(daemon_ids.contains(&second.id));

    // Exactly one registry row for the worktree.
    let row = registry.get_for_worktree(&worktree).unwrap().unwrap();
    assert_eq!(row.id, second.id);
    assert_eq!(row.status, AgentSessionStatus::Active);
    client.close();
}

#[tokio::test]
async fn test_unregister_terminates_and_keeps_audit_row() {
    let (registry, client, dir) = harness().await;
    let worktree = WorktreeId::from_string("wt-a");

    registry
        .register_session(worktree, dir.path(), "sleep 300", None)
        .await
        .unwrap();
    registry.unregister_session(&worktree).await.unwrap();

    let row = registry.get_for_worktree(&worktree).unwrap().unwrap();
    assert_eq!(row.status, AgentSessionStatus::Terminated);
    assert!(client.list_sessions().await.unwrap().is_empty());
    assert!(registry.active_worktrees().unwrap().is_empty());
    client.close();
}

#[tokio::test]
async fn test_validate_reconciles_registry_with_daemon() {
    let (registry, client, dir) = harness().await;

    let live = registry
        .register_session(WorktreeId::from_string("wt-live"), dir.path(), "sleep 300", None)
        .await
        .unwrap();

    // A second registered session whose daemon half dies out-of-band.
    let gone = registry
        .register_session(WorktreeId::from_string("wt-gone"), dir.path(), "sleep 300", None)
        .await
        .unwrap();
    client.destroy_session(gone.id).await.unwrap();

    // A daemon session nobody registered.
    let orphan = client
        .create_session(
            WorktreeId::from_string("wt-orphan"),
            dir.path(),
            dir.path(),
            None,
        )
        .await
        .unwrap();

    // An orchestrator-owned session is not an orphan.
    client
        .create_session(
            WorktreeId::from_string("orchestrator-main"),
            dir.path(),
            dir.path(),
            None,
        )
        .await
        .unwrap();

    let report = registry.validate_all_sessions().await.unwrap();
    assert_eq!(report.active, vec![live.id]);
    assert_eq!(report.disconnected, vec![gone.id]);
    assert_eq!(report.orphaned.len(), 1);
    assert_eq!(report.orphaned[0].id, orphan.id);
    client.close();
}

#[tokio::test]
async fn test_restore_session_swaps_id_and_counts() {
    let (registry, client, dir) = harness().await;
    let worktree = WorktreeId::from_string("wt-a");

    let original = registry
        .register_session(worktree, dir.path(), "sleep 300", Some("conv-9".to_string()))
        .await
        .unwrap();
    client.destroy_session(original.id).await.unwrap();
    registry.on_daemon_disconnected().unwrap();

    let restored = registry.restore_session(&worktree).await.unwrap();
    assert_ne!(restored.id, original.id);
    assert_eq!(restored.status, AgentSessionStatus::Resumed);
    assert_eq!(restored.resume_count, 1);
    assert_eq!(restored.conversation_resume_id.as_deref(), Some("conv-9"));

    let daemon_ids: Vec<_> = client
        .list_sessions()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert!(daemon_ids.contains(&restored.id));
    client.close();
}

#[tokio::test]
async fn test_disconnect_transition_is_bulk() {
    let (registry, client, dir) = harness().await;
    registry
        .register_session(WorktreeId::from_string("wt-a"), dir.path(), "sleep 300", None)
        .await
        .unwrap();
    registry
        .register_session(WorktreeId::from_string("wt-b"), dir.path(), "sleep 300", None)
        .await
        .unwrap();

    assert_eq!(registry.on_daemon_disconnected().unwrap(), 2);
    for session in registry.list().unwrap() {
        assert_eq!(session.status, AgentSessionStatus::Disconnected);
    }
    client.close();
}
