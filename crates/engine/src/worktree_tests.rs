// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use orchard_core::ProjectId;
use orchard_storage::ProjectDb;
use std::process::Command;

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE")
        .env("GIT_AUTHOR_NAME", "test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .status()
        .unwrap();
    assert!(status.success(), "git {:?} failed", args);
}

fn init_repo(dir: &Path) {
    git(dir, &["init", "-b", "main"]);
    std::fs::write(dir.join("README.md"), "hello\n").unwrap();
    git(dir, &["add", "."]);
    git(dir, &["commit", "-m", "initial"]);
}

fn manager(dir: &Path) -> WorktreeManager {
    let project = Project {
        id: ProjectId::from_string("prj-test"),
        path: dir.to_path_buf(),
        name: "test".to_string(),
        repo_url: None,
        created_at_ms: epoch_ms_now(),
    };
    WorktreeManager::new(ProjectDb::open_in_memory().unwrap(), project)
}

#[test]
fn test_branch_name_slugging() {
    assert_eq!(branch_name_for("Add Auth"), "feature/add-auth");
    assert_eq!(branch_name_for("fix_parser!"), "feature/fix-parser-");
    assert_eq!(branch_name_for("v2-cleanup"), "feature/v2-cleanup");
}

#[test]
fn test_parse_worktree_list_blocks() {
    let porcelain = "worktree /repo\nHEAD abc123\nbranch refs/heads/main\n\n\
                     worktree /repo/.worktrees/feature-x\nHEAD def456\nbranch refs/heads/feature/x\n\n\
                     worktree /repo/.worktrees/detached-one\nHEAD 0123ab\ndetached\n";
    let entries = parse_worktree_list(porcelain);
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].path, PathBuf::from("/repo"));
    assert_eq!(entries[0].branch, "main");
    assert_eq!(entries[1].branch, "feature/x");
    assert_eq!(entries[2].branch, "HEAD");
}

#[tokio::test]
async fn test_create_worktree_writes_manifests_and_record() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let manager = manager(dir.path());

    let worktree = manager
        .create_worktree(
            "feature/demo",
            CreateWorktreeOptions {
                new_branch: true,
                base_branch: Some("main".to_string()),
                mode: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(
        worktree.path,
        dir.path().join(".worktrees").join("feature-demo")
    );
    assert!(worktree.path.join(".claude/settings.local.json").exists());
    assert!(worktree.path.join(".mcp.json").exists());

    let manifest: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(worktree.path.join(".mcp.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(
        manifest["mcpServers"]["orchard-agent"]["env"]["WORKTREE_ID"],
        worktree.id.as_str()
    );

    let settings: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(worktree.path.join(".claude/settings.local.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(settings["trust"], true);
    let allow = settings["permissions"]["allow"].as_array().unwrap();
    assert!(allow
        .iter()
        .any(|v| v.as_str().unwrap().starts_with("Bash(")));

    // Record persisted with the deterministic id.
    let stored = manager.get(&worktree.id).unwrap();
    assert_eq!(stored.branch, "feature/demo");
    assert_eq!(
        stored.id,
        WorktreeId::derive(&manager.project().id, &worktree.path)
    );
}

#[tokio::test]
async fn test_create_worktree_rejects_path_collision() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let manager = manager(dir.path());

    manager
        .create_worktree(
            "feature/demo",
            CreateWorktreeOptions {
                new_branch: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = manager
        .create_worktree(
            "feature/demo",
            CreateWorktreeOptions {
                new_branch: false,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[tokio::test]
async fn test_load_worktrees_marks_main_and_syncs_status() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let manager = manager(dir.path());

    manager
        .create_worktree(
            "feature/dirty",
            CreateWorktreeOptions {
                new_branch: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let worktree_path = dir.path().join(".worktrees").join("feature-dirty");
    std::fs::write(worktree_path.join("scratch.txt"), "wip\n").unwrap();

    let worktrees = manager.load_worktrees(&HashSet::new()).await.unwrap();
    assert_eq!(worktrees.len(), 2);

    let main = worktrees.iter().find(|w| w.is_main).unwrap();
    assert_eq!(main.branch, "main");
    assert_eq!(main.path, dir.path().to_path_buf());

    let feature = worktrees.iter().find(|w| !w.is_main).unwrap();
    assert_eq!(feature.status.untracked, 1);
    assert!(!feature.merged, "dirty worktree can never be merged");
}

#[tokio::test]
async fn test_merged_detection_requires_full_guard() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let manager = manager(dir.path());

    let worktree = manager
        .create_worktree(
            "feature/merge-me",
            CreateWorktreeOptions {
                new_branch: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // A clean branch pointing at an ancestor of main is merged.
    let loaded = manager.load_worktrees(&HashSet::new()).await.unwrap();
    let feature = loaded.iter().find(|w| !w.is_main).unwrap();
    assert!(feature.merged);

    // The same worktree with an active session is not merged.
    let mut active = HashSet::new();
    active.insert(worktree.id);
    let loaded = manager.load_worktrees(&active).await.unwrap();
    let feature = loaded.iter().find(|w| !w.is_main).unwrap();
    assert!(!feature.merged);

    // Commits ahead of main clear it too.
    std::fs::write(worktree.path.join("new.txt"), "ahead\n").unwrap();
    git(&worktree.path, &["add", "."]);
    git(&worktree.path, &["commit", "-m", "ahead"]);
    let loaded = manager.load_worktrees(&HashSet::new()).await.unwrap();
    let feature = loaded.iter().find(|w| !w.is_main).unwrap();
    assert!(!feature.merged);
    assert_eq!(feature.status.ahead, 1);
}

#[tokio::test]
async fn test_archive_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let manager = manager(dir.path());

    let worktree = manager
        .create_worktree(
            "feature/archive-me",
            CreateWorktreeOptions {
                new_branch: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    manager.archive_worktree(&worktree.id).unwrap();

    let loaded = manager.load_worktrees(&HashSet::new()).await.unwrap();
    let feature = loaded.iter().find(|w| !w.is_main).unwrap();
    assert!(feature.archived);

    manager.mark_worktree_active(&worktree.id).unwrap();
    assert!(!manager.get(&worktree.id).unwrap().archived);
}

#[tokio::test]
async fn test_delete_rejects_main_worktree() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let manager = manager(dir.path());

    let worktrees = manager.load_worktrees(&HashSet::new()).await.unwrap();
    let main = worktrees.iter().find(|w| w.is_main).unwrap();
    let err = manager.delete_worktree(&main.id, false).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn test_delete_worktree_removes_dir_and_row() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let manager = manager(dir.path());

    let worktree = manager
        .create_worktree(
            "feature/doomed",
            CreateWorktreeOptions {
                new_branch: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    manager.delete_worktree(&worktree.id, true).await.unwrap();
    assert!(!worktree.path.exists());
    assert!(manager.get(&worktree.id).is_err());
}

#[tokio::test]
async fn test_default_branch_probe() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let manager = manager(dir.path());
    assert_eq!(manager.default_branch().await, "main");
}

#[tokio::test]
async fn test_manifest_id_resync() {
    let dir = tempfile::tempdir().unwrap();
    init_repo(dir.path());
    let manager = manager(dir.path());

    let worktree = manager
        .create_worktree(
            "feature/resync",
            CreateWorktreeOptions {
                new_branch: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Corrupt the manifest with a stale id.
    let stale = agent_manifest(&WorktreeId::from_string(
        "00000000-0000-0000-0000-000000000000",
    ));
    std::fs::write(
        worktree.path.join(".mcp.json"),
        serde_json::to_string_pretty(&stale).unwrap(),
    )
    .unwrap();

    manager.load_worktrees(&HashSet::new()).await.unwrap();

    let manifest: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(worktree.path.join(".mcp.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(
        manifest["mcpServers"]["orchard-agent"]["env"]["WORKTREE_ID"],
        worktree.id.as_str()
    );
}
