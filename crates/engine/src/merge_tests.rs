// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use orchard_core::{epoch_ms_now, ProjectId};
use std::path::Path;
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

fn service(dir: &Path) -> (MergeService, ProjectDb) {
    let db = ProjectDb::open_in_memory().unwrap();
    let project = Project {
        id: ProjectId::from_string("prj-test"),
        path: dir.to_path_buf(),
        name: "test".to_string(),
        repo_url: None,
        created_at_ms: epoch_ms_now(),
    };
    (MergeService::new(db.clone(), project), db)
}

fn init_repo_with_branch(dir: &Path, conflicting: bool) {
    git(dir, &["init", "-b", "main"]);
    std::fs::write(dir.join("shared.txt"), "base\n").unwrap();
    git(dir, &["add", "."]);
    git(dir, &["commit", "-m", "initial"]);

    git(dir, &["checkout", "-b", "feature/x"]);
    std::fs::write(dir.join("shared.txt"), "feature change\n").unwrap();
    git(dir, &["commit", "-am", "feature work"]);

    git(dir, &["checkout", "main"]);
    if conflicting {
        std::fs::write(dir.join("shared.txt"), "main change\n").unwrap();
        git(dir, &["commit", "-am", "conflicting main work"]);
    }
}

#[tokio::test]
async fn test_merge_success_marks_entry() {
    let dir = tempfile::tempdir().unwrap();
    init_repo_with_branch(dir.path(), false);
    let (service, db) = service(dir.path());

    let worktree_id = WorktreeId::from_string("wt-x");
    service.enqueue(&worktree_id, "feature/x", "did the thing", true).unwrap();

    let merged = service.merge_worktree(&worktree_id, "main", false).await.unwrap();
    assert!(merged.merged);

    // The merge commit landed on main with --no-ff.
    let log = std::process::Command::new("git")
        .args(["-C", dir.path().to_str().unwrap(), "log", "--oneline", "-1"])
        .output()
        .unwrap();
    let line = String::from_utf8_lossy(&log.stdout).into_owned();
    assert!(line.contains("Merge branch 'feature/x'"), "got: {}", line);

    // Queue no longer lists the entry as pending.
    assert!(db.get_merge_queue().unwrap().is_empty());
}

#[tokio::test]
async fn test_merge_twice_reports_already_merged() {
    let dir = tempfile::tempdir().unwrap();
    init_repo_with_branch(dir.path(), false);
    let (service, _db) = service(dir.path());

    let worktree_id = WorktreeId::from_string("wt-x");
    service.enqueue(&worktree_id, "feature/x", "", true).unwrap();
    service.merge_worktree(&worktree_id, "main", false).await.unwrap();

    let err = service.merge_worktree(&worktree_id, "main", false).await.unwrap_err();
    match err {
        EngineError::Validation(msg) => assert!(msg.contains("Already merged")),
        other => panic!("expected Already merged, got {:?}", other),
    }
}

#[tokio::test]
async fn test_merge_conflict_surfaces_and_aborts() {
    let dir = tempfile::tempdir().unwrap();
    init_repo_with_branch(dir.path(), true);
    let (service, db) = service(dir.path());

    let worktree_id = WorktreeId::from_string("wt-x");
    service.enqueue(&worktree_id, "feature/x", "", true).unwrap();

    let err = service.merge_worktree(&worktree_id, "main", false).await.unwrap_err();
    assert!(matches!(err, EngineError::MergeConflict(_)));

    // Entry stays pending so the conflict can be resolved and retried.
    assert_eq!(db.get_merge_queue().unwrap().len(), 1);

    // Working tree was left clean (merge aborted).
    let status = std::process::Command::new("git")
        .args(["-C", dir.path().to_str().unwrap(), "status", "--porcelain"])
        .output()
        .unwrap();
    assert!(status.stdout.is_empty());
}

#[tokio::test]
async fn test_squash_merge_collapses_to_one_commit() {
    let dir = tempfile::tempdir().unwrap();
    init_repo_with_branch(dir.path(), false);
    let (service, _db) = service(dir.path());

    let worktree_id = WorktreeId::from_string("wt-x");
    service.enqueue(&worktree_id, "feature/x", "", true).unwrap();
    let merged = service.merge_worktree(&worktree_id, "main", true).await.unwrap();
    assert!(merged.merged);

    // Exactly one commit on top of the initial one, no merge parents.
    let log = std::process::Command::new("git")
        .args(["-C", dir.path().to_str().unwrap(), "rev-list", "--count", "main"])
        .output()
        .unwrap();
    let count = String::from_utf8_lossy(&log.stdout).trim().to_string();
    assert_eq!(count, "2");
}

#[tokio::test]
async fn test_merge_unknown_worktree_not_found() {
    let dir = tempfile::tempdir().unwrap();
    init_repo_with_branch(dir.path(), false);
    let (service, _db) = service(dir.path());

    let err = service
        .merge_worktree(&WorktreeId::from_string("wt-missing"), "main", false)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}
