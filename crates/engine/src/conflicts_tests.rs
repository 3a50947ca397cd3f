// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use orchard_core::{GitStatus, Project, ProjectId};
use orchard_storage::ProjectDb;
use std::path::PathBuf;
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

fn lock(path: &str, worktree: &str) -> FileLock {
    FileLock {
        file_path: path.to_string(),
        worktree_id: WorktreeId::from_string(worktree),
        branch: format!("feature/{}", worktree),
        status: FileLockStatus::Modified,
        last_modified_ms: epoch_ms_now(),
    }
}

#[test]
fn test_find_conflicts_requires_two_holders() {
    let tracker = FileConflictTracker::new();
    let locks = vec![
        lock("src/lib.rs", "wt-a"),
        lock("src/lib.rs", "wt-b"),
        lock("src/main.rs", "wt-a"),
    ];
    let conflicts = tracker.find_conflicts(&locks);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].file_path, "src/lib.rs");
    assert_eq!(conflicts[0].worktree_ids.len(), 2);
}

#[test]
fn test_same_worktree_counts_once() {
    let tracker = FileConflictTracker::new();
    let locks = vec![lock("src/lib.rs", "wt-a"), lock("src/lib.rs", "wt-a")];
    assert!(tracker.find_conflicts(&locks).is_empty());
}

#[test]
fn test_check_for_overlaps_returns_subset() {
    let tracker = FileConflictTracker::new();
    let locks = vec![lock("src/lib.rs", "wt-a"), lock("docs/guide.md", "wt-b")];

    let new_files = vec![
        "src/lib.rs".to_string(),
        "src/new_module.rs".to_string(),
        "docs/guide.md".to_string(),
    ];
    let (overlapping, worktrees) = tracker.check_for_overlaps(&new_files, &locks);
    assert_eq!(overlapping, vec!["src/lib.rs".to_string(), "docs/guide.md".to_string()]);
    assert_eq!(worktrees.len(), 2);
}

#[tokio::test]
async fn test_derive_locks_from_real_worktrees() {
    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init", "-b", "main"]);
    std::fs::write(dir.path().join("shared.txt"), "base\n").unwrap();
    git(dir.path(), &["add", "."]);
    git(dir.path(), &["commit", "-m", "initial"]);

    let worktree_path = dir.path().join(".worktrees").join("feature-a");
    std::fs::create_dir_all(worktree_path.parent().unwrap()).unwrap();
    git(
        dir.path(),
        &[
            "worktree",
            "add",
            "-b",
            "feature/a",
            worktree_path.to_str().unwrap(),
        ],
    );

    // One modified, one untracked file in the worktree.
    std::fs::write(worktree_path.join("shared.txt"), "changed\n").unwrap();
    std::fs::write(worktree_path.join("fresh.txt"), "new\n").unwrap();

    let project_id = ProjectId::from_string("prj-test");
    let main = Worktree {
        id: WorktreeId::derive(&project_id, dir.path()),
        project_id,
        path: dir.path().to_path_buf(),
        branch: "main".to_string(),
        is_main: true,
        merged: false,
        archived: false,
        mode: None,
        status: GitStatus::default(),
        last_commit_ms: None,
        created_at_ms: epoch_ms_now(),
    };
    let feature = Worktree {
        id: WorktreeId::derive(&project_id, &worktree_path),
        path: worktree_path,
        branch: "feature/a".to_string(),
        is_main: false,
        ..main.clone()
    };

    let tracker = FileConflictTracker::new();
    let locks = tracker.derive_file_locks(&[main, feature.clone()]).await;

    // Main worktree contributes nothing even if dirty.
    assert!(locks.iter().all(|l| l.worktree_id == feature.id));

    let by_path: std::collections::HashMap<&str, FileLockStatus> = locks
        .iter()
        .map(|l| (l.file_path.as_str(), l.status))
        .collect();
    assert_eq!(by_path.get("shared.txt"), Some(&FileLockStatus::Modified));
    assert_eq!(by_path.get("fresh.txt"), Some(&FileLockStatus::Untracked));
}

#[test]
fn test_conflicts_logged_as_worktree_events() {
    let db = ProjectDb::open_in_memory().unwrap();
    let project = Project {
        id: ProjectId::from_string("prj-test"),
        path: PathBuf::from("/tmp/x"),
        name: "test".to_string(),
        repo_url: None,
        created_at_ms: epoch_ms_now(),
    };
    let activity = ActivityService::new(db.clone(), project.clone());

    let tracker = FileConflictTracker::new();
    let conflicts = tracker.find_conflicts(&[
        lock("src/lib.rs", "wt-a"),
        lock("src/lib.rs", "wt-b"),
    ]);
    tracker.log_conflicts(&activity, &conflicts).unwrap();

    let entries = db.recent_activity(&project.id, 10).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].kind, ActivityType::Event);
    assert_eq!(entries[0].category, ActivityCategory::Worktree);
    assert_eq!(entries[0].details["file"], "src/lib.rs");
}
