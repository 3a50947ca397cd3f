// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use orchard_core::epoch_ms_now;
use std::path::Path;

fn sample(project: &ProjectId, path: &str, branch: &str) -> Worktree {
    Worktree {
        id: WorktreeId::derive(project, Path::new(path)),
        project_id: *project,
        path: PathBuf::from(path),
        branch: branch.to_string(),
        is_main: false,
        merged: false,
        archived: false,
        mode: None,
        status: GitStatus::default(),
        last_commit_ms: None,
        created_at_ms: epoch_ms_now(),
    }
}

#[test]
fn test_upsert_then_get() {
    let db = ProjectDb::open_in_memory().unwrap();
    let project = ProjectId::from_string("prj-test");
    let wt = sample(&project, "/repo/.worktrees/feature-x", "feature/x");
    db.upsert_worktree(&wt).unwrap();

    let fetched = db.get_worktree(&wt.id).unwrap();
    assert_eq!(fetched, wt);
}

#[test]
fn test_upsert_refreshes_existing_row() {
    let db = ProjectDb::open_in_memory().unwrap();
    let project = ProjectId::from_string("prj-test");
    let mut wt = sample(&project, "/repo/.worktrees/feature-x", "feature/x");
    db.upsert_worktree(&wt).unwrap();

    wt.status.modified = 3;
    wt.merged = true;
    db.upsert_worktree(&wt).unwrap();

    let fetched = db.get_worktree(&wt.id).unwrap();
    assert_eq!(fetched.status.modified, 3);
    assert!(fetched.merged);
    assert_eq!(db.list_worktrees(&project).unwrap().len(), 1);
}

#[test]
fn test_archive_then_reactivate() {
    let db = ProjectDb::open_in_memory().unwrap();
    let project = ProjectId::from_string("prj-test");
    let wt = sample(&project, "/repo/.worktrees/feature-x", "feature/x");
    db.upsert_worktree(&wt).unwrap();

    db.set_worktree_archived(&wt.id).unwrap();
    assert!(db.get_worktree(&wt.id).unwrap().archived);

    db.mark_worktree_active(&wt.id).unwrap();
    let active = db.get_worktree(&wt.id).unwrap();
    assert!(!active.archived);
    assert!(!active.merged);
}

#[test]
fn test_delete_row() {
    let db = ProjectDb::open_in_memory().unwrap();
    let project = ProjectId::from_string("prj-test");
    let wt = sample(&project, "/repo/.worktrees/feature-x", "feature/x");
    db.upsert_worktree(&wt).unwrap();
    db.delete_worktree_row(&wt.id).unwrap();
    assert!(matches!(
        db.get_worktree(&wt.id),
        Err(StorageError::NotFound(_))
    ));
}

#[test]
fn test_unknown_worktree_is_not_found() {
    let db = ProjectDb::open_in_memory().unwrap();
    let missing = WorktreeId::from_string("00000000-0000-0000-0000-000000000000");
    assert!(matches!(
        db.set_worktree_archived(&missing),
        Err(StorageError::NotFound(_))
    ));
}
