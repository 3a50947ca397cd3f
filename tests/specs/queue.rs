// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merge queue FIFO semantics and pop atomicity.

use orchard_core::WorktreeId;
use orchard_storage::ProjectDb;

#[test]
fn pop_on_empty_queue_changes_nothing() {
    let db = ProjectDb::open_in_memory().unwrap();
    assert!(db.pop_from_merge_queue().unwrap().is_none());
    assert!(db.get_merge_queue().unwrap().is_empty());
}

#[test]
fn upsert_then_pop_is_fifo() {
    let dir = tempfile::tempdir().unwrap();
    let db = ProjectDb::open_at(&dir.path().join("orchard.db")).unwrap();
    let w1 = WorktreeId::from_string("W1");
    let w2 = WorktreeId::from_string("W2");

    db.upsert_merge_queue_entry(&w1, "feature/x", "", true).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    db.upsert_merge_queue_entry(&w2, "feature/y", "", true).unwrap();

    let first = db.pop_from_merge_queue().unwrap().unwrap();
    assert_eq!(first.worktree_id, w1);
    assert!(db.get_merge_queue_entry(&w1).unwrap().is_none());

    let second = db.pop_from_merge_queue().unwrap().unwrap();
    assert_eq!(second.worktree_id, w2);
    assert!(db.pop_from_merge_queue().unwrap().is_none());
}

#[test]
fn concurrent_pops_never_share_an_entry() {
    let dir = tempfile::tempdir().unwrap();
    let db = ProjectDb::open_at(&dir.path().join("orchard.db")).unwrap();
    for i in 0..20 {
        let id = WorktreeId::from_string(format!("W{}", i));
        db.upsert_merge_queue_entry(&id, &format!("feature/{}", i), "", true)
            .unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let db = db.clone();
        handles.push(std::thread::spawn(move || {
            let mut popped = Vec::new();
            while let Some(entry) = db.pop_from_merge_queue().unwrap() {
                popped.push(entry.worktree_id.as_str().to_string());
            }
            popped
        }));
    }

    let mut all: Vec<String> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(all.len(), 20, "every entry popped exactly once");
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 20, "no entry popped twice");
}
