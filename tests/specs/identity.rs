// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic worktree identity and output reconstruction.

use std::path::Path;

use orchard_core::{
    epoch_ms_now, PrintSession, PrintSessionId, PrintSessionStatus, ProjectId, WorktreeId,
};
use orchard_storage::ProjectDb;

#[test]
fn worktree_ids_are_stable_across_processes() {
    // Same derivation twice stands in for two process lifetimes: the
    // digest has no process-local input.
    let project = ProjectId::from_string("prj-stable");
    let path = Path::new("/work/repo/.worktrees/feature-auth");
    let first = WorktreeId::derive(&project, path);
    let second = WorktreeId::derive(&project, path);
    assert_eq!(first, second);
    assert_eq!(first.as_str().len(), 36);

    let other_project = ProjectId::from_string("prj-other");
    assert_ne!(first, WorktreeId::derive(&other_project, path));
}

#[test]
fn terminal_output_reconstructs_from_chunks_in_id_order() {
    let db = ProjectDb::open_in_memory().unwrap();
    let session = PrintSession {
        id: PrintSessionId::new(),
        worktree_id: WorktreeId::from_string("wt-a"),
        project_id: ProjectId::from_string("prj-test"),
        task: "demo".to_string(),
        status: PrintSessionStatus::Running,
        exit_code: None,
        started_at_ms: epoch_ms_now(),
        completed_at_ms: None,
    };
    db.insert_print_session(&session).unwrap();

    let parts = ["@@PROMPT@@\ndemo\n@@END@@\n", "@@TOOL:Bash@@\n", "@@CMD:ls@@\n"];
    for part in parts {
        db.append_terminal_chunk(&session.id, part).unwrap();
    }
    assert_eq!(db.full_terminal_output(&session.id).unwrap(), parts.concat());
}
