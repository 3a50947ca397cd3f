// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use orchard_client::DaemonClient;
use orchard_engine::{SessionRegistry, WorktreeManager};

pub async fn show(path: &Path) -> anyhow::Result<()> {
    let (project, db) = super::open_project(path)?;
    println!("project {} ({})", project.name, project.id);

    // Status works with or without a live daemon.
    let client = DaemonClient::connect(super::daemon_url());
    let daemon_up = client.wait_connected(Duration::from_secs(2)).await.is_ok();
    println!("daemon: {}", if daemon_up { "connected" } else { "unreachable" });

    let registry = SessionRegistry::new(db.clone(), Arc::clone(&client), project.clone());
    let worktrees = WorktreeManager::new(db.clone(), project.clone());

    let active = registry.active_worktrees().unwrap_or_default();
    let listed = if daemon_up {
        worktrees.load_worktrees(&active).await?
    } else {
        worktrees.list()?
    };

    println!("\nworktrees:");
    for worktree in &listed {
        let role = if worktree.is_main { " main" } else { "" };
        let mut flags = String::new();
        if worktree.merged {
            flags.push_str(" merged");
        }
        if worktree.archived {
            flags.push_str(" archived");
        }
        println!(
            "  {}  {}{}{}  +{} ~{} ?{}",
            worktree.id,
            worktree.branch,
            role,
            flags,
            worktree.status.ahead,
            worktree.status.modified,
            worktree.status.untracked,
        );
    }

    println!("\nsessions:");
    let sessions = registry.list()?;
    if sessions.is_empty() {
        println!("  (none)");
    }
    for session in sessions {
        println!(
            "  {}  worktree {}  {}  resumes {}",
            session.id, session.worktree_id, session.status, session.resume_count
        );
    }

    println!("\nmerge queue:");
    let queue = db.get_merge_queue()?;
    if queue.is_empty() {
        println!("  (empty)");
    }
    for entry in queue {
        println!("  {}  {}", entry.worktree_id, entry.branch);
    }

    client.close();
    Ok(())
}
