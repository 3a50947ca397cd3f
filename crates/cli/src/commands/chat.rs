// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use orchard_engine::ActivityService;

/// Queue a user chat message for the orchestrator's next tick.
pub fn send(path: &Path, message: &str) -> anyhow::Result<()> {
    let (project, db) = super::open_project(path)?;
    let activity = ActivityService::new(db, project);
    let sent = activity.send_user_message(message)?;
    println!("queued {}", sent.id);
    Ok(())
}
