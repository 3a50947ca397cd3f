// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use orchard_engine::ActivityService;

/// Formatted view derived from the structured activity records.
pub fn show(path: &Path, limit: u32) -> anyhow::Result<()> {
    let (project, db) = super::open_project(path)?;
    let activity = ActivityService::new(db, project);
    for line in activity.formatted_log(limit)? {
        println!("{}", line);
    }
    Ok(())
}
