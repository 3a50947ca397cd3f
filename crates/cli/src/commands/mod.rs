// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod chat;
pub mod daemon;
pub mod logs;
pub mod project;
pub mod run;
pub mod status;

use std::path::Path;

use orchard_core::{Project, ProjectConfig};
use orchard_storage::{ProjectDb, ProjectRegistry};

/// Resolve a registered project (registering it on first use) and open
/// its database. Writes `<path>/.orchard/config.json` when absent.
pub fn open_project(path: &Path) -> anyhow::Result<(Project, ProjectDb)> {
    let registry = ProjectRegistry::open_default()?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());
    let project = registry.register(path, &name, None)?;
    registry.touch_opened(&project.id)?;

    let config_path = path.join(".orchard").join("config.json");
    if !config_path.exists() {
        let config = ProjectConfig {
            id: project.id,
            name: project.name.clone(),
            repo_url: project.repo_url.clone(),
            orchestrator: Default::default(),
        };
        std::fs::create_dir_all(path.join(".orchard"))?;
        std::fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;
    }

    let db = ProjectDb::open(path)?;
    Ok((project, db))
}

/// Read the project's on-disk orchestrator config, defaulting when the
/// file is missing or unparseable.
pub fn load_project_config(path: &Path) -> orchard_core::OrchestratorConfig {
    std::fs::read_to_string(path.join(".orchard").join("config.json"))
        .ok()
        .and_then(|raw| serde_json::from_str::<ProjectConfig>(&raw).ok())
        .map(|config| config.orchestrator)
        .unwrap_or_default()
}

/// Daemon URL from `ORCHARD_DAEMON_PORT` (default 9782).
pub fn daemon_url() -> String {
    let port = std::env::var("ORCHARD_DAEMON_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(9782);
    format!("ws://127.0.0.1:{}", port)
}
