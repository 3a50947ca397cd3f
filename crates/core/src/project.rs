// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project identity and self-describing config.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::id::ProjectId;

/// A registered project. The process-wide registry owns identity only;
/// everything else lives in the project's own database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: ProjectId,
    /// Absolute path; unique across registered projects.
    pub path: PathBuf,
    pub name: String,
    pub repo_url: Option<String>,
    pub created_at_ms: u64,
}

/// Orchestrator loop settings, hot-reloadable via `update_config`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestratorConfig {
    pub model: String,
    pub tick_interval_ms: u64,
    pub enabled: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5".to_string(),
            tick_interval_ms: 5_000,
            enabled: true,
        }
    }
}

/// Self-describing config written to `<path>/.orchard/config.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectConfig {
    pub id: ProjectId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}
