// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use orchard_storage::ProjectRegistry;

pub fn add(path: &Path, name: Option<&str>, repo_url: Option<&str>) -> anyhow::Result<()> {
    let path = std::fs::canonicalize(path)?;
    let registry = ProjectRegistry::open_default()?;
    let fallback = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());
    let project = registry.register(&path, name.unwrap_or(&fallback), repo_url)?;
    println!("{}  {}  {}", project.id, project.name, project.path.display());
    Ok(())
}

pub fn list() -> anyhow::Result<()> {
    let registry = ProjectRegistry::open_default()?;
    let projects = registry.list()?;
    if projects.is_empty() {
        println!("no projects registered");
        return Ok(());
    }
    for project in projects {
        println!("{}  {}  {}", project.id, project.name, project.path.display());
    }
    Ok(())
}
