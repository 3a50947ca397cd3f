// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide project registry.
//!
//! Owns project identity only: `(id, path, name, created_at, opened_at)`.
//! Everything else belongs to the project's own database.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use orchard_core::{epoch_ms_now, Project, ProjectId};

use crate::{Result, StorageError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    repo_url TEXT,
    created_at INTEGER NOT NULL,
    opened_at INTEGER NOT NULL
);
"#;

#[derive(Clone)]
pub struct ProjectRegistry {
    conn: Arc<Mutex<Connection>>,
}

impl ProjectRegistry {
    /// Open the registry at `$HOME/.orchard/registry.db`.
    pub fn open_default() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "cannot resolve home directory",
            ))
        })?;
        Self::open_at(&home.join(".orchard").join("registry.db"))
    }

    /// Open the registry at an explicit path.
    pub fn open_at(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Register a project, or touch `opened_at` if the path is already
    /// registered. Path uniqueness is the identity anchor: re-registering
    /// an existing path returns the existing project.
    pub fn register(
        &self,
        path: &Path,
        name: &str,
        repo_url: Option<&str>,
    ) -> Result<Project> {
        let now = epoch_ms_now();
        let conn = self.conn.lock();

        if let Some(existing) = Self::lookup_by_path(&conn, path)? {
            conn.execute(
                "UPDATE projects SET opened_at = ?1 WHERE id = ?2",
                params![now, existing.id.as_str()],
            )?;
            return Ok(existing);
        }

        let project = Project {
            id: ProjectId::new(),
            path: path.to_path_buf(),
            name: name.to_string(),
            repo_url: repo_url.map(str::to_string),
            created_at_ms: now,
        };
        conn.execute(
            "INSERT INTO projects (id, path, name, repo_url, created_at, opened_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                project.id.as_str(),
                project.path.display().to_string(),
                project.name,
                project.repo_url,
                now,
            ],
        )?;
        Ok(project)
    }

    pub fn get(&self, id: &ProjectId) -> Result<Project> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, path, name, repo_url, created_at FROM projects WHERE id = ?1",
            params![id.as_str()],
            row_to_project,
        )
        .optional()?
        .ok_or_else(|| StorageError::NotFound(format!("project {}", id)))
    }

    pub fn get_by_path(&self, path: &Path) -> Result<Option<Project>> {
        let conn = self.conn.lock();
        Self::lookup_by_path(&conn, path)
    }

    pub fn list(&self) -> Result<Vec<Project>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, path, name, repo_url, created_at FROM projects ORDER BY created_at",
        )?;
        let rows = stmt.query_map([], row_to_project)?;
        let mut projects = Vec::new();
        for row in rows {
            projects.push(row?);
        }
        Ok(projects)
    }

    /// Record that a project was opened (used by merged-staleness heuristics
    /// and the CLI's "recent projects" ordering).
    pub fn touch_opened(&self, id: &ProjectId) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE projects SET opened_at = ?1 WHERE id = ?2",
            params![epoch_ms_now(), id.as_str()],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("project {}", id)));
        }
        Ok(())
    }

    fn lookup_by_path(conn: &Connection, path: &Path) -> Result<Option<Project>> {
        Ok(conn
            .query_row(
                "SELECT id, path, name, repo_url, created_at FROM projects WHERE path = ?1",
                params![path.display().to_string()],
                row_to_project,
            )
            .optional()?)
    }
}

fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: ProjectId::from_string(row.get::<_, String>(0)?),
        path: PathBuf::from(row.get::<_, String>(1)?),
        name: row.get(2)?,
        repo_url: row.get(3)?,
        created_at_ms: row.get::<_, i64>(4)? as u64,
    })
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
