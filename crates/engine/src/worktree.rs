// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worktree manager: deterministic identity and lifecycle for git
//! worktrees.
//!
//! IDs are derived from `(project_id, path)` with SHA-256, so every
//! persisted reference survives a process restart. `merged` is computed
//! here during load, never trusted from a stale row.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::{debug, warn};

use orchard_core::{
    clock::parse_iso_ms, epoch_ms_now, GitStatus, Project, Worktree, WorktreeId, WorktreeMode,
};
use orchard_storage::ProjectDb;

use crate::error::EngineError;
use crate::git::{git_succeeds, run_git};

/// Options for [`WorktreeManager::create_worktree`].
#[derive(Debug, Default, Clone)]
pub struct CreateWorktreeOptions {
    /// Create the branch (`git worktree add -b`).
    pub new_branch: bool,
    /// Start point for a new branch.
    pub base_branch: Option<String>,
    pub mode: Option<WorktreeMode>,
}

pub struct WorktreeManager {
    db: ProjectDb,
    project: Project,
}

/// Branch name for an orchestrator-created worktree:
/// `feature/<lower(name) with [^a-z0-9-] -> "-">`.
pub fn branch_name_for(name: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("feature/{}", slug)
}

impl WorktreeManager {
    pub fn new(db: ProjectDb, project: Project) -> Self {
        Self { db, project }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Where a worktree for `branch` lives. In-place projects (a normal
    /// git checkout) nest worktrees under `.worktrees/` with `/` in the
    /// branch name flattened to `-`; bare layouts get `<project>/<branch>`.
    pub fn worktree_path_for(&self, branch: &str) -> PathBuf {
        if self.project.path.join(".git").exists() {
            self.project
                .path
                .join(".worktrees")
                .join(branch.replace('/', "-"))
        } else {
            self.project.path.join(branch)
        }
    }

    /// Create a git worktree, write its agent manifests, and persist
    /// the record. Fails fast on a path collision.
    pub async fn create_worktree(
        &self,
        branch: &str,
        opts: CreateWorktreeOptions,
    ) -> Result<Worktree, EngineError> {
        let path = self.worktree_path_for(branch);
        if path.exists() {
            return Err(EngineError::Conflict(format!(
                "worktree path already exists: {}",
                path.display()
            )));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let path_str = path.display().to_string();
        let mut args: Vec<&str> = vec!["worktree", "add"];
        if opts.new_branch {
            args.push("-b");
            args.push(branch);
        }
        args.push(&path_str);
        if opts.new_branch {
            if let Some(ref base) = opts.base_branch {
                args.push(base);
            }
        } else {
            args.push(branch);
        }
        run_git(&self.project.path, &args).await?;

        let id = WorktreeId::derive(&self.project.id, &path);
        write_agent_manifests(&self.project.path, &path, &id)?;

        let worktree = Worktree {
            id,
            project_id: self.project.id,
            path,
            branch: branch.to_string(),
            is_main: false,
            merged: false,
            archived: false,
            mode: opts.mode,
            status: GitStatus::default(),
            last_commit_ms: None,
            created_at_ms: epoch_ms_now(),
        };
        self.db.upsert_worktree(&worktree)?;
        Ok(worktree)
    }

    /// Shell out to `git worktree list --porcelain` and sync every
    /// worktree's record: status, merged-detection (under the full
    /// guard), commit timestamps, and the `.mcp.json` worktree id.
    ///
    /// `active_sessions` is the set of worktrees with a live terminal
    /// session; a worktree with one is never considered merged.
    pub async fn load_worktrees(
        &self,
        active_sessions: &HashSet<WorktreeId>,
    ) -> Result<Vec<Worktree>, EngineError> {
        let porcelain = run_git(&self.project.path, &["worktree", "list", "--porcelain"]).await?;
        let entries = parse_worktree_list(&porcelain);
        let default_branch = self.default_branch().await;

        let mut worktrees = Vec::new();
        let main_path = self
            .project
            .path
            .canonicalize()
            .unwrap_or_else(|_| self.project.path.clone());
        for entry in entries {
            let id = WorktreeId::derive(&self.project.id, &entry.path);
            let is_main = entry.path == self.project.path
                || entry.path.canonicalize().map(|p| p == main_path).unwrap_or(false);
            let existing = self.db.get_worktree(&id).ok();

            let status = self
                .git_status(&entry.path, &default_branch, is_main)
                .await
                .unwrap_or_else(|e| {
                    debug!(path = %entry.path.display(), error = %e, "status probe failed");
                    GitStatus::default()
                });

            let merged = if !is_main
                && status.is_clean()
                && status.ahead == 0
                && !active_sessions.contains(&id)
            {
                git_succeeds(
                    &self.project.path,
                    &["merge-base", "--is-ancestor", &entry.branch, &default_branch],
                )
                .await
                .unwrap_or(false)
            } else {
                false
            };

            let last_commit_ms = self.last_commit_ms(&entry.path).await;
            let created_at_ms = if is_main {
                existing
                    .as_ref()
                    .map(|w| w.created_at_ms)
                    .or(last_commit_ms)
                    .unwrap_or_else(epoch_ms_now)
            } else {
                self.branch_created_ms(&entry.path, &default_branch)
                    .await
                    .or(last_commit_ms)
                    .unwrap_or_else(epoch_ms_now)
            };

            if !is_main {
                sync_manifest_worktree_id(&entry.path, &id);
            }

            let worktree = Worktree {
                id,
                project_id: self.project.id,
                path: entry.path,
                branch: entry.branch,
                is_main,
                merged,
                archived: existing.as_ref().map(|w| w.archived).unwrap_or(false),
                mode: existing.as_ref().and_then(|w| w.mode),
                status,
                last_commit_ms,
                created_at_ms,
            };
            self.db.upsert_worktree(&worktree)?;
            worktrees.push(worktree);
        }
        Ok(worktrees)
    }

    pub fn get(&self, id: &WorktreeId) -> Result<Worktree, EngineError> {
        Ok(self.db.get_worktree(id)?)
    }

    pub fn list(&self) -> Result<Vec<Worktree>, EngineError> {
        Ok(self.db.list_worktrees(&self.project.id)?)
    }

    /// Flip `archived` on. Caller contract: this does not kill the
    /// worktree's sessions; the caller must do that first.
    pub fn archive_worktree(&self, id: &WorktreeId) -> Result<(), EngineError> {
        self.db.set_worktree_archived(id)?;
        Ok(())
    }

    /// Clear `merged` and `archived`.
    pub fn mark_worktree_active(&self, id: &WorktreeId) -> Result<(), EngineError> {
        self.db.mark_worktree_active(id)?;
        Ok(())
    }

    /// Remove the worktree from disk and delete its row. The main
    /// worktree is never deletable.
    pub async fn delete_worktree(&self, id: &WorktreeId, force: bool) -> Result<(), EngineError> {
        let worktree = self.db.get_worktree(id)?;
        if worktree.is_main {
            return Err(EngineError::Validation(
                "cannot delete the main worktree".to_string(),
            ));
        }
        let path_str = worktree.path.display().to_string();
        let mut args: Vec<&str> = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(&path_str);
        run_git(&self.project.path, &args).await?;
        self.db.delete_worktree_row(id)?;
        Ok(())
    }

    /// Default branch, probed in order: remote HEAD, local `main` or
    /// `master`, the current branch, then the literal "main".
    pub async fn default_branch(&self) -> String {
        if let Ok(output) = run_git(&self.project.path, &["remote", "show", "origin"]).await {
            for line in output.lines() {
                if let Some(rest) = line.trim().strip_prefix("HEAD branch:") {
                    let branch = rest.trim();
                    if !branch.is_empty() && branch != "(unknown)" {
                        return branch.to_string();
                    }
                }
            }
        }
        for candidate in ["main", "master"] {
            let reference = format!("refs/heads/{}", candidate);
            if git_succeeds(&self.project.path, &["show-ref", "--verify", "--quiet", &reference])
                .await
                .unwrap_or(false)
            {
                return candidate.to_string();
            }
        }
        if let Ok(current) =
            run_git(&self.project.path, &["rev-parse", "--abbrev-ref", "HEAD"]).await
        {
            let current = current.trim();
            if !current.is_empty() && current != "HEAD" {
                return current.to_string();
            }
        }
        "main".to_string()
    }

    async fn git_status(
        &self,
        path: &Path,
        default_branch: &str,
        is_main: bool,
    ) -> Result<GitStatus, EngineError> {
        let porcelain = run_git(path, &["status", "--porcelain"]).await?;
        let mut status = GitStatus::default();
        for line in porcelain.lines() {
            let mut chars = line.chars();
            let x = chars.next().unwrap_or(' ');
            let y = chars.next().unwrap_or(' ');
            // Manager-written infrastructure files don't count as work.
            let entry_path = line.get(3..).unwrap_or("").trim();
            if entry_path == ".mcp.json" || entry_path.starts_with(".claude/") {
                continue;
            }
            if x == '?' && y == '?' {
                status.untracked += 1;
                continue;
            }
            if x != ' ' {
                status.staged += 1;
            }
            if y != ' ' {
                status.modified += 1;
            }
        }

        if !is_main {
            let range = format!("{}...HEAD", default_branch);
            if let Ok(counts) =
                run_git(path, &["rev-list", "--left-right", "--count", &range]).await
            {
                let mut parts = counts.split_whitespace();
                status.behind = parts.next().and_then(|n| n.parse().ok()).unwrap_or(0);
                status.ahead = parts.next().and_then(|n| n.parse().ok()).unwrap_or(0);
            }
        }
        Ok(status)
    }

    async fn last_commit_ms(&self, path: &Path) -> Option<u64> {
        let output = run_git(path, &["log", "-1", "--format=%cI"]).await.ok()?;
        parse_iso_ms(output.trim())
    }

    /// Timestamp of the first commit unique to the branch vs the
    /// default branch.
    async fn branch_created_ms(&self, path: &Path, default_branch: &str) -> Option<u64> {
        let range = format!("{}..HEAD", default_branch);
        let output = run_git(path, &["log", &range, "--format=%cI"]).await.ok()?;
        output.lines().last().and_then(parse_iso_ms)
    }
}

struct WorktreeListEntry {
    path: PathBuf,
    branch: String,
}

/// Parse `git worktree list --porcelain` blocks.
fn parse_worktree_list(porcelain: &str) -> Vec<WorktreeListEntry> {
    let mut entries = Vec::new();
    let mut path: Option<PathBuf> = None;
    let mut branch = String::new();

    for line in porcelain.lines().chain(std::iter::once("")) {
        if line.is_empty() {
            if let Some(path) = path.take() {
                entries.push(WorktreeListEntry {
                    path,
                    branch: std::mem::take(&mut branch),
                });
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("worktree ") {
            path = Some(PathBuf::from(rest));
        } else if let Some(rest) = line.strip_prefix("branch ") {
            branch = rest
                .strip_prefix("refs/heads/")
                .unwrap_or(rest)
                .to_string();
        } else if line == "detached" {
            branch = "HEAD".to_string();
        }
    }
    entries
}

/// Write the worktree-local permission manifest and tool-server
/// manifest that agents read on startup.
pub(crate) fn write_agent_manifests(
    project_path: &Path,
    worktree_path: &Path,
    worktree_id: &WorktreeId,
) -> Result<(), EngineError> {
    let claude_dir = worktree_path.join(".claude");
    std::fs::create_dir_all(&claude_dir)?;

    let mut allow = Vec::new();
    let mut scopes = vec![project_path];
    if !worktree_path.starts_with(project_path) {
        scopes.push(worktree_path);
    }
    for scope in scopes {
        for tool in ["Bash", "Read", "Write", "Edit"] {
            allow.push(format!("{}({}/**)", tool, scope.display()));
        }
    }
    let settings = json!({
        "permissions": { "allow": allow },
        "trust": true,
    });
    std::fs::write(
        claude_dir.join("settings.local.json"),
        serde_json::to_string_pretty(&settings).unwrap_or_default(),
    )?;

    std::fs::write(
        worktree_path.join(".mcp.json"),
        serde_json::to_string_pretty(&agent_manifest(worktree_id)).unwrap_or_default(),
    )?;
    Ok(())
}

/// Tool-server manifest advertising the five agent-side tools.
pub(crate) fn agent_manifest(worktree_id: &WorktreeId) -> serde_json::Value {
    json!({
        "mcpServers": {
            "orchard-agent": {
                "command": "orchard",
                "args": ["tool-server"],
                "env": { "WORKTREE_ID": worktree_id.as_str() },
                "tools": [
                    "report_completion",
                    "log_activity",
                    "report_progress",
                    "report_error",
                    "ask_question",
                ],
            }
        }
    })
}

/// Rewrite `.mcp.json` only when its `WORKTREE_ID` differs from the
/// freshly computed id (paths moved, or the file predates this layout).
fn sync_manifest_worktree_id(worktree_path: &Path, worktree_id: &WorktreeId) {
    let manifest_path = worktree_path.join(".mcp.json");
    let current = std::fs::read_to_string(&manifest_path)
        .ok()
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
        .and_then(|value| {
            value["mcpServers"]["orchard-agent"]["env"]["WORKTREE_ID"]
                .as_str()
                .map(str::to_string)
        });
    if current.as_deref() == Some(worktree_id.as_str()) {
        return;
    }
    if let Err(e) = std::fs::write(
        &manifest_path,
        serde_json::to_string_pretty(&agent_manifest(worktree_id)).unwrap_or_default(),
    ) {
        warn!(path = %manifest_path.display(), error = %e, "manifest sync failed");
    }
}

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;
