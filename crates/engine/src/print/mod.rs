// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Print-session executor: one-shot agent runs with a typed output
//! trace.
//!
//! At most one running print session per worktree, enforced by the
//! in-memory running-task map; attempts while a task is running return
//! a conflict carrying the existing session id and start time.

mod parser;

pub use parser::StreamParser;

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use orchard_core::print::{EXIT_INTERRUPTED, EXIT_INTERRUPTED_HANDLED, EXIT_ORPHANED};
use orchard_core::{
    epoch_ms_now, PrintSession, PrintSessionId, PrintSessionStatus, Project, Worktree, WorktreeId,
};
use orchard_storage::ProjectDb;

use crate::error::EngineError;
use crate::git::run_git;
use crate::worktree::write_agent_manifests;

/// Fixed preamble prepended to every task prompt.
pub const PROMPT_PREAMBLE: &str = "You are working in a dedicated git worktree. \
Commit your work often with clear messages. \
When you have finished the task, call the report_completion tool with a short summary.";

/// Default agent invocation; `{prompt}` is replaced with the full
/// prompt. Overridable for tests and non-default agent binaries.
pub const DEFAULT_AGENT_ARGV: &[&str] = &[
    "claude",
    "-p",
    "{prompt}",
    "--output-format",
    "stream-json",
    "--verbose",
];

/// Entry in the running-task map.
#[derive(Debug, Clone, Copy)]
pub struct RunningTask {
    pub session_id: PrintSessionId,
    pub started_at_ms: u64,
}

pub struct PrintExecutor {
    db: ProjectDb,
    project: Project,
    agent_argv: Vec<String>,
    running: Arc<Mutex<HashMap<WorktreeId, RunningTask>>>,
}

impl PrintExecutor {
    pub fn new(db: ProjectDb, project: Project) -> Self {
        Self {
            db,
            project,
            agent_argv: DEFAULT_AGENT_ARGV.iter().map(|s| s.to_string()).collect(),
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Replace the agent argv (tests point this at a stub script).
    pub fn with_agent_argv(mut self, argv: Vec<String>) -> Self {
        self.agent_argv = argv;
        self
    }

    pub fn running_task(&self, worktree_id: &WorktreeId) -> Option<RunningTask> {
        self.running.lock().get(worktree_id).copied()
    }

    /// Spawn a one-shot agent run in the worktree.
    ///
    /// The returned session is already persisted with status `running`;
    /// output streams into `terminal_output` as the process runs, and
    /// completion/merge-queue bookkeeping happens when it exits.
    pub async fn start(
        &self,
        worktree: &Worktree,
        task: &str,
        default_branch: &str,
    ) -> Result<PrintSession, EngineError> {
        let session = PrintSession {
            id: PrintSessionId::new(),
            worktree_id: worktree.id,
            project_id: self.project.id,
            task: task.to_string(),
            status: PrintSessionStatus::Running,
            exit_code: None,
            started_at_ms: epoch_ms_now(),
            completed_at_ms: None,
        };

        // Reserve the worktree atomically; concurrent starts race on
        // this one lock acquisition.
        {
            let mut running = self.running.lock();
            if let Some(existing) = running.get(&worktree.id) {
                return Err(EngineError::TaskAlreadyRunning {
                    session_id: existing.session_id,
                    started_at_ms: existing.started_at_ms,
                });
            }
            running.insert(
                worktree.id,
                RunningTask {
                    session_id: session.id,
                    started_at_ms: session.started_at_ms,
                },
            );
        }

        let mut child = match self.prepare_and_spawn(worktree, task, &session) {
            Ok(child) => child,
            Err(e) => {
                self.running.lock().remove(&worktree.id);
                return Err(e);
            }
        };
        info!(session_id = %session.id, worktree_id = %worktree.id, "print session started");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let db = self.db.clone();
        let running = Arc::clone(&self.running);
        let session_id = session.id;
        let worktree_id = worktree.id;
        let worktree_path = worktree.path.clone();
        let branch = worktree.branch.clone();
        let default_branch = default_branch.to_string();

        tokio::spawn(async move {
            let stderr_task = stderr.map(|stderr| {
                let db = db.clone();
                tokio::spawn(async move {
                    let mut stderr = stderr;
                    let mut buf = [0u8; 8192];
                    loop {
                        match stderr.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => {
                                let text = String::from_utf8_lossy(&buf[..n]);
                                let chunk = format!("[stderr] {}", text);
                                if let Err(e) = db.append_terminal_chunk(&session_id, &chunk) {
                                    warn!(error = %e, "stderr chunk append failed");
                                }
                            }
                        }
                    }
                })
            });

            let mut parser = StreamParser::new();
            if let Some(mut stdout) = stdout {
                let mut buf = [0u8; 8192];
                loop {
                    match stdout.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let text = String::from_utf8_lossy(&buf[..n]);
                            for chunk in parser.feed(&text) {
                                if let Err(e) = db.append_terminal_chunk(&session_id, &chunk) {
                                    warn!(error = %e, "chunk append failed");
                                }
                            }
                        }
                    }
                }
            }
            for chunk in parser.finish() {
                if let Err(e) = db.append_terminal_chunk(&session_id, &chunk) {
                    warn!(error = %e, "chunk append failed");
                }
            }
            if let Some(task) = stderr_task {
                let _ = task.await;
            }

            let exit_code = match child.wait().await {
                Ok(status) => status.code().unwrap_or(EXIT_INTERRUPTED),
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "wait failed");
                    EXIT_INTERRUPTED
                }
            };

            if let Err(e) = db.finish_print_session(&session_id, exit_code) {
                warn!(session_id = %session_id, error = %e, "finish failed");
            }
            info!(session_id = %session_id, exit_code, "print session finished");

            if exit_code == 0 {
                match has_commits_since_base(&worktree_path, &default_branch).await {
                    Ok(true) => {
                        if let Err(e) =
                            db.upsert_merge_queue_entry(&worktree_id, &branch, "", true)
                        {
                            warn!(worktree_id = %worktree_id, error = %e, "merge enqueue failed");
                        } else {
                            info!(worktree_id = %worktree_id, branch = %branch, "queued for merge");
                        }
                    }
                    Ok(false) => {}
                    Err(e) => warn!(worktree_id = %worktree_id, error = %e, "commit probe failed"),
                }
            }

            running.lock().remove(&worktree_id);
        });

        Ok(session)
    }

    /// Manifest, session row, prompt marker, and the agent process.
    fn prepare_and_spawn(
        &self,
        worktree: &Worktree,
        task: &str,
        session: &PrintSession,
    ) -> Result<tokio::process::Child, EngineError> {
        write_agent_manifests(&self.project.path, &worktree.path, &worktree.id)?;

        self.db.insert_print_session(session)?;
        // Prompt marker first, so the task is recoverable from the
        // chunk stream alone.
        self.db
            .append_terminal_chunk(&session.id, &format!("@@PROMPT@@\n{}\n@@END@@\n", task))?;

        let prompt = format!("{}\n\n{}", PROMPT_PREAMBLE, task);
        let argv: Vec<String> = self
            .agent_argv
            .iter()
            .map(|arg| arg.replace("{prompt}", &prompt))
            .collect();
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| EngineError::Validation("empty agent argv".to_string()))?;

        Ok(tokio::process::Command::new(program)
            .args(args)
            .current_dir(&worktree.path)
            .env("WORKTREE_ID", worktree.id.as_str())
            .env("TERM", "dumb")
            .env("NO_COLOR", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?)
    }

    /// Startup scan for sessions interrupted by a previous process
    /// death. Returns resume candidates.
    ///
    /// - running rows on archived worktrees → exit `-3`, failed
    /// - other running rows → exit `-1` (interrupted)
    /// - `-1` rows superseded by a newer completed session on the main
    ///   worktree → exit `-2` (interrupted-handled)
    pub fn recover_on_startup(
        &self,
        worktrees: &[Worktree],
    ) -> Result<Vec<PrintSession>, EngineError> {
        let archived: HashMap<WorktreeId, bool> =
            worktrees.iter().map(|w| (w.id, w.archived)).collect();
        let main_worktree = worktrees.iter().find(|w| w.is_main);

        for session in self
            .db
            .list_print_sessions_by_status(PrintSessionStatus::Running)?
        {
            let code = if archived.get(&session.worktree_id).copied().unwrap_or(false) {
                EXIT_ORPHANED
            } else {
                EXIT_INTERRUPTED
            };
            self.db.mark_print_session_interrupted(&session.id, code)?;
        }

        let newest_main_completion = main_worktree
            .map(|main| {
                self.db
                    .list_print_sessions_for_worktree(&main.id)
                    .map(|sessions| {
                        sessions
                            .into_iter()
                            .filter(|s| s.status == PrintSessionStatus::Completed)
                            .filter_map(|s| s.completed_at_ms)
                            .max()
                    })
            })
            .transpose()?
            .flatten();

        let mut candidates = Vec::new();
        for session in self
            .db
            .list_print_sessions_by_status(PrintSessionStatus::Failed)?
        {
            if session.exit_code != Some(EXIT_INTERRUPTED) {
                continue;
            }
            let superseded = newest_main_completion
                .map(|ts| ts > session.started_at_ms)
                .unwrap_or(false);
            if superseded {
                self.db
                    .set_print_session_exit_code(&session.id, EXIT_INTERRUPTED_HANDLED)?;
            } else {
                candidates.push(session);
            }
        }
        Ok(candidates)
    }

    pub fn get(&self, id: &PrintSessionId) -> Result<PrintSession, EngineError> {
        Ok(self.db.get_print_session(id)?)
    }

    /// Wait until no task is running for the worktree (tests and
    /// shutdown paths).
    pub async fn wait_idle(&self, worktree_id: &WorktreeId) {
        while self.running_task(worktree_id).is_some() {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
    }
}

/// `git log <default>..HEAD --oneline` non-empty?
async fn has_commits_since_base(
    worktree_path: &std::path::Path,
    default_branch: &str,
) -> Result<bool, EngineError> {
    let range = format!("{}..HEAD", default_branch);
    let output = run_git(worktree_path, &["log", &range, "--oneline"]).await?;
    Ok(!output.trim().is_empty())
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
