// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator loop.
//!
//! A periodic tick builds a context snapshot, makes one LLM call with
//! the fixed tool set, and dispatches the requested tool calls through
//! the activity service. Ticks are single-flight: an in-flight tick
//! suppresses the next one rather than queueing behind it, and no
//! failure escapes the loop; errors become activity records.

pub mod context;
pub mod llm;
pub mod tools;

pub use context::{ContextSnapshot, SYSTEM_PROMPT};
pub use llm::{HttpLlmClient, LlmClient, LlmRequest, LlmResponse, RequestedToolCall};
pub use tools::{tool_definitions, ToolCall};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use orchard_client::DaemonClient;
use orchard_core::{
    ActivityCategory, ActivityType, ChatStatus, OrchestratorConfig, PatternType, Project,
};
use orchard_storage::{ActivityFilter, ProjectDb};

use crate::activity::ActivityService;
use crate::error::EngineError;
use crate::merge::MergeService;
use crate::monitor::TerminalMonitor;
use crate::print::PrintExecutor;
use crate::registry::SessionRegistry;
use crate::worktree::{branch_name_for, CreateWorktreeOptions, WorktreeManager};

const LLM_MAX_TOKENS: u32 = 4096;
/// Default nudge typed into an agent's terminal.
const DEFAULT_NUDGE: &str = "Please give a brief status update on your current task.";

/// Everything the orchestrator composes over, injected by the process
/// entry point.
pub struct OrchestratorDeps {
    pub project: Project,
    pub db: ProjectDb,
    pub activity: ActivityService,
    pub worktrees: WorktreeManager,
    pub registry: SessionRegistry,
    pub executor: PrintExecutor,
    pub merge: MergeService,
    pub monitor: Arc<TerminalMonitor>,
    pub client: Arc<DaemonClient>,
    pub llm: Arc<dyn LlmClient>,
    pub config: OrchestratorConfig,
}

pub struct Orchestrator {
    project: Project,
    db: ProjectDb,
    activity: ActivityService,
    worktrees: WorktreeManager,
    registry: SessionRegistry,
    executor: PrintExecutor,
    merge: MergeService,
    monitor: Arc<TerminalMonitor>,
    client: Arc<DaemonClient>,
    llm: Arc<dyn LlmClient>,
    config: Mutex<OrchestratorConfig>,
    paused: AtomicBool,
    in_flight: AtomicBool,
    shutdown: CancellationToken,
}

/// Partial config update; `None` fields keep their current value.
#[derive(Debug, Default, Clone)]
pub struct ConfigPatch {
    pub model: Option<String>,
    pub tick_interval_ms: Option<u64>,
    pub enabled: Option<bool>,
}

impl Orchestrator {
    pub fn new(deps: OrchestratorDeps) -> Arc<Self> {
        Arc::new(Self {
            project: deps.project,
            db: deps.db,
            activity: deps.activity,
            worktrees: deps.worktrees,
            registry: deps.registry,
            executor: deps.executor,
            merge: deps.merge,
            monitor: deps.monitor,
            client: deps.client,
            llm: deps.llm,
            config: Mutex::new(deps.config),
            paused: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Hot-reloadable configuration.
    pub fn update_config(&self, patch: ConfigPatch) {
        let mut config = self.config.lock();
        if let Some(model) = patch.model {
            config.model = model;
        }
        if let Some(interval) = patch.tick_interval_ms {
            config.tick_interval_ms = interval;
        }
        if let Some(enabled) = patch.enabled {
            config.enabled = enabled;
        }
    }

    pub fn config(&self) -> OrchestratorConfig {
        self.config.lock().clone()
    }

    /// Run the tick loop until [`Orchestrator::stop`].
    pub async fn run(self: Arc<Self>) {
        loop {
            let interval = Duration::from_millis(self.config.lock().tick_interval_ms);
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.shutdown.cancelled() => return,
            }
            self.tick().await;
        }
    }

    /// Stop the loop and wait for an in-flight tick to settle.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        while self.in_flight.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// One tick, synchronously (testing and CLI single-step).
    pub async fn manual_tick(&self) {
        self.tick().await;
    }

    async fn tick(&self) {
        if !self.config.lock().enabled || self.paused.load(Ordering::SeqCst) {
            return;
        }
        // Single-flight: overlapping ticks are suppressed.
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("tick suppressed: previous tick still in flight");
            return;
        }
        let result = self.tick_inner().await;
        self.in_flight.store(false, Ordering::SeqCst);
        if let Err(e) = result {
            // Failures become activity records; the loop proceeds.
            warn!(error = %e, "tick failed");
            let _ = self.activity.log(
                ActivityType::Error,
                ActivityCategory::Orchestrator,
                &format!("tick failed: {}", e),
                json!({}),
                None,
            );
        }
    }

    async fn tick_inner(&self) -> Result<(), EngineError> {
        let correlation_id = ActivityService::new_correlation_id();
        let snapshot = self.build_context()?;
        self.activity.log(
            ActivityType::Tick,
            ActivityCategory::Orchestrator,
            "tick",
            json!({
                "pending_messages": snapshot.pending_messages.len(),
                "sessions": snapshot.sessions.len(),
                "merge_queue": snapshot.merge_queue_len,
            }),
            Some(&correlation_id),
        )?;

        let model = self.config.lock().model.clone();
        let request = LlmRequest {
            model: model.clone(),
            system: SYSTEM_PROMPT.to_string(),
            user_message: snapshot.render(),
            tools: tool_definitions(),
            max_tokens: LLM_MAX_TOKENS,
        };
        self.activity.log(
            ActivityType::LlmRequest,
            ActivityCategory::Orchestrator,
            &format!("llm request ({})", model),
            json!({ "context_bytes": request.user_message.len() }),
            Some(&correlation_id),
        )?;

        let response = self.llm.complete(request).await?;

        for requested in &response.tool_calls {
            let call = match ToolCall::parse(&requested.name, &requested.input) {
                Ok(call) => call,
                Err(e) => {
                    self.activity.log(
                        ActivityType::Error,
                        ActivityCategory::Orchestrator,
                        &format!("bad tool call {}: {}", requested.name, e),
                        json!({ "input": requested.input }),
                        Some(&correlation_id),
                    )?;
                    continue;
                }
            };
            // Individual failures are logged by execute_action and do
            // not stop the remaining calls.
            let _ = self
                .activity
                .execute_action(call.name(), requested.input.clone(), &correlation_id, || {
                    self.execute_tool(call.clone())
                })
                .await;
        }

        self.activity.log(
            ActivityType::LlmResponse,
            ActivityCategory::Orchestrator,
            &format!(
                "llm response: {} tool calls, stop {}",
                response.tool_calls.len(),
                response.stop_reason.as_deref().unwrap_or("unknown")
            ),
            json!({
                "usage": {
                    "input_tokens": response.usage.input_tokens,
                    "output_tokens": response.usage.output_tokens,
                },
                "text": response.text,
            }),
            Some(&correlation_id),
        )?;
        Ok(())
    }

    fn build_context(&self) -> Result<ContextSnapshot, EngineError> {
        let queue = self.merge.queue()?;
        Ok(ContextSnapshot {
            project_name: self.project.name.clone(),
            project_id: self.project.id.to_string(),
            pending_messages: self.activity.pending_user_messages()?,
            sessions: self
                .registry
                .list()?
                .into_iter()
                .filter(|s| s.status.is_live())
                .collect(),
            worktrees: self.worktrees.list()?,
            merge_queue_len: queue.len(),
            merge_queue_head: queue.into_iter().next(),
            recent_patterns: self.db.recent_patterns(&self.project.id, 10)?,
            recent_decisions: self.activity.query(
                &ActivityFilter {
                    kind: Some(ActivityType::Decision),
                    ..Default::default()
                },
                10,
            )?,
        })
    }

    async fn execute_tool(&self, call: ToolCall) -> Result<Value, EngineError> {
        match call {
            ToolCall::CreateWorktree {
                name,
                task,
                start_agent,
                ..
            } => {
                let branch = branch_name_for(&name);
                let worktree = self
                    .worktrees
                    .create_worktree(
                        &branch,
                        CreateWorktreeOptions {
                            new_branch: true,
                            base_branch: None,
                            mode: None,
                        },
                    )
                    .await?;
                if start_agent {
                    self.registry
                        .register_session(worktree.id, &worktree.path, "claude", None)
                        .await?;
                }
                if let Some(task) = task {
                    let default_branch = self.worktrees.default_branch().await;
                    self.executor.start(&worktree, &task, &default_branch).await?;
                }
                Ok(json!({
                    "worktreeId": worktree.id,
                    "branch": worktree.branch,
                    "path": worktree.path,
                }))
            }

            ToolCall::SendTask {
                worktree_id,
                message,
            } => {
                let worktree = self.worktrees.get(&worktree_id)?;
                if worktree.archived {
                    return Err(EngineError::Validation(format!(
                        "worktree {} is archived",
                        worktree_id
                    )));
                }
                let default_branch = self.worktrees.default_branch().await;
                let session = self.executor.start(&worktree, &message, &default_branch).await?;
                Ok(json!({ "sessionId": session.id }))
            }

            ToolCall::MergeWorktree {
                worktree_id,
                squash,
                delete_after,
                ..
            } => {
                let default_branch = self.worktrees.default_branch().await;
                let entry = self
                    .merge
                    .merge_worktree(&worktree_id, &default_branch, squash)
                    .await?;
                if delete_after {
                    self.worktrees.delete_worktree(&worktree_id, true).await?;
                }
                Ok(json!({ "branch": entry.branch, "merged": true }))
            }

            ToolCall::ArchiveWorktree {
                worktree_id,
                delete_files,
            } => {
                // Sessions die first; archive does not do it for us.
                match self.registry.unregister_session(&worktree_id).await {
                    Ok(()) => {}
                    Err(EngineError::NotFound(_)) => {}
                    Err(e) => return Err(e),
                }
                self.worktrees.archive_worktree(&worktree_id)?;
                if delete_files {
                    self.worktrees.delete_worktree(&worktree_id, true).await?;
                }
                Ok(json!({ "archived": true }))
            }

            ToolCall::SendMessage {
                message, reply_to, ..
            } => {
                let sent = self.activity.send_orchestrator_message(&message, reply_to)?;
                Ok(json!({ "messageId": sent.id }))
            }

            ToolCall::NudgeAgent {
                worktree_id,
                message,
            } => {
                let session = self
                    .registry
                    .get_for_worktree(&worktree_id)?
                    .filter(|s| s.status.is_live())
                    .ok_or_else(|| {
                        EngineError::NotFound(format!("no live session for {}", worktree_id))
                    })?;
                let text = message.unwrap_or_else(|| DEFAULT_NUDGE.to_string());
                self.client.send_input(session.id, &format!("{}\r", text));
                Ok(json!({ "sessionId": session.id }))
            }

            ToolCall::CheckStatus { worktree_id, .. } => {
                let worktrees = self.worktrees.list()?;
                let sessions = self.registry.list()?;
                let queue = self.merge.queue()?;
                let filtered: Vec<_> = worktrees
                    .iter()
                    .filter(|w| worktree_id.map(|id| w.id == id).unwrap_or(true))
                    .collect();
                Ok(json!({
                    "worktrees": filtered,
                    "sessions": sessions,
                    "mergeQueue": queue,
                }))
            }

            ToolCall::RespondToQuestion {
                worktree_id,
                response,
            } => {
                let session = self
                    .registry
                    .get_for_worktree(&worktree_id)?
                    .filter(|s| s.status.is_live())
                    .ok_or_else(|| {
                        EngineError::NotFound(format!("no live session for {}", worktree_id))
                    })?;
                self.client.send_input(session.id, &format!("{}\r", response));

                // The question is answered; mark its detections handled.
                for pattern in self.db.unhandled_patterns(&self.project.id)? {
                    if pattern.worktree_id == worktree_id
                        && pattern.pattern_type == PatternType::Question
                    {
                        self.monitor.mark_handled(&pattern.id)?;
                    }
                }
                Ok(json!({ "sessionId": session.id }))
            }

            ToolCall::LogActivity {
                summary,
                category,
                details,
            } => {
                let category =
                    ActivityCategory::parse(&category).unwrap_or(ActivityCategory::Orchestrator);
                let id = self.activity.log(
                    ActivityType::Decision,
                    category,
                    &summary,
                    details.unwrap_or_else(|| json!({})),
                    None,
                )?;
                Ok(json!({ "activityId": id }))
            }

            ToolCall::GetPendingMessages => {
                let pending = self.activity.pending_user_messages()?;
                self.activity.consume_messages(&pending)?;
                for message in &pending {
                    // Consumed messages move to `working` while the
                    // orchestrator acts on them.
                    let _ = self
                        .activity
                        .set_message_status(&message.id, ChatStatus::Working);
                }
                Ok(json!({
                    "messages": pending
                        .iter()
                        .map(|m| json!({ "id": m.id, "text": m.text, "timestamp": m.timestamp_ms }))
                        .collect::<Vec<_>>()
                }))
            }
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
