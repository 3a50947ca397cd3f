// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity log and chat service.
//!
//! Every orchestrator action runs through `execute_action`, which
//! brackets the call with `action` start/complete (or `error`) records
//! sharing one correlation id, so an LLM call, its tool executions, and
//! their results read as one causal group.

use std::future::Future;

use serde_json::{json, Value};
use tracing::{error, info};

use orchard_core::{
    epoch_ms_now, ActivityCategory, ActivityEntry, ActivityType, ChatMessage, ChatSender,
    ChatStatus, MessageId, Project,
};
use orchard_storage::{ActivityFilter, ProjectDb};

use crate::error::EngineError;

pub struct ActivityService {
    db: ProjectDb,
    project: Project,
}

impl ActivityService {
    pub fn new(db: ProjectDb, project: Project) -> Self {
        Self { db, project }
    }

    pub fn new_correlation_id() -> String {
        format!("corr-{}", nanoid::nanoid!(12))
    }

    /// Append one activity record; returns its id.
    pub fn log(
        &self,
        kind: ActivityType,
        category: ActivityCategory,
        summary: &str,
        details: Value,
        correlation_id: Option<&str>,
    ) -> Result<i64, EngineError> {
        info!(
            kind = kind.as_str(),
            category = category.as_str(),
            correlation_id,
            "{}",
            summary
        );
        Ok(self.db.append_activity(
            &self.project.id,
            epoch_ms_now(),
            kind,
            category,
            summary,
            &details,
            correlation_id,
        )?)
    }

    pub fn recent(&self, limit: u32) -> Result<Vec<ActivityEntry>, EngineError> {
        Ok(self.db.recent_activity(&self.project.id, limit)?)
    }

    pub fn query(
        &self,
        filter: &ActivityFilter,
        limit: u32,
    ) -> Result<Vec<ActivityEntry>, EngineError> {
        Ok(self.db.query_activity(&self.project.id, filter, limit)?)
    }

    /// Derived log view: formatted one-line rendering, oldest first.
    pub fn formatted_log(&self, limit: u32) -> Result<Vec<String>, EngineError> {
        Ok(self
            .recent(limit)?
            .iter()
            .map(ActivityEntry::format_line)
            .collect())
    }

    /// Run one orchestrator action bracketed by activity records.
    ///
    /// Pre-logs `action` start, runs `f`, then logs completion with the
    /// captured duration, or an `error` record. No failure escapes
    /// unlogged.
    pub async fn execute_action<F, Fut>(
        &self,
        name: &str,
        params: Value,
        correlation_id: &str,
        f: F,
    ) -> Result<Value, EngineError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, EngineError>>,
    {
        self.log(
            ActivityType::Action,
            ActivityCategory::Orchestrator,
            &format!("{}: start", name),
            json!({ "params": params }),
            Some(correlation_id),
        )?;
        let started = std::time::Instant::now();
        match f().await {
            Ok(result) => {
                self.log(
                    ActivityType::Action,
                    ActivityCategory::Orchestrator,
                    &format!("{}: complete", name),
                    json!({
                        "duration_ms": started.elapsed().as_millis() as u64,
                        "result": result,
                    }),
                    Some(correlation_id),
                )?;
                Ok(result)
            }
            Err(e) => {
                error!(action = name, error = %e, "action failed");
                self.log(
                    ActivityType::Error,
                    ActivityCategory::Orchestrator,
                    &format!("{}: {}", name, e),
                    json!({
                        "duration_ms": started.elapsed().as_millis() as u64,
                        "params": params,
                    }),
                    Some(correlation_id),
                )?;
                Err(e)
            }
        }
    }

    // ---- Chat ----

    /// Record an incoming user message (unread, unprocessed).
    pub fn send_user_message(&self, text: &str) -> Result<ChatMessage, EngineError> {
        let message = ChatMessage {
            id: MessageId::new(),
            project_id: self.project.id,
            timestamp_ms: epoch_ms_now(),
            sender: ChatSender::User,
            text: text.to_string(),
            reply_to: None,
            processed: false,
            status: ChatStatus::Unread,
        };
        self.db.insert_chat_message(&message)?;
        Ok(message)
    }

    /// Record an orchestrator reply; orchestrator messages never enter
    /// the unprocessed queue.
    pub fn send_orchestrator_message(
        &self,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<ChatMessage, EngineError> {
        let message = ChatMessage {
            id: MessageId::new(),
            project_id: self.project.id,
            timestamp_ms: epoch_ms_now(),
            sender: ChatSender::Orchestrator,
            text: text.to_string(),
            reply_to,
            processed: true,
            status: ChatStatus::Unread,
        };
        self.db.insert_chat_message(&message)?;
        if let Some(original) = reply_to {
            // Replying resolves the question it answers; a backwards
            // transition here just means it was already resolved.
            if let Err(e) = self.db.set_chat_message_status(&original, ChatStatus::Resolved) {
                tracing::debug!(message_id = %original, error = %e, "status advance skipped");
            }
        }
        Ok(message)
    }

    /// User messages the orchestrator has not consumed yet.
    pub fn pending_user_messages(&self) -> Result<Vec<ChatMessage>, EngineError> {
        Ok(self.db.unprocessed_user_messages(&self.project.id)?)
    }

    /// Consume pending messages: mark processed and advance to `read`.
    pub fn consume_messages(&self, messages: &[ChatMessage]) -> Result<(), EngineError> {
        for message in messages {
            self.db.mark_chat_message_processed(&message.id)?;
            self.db.set_chat_message_status(&message.id, ChatStatus::Read)?;
        }
        Ok(())
    }

    pub fn set_message_status(
        &self,
        id: &MessageId,
        status: ChatStatus,
    ) -> Result<(), EngineError> {
        Ok(self.db.set_chat_message_status(id, status)?)
    }

    pub fn recent_messages(&self, limit: u32) -> Result<Vec<ChatMessage>, EngineError> {
        Ok(self.db.list_chat_messages(&self.project.id, limit)?)
    }
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
