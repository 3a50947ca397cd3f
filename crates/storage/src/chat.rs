// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat message rows.

use rusqlite::{params, OptionalExtension};

use orchard_core::{ChatMessage, ChatSender, ChatStatus, MessageId, ProjectId};

use crate::{ProjectDb, Result, StorageError};

impl ProjectDb {
    pub fn insert_chat_message(&self, message: &ChatMessage) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO chat_messages
                 (id, project_id, timestamp, sender, text, reply_to, processed, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                message.id.as_str(),
                message.project_id.as_str(),
                message.timestamp_ms as i64,
                message.sender.as_str(),
                message.text,
                message.reply_to.as_ref().map(|id| id.as_str().to_string()),
                message.processed,
                message.status.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn get_chat_message(&self, id: &MessageId) -> Result<ChatMessage> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("{} WHERE id = ?1", SELECT_MESSAGE),
            params![id.as_str()],
            row_to_message,
        )
        .optional()?
        .ok_or_else(|| StorageError::NotFound(format!("message {}", id)))
    }

    pub fn list_chat_messages(&self, project_id: &ProjectId, limit: u32) -> Result<Vec<ChatMessage>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE project_id = ?1 ORDER BY timestamp DESC LIMIT ?2",
            SELECT_MESSAGE
        ))?;
        let rows = stmt.query_map(params![project_id.as_str(), limit], row_to_message)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        out.reverse();
        Ok(out)
    }

    /// User messages the orchestrator has not consumed yet, oldest first.
    pub fn unprocessed_user_messages(&self, project_id: &ProjectId) -> Result<Vec<ChatMessage>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE project_id = ?1 AND sender = 'user' AND processed = 0
             ORDER BY timestamp ASC",
            SELECT_MESSAGE
        ))?;
        let rows = stmt.query_map(params![project_id.as_str()], row_to_message)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Idempotent: marking an already-processed message is a no-op.
    pub fn mark_chat_message_processed(&self, id: &MessageId) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE chat_messages SET processed = 1 WHERE id = ?1",
            params![id.as_str()],
        )?;
        Ok(())
    }

    /// Advance a message's status. Backwards transitions are rejected
    /// before touching the row.
    pub fn set_chat_message_status(&self, id: &MessageId, status: ChatStatus) -> Result<()> {
        let current = self.get_chat_message(id)?;
        if !current.status.can_transition_to(status) {
            return Err(StorageError::InvalidTransition(format!(
                "message {} cannot move {} -> {}",
                id, current.status, status
            )));
        }
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE chat_messages SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id.as_str()],
        )?;
        Ok(())
    }
}

const SELECT_MESSAGE: &str = "SELECT id, project_id, timestamp, sender, text, reply_to, processed, status \
     FROM chat_messages";

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMessage> {
    let sender_str: String = row.get(3)?;
    let status_str: String = row.get(7)?;
    Ok(ChatMessage {
        id: MessageId::from_string(row.get::<_, String>(0)?),
        project_id: ProjectId::from_string(row.get::<_, String>(1)?),
        timestamp_ms: row.get::<_, i64>(2)? as u64,
        sender: ChatSender::parse(&sender_str).unwrap_or(ChatSender::User),
        text: row.get(4)?,
        reply_to: row.get::<_, Option<String>>(5)?.map(MessageId::from_string),
        processed: row.get(6)?,
        status: ChatStatus::parse(&status_str).unwrap_or(ChatStatus::Unread),
    })
}

#[cfg(test)]
#[path = "chat_tests.rs"]
mod tests;
