// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use orchard_core::epoch_ms_now;

fn sample(text: &str, sender: ChatSender) -> ChatMessage {
    ChatMessage {
        id: MessageId::new(),
        project_id: ProjectId::from_string("prj-test"),
        timestamp_ms: epoch_ms_now(),
        sender,
        text: text.to_string(),
        reply_to: None,
        processed: false,
        status: ChatStatus::Unread,
    }
}

#[test]
fn test_insert_and_list() {
    let db = ProjectDb::open_in_memory().unwrap();
    let project = ProjectId::from_string("prj-test");
    db.insert_chat_message(&sample("hello", ChatSender::User)).unwrap();
    db.insert_chat_message(&sample("on it", ChatSender::Orchestrator)).unwrap();

    let messages = db.list_chat_messages(&project, 10).unwrap();
    assert_eq!(messages.len(), 2);
}

#[test]
fn test_unprocessed_filters_sender_and_flag() {
    let db = ProjectDb::open_in_memory().unwrap();
    let project = ProjectId::from_string("prj-test");
    let pending = sample("do the thing", ChatSender::User);
    db.insert_chat_message(&pending).unwrap();
    db.insert_chat_message(&sample("ack", ChatSender::Orchestrator)).unwrap();

    let unprocessed = db.unprocessed_user_messages(&project).unwrap();
    assert_eq!(unprocessed.len(), 1);
    assert_eq!(unprocessed[0].id, pending.id);

    db.mark_chat_message_processed(&pending.id).unwrap();
    assert!(db.unprocessed_user_messages(&project).unwrap().is_empty());

    // Idempotent re-mark.
    db.mark_chat_message_processed(&pending.id).unwrap();
}

#[test]
fn test_status_never_moves_backwards() {
    let db = ProjectDb::open_in_memory().unwrap();
    let message = sample("question?", ChatSender::User);
    db.insert_chat_message(&message).unwrap();

    db.set_chat_message_status(&message.id, ChatStatus::Read).unwrap();
    db.set_chat_message_status(&message.id, ChatStatus::Working).unwrap();
    db.set_chat_message_status(&message.id, ChatStatus::Resolved).unwrap();

    assert!(matches!(
        db.set_chat_message_status(&message.id, ChatStatus::Working),
        Err(StorageError::InvalidTransition(_))
    ));
    assert_eq!(
        db.get_chat_message(&message.id).unwrap().status,
        ChatStatus::Resolved
    );
}

#[test]
fn test_reply_to_round_trips() {
    let db = ProjectDb::open_in_memory().unwrap();
    let original = sample("should I merge?", ChatSender::Orchestrator);
    db.insert_chat_message(&original).unwrap();

    let mut reply = sample("yes", ChatSender::User);
    reply.reply_to = Some(original.id);
    db.insert_chat_message(&reply).unwrap();

    let fetched = db.get_chat_message(&reply.id).unwrap();
    assert_eq!(fetched.reply_to, Some(original.id));
}
