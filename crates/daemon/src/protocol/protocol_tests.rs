// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn test_request_wire_shape() {
    let frame = json!({
        "type": "session:create",
        "requestId": "req-1",
        "worktreeId": "wt-a",
        "projectPath": "/repo",
        "cwd": "/repo/.worktrees/feature-x",
        "initialCommand": "claude"
    });
    let request: Request = serde_json::from_value(frame).unwrap();
    match request {
        Request::SessionCreate {
            request_id,
            worktree_id,
            initial_command,
            ..
        } => {
            assert_eq!(request_id, "req-1");
            assert_eq!(worktree_id, "wt-a");
            assert_eq!(initial_command.as_deref(), Some("claude"));
        }
        other => panic!("wrong variant: {:?}", other),
    }
}

#[test]
fn test_input_has_no_request_id() {
    let frame = json!({
        "type": "terminal:input",
        "sessionId": "ses-x",
        "data": "ls\r"
    });
    let request: Request = serde_json::from_value(frame).unwrap();
    assert!(matches!(request, Request::Input { .. }));
}

#[test]
fn test_event_round_trip() {
    let event = Event::TerminalData {
        session_id: SessionId::from_string("ses-x"),
        data: "hello".to_string(),
        seq: 7,
    };
    let value = serde_json::to_value(&event).unwrap();
    assert_eq!(value["type"], "terminal:data");
    assert_eq!(value["sessionId"], "ses-x");
    assert_eq!(value["seq"], 7);

    let back: Event = serde_json::from_value(value).unwrap();
    assert_eq!(back, event);
}

#[test]
fn test_event_type_tags_match_serialisation() {
    let events = [
        Event::TerminalExit {
            session_id: SessionId::from_string("ses-x"),
            exit_code: -1,
        },
        Event::AgentReady {
            session_id: SessionId::from_string("ses-x"),
            worktree_id: WorktreeId::from_string("wt-a"),
        },
        Event::SessionError {
            request_id: "req-9".to_string(),
            error: "spawn failed".to_string(),
        },
    ];
    for event in events {
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], event.type_tag());
    }
}

#[test]
fn test_reply_family_exposes_request_id() {
    let reply = Event::SessionDestroyed {
        request_id: "req-3".to_string(),
        session_id: SessionId::from_string("ses-x"),
    };
    assert_eq!(reply.request_id(), Some("req-3"));

    let unsolicited = Event::TerminalExit {
        session_id: SessionId::from_string("ses-x"),
        exit_code: 0,
    };
    assert_eq!(unsolicited.request_id(), None);
}

#[test]
fn test_rate_limited_session_id() {
    let event = Event::AgentRateLimited {
        rate_limit: RateLimitInfo {
            session_id: SessionId::from_string("ses-x"),
            worktree_id: WorktreeId::from_string("wt-a"),
        },
    };
    assert_eq!(event.session_id(), Some(SessionId::from_string("ses-x")));
}
