// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn monitor() -> TerminalMonitor {
    TerminalMonitor::new(
        ProjectDb::open_in_memory().unwrap(),
        ProjectId::from_string("prj-test"),
    )
}

fn session() -> (SessionId, WorktreeId) {
    (
        SessionId::from_string("ses-mon"),
        WorktreeId::from_string("wt-a"),
    )
}

#[test]
fn test_unmonitored_sessions_are_ignored() {
    let monitor = monitor();
    let (session_id, _) = session();
    assert!(monitor.on_terminal_data(&session_id, "TASK COMPLETE").is_none());
}

#[parameterized(
    task_complete_literal = { "TASK COMPLETE", PatternType::TaskComplete },
    task_complete_underscore = { "task_complete", PatternType::TaskComplete },
    task_complete_phrase = { "I have completed the task", PatternType::TaskComplete },
    question_trailing_mark = { "Should we proceed?\n", PatternType::Question },
    question_phrase = { "Would you like me to continue", PatternType::Question },
    error_fatal = { "fatal: not a git repository", PatternType::Error },
    error_panic = { "panic: index out of bounds", PatternType::Error },
    error_traceback = { "Traceback (most recent call last)", PatternType::Error },
    rate_limit_words = { "You are being rate limited", PatternType::RateLimit },
    rate_limit_code = { "HTTP 429", PatternType::RateLimit },
    ready_prompt = { "How can I help you today", PatternType::Ready },
    ready_chevron = { ">\n", PatternType::Ready },
)]
fn test_rule_table_detection(input: &str, expected: PatternType) {
    let monitor = monitor();
    let (session_id, worktree_id) = session();
    monitor.start_monitoring(session_id, worktree_id);

    let detection = monitor.on_terminal_data(&session_id, input).unwrap();
    assert_eq!(detection.pattern_type, expected);
    assert_eq!(detection.session_id, session_id);
    assert_eq!(detection.worktree_id, worktree_id);
}

#[test]
fn test_first_match_wins_over_later_rules() {
    let monitor = monitor();
    let (session_id, worktree_id) = session();
    monitor.start_monitoring(session_id, worktree_id);

    // Both TASK_COMPLETE and ERROR text in one frame: the rule table
    // order decides.
    let detection = monitor
        .on_terminal_data(&session_id, "error: x\nTASK COMPLETE\n")
        .unwrap();
    assert_eq!(detection.pattern_type, PatternType::TaskComplete);
}

#[test]
fn test_ansi_escapes_are_stripped() {
    let monitor = monitor();
    let (session_id, worktree_id) = session();
    monitor.start_monitoring(session_id, worktree_id);

    let detection = monitor
        .on_terminal_data(&session_id, "\x1b[1;32mTASK\x1b[0m COMPLETE")
        .unwrap();
    assert_eq!(detection.pattern_type, PatternType::TaskComplete);
    assert!(!detection.content.contains('\x1b'));
}

#[test]
fn test_cooldown_suppresses_duplicates() {
    let monitor = monitor();
    let (session_id, worktree_id) = session();
    monitor.start_monitoring(session_id, worktree_id);

    assert!(monitor.on_terminal_data(&session_id, "TASK COMPLETE").is_some());
    // Same signal again within the window: suppressed.
    assert!(monitor.on_terminal_data(&session_id, "TASK COMPLETE").is_none());

    // Age the cooldown past the window; the signal fires again.
    {
        let mut sessions = monitor.sessions.lock();
        let record = sessions.get_mut(&session_id).unwrap();
        record
            .cooldowns
            .insert(PatternType::TaskComplete, epoch_ms_now() - 6_000);
    }
    assert!(monitor.on_terminal_data(&session_id, "TASK COMPLETE").is_some());
}

#[test]
fn test_cooldown_is_per_type() {
    let monitor = monitor();
    let (session_id, worktree_id) = session();
    monitor.start_monitoring(session_id, worktree_id);

    assert!(monitor.on_terminal_data(&session_id, "TASK COMPLETE").is_some());
    // A different pattern type is not suppressed. Use a frame that only
    // matches ERROR (the buffer still holds the TASK COMPLETE text, but
    // TASK_COMPLETE is in cooldown... first-match-wins evaluates
    // TASK_COMPLETE first and suppresses, so no ERROR detection).
    assert!(monitor.on_terminal_data(&session_id, "error: broken").is_none());

    // On a fresh session, ERROR fires straight away.
    let other = SessionId::from_string("ses-other");
    monitor.start_monitoring(other, worktree_id);
    let detection = monitor.on_terminal_data(&other, "error: broken").unwrap();
    assert_eq!(detection.pattern_type, PatternType::Error);
}

#[test]
fn test_detections_are_persisted() {
    let monitor = monitor();
    let (session_id, worktree_id) = session();
    monitor.start_monitoring(session_id, worktree_id);

    let detection = monitor.on_terminal_data(&session_id, "All done!").unwrap();

    let project = ProjectId::from_string("prj-test");
    let stored = monitor.db.recent_patterns(&project, 10).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, detection.id);
    assert!(!stored[0].handled);

    monitor.mark_handled(&detection.id).unwrap();
    assert!(monitor.db.recent_patterns(&project, 10).unwrap()[0].handled);
}

#[test]
fn test_buffer_is_bounded() {
    let monitor = monitor();
    let (session_id, worktree_id) = session();
    monitor.start_monitoring(session_id, worktree_id);

    let noise = "x".repeat(1000);
    for _ in 0..10 {
        let _ = monitor.on_terminal_data(&session_id, &noise);
    }
    let sessions = monitor.sessions.lock();
    assert!(sessions.get(&session_id).unwrap().buffer.len() <= MONITOR_BUFFER_MAX);
}

#[test]
fn test_content_is_capped_at_500() {
    let monitor = monitor();
    let (session_id, worktree_id) = session();
    monitor.start_monitoring(session_id, worktree_id);

    // A very long line ending in '?' matches QUESTION multiline.
    let long_question = format!("{}?\n", "q".repeat(900));
    let detection = monitor.on_terminal_data(&session_id, &long_question).unwrap();
    assert!(detection.content.chars().count() <= 500);
}

#[test]
fn test_bus_receives_detections() {
    let monitor = monitor();
    let (session_id, worktree_id) = session();
    monitor.start_monitoring(session_id, worktree_id);

    let mut rx = monitor.subscribe();
    let detection = monitor.on_terminal_data(&session_id, "Finished!").unwrap();
    let from_bus = rx.try_recv().unwrap();
    assert_eq!(from_bus.id, detection.id);
}

#[test]
fn test_stop_monitoring_drops_state() {
    let monitor = monitor();
    let (session_id, worktree_id) = session();
    monitor.start_monitoring(session_id, worktree_id);
    assert!(monitor.is_monitoring(&session_id));
    monitor.stop_monitoring(&session_id);
    assert!(!monitor.is_monitoring(&session_id));
    assert!(monitor.on_terminal_data(&session_id, "TASK COMPLETE").is_none());
}
