// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pattern cooldown: identical matches inside the 5-second window
//! collapse into one detection.

use orchard_core::{ProjectId, SessionId, WorktreeId};
use orchard_engine::TerminalMonitor;
use orchard_storage::ProjectDb;

#[test]
fn identical_patterns_within_window_fire_once() {
    let monitor = TerminalMonitor::new(
        ProjectDb::open_in_memory().unwrap(),
        ProjectId::from_string("prj-test"),
    );
    let session_id = SessionId::from_string("ses-s");
    monitor.start_monitoring(session_id, WorktreeId::from_string("wt-a"));

    assert!(monitor.on_terminal_data(&session_id, "TASK COMPLETE").is_some());
    assert!(monitor.on_terminal_data(&session_id, "TASK COMPLETE").is_none());

    // Past the window, the same signal fires again.
    std::thread::sleep(std::time::Duration::from_millis(5_100));
    assert!(monitor.on_terminal_data(&session_id, "TASK COMPLETE").is_some());
}
