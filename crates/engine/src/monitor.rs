// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal monitor: pattern detection over PTY output.
//!
//! Sessions are monitored only after an explicit `start_monitoring`.
//! Each frame is ANSI-stripped, appended to a bounded rolling buffer,
//! and tested against a fixed, ordered rule table; the first matching
//! rule wins per evaluation, and a per-`session:type` cooldown
//! suppresses duplicate detections inside a 5-second window.

use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::Mutex;
use regex::Regex;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use orchard_core::pattern::PATTERN_CONTENT_MAX;
use orchard_core::{
    epoch_ms_now, DetectedPattern, PatternId, PatternType, ProjectId, SessionId, WorktreeId,
};
use orchard_storage::ProjectDb;

/// Rolling buffer cap per session.
pub const MONITOR_BUFFER_MAX: usize = 4096;
/// Duplicate suppression window per `session:type`.
pub const PATTERN_COOLDOWN_MS: u64 = 5_000;

/// Fixed rule table, in evaluation order.
fn rules() -> &'static [(PatternType, Regex)] {
    static RULES: OnceLock<Vec<(PatternType, Regex)>> = OnceLock::new();
    RULES.get_or_init(|| {
        fn rule(pattern_type: PatternType, re: &str) -> (PatternType, Regex) {
            #[allow(clippy::expect_used)]
            let regex = Regex::new(re).expect("static rule regex");
            (pattern_type, regex)
        }
        vec![
            rule(
                PatternType::TaskComplete,
                r"(?i:TASK[\s_-]*COMPLETE)|Task completed successfully|All done!|Finished!|completed the task",
            ),
            rule(
                PatternType::Question,
                r"(?m:\?\s*$)|Would you like me to|Should I|Do you want|Please confirm|waiting for.*input",
            ),
            rule(
                PatternType::Error,
                r"error:|Error:|fatal:|FAILED|exception:|panic:|Traceback \(most recent call last\)",
            ),
            rule(
                PatternType::RateLimit,
                r"(?i:rate.?limit|too many requests|429|throttl)",
            ),
            rule(
                PatternType::Ready,
                r"How can I help|What would you like|Ready for input|(?m:^>\s*$)",
            ),
        ]
    })
}

fn ansi_stripper() -> &'static Regex {
    static STRIPPER: OnceLock<Regex> = OnceLock::new();
    STRIPPER.get_or_init(|| {
        // CSI sequences, OSC sequences, and stray escapes.
        #[allow(clippy::expect_used)]
        let regex = Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b.")
            .expect("static ansi regex");
        regex
    })
}

struct MonitoredSession {
    worktree_id: WorktreeId,
    buffer: String,
    /// Last emission per pattern type, epoch ms.
    cooldowns: HashMap<PatternType, u64>,
}

pub struct TerminalMonitor {
    db: ProjectDb,
    project_id: ProjectId,
    sessions: Mutex<HashMap<SessionId, MonitoredSession>>,
    pattern_tx: broadcast::Sender<DetectedPattern>,
}

impl TerminalMonitor {
    pub fn new(db: ProjectDb, project_id: ProjectId) -> Self {
        let (pattern_tx, _) = broadcast::channel(128);
        Self {
            db,
            project_id,
            sessions: Mutex::new(HashMap::new()),
            pattern_tx,
        }
    }

    /// Bus of detections (`pattern` events; filter by type as needed).
    pub fn subscribe(&self) -> broadcast::Receiver<DetectedPattern> {
        self.pattern_tx.subscribe()
    }

    pub fn start_monitoring(&self, session_id: SessionId, worktree_id: WorktreeId) {
        self.sessions.lock().insert(
            session_id,
            MonitoredSession {
                worktree_id,
                buffer: String::new(),
                cooldowns: HashMap::new(),
            },
        );
    }

    pub fn stop_monitoring(&self, session_id: &SessionId) {
        self.sessions.lock().remove(session_id);
    }

    pub fn is_monitoring(&self, session_id: &SessionId) -> bool {
        self.sessions.lock().contains_key(session_id)
    }

    /// Consume one `terminal:data` frame. Returns the detection this
    /// frame produced, if any.
    pub fn on_terminal_data(&self, session_id: &SessionId, data: &str) -> Option<DetectedPattern> {
        let detection = {
            let mut sessions = self.sessions.lock();
            let session = sessions.get_mut(session_id)?;

            let clean = ansi_stripper().replace_all(data, "");
            session.buffer.push_str(&clean);
            if session.buffer.len() > MONITOR_BUFFER_MAX {
                let excess = session.buffer.len() - MONITOR_BUFFER_MAX;
                let cut = session
                    .buffer
                    .char_indices()
                    .find(|(idx, _)| *idx >= excess)
                    .map(|(idx, _)| idx)
                    .unwrap_or(0);
                session.buffer.drain(..cut);
            }

            // First match wins per evaluation.
            let matched = rules()
                .iter()
                .find_map(|(pattern_type, regex)| {
                    regex
                        .find(&session.buffer)
                        .map(|m| (*pattern_type, m.as_str().to_string()))
                })?;
            let (pattern_type, excerpt) = matched;

            let now = epoch_ms_now();
            let last = session.cooldowns.get(&pattern_type).copied().unwrap_or(0);
            if now.saturating_sub(last) < PATTERN_COOLDOWN_MS {
                debug!(session_id = %session_id, pattern = %pattern_type, "suppressed by cooldown");
                return None;
            }
            session.cooldowns.insert(pattern_type, now);

            let content: String = excerpt.chars().take(PATTERN_CONTENT_MAX).collect();
            DetectedPattern {
                id: PatternId::new(),
                pattern_type,
                session_id: *session_id,
                worktree_id: session.worktree_id,
                project_id: self.project_id,
                timestamp_ms: now,
                content,
                handled: false,
                handled_at_ms: None,
            }
        };

        if let Err(e) = self.db.insert_detected_pattern(&detection) {
            warn!(error = %e, "pattern persist failed");
        }
        let _ = self.pattern_tx.send(detection.clone());
        Some(detection)
    }

    /// Flip `handled` once the orchestrator has acted on a detection.
    pub fn mark_handled(&self, id: &PatternId) -> Result<(), crate::error::EngineError> {
        Ok(self.db.mark_pattern_handled(id)?)
    }

    /// Startup hygiene: drop detections past the 24-hour retention.
    pub fn prune_old_detections(&self) -> Result<usize, crate::error::EngineError> {
        let cutoff = epoch_ms_now().saturating_sub(24 * 60 * 60 * 1000);
        Ok(self.db.prune_patterns(cutoff)?)
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
