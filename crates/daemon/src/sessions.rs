// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session table and fan-out.
//!
//! The manager is the only mutator of PTY session records; listener
//! connections interact through its methods. Every data frame carries a
//! per-session monotonically increasing `seq`, and subscribers receive
//! frames in emission order (each subscriber is an ordered channel).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use orchard_core::{epoch_ms_now, SessionId, WorktreeId};

use crate::protocol::{Event, SessionInfo};
use crate::pty::{PtyError, PtyOutput, PtyProcess};

/// Live session cap; creating session 21 evicts the oldest.
pub const MAX_SESSIONS: usize = 20;
/// Scrollback keeps the most recent 10k newline-split entries.
pub const SCROLLBACK_MAX: usize = 10_000;
/// Reads pause once this many emitted chunks are unacknowledged.
pub const PAUSE_THRESHOLD: u32 = 100;
/// Reads resume once acks bring the count back under this.
pub const RESUME_THRESHOLD: u32 = 50;
/// Delay before the initial command is typed into a fresh shell.
pub const INITIAL_COMMAND_DELAY: Duration = Duration::from_millis(100);

/// Identifies one WebSocket connection for subscription bookkeeping.
pub type ClientId = u64;

/// Serialized frames ready for a connection's write task.
pub type FrameSender = mpsc::UnboundedSender<String>;

struct SessionRecord {
    id: SessionId,
    worktree_id: WorktreeId,
    cwd: PathBuf,
    created_at_ms: u64,
    ordinal: u64,
    pty: PtyProcess,
    scrollback: Vec<String>,
    partial_line: String,
    seq: u64,
    unacked: u32,
    subscribers: HashMap<ClientId, FrameSender>,
}

impl SessionRecord {
    fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            worktree_id: self.worktree_id,
            cwd: self.cwd.clone(),
            created_at_ms: self.created_at_ms,
            subscriber_count: self.subscribers.len(),
            scrollback_len: self.scrollback.len(),
            seq: self.seq,
        }
    }

    fn append_scrollback(&mut self, text: &str) {
        push_scrollback(&mut self.scrollback, &mut self.partial_line, text);
    }

    fn scrollback_snapshot(&self) -> Vec<String> {
        let mut lines = self.scrollback.clone();
        if !self.partial_line.is_empty() {
            lines.push(self.partial_line.clone());
        }
        lines
    }
}

/// Owns every PTY session in the process.
pub struct SessionManager {
    inner: Mutex<HashMap<SessionId, SessionRecord>>,
    ordinal: Mutex<u64>,
    started_at: Instant,
}

impl SessionManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(HashMap::new()),
            ordinal: Mutex::new(0),
            started_at: Instant::now(),
        })
    }

    pub fn uptime_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Spawn a shell session. Evicts the oldest session first when the
    /// table is full. Returns the new session's info.
    ///
    /// Takes an `Arc` receiver because the output pump, exit watcher,
    /// and delayed initial-command writer all need handles back into
    /// the manager; call as `Arc::clone(&manager).create(..)`.
    pub fn create(
        self: Arc<Self>,
        worktree_id: WorktreeId,
        cwd: &Path,
        initial_command: Option<String>,
    ) -> Result<SessionInfo, PtyError> {
        self.evict_if_full();

        let mut pty = PtyProcess::spawn(cwd)?;
        let output_rx = pty.output_rx.take();
        let exit_rx = pty.exit_rx.take();

        let id = SessionId::new();
        let ordinal = {
            let mut ordinal = self.ordinal.lock();
            *ordinal += 1;
            *ordinal
        };
        let record = SessionRecord {
            id,
            worktree_id,
            cwd: cwd.to_path_buf(),
            created_at_ms: epoch_ms_now(),
            ordinal,
            pty,
            scrollback: Vec::new(),
            partial_line: String::new(),
            seq: 0,
            unacked: 0,
            subscribers: HashMap::new(),
        };
        let info = record.info();
        self.inner.lock().insert(id, record);
        info!(session_id = %id, worktree_id = %worktree_id, "session created");

        if let Some(mut output_rx) = output_rx {
            let manager = Arc::clone(&self);
            tokio::spawn(async move {
                while let Some(output) = output_rx.recv().await {
                    match output {
                        PtyOutput::Data(bytes) => manager.handle_data(id, &bytes),
                        PtyOutput::Eof => break,
                    }
                }
            });
        }

        if let Some(exit_rx) = exit_rx {
            let manager = Arc::clone(&self);
            tokio::spawn(async move {
                let exit_code = exit_rx.await.unwrap_or(-1);
                manager.handle_exit(id, exit_code);
            });
        }

        if let Some(command) = initial_command {
            let manager = Arc::clone(&self);
            tokio::spawn(async move {
                tokio::time::sleep(INITIAL_COMMAND_DELAY).await;
                manager.write(&id, &format!("{}\r", command));
            });
        }

        Ok(info)
    }

    /// SIGKILL the session's process group, notify subscribers with
    /// `terminal:exit { exitCode: -1 }`, and drop the record.
    pub fn destroy(&self, id: &SessionId) -> bool {
        let record = self.inner.lock().remove(id);
        match record {
            Some(mut record) => {
                send_to_subscribers(
                    &record.subscribers,
                    &Event::TerminalExit {
                        session_id: *id,
                        exit_code: -1,
                    },
                );
                record.pty.kill();
                info!(session_id = %id, "session destroyed");
                true
            }
            None => false,
        }
    }

    /// Write raw bytes to the PTY. Unknown ids return false.
    pub fn write(&self, id: &SessionId, data: &str) -> bool {
        let mut inner = self.inner.lock();
        match inner.get_mut(id) {
            Some(record) => match record.pty.write(data.as_bytes()) {
                Ok(()) => true,
                Err(e) => {
                    warn!(session_id = %id, error = %e, "pty write failed");
                    false
                }
            },
            None => false,
        }
    }

    pub fn resize(&self, id: &SessionId, cols: u16, rows: u16) -> bool {
        let inner = self.inner.lock();
        match inner.get(id) {
            Some(record) => record.pty.resize(cols, rows),
            None => false,
        }
    }

    /// Register a subscriber and return the scrollback snapshot, or
    /// `None` for an unknown session.
    pub fn subscribe(
        &self,
        id: &SessionId,
        client_id: ClientId,
        sender: FrameSender,
    ) -> Option<Vec<String>> {
        let mut inner = self.inner.lock();
        let record = inner.get_mut(id)?;
        record.subscribers.insert(client_id, sender);
        Some(record.scrollback_snapshot())
    }

    pub fn unsubscribe(&self, id: &SessionId, client_id: ClientId) -> bool {
        let mut inner = self.inner.lock();
        match inner.get_mut(id) {
            Some(record) => record.subscribers.remove(&client_id).is_some(),
            None => false,
        }
    }

    /// Drop a disconnected client from every session silently.
    pub fn remove_client(&self, client_id: ClientId) {
        let mut inner = self.inner.lock();
        for record in inner.values_mut() {
            record.subscribers.remove(&client_id);
        }
    }

    /// Acknowledge `count` delivered chunks; resumes a paused reader
    /// once the outstanding count drops under [`RESUME_THRESHOLD`].
    pub fn ack(&self, id: &SessionId, count: u32) {
        let mut inner = self.inner.lock();
        let Some(record) = inner.get_mut(id) else {
            debug!(session_id = %id, "ack for unknown session");
            return;
        };
        record.unacked = record.unacked.saturating_sub(count);
        if record.unacked < RESUME_THRESHOLD && record.pty.pause_gate.is_paused() {
            record.pty.pause_gate.resume();
            debug!(session_id = %id, unacked = record.unacked, "reads resumed");
        }
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        let inner = self.inner.lock();
        let mut sessions: Vec<SessionInfo> = inner.values().map(SessionRecord::info).collect();
        sessions.sort_by_key(|s| s.created_at_ms);
        sessions
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionInfo> {
        self.inner.lock().get(id).map(SessionRecord::info)
    }

    /// Broadcast a frame to every subscriber of `session_id`.
    pub fn broadcast_to_session(&self, session_id: &SessionId, event: &Event) {
        let inner = self.inner.lock();
        if let Some(record) = inner.get(session_id) {
            send_to_subscribers(&record.subscribers, event);
        }
    }

    /// Destroy all sessions (daemon shutdown path).
    pub fn destroy_all(&self) {
        let ids: Vec<SessionId> = self.inner.lock().keys().copied().collect();
        for id in ids {
            self.destroy(&id);
        }
    }

    fn evict_if_full(&self) {
        let oldest = {
            let inner = self.inner.lock();
            if inner.len() < MAX_SESSIONS {
                return;
            }
            inner
                .values()
                .min_by_key(|r| (r.created_at_ms, r.ordinal))
                .map(|r| r.id)
        };
        if let Some(id) = oldest {
            warn!(session_id = %id, "session table full; evicting oldest");
            self.destroy(&id);
        }
    }

    fn handle_data(&self, id: SessionId, bytes: &[u8]) {
        let mut inner = self.inner.lock();
        let Some(record) = inner.get_mut(&id) else {
            return;
        };
        let text = String::from_utf8_lossy(bytes).into_owned();
        record.seq += 1;
        record.append_scrollback(&text);
        record.unacked += 1;
        if record.unacked > PAUSE_THRESHOLD && !record.pty.pause_gate.is_paused() {
            record.pty.pause_gate.pause();
            debug!(session_id = %id, unacked = record.unacked, "reads paused");
        }
        let event = Event::TerminalData {
            session_id: id,
            data: text,
            seq: record.seq,
        };
        send_to_subscribers(&record.subscribers, &event);
    }

    fn handle_exit(&self, id: SessionId, exit_code: i32) {
        let record = self.inner.lock().remove(&id);
        if let Some(record) = record {
            info!(session_id = %id, exit_code, "session exited");
            send_to_subscribers(
                &record.subscribers,
                &Event::TerminalExit {
                    session_id: id,
                    exit_code,
                },
            );
        }
    }
}

/// Split `text` on newlines into scrollback entries, carrying the
/// trailing partial line until its newline arrives. Trims to the most
/// recent [`SCROLLBACK_MAX`] entries.
pub(crate) fn push_scrollback(scrollback: &mut Vec<String>, partial: &mut String, text: &str) {
    let mut parts = text.split('\n');
    if let Some(first) = parts.next() {
        partial.push_str(first);
    }
    for part in parts {
        let line = std::mem::take(partial);
        scrollback.push(line);
        partial.push_str(part);
    }
    if scrollback.len() > SCROLLBACK_MAX {
        let excess = scrollback.len() - SCROLLBACK_MAX;
        scrollback.drain(..excess);
    }
}

fn send_to_subscribers(subscribers: &HashMap<ClientId, FrameSender>, event: &Event) {
    let frame = match serde_json::to_string(event) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "failed to serialise event");
            return;
        }
    };
    for sender in subscribers.values() {
        // Dead senders belong to closed connections; remove_client
        // prunes them when the listener notices.
        let _ = sender.send(frame.clone());
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
