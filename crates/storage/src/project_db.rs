// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-project database: open, schema, pragmas.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;

use crate::Result;

/// Schema applied on open. `CREATE TABLE IF NOT EXISTS` keeps opens
/// idempotent; adding columns requires a migration statement here.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS activity_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    type TEXT NOT NULL,
    category TEXT NOT NULL,
    summary TEXT NOT NULL,
    details TEXT NOT NULL DEFAULT '{}',
    correlation_id TEXT
);
CREATE INDEX IF NOT EXISTS idx_activity_project ON activity_logs(project_id);
CREATE INDEX IF NOT EXISTS idx_activity_timestamp ON activity_logs(timestamp);
CREATE INDEX IF NOT EXISTS idx_activity_correlation ON activity_logs(correlation_id);

CREATE TABLE IF NOT EXISTS chat_messages (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    sender TEXT NOT NULL CHECK (sender IN ('user', 'orchestrator')),
    text TEXT NOT NULL,
    reply_to TEXT,
    processed INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'unread'
        CHECK (status IN ('unread', 'read', 'working', 'resolved'))
);
CREATE INDEX IF NOT EXISTS idx_chat_project ON chat_messages(project_id);
CREATE INDEX IF NOT EXISTS idx_chat_status ON chat_messages(status);
CREATE INDEX IF NOT EXISTS idx_chat_timestamp ON chat_messages(timestamp);

CREATE TABLE IF NOT EXISTS agent_sessions (
    id TEXT PRIMARY KEY,
    worktree_id TEXT NOT NULL UNIQUE,
    project_id TEXT NOT NULL,
    command TEXT NOT NULL,
    cwd TEXT NOT NULL,
    conversation_resume_id TEXT,
    status TEXT NOT NULL
        CHECK (status IN ('active', 'disconnected', 'resumed', 'terminated')),
    created_at INTEGER NOT NULL,
    last_activity_at INTEGER NOT NULL,
    resume_count INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_sessions_project ON agent_sessions(project_id);
CREATE INDEX IF NOT EXISTS idx_sessions_status ON agent_sessions(status);

CREATE TABLE IF NOT EXISTS print_sessions (
    id TEXT PRIMARY KEY,
    worktree_id TEXT NOT NULL,
    project_id TEXT NOT NULL,
    task TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('running', 'completed', 'failed')),
    exit_code INTEGER,
    started_at INTEGER NOT NULL,
    completed_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_print_worktree ON print_sessions(worktree_id);
CREATE INDEX IF NOT EXISTS idx_print_status ON print_sessions(status);

CREATE TABLE IF NOT EXISTS terminal_output (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL REFERENCES print_sessions(id),
    chunk TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_terminal_session ON terminal_output(session_id);

CREATE TABLE IF NOT EXISTS merge_queue (
    worktree_id TEXT PRIMARY KEY,
    branch TEXT NOT NULL,
    completed_at INTEGER NOT NULL,
    summary TEXT NOT NULL DEFAULT '',
    has_commits INTEGER NOT NULL DEFAULT 0,
    merged INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS worktrees (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    path TEXT NOT NULL UNIQUE,
    branch TEXT NOT NULL,
    is_main INTEGER NOT NULL DEFAULT 0,
    merged INTEGER NOT NULL DEFAULT 0,
    archived INTEGER NOT NULL DEFAULT 0,
    mode TEXT,
    status TEXT NOT NULL DEFAULT '{}',
    last_commit_at INTEGER,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_worktrees_project ON worktrees(project_id);

CREATE TABLE IF NOT EXISTS detected_patterns (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL,
    session_id TEXT NOT NULL,
    worktree_id TEXT NOT NULL,
    project_id TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    content TEXT NOT NULL,
    handled INTEGER NOT NULL DEFAULT 0,
    handled_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_patterns_session ON detected_patterns(session_id);
CREATE INDEX IF NOT EXISTS idx_patterns_timestamp ON detected_patterns(timestamp);
"#;

/// Handle to one project's database.
///
/// Cheap to clone; all clones share the same serialized connection.
#[derive(Clone)]
pub struct ProjectDb {
    pub(crate) conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl ProjectDb {
    /// Open (creating if needed) `<project_path>/.orchard/orchard.db`.
    pub fn open(project_path: &Path) -> Result<Self> {
        let state_dir = project_path.join(".orchard");
        std::fs::create_dir_all(&state_dir)?;
        Self::open_at(&state_dir.join("orchard.db"))
    }

    /// Open a database at an explicit path (tests point this at a tempdir).
    pub fn open_at(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(db = %db_path.display(), "project database opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: db_path.to_path_buf(),
        })
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path: PathBuf::from(":memory:"),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}
