// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embedded SQL persistence.
//!
//! Two databases: a process-wide registry (`~/.orchard/registry.db`)
//! that owns project identity only, and one database per project at
//! `<path>/.orchard/orchard.db` (WAL mode) that owns everything else.
//! Cross-row atomicity (queue pop, session upsert) uses explicit
//! transactions; everything else relies on per-connection serialisation.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod activity;
mod chat;
mod merge_queue;
mod patterns;
mod print_sessions;
mod project_db;
mod registry;
mod sessions;
mod worktrees;

pub use activity::ActivityFilter;
pub use project_db::ProjectDb;
pub use registry::ProjectRegistry;

use thiserror::Error;

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    /// Chat status moved backwards, or a similar constraint breach
    /// caught before it reaches SQLite.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
