// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Detected-pattern rows (24-hour retention).

use rusqlite::params;

use orchard_core::{
    epoch_ms_now, DetectedPattern, PatternId, PatternType, ProjectId, SessionId, WorktreeId,
};

use crate::{ProjectDb, Result, StorageError};

impl ProjectDb {
    pub fn insert_detected_pattern(&self, pattern: &DetectedPattern) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO detected_patterns
                 (id, type, session_id, worktree_id, project_id, timestamp, content,
                  handled, handled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                pattern.id.as_str(),
                pattern.pattern_type.as_str(),
                pattern.session_id.as_str(),
                pattern.worktree_id.as_str(),
                pattern.project_id.as_str(),
                pattern.timestamp_ms as i64,
                pattern.content,
                pattern.handled,
                pattern.handled_at_ms.map(|ms| ms as i64),
            ],
        )?;
        Ok(())
    }

    /// Recent detections, newest first.
    pub fn recent_patterns(&self, project_id: &ProjectId, limit: u32) -> Result<Vec<DetectedPattern>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE project_id = ?1 ORDER BY timestamp DESC LIMIT ?2",
            SELECT_PATTERN
        ))?;
        let rows = stmt.query_map(params![project_id.as_str(), limit], row_to_pattern)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn unhandled_patterns(&self, project_id: &ProjectId) -> Result<Vec<DetectedPattern>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE project_id = ?1 AND handled = 0 ORDER BY timestamp ASC",
            SELECT_PATTERN
        ))?;
        let rows = stmt.query_map(params![project_id.as_str()], row_to_pattern)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn mark_pattern_handled(&self, id: &PatternId) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE detected_patterns SET handled = 1, handled_at = ?1 WHERE id = ?2",
            params![epoch_ms_now() as i64, id.as_str()],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(format!("pattern {}", id)));
        }
        Ok(())
    }

    /// Drop detections older than `cutoff_ms` (24-hour retention).
    pub fn prune_patterns(&self, cutoff_ms: u64) -> Result<usize> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "DELETE FROM detected_patterns WHERE timestamp < ?1",
            params![cutoff_ms as i64],
        )?;
        Ok(changed)
    }
}

const SELECT_PATTERN: &str = "SELECT id, type, session_id, worktree_id, project_id, timestamp, \
     content, handled, handled_at FROM detected_patterns";

fn row_to_pattern(row: &rusqlite::Row<'_>) -> rusqlite::Result<DetectedPattern> {
    let type_str: String = row.get(1)?;
    Ok(DetectedPattern {
        id: PatternId::from_string(row.get::<_, String>(0)?),
        pattern_type: PatternType::parse(&type_str).unwrap_or(PatternType::Error),
        session_id: SessionId::from_string(row.get::<_, String>(2)?),
        worktree_id: WorktreeId::from_string(row.get::<_, String>(3)?),
        project_id: ProjectId::from_string(row.get::<_, String>(4)?),
        timestamp_ms: row.get::<_, i64>(5)? as u64,
        content: row.get(6)?,
        handled: row.get(7)?,
        handled_at_ms: row.get::<_, Option<i64>>(8)?.map(|ms| ms as u64),
    })
}

#[cfg(test)]
#[path = "patterns_tests.rs"]
mod tests;
