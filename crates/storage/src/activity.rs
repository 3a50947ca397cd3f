// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity log rows (append-only).

use rusqlite::params;

use orchard_core::{ActivityCategory, ActivityEntry, ActivityType, ProjectId};

use crate::{ProjectDb, Result};

/// Filters for activity queries; all fields are optional conjuncts.
#[derive(Debug, Default, Clone)]
pub struct ActivityFilter {
    pub kind: Option<ActivityType>,
    pub category: Option<ActivityCategory>,
    pub correlation_id: Option<String>,
}

impl ProjectDb {
    /// Append one entry; returns the assigned autoincrement id.
    pub fn append_activity(
        &self,
        project_id: &ProjectId,
        timestamp_ms: u64,
        kind: ActivityType,
        category: ActivityCategory,
        summary: &str,
        details: &serde_json::Value,
        correlation_id: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO activity_logs
                 (project_id, timestamp, type, category, summary, details, correlation_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                project_id.as_str(),
                timestamp_ms as i64,
                kind.as_str(),
                category.as_str(),
                summary,
                details.to_string(),
                correlation_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent entries matching `filter`, newest last.
    pub fn query_activity(
        &self,
        project_id: &ProjectId,
        filter: &ActivityFilter,
        limit: u32,
    ) -> Result<Vec<ActivityEntry>> {
        let mut sql = String::from(
            "SELECT id, project_id, timestamp, type, category, summary, details, correlation_id
             FROM activity_logs WHERE project_id = ?1",
        );
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(project_id.as_str().to_string())];

        if let Some(kind) = filter.kind {
            params.push(Box::new(kind.as_str().to_string()));
            sql.push_str(&format!(" AND type = ?{}", params.len()));
        }
        if let Some(category) = filter.category {
            params.push(Box::new(category.as_str().to_string()));
            sql.push_str(&format!(" AND category = ?{}", params.len()));
        }
        if let Some(ref corr) = filter.correlation_id {
            params.push(Box::new(corr.clone()));
            sql.push_str(&format!(" AND correlation_id = ?{}", params.len()));
        }
        params.push(Box::new(limit));
        sql.push_str(&format!(" ORDER BY id DESC LIMIT ?{}", params.len()));

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), row_to_entry)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        out.reverse();
        Ok(out)
    }

    pub fn recent_activity(&self, project_id: &ProjectId, limit: u32) -> Result<Vec<ActivityEntry>> {
        self.query_activity(project_id, &ActivityFilter::default(), limit)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActivityEntry> {
    let kind_str: String = row.get(3)?;
    let category_str: String = row.get(4)?;
    let details_str: String = row.get(6)?;
    Ok(ActivityEntry {
        id: row.get(0)?,
        project_id: ProjectId::from_string(row.get::<_, String>(1)?),
        timestamp_ms: row.get::<_, i64>(2)? as u64,
        kind: ActivityType::parse(&kind_str).unwrap_or(ActivityType::Event),
        category: ActivityCategory::parse(&category_str).unwrap_or(ActivityCategory::System),
        summary: row.get(5)?,
        details: serde_json::from_str(&details_str).unwrap_or(serde_json::Value::Null),
        correlation_id: row.get(7)?,
    })
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
