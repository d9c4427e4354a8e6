// src/storage/run_log.rs

use chrono::{DateTime, Utc};
use rusqlite::{Row, params};

use super::{Database, count, page_offset, sql_limit};
use crate::error::Result;
use crate::models::{NewRunLogEntry, Page, RunLogEntry};

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<RunLogEntry> {
    Ok(RunLogEntry {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        subject_name: row.get(2)?,
        court_code: row.get(3)?,
        found: count(row, 4)?,
        new_count: count(row, 5)?,
        error: row.get(6)?,
        duration_ms: row.get::<_, i64>(7)?.max(0) as u64,
        timestamp: row.get(8)?,
    })
}

impl Database {
    pub fn append_run_log(&self, entry: &NewRunLogEntry, now: DateTime<Utc>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO run_log (subject_id, court_code, found, new_count, error, duration_ms, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    entry.subject_id,
                    entry.court_code,
                    entry.found as i64,
                    entry.new_count as i64,
                    entry.error,
                    entry.duration_ms as i64,
                    now
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Run log, newest first.
    pub fn list_run_log(&self, page: usize, limit: usize) -> Result<Page<RunLogEntry>> {
        let total = self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM run_log", [], |r| count(r, 0))
        })?;
        let data = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT l.id, l.subject_id, s.name, l.court_code, l.found, l.new_count, l.error,
                        l.duration_ms, l.timestamp
                 FROM run_log l LEFT JOIN subjects s ON s.id = l.subject_id
                 ORDER BY l.timestamp DESC, l.id DESC LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt.query_map(
                params![sql_limit(limit), page_offset(page, limit)],
                entry_from_row,
            )?;
            rows.collect()
        })?;
        Ok(Page::new(data, total, page, limit))
    }

    /// Timestamp of the most recent attempt.
    pub fn last_run_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.with_conn(|conn| conn.query_row("SELECT MAX(timestamp) FROM run_log", [], |r| r.get(0)))
    }

    pub fn count_run_log_since(&self, since: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM run_log WHERE timestamp >= ?1",
                [since],
                |r| count(r, 0),
            )
        })
    }
}
