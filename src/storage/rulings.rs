// src/storage/rulings.rs

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Row, params, params_from_iter};

use super::{Database, count, page_offset, parsed, sql_limit, text};
use crate::error::Result;
use crate::models::{Page, RulingKind, RulingRecord, RulingWithSubject, ScrapedRuling};

const COLUMNS: &str = "r.id, r.identity_hash, r.subject_id, r.court_code, r.court_name, r.kind, \
     r.case_number, r.pronounced_on, r.pronounced_on_iso, r.judge, r.disposition, \
     r.document_url, r.first_seen_at";

fn ruling_from_row(row: &Row<'_>) -> rusqlite::Result<RulingRecord> {
    Ok(RulingRecord {
        id: row.get(0)?,
        identity_hash: row.get(1)?,
        subject_id: row.get(2)?,
        court_code: row.get(3)?,
        court_name: text(row, 4)?,
        kind: parsed(row, 5)?,
        case_number: text(row, 6)?,
        pronounced_on: text(row, 7)?,
        pronounced_on_iso: text(row, 8)?,
        judge: text(row, 9)?,
        disposition: text(row, 10)?,
        document_url: text(row, 11)?,
        first_seen_at: row.get(12)?,
    })
}

fn joined_from_row(row: &Row<'_>) -> rusqlite::Result<RulingWithSubject> {
    Ok(RulingWithSubject {
        ruling: ruling_from_row(row)?,
        subject_name: text(row, 13)?,
    })
}

#[derive(Debug, Clone, Default)]
pub struct RulingFilter {
    pub subject_id: Option<i64>,
    pub court_code: Option<String>,
    pub kind: Option<RulingKind>,
}

impl RulingFilter {
    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        if let Some(id) = self.subject_id {
            clauses.push("r.subject_id = ?");
            values.push(Value::Integer(id));
        }
        if let Some(court) = self.court_code.as_deref().filter(|c| !c.is_empty()) {
            clauses.push("r.court_code = ?");
            values.push(Value::Text(court.to_string()));
        }
        if let Some(kind) = self.kind {
            clauses.push("r.kind = ?");
            values.push(Value::Text(kind.as_str().to_string()));
        }
        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

impl Database {
    /// Insert a ruling unless its identity is already stored.
    ///
    /// Returns the new record, or `None` when the ruling was known.
    pub fn insert_ruling_if_absent(
        &self,
        subject_id: i64,
        row: &ScrapedRuling,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RulingRecord>> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO rulings (identity_hash, subject_id, court_code, court_name,
                    kind, case_number, pronounced_on, pronounced_on_iso, judge, disposition,
                    document_url, first_seen_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    hash,
                    subject_id,
                    row.court_code,
                    row.court_name,
                    row.kind.as_str(),
                    row.case_number,
                    row.pronounced_on,
                    row.pronounced_on_iso,
                    row.judge,
                    row.disposition,
                    row.document_url,
                    now,
                ],
            )?;
            if inserted == 0 {
                return Ok(None);
            }
            Ok(Some(RulingRecord {
                id: conn.last_insert_rowid(),
                identity_hash: hash.to_string(),
                subject_id,
                court_code: row.court_code.clone(),
                court_name: row.court_name.clone(),
                kind: row.kind,
                case_number: row.case_number.clone(),
                pronounced_on: row.pronounced_on.clone(),
                pronounced_on_iso: row.pronounced_on_iso.clone(),
                judge: row.judge.clone(),
                disposition: row.disposition.clone(),
                document_url: row.document_url.clone(),
                first_seen_at: now,
            }))
        })
    }

    /// Rulings newest first.
    pub fn list_rulings(
        &self,
        filter: &RulingFilter,
        page: usize,
        limit: usize,
    ) -> Result<Page<RulingWithSubject>> {
        let (where_sql, mut values) = filter.where_clause();
        let total = self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT COUNT(*) FROM rulings r {where_sql}"),
                params_from_iter(values.iter()),
                |r| count(r, 0),
            )
        })?;

        values.push(Value::Integer(sql_limit(limit)));
        values.push(Value::Integer(page_offset(page, limit)));
        let sql = format!(
            "SELECT {COLUMNS}, s.name FROM rulings r JOIN subjects s ON s.id = r.subject_id
             {where_sql} ORDER BY r.pronounced_on_iso DESC, r.id DESC LIMIT ? OFFSET ?"
        );
        let data = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), joined_from_row)?;
            rows.collect()
        })?;
        Ok(Page::new(data, total, page, limit))
    }

    pub fn rulings_first_seen_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RulingWithSubject>> {
        let sql = format!(
            "SELECT {COLUMNS}, s.name FROM rulings r JOIN subjects s ON s.id = r.subject_id
             WHERE r.first_seen_at >= ?1 ORDER BY r.first_seen_at DESC, r.id DESC LIMIT ?2"
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![since, sql_limit(limit)], joined_from_row)?;
            rows.collect()
        })
    }

    pub fn count_rulings_first_seen_since(&self, since: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM rulings WHERE first_seen_at >= ?1",
                [since],
                |r| count(r, 0),
            )
        })
    }
}
