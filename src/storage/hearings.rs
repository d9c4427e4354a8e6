// src/storage/hearings.rs

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, params, params_from_iter};

use super::{Database, count, like_pattern, page_offset, sql_limit, text};
use crate::error::{AppError, Result};
use crate::models::{
    FieldChange, HearingChange, HearingRecord, HearingWithSubject, Page, ScrapedHearing,
};
use crate::utils::dates::to_iso_date;

const COLUMNS: &str = "h.id, h.identity_hash, h.subject_id, h.court_code, h.court_name, \
     h.case_number, h.judge, h.date, h.date_iso, h.time, h.room, h.title, h.subject_matter, \
     h.case_type, h.hearing_type, h.outcome, h.document_url, h.first_seen_at, h.last_checked_at";

/// Index of the joined subject name, right after `COLUMNS`.
const SUBJECT_NAME: usize = 19;

fn hearing_from_row(row: &Row<'_>) -> rusqlite::Result<HearingRecord> {
    Ok(HearingRecord {
        id: row.get(0)?,
        identity_hash: row.get(1)?,
        subject_id: row.get(2)?,
        court_code: row.get(3)?,
        court_name: text(row, 4)?,
        case_number: text(row, 5)?,
        judge: text(row, 6)?,
        date: text(row, 7)?,
        date_iso: text(row, 8)?,
        time: text(row, 9)?,
        room: text(row, 10)?,
        title: text(row, 11)?,
        subject_matter: text(row, 12)?,
        case_type: text(row, 13)?,
        hearing_type: text(row, 14)?,
        outcome: text(row, 15)?,
        document_url: text(row, 16)?,
        first_seen_at: row.get(17)?,
        last_checked_at: row.get(18)?,
    })
}

fn joined_from_row(row: &Row<'_>) -> rusqlite::Result<HearingWithSubject> {
    Ok(HearingWithSubject {
        hearing: hearing_from_row(row)?,
        subject_name: text(row, SUBJECT_NAME)?,
    })
}

fn change_from_row(row: &Row<'_>) -> rusqlite::Result<HearingChange> {
    Ok(HearingChange {
        id: row.get(0)?,
        hearing_id: row.get(1)?,
        field: row.get(2)?,
        old_value: text(row, 3)?,
        new_value: text(row, 4)?,
        detected_at: row.get(5)?,
    })
}

fn select_joined(tail: &str) -> String {
    format!(
        "SELECT {COLUMNS}, s.name FROM hearings h JOIN subjects s ON s.id = h.subject_id {tail}"
    )
}

/// Sort keys accepted by the listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HearingSort {
    #[default]
    Date,
    Court,
    CaseNumber,
    FirstSeen,
    Subject,
}

impl HearingSort {
    /// Parse a query parameter; unknown keys are rejected rather than
    /// interpolated into SQL.
    pub fn from_param(value: &str) -> Option<Self> {
        match value {
            "date" | "date_iso" => Some(Self::Date),
            "court" => Some(Self::Court),
            "case_number" => Some(Self::CaseNumber),
            "first_seen" | "first_seen_at" => Some(Self::FirstSeen),
            "subject" => Some(Self::Subject),
            _ => None,
        }
    }

    fn order_by(&self, descending: bool) -> String {
        let dir = if descending { "DESC" } else { "ASC" };
        match self {
            Self::Date => format!("h.date_iso {dir}, h.time {dir}, h.id"),
            Self::Court => format!("h.court_name {dir}, h.date_iso, h.time"),
            Self::CaseNumber => format!("h.case_number {dir}, h.date_iso"),
            Self::FirstSeen => format!("h.first_seen_at {dir}, h.id {dir}"),
            Self::Subject => format!("s.name {dir}, h.date_iso, h.time"),
        }
    }
}

/// Listing filter shared by the API list and CSV export.
#[derive(Debug, Clone, Default)]
pub struct HearingFilter {
    pub subject_id: Option<i64>,
    pub court_code: Option<String>,
    pub case_type: Option<String>,
    /// Only hearings on or after this date
    pub from_date: Option<NaiveDate>,
    /// Matches case number, title, subject-matter or judge
    pub text: Option<String>,
    pub sort: HearingSort,
    pub descending: bool,
}

impl HearingFilter {
    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        if let Some(id) = self.subject_id {
            clauses.push("h.subject_id = ?".to_string());
            values.push(Value::Integer(id));
        }
        if let Some(court) = self.court_code.as_deref().filter(|c| !c.is_empty()) {
            clauses.push("h.court_code = ?".to_string());
            values.push(Value::Text(court.to_string()));
        }
        if let Some(case_type) = self.case_type.as_deref().filter(|c| !c.is_empty()) {
            clauses.push("h.case_type = ?".to_string());
            values.push(Value::Text(case_type.to_string()));
        }
        if let Some(from) = self.from_date {
            clauses.push("h.date_iso >= ?".to_string());
            values.push(Value::Text(from.format("%Y-%m-%d").to_string()));
        }
        if let Some(q) = self.text.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            clauses.push(
                "(h.case_number LIKE ? OR h.title LIKE ? OR h.subject_matter LIKE ? OR h.judge LIKE ?)"
                    .to_string(),
            );
            let pattern = like_pattern(q);
            values.extend(std::iter::repeat_n(Value::Text(pattern), 4));
        }

        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!("WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

impl Database {
    pub fn find_hearing_by_hash(&self, hash: &str) -> Result<Option<HearingRecord>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM hearings h WHERE h.identity_hash = ?1"),
                [hash],
                hearing_from_row,
            )
            .optional()
        })
    }

    /// Insert a first-seen hearing.
    pub fn insert_hearing(
        &self,
        subject_id: i64,
        row: &ScrapedHearing,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Result<HearingRecord> {
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO hearings (identity_hash, subject_id, court_code, court_name,
                    case_number, judge, date, date_iso, time, room, title, subject_matter,
                    case_type, hearing_type, outcome, document_url, first_seen_at, last_checked_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?17)",
                params![
                    hash,
                    subject_id,
                    row.court_code,
                    row.court_name,
                    row.case_number,
                    row.judge,
                    row.date,
                    row.date_iso,
                    row.time,
                    row.room,
                    row.title,
                    row.subject_matter,
                    row.case_type,
                    row.hearing_type,
                    row.outcome,
                    row.document_url,
                    now,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        self.get_hearing_record(id)
    }

    /// Refresh `last_checked_at` of an unchanged hearing.
    pub fn touch_hearing(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE hearings SET last_checked_at = ?1 WHERE id = ?2",
                params![now, id],
            )
        })?;
        Ok(())
    }

    /// Append one change row per changed field and overwrite the watched
    /// fields, atomically.
    pub fn record_hearing_changes(
        &self,
        id: i64,
        row: &ScrapedHearing,
        changes: &[FieldChange],
        now: DateTime<Utc>,
    ) -> Result<Vec<HearingChange>> {
        let date_iso = to_iso_date(&row.date);
        self.with_tx(|tx| {
            let mut inserted = Vec::with_capacity(changes.len());
            for change in changes {
                tx.execute(
                    "INSERT INTO hearing_changes (hearing_id, field, old_value, new_value, detected_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        id,
                        change.field.column(),
                        change.old_value,
                        change.new_value,
                        now
                    ],
                )?;
                inserted.push(HearingChange {
                    id: tx.last_insert_rowid(),
                    hearing_id: id,
                    field: change.field.column().to_string(),
                    old_value: change.old_value.clone(),
                    new_value: change.new_value.clone(),
                    detected_at: now,
                });
            }
            tx.execute(
                "UPDATE hearings SET judge = ?1, date = ?2, date_iso = ?3, time = ?4, room = ?5,
                    outcome = ?6, hearing_type = ?7, last_checked_at = ?8
                 WHERE id = ?9",
                params![
                    row.judge,
                    row.date,
                    date_iso,
                    row.time,
                    row.room,
                    row.outcome,
                    row.hearing_type,
                    now,
                    id
                ],
            )?;
            Ok(inserted)
        })
    }

    fn get_hearing_record(&self, id: i64) -> Result<HearingRecord> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM hearings h WHERE h.id = ?1"),
                [id],
                hearing_from_row,
            )
            .optional()
        })?
        .ok_or_else(|| AppError::not_found(format!("hearing {id}")))
    }

    pub fn get_hearing(&self, id: i64) -> Result<HearingWithSubject> {
        self.with_conn(|conn| {
            conn.query_row(&select_joined("WHERE h.id = ?1"), [id], joined_from_row)
                .optional()
        })?
        .ok_or_else(|| AppError::not_found(format!("hearing {id}")))
    }

    /// Change history of a hearing, newest first.
    pub fn hearing_changes(&self, hearing_id: i64) -> Result<Vec<HearingChange>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, hearing_id, field, old_value, new_value, detected_at
                 FROM hearing_changes WHERE hearing_id = ?1
                 ORDER BY detected_at DESC, id DESC",
            )?;
            let rows = stmt.query_map([hearing_id], change_from_row)?;
            rows.collect()
        })
    }

    pub fn list_hearings(
        &self,
        filter: &HearingFilter,
        page: usize,
        limit: usize,
    ) -> Result<Page<HearingWithSubject>> {
        let (where_sql, mut values) = filter.where_clause();
        let total = self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM hearings h JOIN subjects s ON s.id = h.subject_id {where_sql}"
                ),
                params_from_iter(values.iter()),
                |r| count(r, 0),
            )
        })?;

        values.push(Value::Integer(sql_limit(limit)));
        values.push(Value::Integer(page_offset(page, limit)));
        let sql = select_joined(&format!(
            "{where_sql} ORDER BY {} LIMIT ? OFFSET ?",
            filter.sort.order_by(filter.descending)
        ));
        let data = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), joined_from_row)?;
            rows.collect()
        })?;

        Ok(Page::new(data, total, page, limit))
    }

    /// All hearings matching `filter`, for export.
    pub fn filtered_hearings(&self, filter: &HearingFilter) -> Result<Vec<HearingWithSubject>> {
        let (where_sql, values) = filter.where_clause();
        let sql = select_joined(&format!(
            "{where_sql} ORDER BY {}",
            filter.sort.order_by(filter.descending)
        ));
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), joined_from_row)?;
            rows.collect()
        })
    }

    /// Hearings dated within `[from, to]`, chronologically.
    pub fn hearings_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        limit: usize,
    ) -> Result<Vec<HearingWithSubject>> {
        let sql = select_joined(
            "WHERE h.date_iso >= ?1 AND h.date_iso <= ?2 ORDER BY h.date_iso, h.time, h.id LIMIT ?3",
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![from, to, sql_limit(limit)], joined_from_row)?;
            rows.collect()
        })
    }

    /// Next hearings dated on or after `from`.
    pub fn upcoming_hearings(
        &self,
        from: NaiveDate,
        limit: usize,
    ) -> Result<Vec<HearingWithSubject>> {
        let sql =
            select_joined("WHERE h.date_iso >= ?1 ORDER BY h.date_iso, h.time, h.id LIMIT ?2");
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![from, sql_limit(limit)], joined_from_row)?;
            rows.collect()
        })
    }

    /// Hearings first seen at or after `since`, newest first.
    pub fn hearings_first_seen_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<HearingWithSubject>> {
        let sql = select_joined(
            "WHERE h.first_seen_at >= ?1 ORDER BY h.first_seen_at DESC, h.id DESC LIMIT ?2",
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![since, sql_limit(limit)], joined_from_row)?;
            rows.collect()
        })
    }

    /// Free-text search across case number, title, subject-matter and judge.
    pub fn search_hearings(&self, q: &str, limit: usize) -> Result<Vec<HearingWithSubject>> {
        let filter = HearingFilter {
            text: Some(q.to_string()),
            sort: HearingSort::Date,
            descending: true,
            ..HearingFilter::default()
        };
        Ok(self.list_hearings(&filter, 1, limit)?.data)
    }

    pub fn count_hearings_between(&self, from: NaiveDate, to: NaiveDate) -> Result<usize> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM hearings WHERE date_iso >= ?1 AND date_iso <= ?2",
                params![from, to],
                |r| count(r, 0),
            )
        })
    }

    pub fn count_upcoming_hearings(&self, from: NaiveDate) -> Result<usize> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM hearings WHERE date_iso >= ?1",
                [from],
                |r| count(r, 0),
            )
        })
    }

    pub fn count_hearings_first_seen_since(&self, since: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM hearings WHERE first_seen_at >= ?1",
                [since],
                |r| count(r, 0),
            )
        })
    }

    pub fn count_changes_since(&self, since: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM hearing_changes WHERE detected_at >= ?1",
                [since],
                |r| count(r, 0),
            )
        })
    }
}
