// src/storage/subjects.rs

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};

use super::{Database, json, like_pattern, sql_limit};
use crate::error::{AppError, Result};
use crate::models::{CaseType, MonitoredSubject, NewSubject, SubjectUpdate};

const COLUMNS: &str = "id, name, courts, case_type, note, active, created_at";

fn subject_from_row(row: &Row<'_>) -> rusqlite::Result<MonitoredSubject> {
    let case_type: String = row.get(3)?;
    Ok(MonitoredSubject {
        id: row.get(0)?,
        name: row.get(1)?,
        courts: json(row, 2)?,
        case_type: case_type.parse().unwrap_or(CaseType::Any),
        note: row.get(4)?,
        active: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl Database {
    /// Every subject, active ones first.
    pub fn list_subjects(&self) -> Result<Vec<MonitoredSubject>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM subjects ORDER BY active DESC, name"
            ))?;
            let rows = stmt.query_map([], subject_from_row)?;
            rows.collect()
        })
    }

    /// Active subjects in creation order, the order a run visits them.
    pub fn active_subjects(&self) -> Result<Vec<MonitoredSubject>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM subjects WHERE active = 1 ORDER BY id"
            ))?;
            let rows = stmt.query_map([], subject_from_row)?;
            rows.collect()
        })
    }

    pub fn get_subject(&self, id: i64) -> Result<MonitoredSubject> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM subjects WHERE id = ?1"),
                [id],
                subject_from_row,
            )
            .optional()
        })?
        .ok_or_else(|| AppError::not_found(format!("subject {id}")))
    }

    /// Active subject with exactly this (trimmed) name.
    pub fn find_active_subject(&self, name: &str) -> Result<Option<MonitoredSubject>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM subjects WHERE active = 1 AND name = ?1"),
                [name.trim()],
                subject_from_row,
            )
            .optional()
        })
    }

    /// Insert a subject. Expects input already passed through `NewSubject::normalized`.
    pub fn create_subject(
        &self,
        subject: &NewSubject,
        now: DateTime<Utc>,
    ) -> Result<MonitoredSubject> {
        let courts = serde_json::to_string(&subject.courts)?;
        let note = subject.note.clone().filter(|n| !n.trim().is_empty());
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO subjects (name, courts, case_type, note, active, created_at)
                 VALUES (?1, ?2, ?3, ?4, 1, ?5)",
                params![subject.name, courts, subject.case_type.as_str(), note, now],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        self.get_subject(id)
    }

    pub fn update_subject(&self, id: i64, update: &SubjectUpdate) -> Result<MonitoredSubject> {
        let updated = update.apply_to(&self.get_subject(id)?)?;
        let courts = serde_json::to_string(&updated.courts)?;
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE subjects SET name = ?1, courts = ?2, case_type = ?3, note = ?4, active = ?5
                 WHERE id = ?6",
                params![
                    updated.name,
                    courts,
                    updated.case_type.as_str(),
                    updated.note,
                    updated.active,
                    id
                ],
            )
        })?;
        Ok(updated)
    }

    /// Soft delete: history stays, the subject is no longer polled.
    pub fn deactivate_subject(&self, id: i64) -> Result<()> {
        let changed = self.with_conn(|conn| {
            conn.execute("UPDATE subjects SET active = 0 WHERE id = ?1", [id])
        })?;
        if changed == 0 {
            return Err(AppError::not_found(format!("subject {id}")));
        }
        Ok(())
    }

    pub fn search_subjects(&self, q: &str, limit: usize) -> Result<Vec<MonitoredSubject>> {
        let pattern = like_pattern(q);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM subjects WHERE name LIKE ?1 OR note LIKE ?1
                 ORDER BY active DESC, name LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![pattern, sql_limit(limit)], subject_from_row)?;
            rows.collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn courts() -> Vec<String> {
        vec!["jc".into(), "cac".into()]
    }

    fn add(db: &Database, name: &str) -> MonitoredSubject {
        let subject = NewSubject::named(name).normalized(&courts()).unwrap();
        db.create_subject(&subject, Utc::now()).unwrap()
    }

    #[test]
    fn test_create_and_get_subject() {
        let db = Database::open_in_memory().unwrap();
        let created = add(&db, "Popescu Ion");
        let loaded = db.get_subject(created.id).unwrap();
        assert_eq!(loaded.name, "Popescu Ion");
        assert_eq!(loaded.courts, courts());
        assert_eq!(loaded.case_type, CaseType::Any);
        assert!(loaded.active);
    }

    #[test]
    fn test_deactivate_hides_from_active_list() {
        let db = Database::open_in_memory().unwrap();
        let a = add(&db, "A");
        add(&db, "B");
        db.deactivate_subject(a.id).unwrap();

        let active: Vec<_> = db.active_subjects().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(active, vec!["B"]);
        assert_eq!(db.list_subjects().unwrap().len(), 2);
        assert!(db.find_active_subject("A").unwrap().is_none());
    }

    #[test]
    fn test_deactivate_missing_subject_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.deactivate_subject(42),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_subject_fields() {
        let db = Database::open_in_memory().unwrap();
        let s = add(&db, "Ion");
        let update = SubjectUpdate {
            case_type: Some(CaseType::Penal),
            courts: Some(vec!["jc".into()]),
            ..SubjectUpdate::default()
        };
        let updated = db.update_subject(s.id, &update).unwrap();
        assert_eq!(updated.case_type, CaseType::Penal);
        assert_eq!(db.get_subject(s.id).unwrap().courts, vec!["jc"]);
    }

    #[test]
    fn test_search_subjects_by_name() {
        let db = Database::open_in_memory().unwrap();
        add(&db, "Popescu Ion");
        add(&db, "Rusu Ana");
        let found = db.search_subjects("pescu", 10).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Popescu Ion");
    }
}
