//! Identity hashing and change detection for scraped rows.
//!
//! A hearing's identity is a hash of (court, case number, display date,
//! time). A row whose identity is unknown is inserted; a known row is
//! compared field by field on the watched fields, and every difference is
//! recorded as a change row before the stored values are overwritten.
//! Rulings are additions only.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::{
    FieldChange, HearingChange, HearingRecord, RulingKind, RulingRecord, ScrapedHearing,
    ScrapedRuling, WatchedField,
};
use crate::storage::Database;

/// Lowercase hex SHA-256 of the parts joined with `|`.
fn identity(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parts.join("|").as_bytes());
    hex::encode(hasher.finalize())
}

pub fn hearing_identity(court_code: &str, case_number: &str, date: &str, time: &str) -> String {
    identity(&[court_code, case_number, date, time])
}

pub fn ruling_identity(
    court_code: &str,
    kind: RulingKind,
    case_number: &str,
    pronounced_on: &str,
) -> String {
    identity(&[court_code, kind.as_str(), case_number, pronounced_on])
}

impl ScrapedHearing {
    pub fn identity_hash(&self) -> String {
        hearing_identity(&self.court_code, &self.case_number, &self.date, &self.time)
    }
}

impl ScrapedRuling {
    pub fn identity_hash(&self) -> String {
        ruling_identity(
            &self.court_code,
            self.kind,
            &self.case_number,
            &self.pronounced_on,
        )
    }
}

/// Watched fields whose scraped value differs from the stored value.
pub fn compare_watched(stored: &HearingRecord, scraped: &ScrapedHearing) -> Vec<FieldChange> {
    WatchedField::ALL
        .into_iter()
        .filter_map(|field| {
            let old = field.stored(stored);
            let new = field.scraped(scraped);
            (old != new).then(|| FieldChange {
                field,
                old_value: old.to_string(),
                new_value: new.to_string(),
            })
        })
        .collect()
}

/// What applying one scraped hearing did to the store.
#[derive(Debug, Clone)]
pub enum HearingOutcome {
    Inserted(HearingRecord),
    Modified {
        hearing: HearingRecord,
        changes: Vec<HearingChange>,
    },
    Unchanged,
}

/// Apply a scraped hearing against the store.
pub fn apply_hearing(
    db: &Database,
    subject_id: i64,
    row: &ScrapedHearing,
    now: DateTime<Utc>,
) -> Result<HearingOutcome> {
    let hash = row.identity_hash();
    let Some(stored) = db.find_hearing_by_hash(&hash)? else {
        let record = db.insert_hearing(subject_id, row, &hash, now)?;
        return Ok(HearingOutcome::Inserted(record));
    };

    let diffs = compare_watched(&stored, row);
    if diffs.is_empty() {
        db.touch_hearing(stored.id, now)?;
        return Ok(HearingOutcome::Unchanged);
    }

    let changes = db.record_hearing_changes(stored.id, row, &diffs, now)?;
    let hearing = db.get_hearing(stored.id)?.hearing;
    Ok(HearingOutcome::Modified { hearing, changes })
}

/// Insert a scraped ruling unless already known.
pub fn apply_ruling(
    db: &Database,
    subject_id: i64,
    row: &ScrapedRuling,
    now: DateTime<Utc>,
) -> Result<Option<RulingRecord>> {
    db.insert_ruling_if_absent(subject_id, row, &row.identity_hash(), now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewSubject;
    use crate::utils::dates::to_iso_date;
    use chrono::Duration;

    fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let subject = NewSubject::named("Popescu Ion")
            .normalized(&["jc".to_string()])
            .unwrap();
        let id = db.create_subject(&subject, Utc::now()).unwrap().id;
        (db, id)
    }

    fn hearing() -> ScrapedHearing {
        ScrapedHearing {
            court_code: "jc".into(),
            court_name: "Judecătoria Chișinău".into(),
            case_number: "2-1234/2025".into(),
            judge: "Rusu Ana".into(),
            date: "15.03.2025".into(),
            date_iso: to_iso_date("15.03.2025"),
            time: "10:00".into(),
            room: "12".into(),
            title: "Popescu Ion vs SRL".into(),
            ..ScrapedHearing::default()
        }
    }

    #[test]
    fn test_hash_is_deterministic_and_order_sensitive() {
        let a = hearing_identity("jc", "2-1/25", "15.03.2025", "10:00");
        assert_eq!(a, hearing_identity("jc", "2-1/25", "15.03.2025", "10:00"));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, hearing_identity("2-1/25", "jc", "15.03.2025", "10:00"));
        assert_ne!(a, hearing_identity("jc", "2-1/25", "15.03.2025", "10:30"));
        assert_ne!(a, hearing_identity("ca", "2-1/25", "15.03.2025", "10:00"));
        assert_ne!(a, hearing_identity("jc", "2-2/25", "15.03.2025", "10:00"));
        assert_ne!(a, hearing_identity("jc", "2-1/25", "16.03.2025", "10:00"));
    }

    #[test]
    fn test_hash_ignores_non_identity_fields() {
        let mut other = hearing();
        other.judge = "Someone Else".into();
        other.title = "changed".into();
        assert_eq!(other.identity_hash(), hearing().identity_hash());
    }

    #[test]
    fn test_hash_matches_known_digest() {
        assert_eq!(
            hearing_identity("a", "b", "c", "d"),
            "b54856b7a8705958e13238b3d67eac1cf256afefd4ad405d644ac956b1164870"
        );
    }

    #[test]
    fn test_ruling_hash_includes_kind() {
        let decision = ruling_identity("jc", RulingKind::Decision, "2-1/25", "01.02.2025");
        let order = ruling_identity("jc", RulingKind::Interlocutory, "2-1/25", "01.02.2025");
        assert_ne!(decision, order);
    }

    #[test]
    fn test_compare_lists_each_differing_field() {
        let (db, sid) = setup();
        let stored = db
            .insert_hearing(sid, &hearing(), &hearing().identity_hash(), Utc::now())
            .unwrap();
        let mut row = hearing();
        row.room = "3".into();
        row.outcome = "Amânat".into();
        let fields: Vec<_> = compare_watched(&stored, &row).into_iter().map(|c| c.field).collect();
        assert_eq!(fields, vec![WatchedField::Room, WatchedField::Outcome]);
    }

    #[test]
    fn test_insert_then_unchanged_is_idempotent() {
        let (db, sid) = setup();
        let t0 = Utc::now();
        assert!(matches!(
            apply_hearing(&db, sid, &hearing(), t0).unwrap(),
            HearingOutcome::Inserted(_)
        ));

        let t1 = t0 + Duration::hours(12);
        assert!(matches!(
            apply_hearing(&db, sid, &hearing(), t1).unwrap(),
            HearingOutcome::Unchanged
        ));

        let stored = db.find_hearing_by_hash(&hearing().identity_hash()).unwrap().unwrap();
        assert_eq!(stored.first_seen_at, t0);
        assert_eq!(stored.last_checked_at, t1);
        assert!(db.hearing_changes(stored.id).unwrap().is_empty());
    }

    #[test]
    fn test_changed_judge_records_one_change() {
        let (db, sid) = setup();
        let t0 = Utc::now();
        apply_hearing(&db, sid, &hearing(), t0).unwrap();

        let mut row = hearing();
        row.judge = "Ciobanu Vlad".into();
        let t1 = t0 + Duration::hours(12);
        let HearingOutcome::Modified { hearing: updated, changes } =
            apply_hearing(&db, sid, &row, t1).unwrap()
        else {
            panic!("expected a modification");
        };

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "judge");
        assert_eq!(changes[0].old_value, "Rusu Ana");
        assert_eq!(changes[0].new_value, "Ciobanu Vlad");
        assert_eq!(updated.judge, "Ciobanu Vlad");
        assert_eq!(updated.last_checked_at, t1);
        assert_eq!(updated.first_seen_at, t0);

        // Same data again: nothing new
        assert!(matches!(
            apply_hearing(&db, sid, &row, t1 + Duration::hours(1)).unwrap(),
            HearingOutcome::Unchanged
        ));
        assert_eq!(db.hearing_changes(updated.id).unwrap().len(), 1);
    }

    #[test]
    fn test_non_watched_fields_stay_frozen() {
        let (db, sid) = setup();
        let t0 = Utc::now();
        apply_hearing(&db, sid, &hearing(), t0).unwrap();

        let mut row = hearing();
        row.title = "Renamed case".into();
        assert!(matches!(
            apply_hearing(&db, sid, &row, t0).unwrap(),
            HearingOutcome::Unchanged
        ));
        let stored = db.find_hearing_by_hash(&row.identity_hash()).unwrap().unwrap();
        assert_eq!(stored.title, "Popescu Ion vs SRL");
    }

    #[test]
    fn test_ruling_inserted_once() {
        let (db, sid) = setup();
        let row = ScrapedRuling {
            court_code: "jc".into(),
            court_name: "Judecătoria Chișinău".into(),
            kind: RulingKind::Decision,
            case_number: "2-1234/2025".into(),
            pronounced_on: "01.02.2025".into(),
            pronounced_on_iso: "2025-02-01".into(),
            judge: "Rusu Ana".into(),
            disposition: "Admisă".into(),
            document_url: String::new(),
        };
        assert!(apply_ruling(&db, sid, &row, Utc::now()).unwrap().is_some());
        assert!(apply_ruling(&db, sid, &row, Utc::now()).unwrap().is_none());
    }
}
