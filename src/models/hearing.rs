// src/models/hearing.rs

//! Hearing rows as scraped and as stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One hearing row parsed from a court agenda listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedHearing {
    pub court_code: String,
    pub court_name: String,
    pub case_number: String,
    pub judge: String,

    /// Date as displayed by the portal (dd.mm.yyyy)
    pub date: String,

    /// ISO form of `date`, empty when the display date is unparseable
    pub date_iso: String,

    pub time: String,
    pub room: String,
    pub title: String,
    pub subject_matter: String,
    pub case_type: String,
    pub hearing_type: String,
    pub outcome: String,
    pub document_url: String,
}

/// Persisted hearing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HearingRecord {
    pub id: i64,
    pub identity_hash: String,
    pub subject_id: i64,
    pub court_code: String,
    pub court_name: String,
    pub case_number: String,
    pub judge: String,
    pub date: String,
    pub date_iso: String,
    pub time: String,
    pub room: String,
    pub title: String,
    pub subject_matter: String,
    pub case_type: String,
    pub hearing_type: String,
    pub outcome: String,
    pub document_url: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_checked_at: DateTime<Utc>,
}

/// Hearing joined with the name of the subject it was found for.
#[derive(Debug, Clone, Serialize)]
pub struct HearingWithSubject {
    #[serde(flatten)]
    pub hearing: HearingRecord,
    pub subject_name: String,
}

/// Fields that may change between polls of the same hearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchedField {
    Judge,
    Date,
    Time,
    Room,
    Outcome,
    HearingType,
}

impl WatchedField {
    pub const ALL: [WatchedField; 6] = [
        WatchedField::Judge,
        WatchedField::Date,
        WatchedField::Time,
        WatchedField::Room,
        WatchedField::Outcome,
        WatchedField::HearingType,
    ];

    /// Column name, also used as the field name in change rows.
    pub fn column(&self) -> &'static str {
        match self {
            WatchedField::Judge => "judge",
            WatchedField::Date => "date",
            WatchedField::Time => "time",
            WatchedField::Room => "room",
            WatchedField::Outcome => "outcome",
            WatchedField::HearingType => "hearing_type",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WatchedField::Judge => "Judge",
            WatchedField::Date => "Date",
            WatchedField::Time => "Time",
            WatchedField::Room => "Room",
            WatchedField::Outcome => "Outcome",
            WatchedField::HearingType => "Hearing type",
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.column() == column)
    }

    pub fn stored<'a>(&self, record: &'a HearingRecord) -> &'a str {
        match self {
            WatchedField::Judge => &record.judge,
            WatchedField::Date => &record.date,
            WatchedField::Time => &record.time,
            WatchedField::Room => &record.room,
            WatchedField::Outcome => &record.outcome,
            WatchedField::HearingType => &record.hearing_type,
        }
    }

    pub fn scraped<'a>(&self, row: &'a ScrapedHearing) -> &'a str {
        match self {
            WatchedField::Judge => &row.judge,
            WatchedField::Date => &row.date,
            WatchedField::Time => &row.time,
            WatchedField::Room => &row.room,
            WatchedField::Outcome => &row.outcome,
            WatchedField::HearingType => &row.hearing_type,
        }
    }
}

/// A watched field whose scraped value differs from the stored one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: WatchedField,
    pub old_value: String,
    pub new_value: String,
}

/// Audit row for one field that changed on a stored hearing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HearingChange {
    pub id: i64,
    pub hearing_id: i64,
    pub field: String,
    pub old_value: String,
    pub new_value: String,
    pub detected_at: DateTime<Utc>,
}

/// A change row with enough hearing context to notify about it.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeNotice {
    #[serde(flatten)]
    pub change: HearingChange,
    pub case_number: String,
    pub court_name: String,
    pub date: String,
    pub time: String,
    pub subject_name: String,
}

impl ChangeNotice {
    pub fn field_label(&self) -> &str {
        WatchedField::from_column(&self.change.field)
            .map(|f| f.label())
            .unwrap_or(&self.change.field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watched_field_columns_round_trip() {
        for field in WatchedField::ALL {
            assert_eq!(WatchedField::from_column(field.column()), Some(field));
        }
        assert_eq!(WatchedField::from_column("title"), None);
    }

    #[test]
    fn test_watched_field_reads_scraped_values() {
        let row = ScrapedHearing {
            judge: "Rusu Ana".into(),
            room: "12".into(),
            ..ScrapedHearing::default()
        };
        assert_eq!(WatchedField::Judge.scraped(&row), "Rusu Ana");
        assert_eq!(WatchedField::Room.scraped(&row), "12");
        assert_eq!(WatchedField::Outcome.scraped(&row), "");
    }
}
