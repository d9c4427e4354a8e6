// src/models/ruling.rs

//! Court rulings (decisions and interlocutory orders).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Ruling category; each is served from its own portal listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RulingKind {
    Decision,
    Interlocutory,
}

impl RulingKind {
    pub const ALL: [RulingKind; 2] = [RulingKind::Decision, RulingKind::Interlocutory];

    /// Listing path under `/ro/` on the court portal.
    pub fn path(&self) -> &'static str {
        match self {
            RulingKind::Decision => "court-decisions",
            RulingKind::Interlocutory => "court-sentences",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RulingKind::Decision => "Decision",
            RulingKind::Interlocutory => "Interlocutory",
        }
    }
}

impl fmt::Display for RulingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RulingKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        RulingKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::validation(format!("unknown ruling type '{s}'")))
    }
}

/// One ruling row parsed from a portal listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedRuling {
    pub court_code: String,
    pub court_name: String,
    pub kind: RulingKind,
    pub case_number: String,
    pub pronounced_on: String,
    pub pronounced_on_iso: String,
    pub judge: String,
    pub disposition: String,
    pub document_url: String,
}

/// Persisted ruling. Never modified after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulingRecord {
    pub id: i64,
    pub identity_hash: String,
    pub subject_id: i64,
    pub court_code: String,
    pub court_name: String,
    pub kind: RulingKind,
    pub case_number: String,
    pub pronounced_on: String,
    pub pronounced_on_iso: String,
    pub judge: String,
    pub disposition: String,
    pub document_url: String,
    pub first_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RulingWithSubject {
    #[serde(flatten)]
    pub ruling: RulingRecord,
    pub subject_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_paths() {
        assert_eq!(RulingKind::Decision.path(), "court-decisions");
        assert_eq!(RulingKind::Interlocutory.path(), "court-sentences");
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(
            "interlocutory".parse::<RulingKind>().unwrap(),
            RulingKind::Interlocutory
        );
        assert!("verdict".parse::<RulingKind>().is_err());
    }
}
