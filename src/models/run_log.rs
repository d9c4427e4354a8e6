// src/models/run_log.rs

//! Per-attempt audit of hearing fetches.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One (subject, court) hearing attempt within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub id: i64,
    pub subject_id: Option<i64>,
    /// Filled by joins for display; not stored
    #[serde(default)]
    pub subject_name: Option<String>,
    pub court_code: String,
    pub found: usize,
    pub new_count: usize,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Input for appending a run-log row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRunLogEntry {
    pub subject_id: Option<i64>,
    pub court_code: String,
    pub found: usize,
    pub new_count: usize,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl NewRunLogEntry {
    pub fn succeeded(subject_id: i64, court_code: &str, found: usize, new_count: usize) -> Self {
        Self {
            subject_id: Some(subject_id),
            court_code: court_code.to_string(),
            found,
            new_count,
            ..Self::default()
        }
    }

    /// Failed attempts carry the error text and zero counts.
    pub fn failed(subject_id: i64, court_code: &str, error: impl ToString) -> Self {
        Self {
            subject_id: Some(subject_id),
            court_code: court_code.to_string(),
            error: Some(error.to_string()),
            ..Self::default()
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}
