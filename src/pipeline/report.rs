// src/pipeline/report.rs

//! Aggregate result of one run.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{ChangeNotice, HearingWithSubject, RulingWithSubject};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub found: usize,
    pub new: usize,
    pub modified: usize,
}

/// A failed portal request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestError {
    pub subject: String,
    pub court_code: String,
    /// "hearings", or the ruling kind
    pub listing: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub subjects: usize,
    pub hearings: Totals,
    pub rulings: Totals,
    pub new_hearings: Vec<HearingWithSubject>,
    pub changes: Vec<ChangeNotice>,
    pub new_rulings: Vec<RulingWithSubject>,
    pub errors: Vec<RequestError>,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            subjects: 0,
            hearings: Totals::default(),
            rulings: Totals::default(),
            new_hearings: Vec::new(),
            changes: Vec::new(),
            new_rulings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Anything worth notifying about.
    pub fn has_news(&self) -> bool {
        !self.new_hearings.is_empty() || !self.changes.is_empty() || !self.new_rulings.is_empty()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    /// Key/value lines for `utils::log::summary`.
    pub fn summary_items(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Subjects", self.subjects.to_string()),
            ("Hearings found", self.hearings.found.to_string()),
            ("New hearings", self.hearings.new.to_string()),
            ("Modified hearings", self.hearings.modified.to_string()),
            ("Rulings found", self.rulings.found.to_string()),
            ("New rulings", self.rulings.new.to_string()),
            ("Errors", self.errors.len().to_string()),
            ("Duration", format!("{} ms", self.duration_ms())),
        ]
    }
}
