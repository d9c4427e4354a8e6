// src/models/subject.rs

//! Monitored subjects and their case-type filter.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Case-type filter sent to the portal listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseType {
    #[default]
    Any,
    Civil,
    Penal,
    Contravention,
}

impl CaseType {
    pub const ALL: [CaseType; 4] = [
        CaseType::Any,
        CaseType::Civil,
        CaseType::Penal,
        CaseType::Contravention,
    ];

    /// Query-string value understood by the portal.
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseType::Any => "Any",
            CaseType::Civil => "Civil",
            CaseType::Penal => "Penal",
            CaseType::Contravention => "Contravention",
        }
    }
}

impl fmt::Display for CaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        CaseType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::validation(format!("unknown case type '{s}'")))
    }
}

/// A person whose court activity is tracked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitoredSubject {
    pub id: i64,

    /// Full name as typed into the portal search
    pub name: String,

    /// Court codes to watch, polled in this order
    pub courts: Vec<String>,

    pub case_type: CaseType,

    #[serde(default)]
    pub note: Option<String>,

    pub active: bool,

    pub created_at: DateTime<Utc>,
}

/// Input for creating a subject.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSubject {
    #[serde(default)]
    pub name: String,

    /// Empty means "every known court"
    #[serde(default)]
    pub courts: Vec<String>,

    #[serde(default)]
    pub case_type: CaseType,

    #[serde(default)]
    pub note: Option<String>,
}

impl NewSubject {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Trim the name and fill in the default court list.
    pub fn normalized(mut self, all_courts: &[String]) -> Result<Self> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(AppError::validation("subject name is required"));
        }
        if self.courts.is_empty() {
            self.courts = all_courts.to_vec();
        }
        if let Some(unknown) = self.courts.iter().find(|c| !all_courts.contains(c)) {
            return Err(AppError::validation(format!("unknown court code '{unknown}'")));
        }
        Ok(self)
    }
}

/// Partial update of a subject; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubjectUpdate {
    pub name: Option<String>,
    pub courts: Option<Vec<String>>,
    pub case_type: Option<CaseType>,
    pub note: Option<String>,
    pub active: Option<bool>,
}

impl SubjectUpdate {
    /// Apply the update on top of an existing subject.
    pub fn apply_to(&self, subject: &MonitoredSubject) -> Result<MonitoredSubject> {
        let mut updated = subject.clone();
        if let Some(name) = &self.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::validation("subject name cannot be empty"));
            }
            updated.name = name.to_string();
        }
        if let Some(courts) = &self.courts {
            updated.courts = courts.clone();
        }
        if let Some(case_type) = self.case_type {
            updated.case_type = case_type;
        }
        if let Some(note) = &self.note {
            updated.note = Some(note.clone()).filter(|n| !n.is_empty());
        }
        if let Some(active) = self.active {
            updated.active = active;
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn courts() -> Vec<String> {
        vec!["jc".to_string(), "cac".to_string()]
    }

    #[test]
    fn test_case_type_parses_case_insensitively() {
        assert_eq!("penal".parse::<CaseType>().unwrap(), CaseType::Penal);
        assert_eq!(" Any ".parse::<CaseType>().unwrap(), CaseType::Any);
        assert!("criminal".parse::<CaseType>().is_err());
    }

    #[test]
    fn test_new_subject_defaults_to_all_courts() {
        let subject = NewSubject::named("  Popescu Ion ").normalized(&courts()).unwrap();
        assert_eq!(subject.name, "Popescu Ion");
        assert_eq!(subject.courts, courts());
    }

    #[test]
    fn test_new_subject_rejects_blank_name() {
        assert!(NewSubject::named("   ").normalized(&courts()).is_err());
    }

    #[test]
    fn test_new_subject_rejects_unknown_court() {
        let mut subject = NewSubject::named("Ion");
        subject.courts = vec!["xyz".into()];
        assert!(subject.normalized(&courts()).is_err());
    }

    #[test]
    fn test_update_keeps_absent_fields() {
        let subject = MonitoredSubject {
            id: 1,
            name: "Ion".into(),
            courts: courts(),
            case_type: CaseType::Civil,
            note: Some("client".into()),
            active: true,
            created_at: Utc::now(),
        };
        let update = SubjectUpdate {
            active: Some(false),
            ..SubjectUpdate::default()
        };
        let updated = update.apply_to(&subject).unwrap();
        assert!(!updated.active);
        assert_eq!(updated.case_type, CaseType::Civil);
        assert_eq!(updated.note.as_deref(), Some("client"));
    }
}
