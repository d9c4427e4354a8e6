// src/models/mod.rs

//! Domain models for the monitor.
//!
//! Configuration, monitored subjects, and the hearing/ruling/run-log rows
//! the store persists.

mod config;
mod hearing;
mod ruling;
mod run_log;
mod subject;

pub use config::{
    Config, CourtInfo, CrawlerConfig, NotifyConfig, ScheduleConfig, ServerConfig, StoreConfig,
    TelegramConfig, WebhookConfig,
};
pub use hearing::{
    ChangeNotice, FieldChange, HearingChange, HearingRecord, HearingWithSubject, ScrapedHearing,
    WatchedField,
};
pub use ruling::{RulingKind, RulingRecord, RulingWithSubject, ScrapedRuling};
pub use run_log::{NewRunLogEntry, RunLogEntry};
pub use subject::{CaseType, MonitoredSubject, NewSubject, SubjectUpdate};

/// One page of a listing.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub pages: usize,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: usize, page: usize, limit: usize) -> Self {
        let pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            data,
            total,
            page,
            limit,
            pages,
        }
    }
}
