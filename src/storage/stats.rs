// src/storage/stats.rs

//! Aggregate counters for the dashboard and the weekly digest.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use super::{Database, count};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub subjects: usize,
    pub upcoming: usize,
    pub today: usize,
    pub tomorrow: usize,
    pub changes_24h: usize,
    pub new_24h: usize,
    pub last_check: Option<DateTime<Utc>>,
}

/// Hearings first seen on one UTC day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub day: NaiveDate,
    pub count: usize,
}

/// Sidebar badge: the coming week and the latest attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadgeStats {
    pub hearings_7d: usize,
    /// `None` before the first attempt
    pub last_check_ok: Option<bool>,
    pub last_check: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestStats {
    pub active_subjects: usize,
    pub new_hearings_7d: usize,
    pub upcoming_hearings: usize,
    pub new_rulings_7d: usize,
    pub attempts_7d: usize,
}

impl Database {
    pub fn count_active_subjects(&self) -> Result<usize> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM subjects WHERE active = 1", [], |r| {
                count(r, 0)
            })
        })
    }

    pub fn count_hearings(&self) -> Result<usize> {
        self.with_conn(|conn| conn.query_row("SELECT COUNT(*) FROM hearings", [], |r| count(r, 0)))
    }

    /// `today` is the calendar date in the monitor's timezone.
    pub fn dashboard_stats(&self, today: NaiveDate, now: DateTime<Utc>) -> Result<DashboardStats> {
        let tomorrow = today + Duration::days(1);
        let day_ago = now - Duration::hours(24);
        Ok(DashboardStats {
            subjects: self.count_active_subjects()?,
            upcoming: self.count_upcoming_hearings(today)?,
            today: self.count_hearings_between(today, today)?,
            tomorrow: self.count_hearings_between(tomorrow, tomorrow)?,
            changes_24h: self.count_changes_since(day_ago)?,
            new_24h: self.count_hearings_first_seen_since(day_ago)?,
            last_check: self.last_run_at()?,
        })
    }

    /// New hearings per day since `since`, oldest day first.
    pub fn first_seen_by_day(&self, since: DateTime<Utc>) -> Result<Vec<DailyCount>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT date(first_seen_at) AS day, COUNT(*) FROM hearings
                 WHERE first_seen_at >= ?1 GROUP BY day ORDER BY day",
            )?;
            let rows = stmt.query_map([since], |r| {
                Ok(DailyCount {
                    day: r.get(0)?,
                    count: count(r, 1)?,
                })
            })?;
            rows.collect()
        })
    }

    pub fn badge_stats(&self, today: NaiveDate) -> Result<BadgeStats> {
        let latest = self.list_run_log(1, 1)?.data.into_iter().next();
        Ok(BadgeStats {
            hearings_7d: self.count_hearings_between(today, today + Duration::days(7))?,
            last_check_ok: latest.as_ref().map(|e| e.error.is_none()),
            last_check: latest.map(|e| e.timestamp),
        })
    }

    pub fn digest_stats(&self, today: NaiveDate, now: DateTime<Utc>) -> Result<DigestStats> {
        let week_ago = now - Duration::days(7);
        Ok(DigestStats {
            active_subjects: self.count_active_subjects()?,
            new_hearings_7d: self.count_hearings_first_seen_since(week_ago)?,
            upcoming_hearings: self.count_upcoming_hearings(today)?,
            new_rulings_7d: self.count_rulings_first_seen_since(week_ago)?,
            attempts_7d: self.count_run_log_since(week_ago)?,
        })
    }
}
