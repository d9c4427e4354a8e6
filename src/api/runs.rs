// src/api/runs.rs

//! Run control, run log, settings, search, dashboard, status and health.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::hearings::paging;
use super::{ApiResult, AppState};
use crate::config::{EffectiveSettings, validate_settings};
use crate::error::AppError;
use crate::models::{HearingWithSubject, MonitoredSubject, Page, RunLogEntry};
use crate::pipeline::RunProgress;
use crate::scheduler::TriggerOutcome;
use crate::storage::{BadgeStats, DailyCount, DashboardStats};

const RUN_LOG_DEFAULT_LIMIT: usize = 50;
const SEARCH_SUBJECTS: usize = 5;
const SEARCH_HEARINGS: usize = 10;
const MIN_QUERY_CHARS: usize = 2;
const TIMELINE_DAYS: i64 = 30;
const ACTIVITY_LIMIT: usize = 20;
const UPCOMING_DEFAULT_LIMIT: usize = 10;

pub async fn trigger(State(state): State<AppState>) -> ApiResult<(StatusCode, Json<Value>)> {
    match state.controller.trigger_manual() {
        TriggerOutcome::Started => Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "status": "running", "message": "check started" })),
        )),
        TriggerOutcome::Conflict => Err(AppError::RunInProgress.into()),
    }
}

pub async fn status(State(state): State<AppState>) -> Json<RunProgress> {
    Json(state.controller.progress())
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

pub async fn log(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> ApiResult<Json<Page<RunLogEntry>>> {
    let (page, limit) = paging(query.page, query.limit.or(Some(RUN_LOG_DEFAULT_LIMIT)));
    Ok(Json(state.db.list_run_log(page, limit)?))
}

pub async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<EffectiveSettings>> {
    Ok(Json(EffectiveSettings::load(&state.db, &state.config)?))
}

#[derive(Debug, Deserialize)]
pub struct SettingsUpdate {
    pub settings: BTreeMap<String, Value>,
}

/// Scalars are stored as their text form; strings without quotes.
fn setting_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub async fn put_settings(
    State(state): State<AppState>,
    Json(body): Json<SettingsUpdate>,
) -> ApiResult<Json<Value>> {
    let values: BTreeMap<String, String> = body
        .settings
        .iter()
        .map(|(k, v)| (k.clone(), setting_text(v)))
        .collect();
    validate_settings(&values)?;
    state.db.put_settings(&values)?;
    log::info!("Updated {} setting(s); schedules apply on next start", values.len());
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct SearchResults {
    pub subjects: Vec<MonitoredSubject>,
    pub hearings: Vec<HearingWithSubject>,
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<SearchResults>> {
    let q = query.q.as_deref().map(str::trim).unwrap_or_default();
    if q.chars().count() < MIN_QUERY_CHARS {
        return Ok(Json(SearchResults::default()));
    }
    let subjects = state
        .db
        .search_subjects(q, SEARCH_SUBJECTS * 4)?
        .into_iter()
        .filter(|s| s.active)
        .take(SEARCH_SUBJECTS)
        .collect();
    let hearings = state.db.search_hearings(q, SEARCH_HEARINGS)?;
    Ok(Json(SearchResults { subjects, hearings }))
}

pub async fn dashboard(State(state): State<AppState>) -> ApiResult<Json<DashboardStats>> {
    Ok(Json(state.db.dashboard_stats(state.today()?, Utc::now())?))
}

pub async fn timeline(State(state): State<AppState>) -> ApiResult<Json<Vec<DailyCount>>> {
    let since = Utc::now() - Duration::days(TIMELINE_DAYS);
    Ok(Json(state.db.first_seen_by_day(since)?))
}

/// Latest attempts with subject names.
pub async fn activity(State(state): State<AppState>) -> ApiResult<Json<Vec<RunLogEntry>>> {
    Ok(Json(state.db.list_run_log(1, ACTIVITY_LIMIT)?.data))
}

pub async fn upcoming(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> ApiResult<Json<Vec<HearingWithSubject>>> {
    let (_, limit) = paging(None, query.limit.or(Some(UPCOMING_DEFAULT_LIMIT)));
    Ok(Json(state.db.upcoming_hearings(state.today()?, limit)?))
}

pub async fn badge(State(state): State<AppState>) -> ApiResult<Json<BadgeStats>> {
    Ok(Json(state.db.badge_stats(state.today()?)?))
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub uptime_secs: u64,
    pub version: &'static str,
    pub subjects: usize,
    pub hearings: usize,
    pub upcoming: usize,
    pub last_check: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub attempts_24h: usize,
    pub telegram_configured: bool,
}

/// Store counters and process facts for the settings page.
pub async fn system_status(State(state): State<AppState>) -> ApiResult<Json<SystemStatus>> {
    let latest = state.db.list_run_log(1, 1)?.data.into_iter().next();
    Ok(Json(SystemStatus {
        uptime_secs: state.started_at.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
        subjects: state.db.count_active_subjects()?,
        hearings: state.db.count_hearings()?,
        upcoming: state.db.count_upcoming_hearings(state.today()?)?,
        last_check: latest.as_ref().map(|e| e.timestamp),
        last_error: latest.and_then(|e| e.error),
        attempts_24h: state.db.count_run_log_since(Utc::now() - Duration::hours(24))?,
        telegram_configured: state.config.telegram_enabled(),
    }))
}

/// Unauthenticated liveness probe. A failing store reports `degraded`
/// instead of an error status.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let db_ok = state.db.ping().is_ok();
    let last_check = if db_ok {
        state.db.last_run_at().ok().flatten()
    } else {
        None
    };
    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "db": db_ok,
        "last_check": last_check,
        "telegram_configured": state.config.telegram_enabled(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_text() {
        assert_eq!(setting_text(&json!("0 8 * * *")), "0 8 * * *");
        assert_eq!(setting_text(&json!(2500)), "2500");
        assert_eq!(setting_text(&json!(true)), "true");
        assert_eq!(setting_text(&Value::Null), "");
    }
}
