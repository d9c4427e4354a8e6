// src/api/hearings.rs

//! Hearing listing, detail, calendar, CSV export and the ruling listing.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::IntoResponse;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{ApiResult, AppState};
use crate::error::AppError;
use crate::export::hearings_csv;
use crate::models::{HearingChange, HearingWithSubject, Page, RulingKind, RulingWithSubject};
use crate::storage::{HearingFilter, HearingSort, RulingFilter};
use crate::utils::dates::month_bounds;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 100;
const CALENDAR_LIMIT: usize = 10_000;

/// Clamp paging parameters to `page >= 1`, `1 <= limit <= 100`.
pub fn paging(page: Option<usize>, limit: Option<usize>) -> (usize, usize) {
    (
        page.unwrap_or(1).max(1),
        limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct HearingQuery {
    pub subject_id: Option<i64>,
    pub court: Option<String>,
    pub case_type: Option<String>,
    /// "1" or "true" keeps only hearings from today on
    pub upcoming: Option<String>,
    pub q: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub sort: Option<String>,
    /// "asc" or "desc" (default)
    pub order: Option<String>,
}

impl HearingQuery {
    pub fn filter(&self, today: NaiveDate) -> HearingFilter {
        let upcoming = matches!(self.upcoming.as_deref(), Some("1" | "true"));
        HearingFilter {
            subject_id: self.subject_id,
            court_code: self.court.clone(),
            case_type: self
                .case_type
                .clone()
                .filter(|t| !t.eq_ignore_ascii_case("any")),
            from_date: upcoming.then_some(today),
            text: self.q.clone(),
            sort: self
                .sort
                .as_deref()
                .and_then(HearingSort::from_param)
                .unwrap_or_default(),
            descending: !self
                .order
                .as_deref()
                .is_some_and(|o| o.eq_ignore_ascii_case("asc")),
        }
    }
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<HearingQuery>,
) -> ApiResult<Json<Page<HearingWithSubject>>> {
    let (page, limit) = paging(query.page, query.limit);
    let filter = query.filter(state.today()?);
    Ok(Json(state.db.list_hearings(&filter, page, limit)?))
}

#[derive(Debug, Serialize)]
pub struct HearingDetail {
    #[serde(flatten)]
    pub hearing: HearingWithSubject,
    pub changes: Vec<HearingChange>,
}

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<HearingDetail>> {
    let hearing = state.db.get_hearing(id)?;
    let changes = state.db.hearing_changes(id)?;
    Ok(Json(HearingDetail { hearing, changes }))
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

/// Hearings of one month keyed by ISO date. Defaults to the current month.
pub async fn calendar(
    State(state): State<AppState>,
    Query(query): Query<CalendarQuery>,
) -> ApiResult<Json<BTreeMap<String, Vec<HearingWithSubject>>>> {
    let today = state.today()?;
    let year = query.year.unwrap_or(today.year());
    let month = query.month.unwrap_or(today.month());
    let (first, last) = month_bounds(year, month)
        .ok_or_else(|| AppError::validation(format!("invalid month {month}/{year}")))?;

    let mut grouped: BTreeMap<String, Vec<HearingWithSubject>> = BTreeMap::new();
    for item in state.db.hearings_between(first, last, CALENDAR_LIMIT)? {
        grouped
            .entry(item.hearing.date_iso.clone())
            .or_default()
            .push(item);
    }
    Ok(Json(grouped))
}

pub async fn export(
    State(state): State<AppState>,
    Query(query): Query<HearingQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = query.filter(state.today()?);
    let hearings = state.db.filtered_hearings(&filter)?;
    let file_name = format!("hearings-{}.csv", state.today()?.format("%Y-%m-%d"));
    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        hearings_csv(&hearings),
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct RulingQuery {
    pub subject_id: Option<i64>,
    pub court: Option<String>,
    pub kind: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

pub async fn rulings(
    State(state): State<AppState>,
    Query(query): Query<RulingQuery>,
) -> ApiResult<Json<Page<RulingWithSubject>>> {
    let (page, limit) = paging(query.page, query.limit);
    let kind = query
        .kind
        .as_deref()
        .filter(|k| !k.is_empty())
        .map(str::parse::<RulingKind>)
        .transpose()?;
    let filter = RulingFilter {
        subject_id: query.subject_id,
        court_code: query.court,
        kind,
    };
    Ok(Json(state.db.list_rulings(&filter, page, limit)?))
}
