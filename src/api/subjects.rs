// src/api/subjects.rs

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};

use super::{ApiResult, AppState};
use crate::error::AppError;
use crate::models::{MonitoredSubject, NewSubject, SubjectUpdate};
use crate::pipeline::RequestError;

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<MonitoredSubject>>> {
    Ok(Json(state.db.list_subjects()?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewSubject>,
) -> ApiResult<(StatusCode, Json<MonitoredSubject>)> {
    let subject = body.normalized(&state.config.court_codes())?;
    let created = state.db.create_subject(&subject, Utc::now())?;
    log::info!("Subject '{}' created", created.name);
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut body): Json<SubjectUpdate>,
) -> ApiResult<Json<MonitoredSubject>> {
    let known = state.config.court_codes();
    if let Some(courts) = &mut body.courts {
        if courts.is_empty() {
            *courts = known.clone();
        }
        if let Some(unknown) = courts.iter().find(|c| !known.contains(c)) {
            return Err(AppError::validation(format!("unknown court code '{unknown}'")).into());
        }
    }
    Ok(Json(state.db.update_subject(id, &body)?))
}

pub async fn remove(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    state.db.deactivate_subject(id)?;
    log::info!("Subject {} deactivated", id);
    Ok(Json(json!({ "ok": true })))
}

/// Outcome of an on-demand check for one subject.
#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub subject_id: i64,
    pub found: usize,
    pub new: usize,
    pub modified: usize,
    pub errors: Vec<RequestError>,
}

/// Hearings pass for one subject. 404 for an unknown id, 409 while a run
/// is in flight.
pub async fn check(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<CheckResult>> {
    let subject = state.db.get_subject(id)?;
    let report = state.controller.check_subject(&subject).await?;
    Ok(Json(CheckResult {
        subject_id: subject.id,
        found: report.hearings.found,
        new: report.hearings.new,
        modified: report.hearings.modified,
        errors: report.errors,
    }))
}
