// src/api/auth.rs

//! In-memory bearer tokens and the login routes.

use std::collections::HashMap;
use std::sync::Mutex;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use super::{ApiError, ApiResult, AppState};
use crate::error::AppError;

/// Issued tokens and their expiry. Lost on restart.
pub struct TokenStore {
    ttl: Duration,
    tokens: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl TokenStore {
    pub fn new(ttl_hours: u64) -> Self {
        Self {
            ttl: Duration::hours(ttl_hours as i64),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Issue a 64-char hex token built from two v4 UUIDs (244 random bits).
    pub fn issue(&self, now: DateTime<Utc>) -> (String, DateTime<Utc>) {
        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let expires_at = now + self.ttl;
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.retain(|_, exp| *exp > now);
        tokens.insert(token.clone(), expires_at);
        (token, expires_at)
    }

    /// Whether the token exists and has not expired. Expired tokens are dropped.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> bool {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        match tokens.get(token) {
            Some(exp) if *exp > now => true,
            Some(_) => {
                tokens.remove(token);
                false
            }
            None => false,
        }
    }

    pub fn revoke(&self, token: &str) {
        self.tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(token);
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let rejection = match bearer(request.headers()) {
        Some(token) if state.tokens.validate(token, Utc::now()) => None,
        Some(_) => Some("invalid or expired token"),
        None => Some("missing bearer token"),
    };
    match rejection {
        None => next.run(request).await,
        Some(reason) => ApiError(AppError::Unauthorized(reason.into())).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let Some(expected) = state.config.server.app_password.as_deref() else {
        return Err(AppError::Unauthorized("login is disabled: no app password configured".into()).into());
    };
    if body.password != expected {
        log::warn!("Rejected login attempt");
        return Err(AppError::Unauthorized("wrong password".into()).into());
    }
    let (token, expires_at) = state.tokens.issue(Utc::now());
    Ok(Json(LoginResponse { token, expires_at }))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    if let Some(token) = bearer(&headers) {
        state.tokens.revoke(token);
    }
    Json(json!({ "ok": true }))
}

pub async fn check() -> Json<Value> {
    Json(json!({ "valid": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_token_lifecycle() {
        let store = TokenStore::new(24);
        let now = Utc::now();
        let (token, expires_at) = store.issue(now);
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(expires_at - now, Duration::hours(24));

        assert!(store.validate(&token, now));
        assert!(!store.validate(&token, now + Duration::hours(25)));
        // dropped once seen expired
        assert!(!store.validate(&token, now));
    }

    #[test]
    fn test_revoke() {
        let store = TokenStore::new(1);
        let (token, _) = store.issue(Utc::now());
        store.revoke(&token);
        assert!(!store.validate(&token, Utc::now()));
    }

    #[test]
    fn test_bearer_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer(&headers), Some("abc"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer(&headers), None);
    }
}
