// src/api/mod.rs

//! JSON API over the store and the run controller.
//!
//! Every route except `/api/health` and `/api/auth/login` requires a bearer
//! token issued by `/api/auth/login`.

pub mod auth;
pub mod hearings;
pub mod runs;
pub mod subjects;

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::scheduler::RunController;
use crate::storage::Database;
use crate::utils::dates::local_date;

pub use auth::TokenStore;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub controller: Arc<RunController>,
    pub tokens: Arc<TokenStore>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(db: Database, config: Arc<Config>, controller: Arc<RunController>) -> Self {
        let tokens = Arc::new(TokenStore::new(config.server.token_ttl_hours));
        Self {
            db,
            config,
            controller,
            tokens,
            started_at: Instant::now(),
        }
    }

    /// Calendar date in the monitor's timezone.
    pub fn today(&self) -> Result<NaiveDate> {
        Ok(local_date(Utc::now(), self.config.timezone()?))
    }
}

/// `AppError` rendered as `{ "error": message }` with a matching status.
#[derive(Debug)]
pub struct ApiError(pub AppError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl<E: Into<AppError>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::RunInProgress => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("API error: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/check", get(auth::check))
        .route("/api/subjects", get(subjects::list).post(subjects::create))
        .route("/api/subjects/:id", put(subjects::update).delete(subjects::remove))
        .route("/api/subjects/:id/check", post(subjects::check))
        .route("/api/hearings", get(hearings::list))
        .route("/api/hearings/calendar", get(hearings::calendar))
        .route("/api/hearings/export", get(hearings::export))
        .route("/api/hearings/:id", get(hearings::detail))
        .route("/api/rulings", get(hearings::rulings))
        .route("/api/runs", post(runs::trigger))
        .route("/api/runs/status", get(runs::status))
        .route("/api/runs/log", get(runs::log))
        .route("/api/settings", get(runs::get_settings).put(runs::put_settings))
        .route("/api/settings/status", get(runs::system_status))
        .route("/api/search", get(runs::search))
        .route("/api/dashboard/stats", get(runs::dashboard))
        .route("/api/dashboard/timeline", get(runs::timeline))
        .route("/api/dashboard/activity", get(runs::activity))
        .route("/api/dashboard/upcoming", get(runs::upcoming))
        .route("/api/dashboard/badge", get(runs::badge))
        .route_layer(from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .route("/api/health", get(runs::health))
        .route("/api/auth/login", post(auth::login))
        .merge(protected)
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState) -> Result<()> {
    let bind = state.config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    log::info!("API listening on {}", bind);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MonitoredSubject, NewSubject, RulingKind, ScrapedHearing, ScrapedRuling};
    use crate::notify::Dispatcher;
    use crate::pipeline::Orchestrator;
    use crate::services::CourtSource;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;
    use tower::ServiceExt;

    /// One hearing per court. While `held`, fetches wait for `release`.
    struct Portal {
        held: AtomicBool,
        release: Notify,
    }

    impl Portal {
        fn open(&self) {
            self.held.store(false, Ordering::SeqCst);
            self.release.notify_one();
        }
    }

    #[async_trait]
    impl CourtSource for Portal {
        async fn fetch_hearings(
            &self,
            _subject: &MonitoredSubject,
            court_code: &str,
        ) -> Result<Vec<ScrapedHearing>> {
            if self.held.load(Ordering::SeqCst) {
                self.release.notified().await;
            }
            Ok(vec![ScrapedHearing {
                court_code: court_code.into(),
                court_name: court_code.to_uppercase(),
                case_number: "2-101/2025".into(),
                date: "20.05.2025".into(),
                date_iso: "2025-05-20".into(),
                time: "09:30".into(),
                ..ScrapedHearing::default()
            }])
        }

        async fn fetch_rulings(
            &self,
            _subject: &MonitoredSubject,
            _court_code: &str,
            _kind: RulingKind,
        ) -> Result<Vec<ScrapedRuling>> {
            Ok(Vec::new())
        }
    }

    struct TestApp {
        router: Router,
        state: AppState,
        portal: Arc<Portal>,
        subject_id: i64,
    }

    impl TestApp {
        fn new(held: bool) -> Self {
            let db = Database::open_in_memory().unwrap();
            let mut subject = NewSubject::named("Popescu Ion");
            subject.courts = vec!["jc".into()];
            let subject_id = db.create_subject(&subject, Utc::now()).unwrap().id;

            let mut config = Config::default();
            config.server.app_password = Some("secret".into());
            let config = Arc::new(config);

            let portal = Arc::new(Portal {
                held: AtomicBool::new(held),
                release: Notify::new(),
            });
            let orchestrator = Orchestrator::new(db.clone(), portal.clone(), &config)
                .with_delay(Duration::ZERO);
            let controller = RunController::new(orchestrator, Dispatcher::new());
            let state = AppState::new(db, config, controller);

            Self {
                router: router(state.clone()),
                state,
                portal,
                subject_id,
            }
        }

        fn token(&self) -> String {
            self.state.tokens.issue(Utc::now()).0
        }

        async fn send(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut request = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                request = request.header(AUTHORIZATION, format!("Bearer {token}"));
            }
            let request = match body {
                Some(json) => request
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(json.to_string())),
                None => request.body(Body::empty()),
            }
            .unwrap();

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
        }

        async fn wait_idle(&self) {
            for _ in 0..100 {
                if !self.state.controller.is_running() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("run did not finish");
        }
    }

    #[tokio::test]
    async fn test_health_needs_no_token() {
        let app = TestApp::new(false);
        let (status, body) = app.send("GET", "/api/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["db"], true);
    }

    #[tokio::test]
    async fn test_protected_route_rejects_missing_or_unknown_token() {
        let app = TestApp::new(false);
        let (status, body) = app.send("GET", "/api/subjects", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].as_str().unwrap().contains("missing bearer token"));

        let (status, _) = app.send("GET", "/api/subjects", Some("nope"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = app.send("GET", "/api/dashboard/stats", Some("nope"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_token_opens_and_logout_closes() {
        let app = TestApp::new(false);
        let wrong = json!({ "password": "guess" });
        let (status, _) = app.send("POST", "/api/auth/login", None, Some(wrong)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let right = json!({ "password": "secret" });
        let (status, body) = app.send("POST", "/api/auth/login", None, Some(right)).await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();

        let (status, body) = app.send("GET", "/api/subjects", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = app.send("POST", "/api/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = app.send("GET", "/api/subjects", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_blank_subject_name_is_bad_request() {
        let app = TestApp::new(false);
        let token = app.token();
        let (status, body) = app
            .send("POST", "/api/subjects", Some(&token), Some(json!({ "name": "  " })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (_, body) = app.send("GET", "/api/subjects", Some(&token), None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_trigger_and_subject_check_conflict() {
        let app = TestApp::new(true);
        let token = app.token();

        let (status, body) = app.send("POST", "/api/runs", Some(&token), None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "running");

        let (status, _) = app.send("POST", "/api/runs", Some(&token), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let check = format!("/api/subjects/{}/check", app.subject_id);
        let (status, _) = app.send("POST", &check, Some(&token), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        app.portal.open();
        app.wait_idle().await;
        let (status, body) = app.send("POST", &check, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        // the background run already stored the hearing
        assert_eq!((body["found"].as_u64(), body["new"].as_u64()), (Some(1), Some(0)));
    }

    #[tokio::test]
    async fn test_subject_check_reports_totals() {
        let app = TestApp::new(false);
        let token = app.token();

        let (status, _) = app.send("POST", "/api/subjects/999/check", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let check = format!("/api/subjects/{}/check", app.subject_id);
        let (status, body) = app.send("POST", &check, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subject_id"].as_i64(), Some(app.subject_id));
        assert_eq!(body["found"].as_u64(), Some(1));
        assert_eq!(body["new"].as_u64(), Some(1));
        assert_eq!(body["modified"].as_u64(), Some(0));
        assert!(body["errors"].as_array().unwrap().is_empty());

        let (_, activity) = app.send("GET", "/api/dashboard/activity", Some(&token), None).await;
        let activity = activity.as_array().unwrap();
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0]["court_code"], "jc");

        let (_, badge) = app.send("GET", "/api/dashboard/badge", Some(&token), None).await;
        assert_eq!(badge["last_check_ok"], true);

        let (_, timeline) = app.send("GET", "/api/dashboard/timeline", Some(&token), None).await;
        assert_eq!(timeline.as_array().unwrap().len(), 1);
        assert_eq!(timeline[0]["count"].as_u64(), Some(1));

        let (status, system) = app.send("GET", "/api/settings/status", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(system["hearings"].as_u64(), Some(1));
        assert_eq!(system["subjects"].as_u64(), Some(1));
        assert_eq!(system["last_error"], Value::Null);
    }

    #[tokio::test]
    async fn test_run_log_page_far_past_the_end() {
        let app = TestApp::new(false);
        let token = app.token();
        let uri = format!("/api/runs/log?page={}&limit=100", usize::MAX);
        let (status, body) = app.send("GET", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].as_array().unwrap().is_empty());
    }
}
