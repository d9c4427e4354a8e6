// src/notify/webhook.rs

//! Generic JSON webhook: one POST per event, target read from settings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::Result;
use crate::models::{ChangeNotice, HearingWithSubject, RulingWithSubject, WebhookConfig};
use crate::notify::{Delivery, NotificationChannel};
use crate::pipeline::RunReport;
use crate::storage::Database;
use crate::utils::http::create_api_client;

/// Settings key holding the target URL.
pub const WEBHOOK_URL_KEY: &str = "webhook_url";

#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    pub event: &'static str,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

impl WebhookEvent {
    pub fn hearing_new(item: &HearingWithSubject, timestamp: DateTime<Utc>) -> Self {
        let h = &item.hearing;
        Self {
            event: "hearing_new",
            timestamp,
            data: json!({
                "case_number": h.case_number,
                "date": h.date,
                "time": h.time,
                "court": h.court_name,
                "judge": h.judge,
                "subject_matter": h.subject_matter,
                "subject": item.subject_name,
            }),
        }
    }

    pub fn hearing_modified(notice: &ChangeNotice, timestamp: DateTime<Utc>) -> Self {
        Self {
            event: "hearing_modified",
            timestamp,
            data: json!({
                "case_number": notice.case_number,
                "date": notice.date,
                "court": notice.court_name,
                "field": notice.change.field,
                "old_value": notice.change.old_value,
                "new_value": notice.change.new_value,
                "subject": notice.subject_name,
            }),
        }
    }

    pub fn ruling_new(item: &RulingWithSubject, timestamp: DateTime<Utc>) -> Self {
        let r = &item.ruling;
        Self {
            event: "ruling_new",
            timestamp,
            data: json!({
                "case_number": r.case_number,
                "kind": r.kind,
                "pronounced_on": r.pronounced_on,
                "court": r.court_name,
                "judge": r.judge,
                "disposition": r.disposition,
                "subject": item.subject_name,
            }),
        }
    }
}

/// All events for a run, in report order.
pub fn events(report: &RunReport, timestamp: DateTime<Utc>) -> Vec<WebhookEvent> {
    report
        .new_hearings
        .iter()
        .map(|h| WebhookEvent::hearing_new(h, timestamp))
        .chain(
            report
                .changes
                .iter()
                .map(|c| WebhookEvent::hearing_modified(c, timestamp)),
        )
        .chain(
            report
                .new_rulings
                .iter()
                .map(|r| WebhookEvent::ruling_new(r, timestamp)),
        )
        .collect()
}

/// Accept only absolute http(s) targets.
pub fn valid_target(raw: &str) -> Option<&str> {
    let url = raw.trim();
    (url.starts_with("http://") || url.starts_with("https://")).then_some(url)
}

pub struct WebhookChannel {
    db: Database,
    client: Client,
}

impl WebhookChannel {
    pub fn new(db: Database, config: &WebhookConfig) -> Result<Self> {
        Ok(Self {
            db,
            client: create_api_client(config.timeout_secs)?,
        })
    }

    /// Current target, re-read on every dispatch so settings edits apply
    /// without a restart.
    fn target(&self) -> Option<String> {
        match self.db.get_setting(WEBHOOK_URL_KEY) {
            Ok(Some(raw)) => valid_target(&raw).map(str::to_string),
            Ok(None) => None,
            Err(e) => {
                log::warn!("Could not read webhook target: {}", e);
                None
            }
        }
    }

    async fn post(&self, url: &str, event: &WebhookEvent) -> Result<()> {
        self.client
            .post(url)
            .json(event)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn publish(&self, report: &RunReport) -> Delivery {
        let Some(url) = self.target() else {
            return Delivery::skipped();
        };

        let mut delivery = Delivery::default();
        for event in events(report, Utc::now()) {
            match self.post(&url, &event).await {
                Ok(()) => delivery.sent += 1,
                Err(e) => {
                    log::warn!("Webhook {} failed: {}", event.event, e);
                    delivery.failed += 1;
                }
            }
        }
        delivery
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RulingKind, RulingRecord};

    #[test]
    fn test_valid_target_requires_http_scheme() {
        assert_eq!(
            valid_target("  https://hooks.example.com/x "),
            Some("https://hooks.example.com/x")
        );
        assert_eq!(valid_target("http://10.0.0.1"), Some("http://10.0.0.1"));
        assert_eq!(valid_target("ftp://example.com"), None);
        assert_eq!(valid_target(""), None);
    }

    #[test]
    fn test_ruling_event_envelope() {
        let item = RulingWithSubject {
            ruling: RulingRecord {
                id: 1,
                identity_hash: "h".into(),
                subject_id: 1,
                court_code: "jc".into(),
                court_name: "Judecătoria Chișinău".into(),
                kind: RulingKind::Decision,
                case_number: "2-1/2025".into(),
                pronounced_on: "01.05.2025".into(),
                pronounced_on_iso: "2025-05-01".into(),
                judge: String::new(),
                disposition: "Admite".into(),
                document_url: String::new(),
                first_seen_at: Utc::now(),
            },
            subject_name: "Popescu Ion".into(),
        };
        let event = WebhookEvent::ruling_new(&item, Utc::now());
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "ruling_new");
        assert_eq!(value["data"]["case_number"], "2-1/2025");
        assert_eq!(value["data"]["subject"], "Popescu Ion");
        assert!(value["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_publish_skipped_without_target() {
        let db = Database::open_in_memory().unwrap();
        let channel = WebhookChannel::new(db.clone(), &WebhookConfig::default()).unwrap();
        let report = RunReport::new(Utc::now());
        assert_eq!(channel.publish(&report).await, Delivery::skipped());

        db.put_setting(WEBHOOK_URL_KEY, "not a url").unwrap();
        assert_eq!(channel.publish(&report).await, Delivery::skipped());
    }
}
