// src/notify/telegram.rs

//! Telegram Bot API client and the bot notification channel.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::TelegramConfig;
use crate::notify::format::{MESSAGE_LIMIT, split_message};
use crate::notify::{Delivery, NotificationChannel, fanout};
use crate::pipeline::RunReport;
use crate::utils::http::create_api_client;

/// Slack on top of the long-poll timeout before the HTTP client gives up.
const POLL_SLACK_SECS: u64 = 15;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Thin Bot API client. The token is part of every URL, so transport
/// errors are stripped of their URL before they are surfaced.
#[derive(Clone)]
pub struct TelegramApi {
    client: Client,
    base: String,
}

impl TelegramApi {
    pub fn new(config: &TelegramConfig, token: &str) -> Result<Self> {
        Ok(Self {
            client: create_api_client(config.poll_timeout_secs + POLL_SLACK_SECS)?,
            base: format!("{}/bot{}", config.api_base.trim_end_matches('/'), token),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base, method)
    }

    async fn call<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response: ApiResponse<T> = request
            .send()
            .await
            .map_err(|e| AppError::Http(e.without_url()))?
            .json()
            .await
            .map_err(|e| AppError::Http(e.without_url()))?;

        if !response.ok {
            return Err(AppError::Telegram(
                response
                    .description
                    .unwrap_or_else(|| "request rejected".to_string()),
            ));
        }
        response
            .result
            .ok_or_else(|| AppError::Telegram("response without result".to_string()))
    }

    /// Send an HTML message to a chat.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let request = self.client.post(self.method_url("sendMessage")).json(&json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        }));
        self.call::<serde_json::Value>(request).await?;
        Ok(())
    }

    /// Upload a file as a document attachment.
    pub async fn send_document(
        &self,
        chat_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<()> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("text/plain; charset=utf-8")
            .map_err(|e| AppError::Http(e.without_url()))?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("document", part);
        let request = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form);
        self.call::<serde_json::Value>(request).await?;
        Ok(())
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let request = self.client.get(self.method_url("getUpdates")).query(&[
            ("offset", offset.to_string()),
            ("timeout", timeout_secs.to_string()),
            ("allowed_updates", "[\"message\"]".to_string()),
        ]);
        self.call(request).await
    }
}

/// Pushes planned run messages to the configured chat.
pub struct BotChannel {
    api: TelegramApi,
    chat_id: String,
    threshold: usize,
}

impl BotChannel {
    pub fn new(api: TelegramApi, chat_id: impl Into<String>, threshold: usize) -> Self {
        Self {
            api,
            chat_id: chat_id.into(),
            threshold,
        }
    }

    pub fn api(&self) -> &TelegramApi {
        &self.api
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Send one message, split if it exceeds the API limit.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        for chunk in split_message(text, MESSAGE_LIMIT) {
            self.api.send_message(&self.chat_id, &chunk).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for BotChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn publish(&self, report: &RunReport) -> Delivery {
        let mut delivery = Delivery::default();
        for message in fanout::plan_messages(report, self.threshold) {
            match self.send_text(&message).await {
                Ok(()) => delivery.sent += 1,
                Err(e) => {
                    log::warn!("Telegram send failed: {}", e);
                    delivery.failed += 1;
                }
            }
        }
        delivery
    }
}
