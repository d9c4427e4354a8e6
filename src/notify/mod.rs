// src/notify/mod.rs

//! Notification channels and the dispatcher that fans a run report out to
//! them.
//!
//! Channels are independent and best-effort: a failing channel is logged and
//! never affects the others or the stored data.

pub mod bot;
pub mod digest;
pub mod fanout;
pub mod format;
pub mod telegram;
pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;

use crate::pipeline::RunReport;

pub use bot::{BotCommand, BotCommands, BotService};
pub use digest::{DigestData, DigestDocument, DigestSender};
pub use telegram::{BotChannel, TelegramApi};
pub use webhook::{WebhookChannel, WebhookEvent};

/// Outcome of publishing one report on one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub sent: usize,
    pub failed: usize,
    /// Channel was not configured
    pub skipped: bool,
}

impl Delivery {
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Publish everything new in `report`. Must not fail: errors are counted
    /// in the returned `Delivery`.
    async fn publish(&self, report: &RunReport) -> Delivery;
}

#[derive(Default, Clone)]
pub struct Dispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Publish a report on every channel concurrently.
    pub async fn dispatch(&self, report: &RunReport) -> Vec<(&'static str, Delivery)> {
        if !report.has_news() {
            log::debug!("Nothing new to notify");
            return Vec::new();
        }

        let results = join_all(self.channels.iter().map(|channel| async move {
            (channel.name(), channel.publish(report).await)
        }))
        .await;

        for (name, delivery) in &results {
            if delivery.skipped {
                log::debug!("Channel {} not configured, skipped", name);
            } else if delivery.failed > 0 {
                log::warn!(
                    "Channel {}: {} sent, {} failed",
                    name,
                    delivery.sent,
                    delivery.failed
                );
            } else {
                log::info!("Channel {}: {} sent", name, delivery.sent);
            }
        }
        results
    }
}
