//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and polling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Database location
    #[serde(default)]
    pub store: StoreConfig,

    /// Cron cadences and timezone
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Bot channel credentials
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Webhook sink behavior
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Message planning and digest layout
    #[serde(default)]
    pub notify: NotifyConfig,

    /// HTTP API settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Court registry (code to display name)
    #[serde(default = "defaults::default_courts")]
    pub courts: Vec<CourtInfo>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.portal_domain.trim().is_empty() {
            return Err(AppError::validation("crawler.portal_domain is empty"));
        }
        if self.store.database_path.trim().is_empty() {
            return Err(AppError::validation("store.database_path is empty"));
        }
        self.timezone()?;
        for (name, expr) in [
            ("schedule.morning", &self.schedule.morning),
            ("schedule.evening", &self.schedule.evening),
            ("schedule.weekly_digest", &self.schedule.weekly_digest),
        ] {
            if expr.trim().is_empty() {
                return Err(AppError::validation(format!("{name} is empty")));
            }
        }
        if self.webhook.timeout_secs == 0 {
            return Err(AppError::validation("webhook.timeout_secs must be > 0"));
        }
        if self.notify.digest_lines_per_page == 0 {
            return Err(AppError::validation(
                "notify.digest_lines_per_page must be > 0",
            ));
        }
        if self.server.token_ttl_hours == 0 {
            return Err(AppError::validation("server.token_ttl_hours must be > 0"));
        }
        if self.courts.is_empty() {
            return Err(AppError::validation("No courts defined"));
        }
        for (i, court) in self.courts.iter().enumerate() {
            if court.code.is_empty()
                || !court
                    .code
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            {
                return Err(AppError::validation(format!(
                    "Invalid court code '{}'",
                    court.code
                )));
            }
            if self.courts[..i].iter().any(|c| c.code == court.code) {
                return Err(AppError::validation(format!(
                    "Duplicate court code '{}'",
                    court.code
                )));
            }
        }
        Ok(())
    }

    /// Timezone in which cron schedules and "today" are evaluated.
    pub fn timezone(&self) -> Result<Tz> {
        Tz::from_str(&self.schedule.timezone).map_err(|e| {
            AppError::validation(format!(
                "schedule.timezone '{}' is invalid: {e}",
                self.schedule.timezone
            ))
        })
    }

    /// Display name of a court, falling back to its code.
    pub fn court_name(&self, code: &str) -> String {
        self.courts
            .iter()
            .find(|c| c.code == code)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| code.to_string())
    }

    pub fn court_codes(&self) -> Vec<String> {
        self.courts.iter().map(|c| c.code.clone()).collect()
    }

    /// Whether both bot credentials are present.
    pub fn telegram_enabled(&self) -> bool {
        self.telegram.credentials().is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            store: StoreConfig::default(),
            schedule: ScheduleConfig::default(),
            telegram: TelegramConfig::default(),
            webhook: WebhookConfig::default(),
            notify: NotifyConfig::default(),
            server: ServerConfig::default(),
            courts: defaults::default_courts(),
        }
    }
}

/// HTTP client and polling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for portal requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Pause after every portal request in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Parent domain of the per-court portals
    #[serde(default = "defaults::portal_domain")]
    pub portal_domain: String,

    /// Whether to poll ruling listings after hearings
    #[serde(default = "defaults::enabled")]
    pub fetch_rulings: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
            portal_domain: defaults::portal_domain(),
            fetch_rulings: defaults::enabled(),
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "defaults::database_path")]
    pub database_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: defaults::database_path(),
        }
    }
}

/// Cron expressions (six-field, seconds first) and their timezone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "defaults::timezone")]
    pub timezone: String,

    #[serde(default = "defaults::cron_morning")]
    pub morning: String,

    #[serde(default = "defaults::cron_evening")]
    pub evening: String,

    #[serde(default = "defaults::cron_weekly")]
    pub weekly_digest: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: defaults::timezone(),
            morning: defaults::cron_morning(),
            evening: defaults::cron_evening(),
            weekly_digest: defaults::cron_weekly(),
        }
    }
}

/// Telegram bot credentials; the channel is disabled unless both are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: Option<String>,

    #[serde(default)]
    pub chat_id: Option<String>,

    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    /// Long-poll timeout for getUpdates in seconds
    #[serde(default = "defaults::poll_timeout")]
    pub poll_timeout_secs: u64,
}

impl TelegramConfig {
    /// Token and chat id, when both are non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let token = self.bot_token.as_deref().filter(|t| !t.trim().is_empty())?;
        let chat = self.chat_id.as_deref().filter(|c| !c.trim().is_empty())?;
        Some((token, chat))
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: defaults::api_base(),
            poll_timeout_secs: defaults::poll_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "defaults::webhook_timeout")]
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_secs: defaults::webhook_timeout(),
        }
    }
}

/// Message planning and digest layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Categories with at most this many items get one message per item
    #[serde(default = "defaults::detail_threshold")]
    pub detail_threshold: usize,

    #[serde(default = "defaults::digest_lines_per_page")]
    pub digest_lines_per_page: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            detail_threshold: defaults::detail_threshold(),
            digest_lines_per_page: defaults::digest_lines_per_page(),
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::bind")]
    pub bind: String,

    /// Password for `/api/auth/login`; login is refused while unset
    #[serde(default)]
    pub app_password: Option<String>,

    #[serde(default = "defaults::token_ttl_hours")]
    pub token_ttl_hours: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: defaults::bind(),
            app_password: None,
            token_ttl_hours: defaults::token_ttl_hours(),
        }
    }
}

/// A court known to the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourtInfo {
    /// Subdomain code (e.g., "jc")
    pub code: String,

    /// Display name (e.g., "Judecătoria Chișinău")
    pub name: String,
}

mod defaults {
    use super::CourtInfo;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn request_delay() -> u64 {
        2000
    }
    pub fn portal_domain() -> String {
        "instante.justice.md".into()
    }
    pub fn enabled() -> bool {
        true
    }

    // Store defaults
    pub fn database_path() -> String {
        "storage/monitor.db".into()
    }

    // Schedule defaults
    pub fn timezone() -> String {
        "Europe/Chisinau".into()
    }
    pub fn cron_morning() -> String {
        "0 0 7 * * *".into()
    }
    pub fn cron_evening() -> String {
        "0 0 19 * * *".into()
    }
    pub fn cron_weekly() -> String {
        "0 0 8 * * Mon".into()
    }

    // Channel defaults
    pub fn api_base() -> String {
        "https://api.telegram.org".into()
    }
    pub fn poll_timeout() -> u64 {
        30
    }
    pub fn webhook_timeout() -> u64 {
        10
    }
    pub fn detail_threshold() -> usize {
        3
    }
    pub fn digest_lines_per_page() -> usize {
        48
    }

    // Server defaults
    pub fn bind() -> String {
        "0.0.0.0:3000".into()
    }
    pub fn token_ttl_hours() -> u64 {
        24
    }

    // Court registry
    pub fn default_courts() -> Vec<CourtInfo> {
        [
            ("jc", "Judecătoria Chișinău"),
            ("jsr", "Judecătoria Soroca"),
            ("jbl", "Judecătoria Bălți"),
            ("jch", "Judecătoria Cahul"),
            ("jcm", "Judecătoria Comrat"),
            ("jed", "Judecătoria Edineț"),
            ("jhn", "Judecătoria Hîncești"),
            ("jun", "Judecătoria Ungheni"),
            ("jor", "Judecătoria Orhei"),
            ("jcs", "Judecătoria Căușeni"),
            ("jst", "Judecătoria Strășeni"),
            ("jan", "Judecătoria Anenii Noi"),
            ("cac", "Curtea de Apel Chișinău"),
            ("cab", "Curtea de Apel Bălți"),
            ("cach", "Curtea de Apel Cahul"),
        ]
        .into_iter()
        .map(|(code, name)| CourtInfo {
            code: code.to_string(),
            name: name.to_string(),
        })
        .collect()
    }
}
