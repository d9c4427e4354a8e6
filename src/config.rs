// src/config.rs

//! Configuration loading utilities.
//!
//! Values are layered: defaults, then the TOML file, then environment
//! variables. Schedules and a few display values are further overridden by
//! the persisted settings table at read time (`EffectiveSettings`).

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::models::Config;
use crate::scheduler::normalize_cron;
use crate::storage::Database;

/// Default location of the config file.
pub const DEFAULT_CONFIG_PATH: &str = "storage/config.toml";

/// Settings keys that override the configured schedules.
pub const SETTING_CRON_MORNING: &str = "cron_morning";
pub const SETTING_CRON_EVENING: &str = "cron_evening";
pub const SETTING_CRON_WEEKLY: &str = "cron_weekly";

/// Load configuration from a TOML file, apply environment overrides and
/// validate. A missing or unreadable file falls back to defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let mut config = Config::load_or_default(path);
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Apply overrides from `var` (normally the process environment).
/// Unparseable numbers are ignored.
pub fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(path) = var("DATABASE_PATH") {
        config.store.database_path = path;
    }
    if let Some(v) = var("SCRAPE_DELAY_MS") {
        if let Ok(ms) = v.trim().parse() {
            config.crawler.request_delay_ms = ms;
        }
    }
    if let Some(token) = var("TELEGRAM_BOT_TOKEN") {
        config.telegram.bot_token = Some(token);
    }
    if let Some(chat) = var("TELEGRAM_CHAT_ID") {
        config.telegram.chat_id = Some(chat);
    }
    if let Some(cron) = var("CRON_SCHEDULE_MORNING") {
        config.schedule.morning = cron;
    }
    if let Some(cron) = var("CRON_SCHEDULE_EVENING") {
        config.schedule.evening = cron;
    }
    if let Some(password) = var("APP_PASSWORD") {
        config.server.app_password = Some(password);
    }
    if let Some(v) = var("PORT") {
        if let Ok(port) = v.trim().parse::<u16>() {
            config.server.bind = format!("0.0.0.0:{port}");
        }
    }
}

/// Configuration merged with persisted settings: settings table wins over
/// config file and environment, which win over defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveSettings {
    pub cron_morning: String,
    pub cron_evening: String,
    pub cron_weekly: String,
    pub timezone: String,
    pub scrape_delay_ms: u64,
    pub telegram_configured: bool,

    /// Remaining stored keys, passed through as-is
    #[serde(flatten)]
    pub stored: BTreeMap<String, String>,
}

impl EffectiveSettings {
    pub fn resolve(config: &Config, mut stored: BTreeMap<String, String>) -> Self {
        let mut take = |key: &str, fallback: &str| {
            stored
                .remove(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };
        let cron_morning = take(SETTING_CRON_MORNING, &config.schedule.morning);
        let cron_evening = take(SETTING_CRON_EVENING, &config.schedule.evening);
        let cron_weekly = take(SETTING_CRON_WEEKLY, &config.schedule.weekly_digest);

        Self {
            cron_morning,
            cron_evening,
            cron_weekly,
            timezone: config.schedule.timezone.clone(),
            scrape_delay_ms: config.crawler.request_delay_ms,
            telegram_configured: config.telegram_enabled(),
            stored,
        }
    }

    pub fn load(db: &Database, config: &Config) -> Result<Self> {
        Ok(Self::resolve(config, db.settings()?))
    }
}

/// Reject settings updates that would break the scheduler on next start.
pub fn validate_settings(values: &BTreeMap<String, String>) -> Result<()> {
    for key in [SETTING_CRON_MORNING, SETTING_CRON_EVENING, SETTING_CRON_WEEKLY] {
        if let Some(expr) = values.get(key).filter(|v| !v.trim().is_empty()) {
            normalize_cron(expr)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("DATABASE_PATH", "/tmp/x.db"),
                ("SCRAPE_DELAY_MS", "500"),
                ("TELEGRAM_BOT_TOKEN", "123:abc"),
                ("TELEGRAM_CHAT_ID", "42"),
                ("CRON_SCHEDULE_MORNING", "0 6 * * *"),
                ("PORT", "8080"),
            ]),
        );
        assert_eq!(config.store.database_path, "/tmp/x.db");
        assert_eq!(config.crawler.request_delay_ms, 500);
        assert!(config.telegram_enabled());
        assert_eq!(config.schedule.morning, "0 6 * * *");
        assert_eq!(config.schedule.evening, "0 0 19 * * *");
        assert_eq!(config.server.bind, "0.0.0.0:8080");
    }

    #[test]
    fn test_bad_numbers_are_ignored() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            env(&[("SCRAPE_DELAY_MS", "fast"), ("PORT", "http")]),
        );
        assert_eq!(config.crawler.request_delay_ms, 2000);
        assert_eq!(config.server.bind, "0.0.0.0:3000");
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.schedule.timezone, "Europe/Chisinau");
    }

    #[test]
    fn test_settings_win_over_config() {
        let mut config = Config::default();
        config.schedule.evening = "0 0 18 * * *".into();

        let stored = BTreeMap::from([
            (SETTING_CRON_MORNING.to_string(), "0 8 * * *".to_string()),
            (SETTING_CRON_EVENING.to_string(), "  ".to_string()),
            ("webhook_url".to_string(), "https://hooks.example.com".to_string()),
        ]);
        let effective = EffectiveSettings::resolve(&config, stored);
        assert_eq!(effective.cron_morning, "0 8 * * *");
        assert_eq!(effective.cron_evening, "0 0 18 * * *");
        assert_eq!(effective.cron_weekly, "0 0 8 * * Mon");
        assert_eq!(effective.stored.len(), 1);

        let json = serde_json::to_value(&effective).unwrap();
        assert_eq!(json["webhook_url"], "https://hooks.example.com");
        assert_eq!(json["telegram_configured"], false);
    }

    #[test]
    fn test_validate_settings_checks_cron() {
        let ok = BTreeMap::from([(SETTING_CRON_MORNING.to_string(), "0 7 * * *".to_string())]);
        assert!(validate_settings(&ok).is_ok());
        let bad = BTreeMap::from([(SETTING_CRON_WEEKLY.to_string(), "weekly".to_string())]);
        assert!(validate_settings(&bad).is_err());
    }
}
