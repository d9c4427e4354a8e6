// src/storage/settings.rs

use std::collections::BTreeMap;

use rusqlite::{OptionalExtension, params};

use super::Database;
use crate::error::Result;

const UPSERT: &str = "INSERT INTO settings (key, value) VALUES (?1, ?2)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value";

impl Database {
    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT value FROM settings WHERE key = ?1", [key], |r| {
                r.get(0)
            })
            .optional()
        })
    }

    pub fn settings(&self) -> Result<BTreeMap<String, String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM settings ORDER BY key")?;
            let rows = stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?;
            rows.collect()
        })
    }

    pub fn put_setting(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| conn.execute(UPSERT, params![key, value]))?;
        Ok(())
    }

    /// Upsert several keys in one transaction.
    pub fn put_settings(&self, values: &BTreeMap<String, String>) -> Result<()> {
        self.with_tx(|tx| {
            for (key, value) in values {
                tx.execute(UPSERT, params![key, value])?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_overwrites_by_key() {
        let db = Database::open_in_memory().unwrap();
        db.put_setting("cron_morning", "0 6 * * *").unwrap();
        db.put_setting("cron_morning", "0 8 * * *").unwrap();
        assert_eq!(
            db.get_setting("cron_morning").unwrap().as_deref(),
            Some("0 8 * * *")
        );
        assert!(db.get_setting("missing").unwrap().is_none());
    }

    #[test]
    fn test_put_settings_batch() {
        let db = Database::open_in_memory().unwrap();
        let mut values = BTreeMap::new();
        values.insert("webhook_url".to_string(), "https://a".to_string());
        values.insert("cron_weekly".to_string(), "0 0 9 * * Mon".to_string());
        db.put_settings(&values).unwrap();
        assert_eq!(db.settings().unwrap(), values);
    }
}
