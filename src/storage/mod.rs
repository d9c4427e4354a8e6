//! SQLite persistence for subjects, hearings, rulings, the run log and settings.
//!
//! One connection in WAL mode behind a mutex. The lock is taken per
//! statement or transaction and never held across an `.await`, so API reads
//! interleave with an in-flight run.
//!
//! ## Tables
//!
//! ```text
//! subjects          # monitored people (soft-deleted via `active`)
//! hearings          # unique identity_hash, watched fields mutable
//! hearing_changes   # append-only audit, cascades with its hearing
//! rulings           # unique identity_hash, immutable
//! run_log           # one row per (subject, court) hearing attempt
//! settings          # key/value overrides
//! ```

pub mod hearings;
pub mod rulings;
pub mod run_log;
pub mod settings;
pub mod stats;
pub mod subjects;

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::types::Type;
use rusqlite::{Connection, Row};

use crate::error::Result;

pub use hearings::{HearingFilter, HearingSort};
pub use rulings::RulingFilter;
pub use stats::{BadgeStats, DailyCount, DashboardStats, DigestStats};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS subjects (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    courts      TEXT NOT NULL DEFAULT '[]',
    case_type   TEXT NOT NULL DEFAULT 'Any',
    note        TEXT,
    active      INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS hearings (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    identity_hash   TEXT NOT NULL UNIQUE,
    subject_id      INTEGER NOT NULL REFERENCES subjects(id) ON DELETE CASCADE,
    court_code      TEXT NOT NULL,
    court_name      TEXT NOT NULL DEFAULT '',
    case_number     TEXT NOT NULL DEFAULT '',
    judge           TEXT NOT NULL DEFAULT '',
    date            TEXT NOT NULL DEFAULT '',
    date_iso        TEXT NOT NULL DEFAULT '',
    time            TEXT NOT NULL DEFAULT '',
    room            TEXT NOT NULL DEFAULT '',
    title           TEXT NOT NULL DEFAULT '',
    subject_matter  TEXT NOT NULL DEFAULT '',
    case_type       TEXT NOT NULL DEFAULT '',
    hearing_type    TEXT NOT NULL DEFAULT '',
    outcome         TEXT NOT NULL DEFAULT '',
    document_url    TEXT NOT NULL DEFAULT '',
    first_seen_at   TEXT NOT NULL,
    last_checked_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_hearings_subject ON hearings(subject_id);
CREATE INDEX IF NOT EXISTS idx_hearings_date ON hearings(date_iso);
CREATE INDEX IF NOT EXISTS idx_hearings_first_seen ON hearings(first_seen_at);

CREATE TABLE IF NOT EXISTS hearing_changes (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    hearing_id  INTEGER NOT NULL REFERENCES hearings(id) ON DELETE CASCADE,
    field       TEXT NOT NULL,
    old_value   TEXT NOT NULL DEFAULT '',
    new_value   TEXT NOT NULL DEFAULT '',
    detected_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_changes_hearing ON hearing_changes(hearing_id);

CREATE TABLE IF NOT EXISTS rulings (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    identity_hash     TEXT NOT NULL UNIQUE,
    subject_id        INTEGER NOT NULL REFERENCES subjects(id) ON DELETE CASCADE,
    court_code        TEXT NOT NULL,
    court_name        TEXT NOT NULL DEFAULT '',
    kind              TEXT NOT NULL,
    case_number       TEXT NOT NULL DEFAULT '',
    pronounced_on     TEXT NOT NULL DEFAULT '',
    pronounced_on_iso TEXT NOT NULL DEFAULT '',
    judge             TEXT NOT NULL DEFAULT '',
    disposition       TEXT NOT NULL DEFAULT '',
    document_url      TEXT NOT NULL DEFAULT '',
    first_seen_at     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_rulings_subject ON rulings(subject_id);

CREATE TABLE IF NOT EXISTS run_log (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_id  INTEGER REFERENCES subjects(id) ON DELETE SET NULL,
    court_code  TEXT NOT NULL,
    found       INTEGER NOT NULL DEFAULT 0,
    new_count   INTEGER NOT NULL DEFAULT 0,
    error       TEXT,
    duration_ms INTEGER NOT NULL DEFAULT 0,
    timestamp   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_run_log_timestamp ON run_log(timestamp);

CREATE TABLE IF NOT EXISTS settings (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Handle to the monitor database. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        Self::init(conn)
    }

    /// Private in-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// A panic while holding the lock leaves the connection usable: any
    /// open transaction was rolled back on drop.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with the connection locked.
    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let conn = self.lock();
        Ok(f(&conn)?)
    }

    /// Run `f` inside a transaction; commits only if `f` succeeds.
    pub(crate) fn with_tx<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    /// Cheap liveness probe.
    pub fn ping(&self) -> Result<()> {
        self.with_conn(|conn| conn.query_row("SELECT 1", [], |_| Ok(())))
    }
}

/// `LIMIT` bind value, saturating at `i64::MAX`.
pub(crate) fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Offset for 1-based page numbers.
pub(crate) fn page_offset(page: usize, limit: usize) -> i64 {
    sql_limit(page.saturating_sub(1).saturating_mul(limit))
}

/// `%q%` pattern for LIKE searches.
pub(crate) fn like_pattern(q: &str) -> String {
    format!("%{}%", q.trim())
}

/// Nullable text column, empty when NULL.
pub(crate) fn text(row: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
}

pub(crate) fn count(row: &Row<'_>, idx: usize) -> rusqlite::Result<usize> {
    Ok(row.get::<_, i64>(idx)?.max(0) as usize)
}

/// Text column parsed through `FromStr`.
pub(crate) fn parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.to_string().into())
    })
}

/// JSON-encoded text column.
pub(crate) fn json<T: serde::de::DeserializeOwned>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.to_string().into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_parent_directory() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/monitor.db");
        let db = Database::open(&path).unwrap();
        db.ping().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_reopen_keeps_schema() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("monitor.db");
        {
            let db = Database::open(&path).unwrap();
            db.put_setting("webhook_url", "https://example.com/hook").unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(
            db.get_setting("webhook_url").unwrap().as_deref(),
            Some("https://example.com/hook")
        );
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let db = Database::open_in_memory().unwrap();
        let on: i64 = db
            .with_conn(|c| c.query_row("PRAGMA foreign_keys", [], |r| r.get(0)))
            .unwrap();
        assert_eq!(on, 1);
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(0, 20), 0);
        assert_eq!(page_offset(usize::MAX, 100), i64::MAX);
        assert_eq!(sql_limit(usize::MAX), i64::MAX);
    }

    #[test]
    fn test_panicking_holder_does_not_disable_store() {
        let db = Database::open_in_memory().unwrap();
        let poisoner = db.clone();
        let outcome = std::thread::spawn(move || {
            poisoner
                .with_tx(|conn| -> rusqlite::Result<()> {
                    conn.execute("INSERT INTO settings (key, value) VALUES ('k', 'v')", [])?;
                    panic!("holder panicked mid-transaction")
                })
                .ok();
        })
        .join();
        assert!(outcome.is_err());
        assert!(db.conn.is_poisoned());

        db.ping().unwrap();
        assert_eq!(db.get_setting("k").unwrap(), None);
        db.put_setting("k", "v2").unwrap();
        assert_eq!(db.get_setting("k").unwrap().as_deref(), Some("v2"));
    }
}
