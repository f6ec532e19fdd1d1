//! # portvakt-storage
//!
//! Durable alert history. The pipeline only needs [`AlertStore::insert_alert`];
//! `recent` and `purge` back the CLI history commands.
//!
//! [`SqliteAlertStore`] opens a fresh connection for every call and lets it
//! drop on every exit path, so it can be shared between the capture thread
//! and the CLI without a connection pool.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use portvakt_core::{Alert, AlertKind, AlertRecord};
use rusqlite::{params, Connection};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

const SCHEMA: &str = include_str!("../resources/schema.sql");

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to encode alert details: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("stored alert {id} is unreadable: {reason}")]
    Corrupt { id: i64, reason: String },
}

pub trait AlertStore: Send + Sync {
    /// Persists one alert atomically and returns it with its assigned id and
    /// server timestamp.
    fn insert_alert(&self, alert: &Alert) -> Result<AlertRecord, StorageError>;

    /// Up to `limit` most recent records, oldest first.
    fn recent(&self, limit: usize) -> Result<Vec<AlertRecord>, StorageError>;

    /// Deletes every record; returns how many were removed.
    fn purge(&self) -> Result<usize, StorageError>;
}

#[derive(Debug, Clone)]
pub struct SqliteAlertStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteAlertStore {
    /// Opens (creating if needed) the database and applies the schema.
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Self, StorageError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout,
        };
        let conn = store.connect()?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.execute_batch(SCHEMA)?;
        info!(path = %store.path.display(), "alert store ready");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StorageError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }
}

impl AlertStore for SqliteAlertStore {
    fn insert_alert(&self, alert: &Alert) -> Result<AlertRecord, StorageError> {
        let details = alert.details();
        let encoded = serde_json::to_string(&details)?;
        let source = alert.source_text();
        let timestamp = Utc::now().trunc_subsecs(6);

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO alerts (ts, type, src, details) VALUES (?1, ?2, ?3, ?4)",
            params![
                timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
                alert.kind.as_str(),
                source,
                encoded,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        debug!(id, kind = %alert.kind, "alert persisted");
        Ok(AlertRecord {
            id,
            timestamp,
            kind: alert.kind,
            source,
            details,
        })
    }

    fn recent(&self, limit: usize) -> Result<Vec<AlertRecord>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, ts, type, src, details FROM alerts ORDER BY id DESC LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map([limit], |row| {
                Ok(StoredRow {
                    id: row.get(0)?,
                    ts: row.get(1)?,
                    kind: row.get(2)?,
                    source: row.get(3)?,
                    details: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().rev().map(StoredRow::into_record).collect()
    }

    fn purge(&self) -> Result<usize, StorageError> {
        let conn = self.connect()?;
        let deleted = conn.execute("DELETE FROM alerts", [])?;
        info!(deleted, "alert history purged");
        Ok(deleted)
    }
}

struct StoredRow {
    id: i64,
    ts: String,
    kind: String,
    source: Option<String>,
    details: String,
}

impl StoredRow {
    fn into_record(self) -> Result<AlertRecord, StorageError> {
        let id = self.id;
        let corrupt = |reason: String| StorageError::Corrupt { id, reason };

        let timestamp = DateTime::parse_from_rfc3339(&self.ts)
            .map_err(|e| corrupt(format!("timestamp: {e}")))?
            .with_timezone(&Utc);
        let kind = AlertKind::from_str(&self.kind).map_err(|e| corrupt(e.to_string()))?;
        let details = match serde_json::from_str::<Value>(&self.details) {
            Ok(Value::Object(map)) => map,
            Ok(other) => return Err(corrupt(format!("details is not an object: {other}"))),
            Err(e) => return Err(corrupt(format!("details: {e}"))),
        };

        Ok(AlertRecord {
            id,
            timestamp,
            kind,
            source: self.source,
            details,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn store() -> (TempDir, SqliteAlertStore) {
        let dir = tempfile::tempdir().unwrap();
        let store =
            SqliteAlertStore::open(dir.path().join("alerts.db"), Duration::from_millis(500))
                .unwrap();
        (dir, store)
    }

    fn scan(src: &str, count: u64) -> Alert {
        Alert::new(
            AlertKind::PortScan,
            Some(src.parse().unwrap()),
            SystemTime::now(),
        )
        .with_attribute("count", count)
        .with_attribute("window_sec", 10)
    }

    #[test]
    fn insert_assigns_identity() {
        let (_dir, store) = store();
        let first = store.insert_alert(&scan("10.0.0.5", 3)).unwrap();
        let second = store.insert_alert(&scan("10.0.0.5", 4)).unwrap();

        assert!(second.id > first.id);
        assert!(second.timestamp >= first.timestamp);
        assert_eq!(first.source.as_deref(), Some("10.0.0.5"));
        assert_eq!(first.details["type"], "PORT_SCAN");
        assert_eq!(first.details["count"], 3);
    }

    #[test]
    fn recent_is_newest_last_and_round_trips() {
        let (_dir, store) = store();
        let inserted: Vec<_> = (1..=5)
            .map(|n| store.insert_alert(&scan("10.0.0.5", n)).unwrap())
            .collect();

        let recent = store.recent(3).unwrap();
        assert_eq!(recent, inserted[2..].to_vec());
    }

    #[test]
    fn purge_empties_history() {
        let (_dir, store) = store();
        store.insert_alert(&scan("10.0.0.5", 3)).unwrap();
        store.insert_alert(&scan("10.0.0.6", 3)).unwrap();

        assert_eq!(store.purge().unwrap(), 2);
        assert!(store.recent(10).unwrap().is_empty());
        assert_eq!(store.purge().unwrap(), 0);
    }

    #[test]
    fn reopening_keeps_history() {
        let (dir, store) = store();
        store.insert_alert(&scan("10.0.0.5", 3)).unwrap();

        let reopened =
            SqliteAlertStore::open(dir.path().join("alerts.db"), Duration::from_millis(500))
                .unwrap();
        assert_eq!(reopened.recent(10).unwrap().len(), 1);
    }

    #[test]
    fn unopenable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = SqliteAlertStore::open(
            dir.path().join("missing").join("alerts.db"),
            Duration::from_millis(100),
        );
        assert!(matches!(result, Err(StorageError::Sqlite(_))));
    }
}
