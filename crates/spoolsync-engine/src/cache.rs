// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persistent expiring cache store backed by SQLite.
//
// Maps printer id → expiration instant, tracking when each desired
// printer was last confirmed by the directory service so that transient
// absences (a user logged out for a weekend) do not trigger premature
// deletion from the spooler.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::debug;

use spoolsync_core::error::{Error, Result};

/// Schema for the cache table. Expirations are RFC 3339 text.
const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS printers (
        id TEXT PRIMARY KEY,
        expires_at TEXT NOT NULL
    )
"#;

/// Expiring printer-id store persisted across daemon restarts.
///
/// Every operation opens and fully closes the underlying database; the
/// engine runs at most one reconciliation at a time, so holding a
/// connection across runs gains nothing. `write` has full-overwrite
/// semantics — callers must read-modify-write.
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    /// A store backed by the SQLite file at `path`. The file is not
    /// touched until the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole cache. A store that does not exist yet yields an
    /// empty mapping, not an error.
    pub fn read(&self) -> Result<BTreeMap<String, DateTime<Utc>>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "cache store absent, treating as empty");
            return Ok(BTreeMap::new());
        }

        let conn = self.open()?;
        let mut stmt = conn
            .prepare("SELECT id, expires_at FROM printers")
            .map_err(|e| Error::Cache(format!("prepare read: {e}")))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| Error::Cache(format!("query read: {e}")))?;

        let mut entries = BTreeMap::new();
        for row in rows {
            let (id, raw) = row.map_err(|e| Error::Cache(format!("row read: {e}")))?;
            let expires = DateTime::parse_from_rfc3339(&raw)
                .map_err(|e| Error::Cache(format!("bad expiration for {id}: {e}")))?
                .with_timezone(&Utc);
            entries.insert(id, expires);
        }
        Ok(entries)
    }

    /// Replace the store's contents with exactly the given mapping, in
    /// one transaction.
    pub fn write(&self, entries: &BTreeMap<String, DateTime<Utc>>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Cache(format!("create {}: {e}", parent.display())))?;
        }

        let mut conn = self.open()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::Cache(format!("begin write: {e}")))?;
        tx.execute("DELETE FROM printers", [])
            .map_err(|e| Error::Cache(format!("clear: {e}")))?;
        for (id, expires) in entries {
            tx.execute(
                "INSERT INTO printers (id, expires_at) VALUES (?1, ?2)",
                params![id, expires.to_rfc3339()],
            )
            .map_err(|e| Error::Cache(format!("insert {id}: {e}")))?;
        }
        tx.commit().map_err(|e| Error::Cache(format!("commit write: {e}")))?;

        debug!(entries = entries.len(), "cache store written");
        Ok(())
    }

    /// Remove exactly the given ids. Ids not present are ignored, so
    /// the operation is idempotent; so is purging from a store that was
    /// never created.
    pub fn purge(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() || !self.path.exists() {
            return Ok(());
        }

        let mut conn = self.open()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::Cache(format!("begin purge: {e}")))?;
        for id in ids {
            tx.execute("DELETE FROM printers WHERE id = ?1", params![id])
                .map_err(|e| Error::Cache(format!("purge {id}: {e}")))?;
        }
        tx.commit().map_err(|e| Error::Cache(format!("commit purge: {e}")))?;

        debug!(ids = ids.len(), "cache entries purged");
        Ok(())
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)
            .map_err(|e| Error::Cache(format!("open {}: {e}", self.path.display())))?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| Error::Cache(format!("create table: {e}")))?;
        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store(dir: &tempfile::TempDir) -> CacheStore {
        CacheStore::new(dir.path().join("cache.db"))
    }

    #[test]
    fn missing_store_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = store(&dir);
        assert!(cache.read().unwrap().is_empty());
        // Reading must not create the file.
        assert!(!cache.path().exists());
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = store(&dir);
        let expires = Utc::now() + Duration::days(14);

        let mut entries = BTreeMap::new();
        entries.insert("P1".to_string(), expires);
        entries.insert("P2".to_string(), expires - Duration::days(20));
        cache.write(&entries).unwrap();

        let read = cache.read().unwrap();
        assert_eq!(read.len(), 2);
        // RFC 3339 keeps sub-second precision, so the instants survive.
        assert_eq!(read["P1"], expires);
    }

    #[test]
    fn write_is_full_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let cache = store(&dir);
        let now = Utc::now();

        let mut first = BTreeMap::new();
        first.insert("stale".to_string(), now);
        cache.write(&first).unwrap();

        let mut second = BTreeMap::new();
        second.insert("fresh".to_string(), now);
        cache.write(&second).unwrap();

        let read = cache.read().unwrap();
        assert_eq!(read.len(), 1);
        assert!(read.contains_key("fresh"));
    }

    #[test]
    fn purge_removes_only_given_ids() {
        let dir = tempfile::tempdir().unwrap();
        let cache = store(&dir);
        let now = Utc::now();

        let mut entries = BTreeMap::new();
        entries.insert("keep".to_string(), now);
        entries.insert("drop".to_string(), now);
        cache.write(&entries).unwrap();

        cache.purge(&["drop".to_string(), "never-existed".to_string()]).unwrap();
        let read = cache.read().unwrap();
        assert_eq!(read.len(), 1);
        assert!(read.contains_key("keep"));

        // Idempotent: purging again changes nothing.
        cache.purge(&["drop".to_string()]).unwrap();
        assert_eq!(cache.read().unwrap().len(), 1);
    }

    #[test]
    fn purge_of_missing_store_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let cache = store(&dir);
        cache.purge(&["anything".to_string()]).unwrap();
        assert!(!cache.path().exists());
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(dir.path().join("nested/dir/cache.db"));
        cache.write(&BTreeMap::new()).unwrap();
        assert!(cache.path().exists());
    }
}
