// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persistent effect store backed by SQLite.
//
// Entries survive across exports. Nothing here ever updates a row: a changed
// override set hashes to a new key, and stale keys are simply never looked up
// again until size-based eviction reclaims them, oldest first.

use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, instrument, warn};

use sheetpress_core::error::{Result, SheetpressError};

use crate::key::EffectKey;
use crate::store::EffectStore;

/// SQLite schema for the effect cache table.
const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS effect_cache (
        key TEXT PRIMARY KEY,
        data BLOB NOT NULL,
        size INTEGER NOT NULL,
        created_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS effect_cache_created_at ON effect_cache (created_at);
"#;

/// Default upper bound on the summed size of cached blobs (512 MiB).
pub const DEFAULT_MAX_BYTES: u64 = 512 * 1024 * 1024;

/// Effect store in a local SQLite database.
///
/// `rusqlite::Connection` is `Send` but not `Sync`, so it sits behind a mutex.
/// Every statement is short, so contention between execution units is low.
pub struct SqliteEffectStore {
    conn: Mutex<Connection>,
    max_bytes: u64,
}

impl SqliteEffectStore {
    /// Open (or create) the cache database at the given path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>, max_bytes: u64) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| SheetpressError::Cache(format!("open: {e}")))?;

        // WAL lets detached writers append while units read.
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| SheetpressError::Cache(format!("WAL pragma: {e}")))?;

        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| SheetpressError::Cache(format!("create table: {e}")))?;

        info!(max_bytes, "effect cache database opened");
        Ok(Self {
            conn: Mutex::new(conn),
            max_bytes,
        })
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory(max_bytes: u64) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SheetpressError::Cache(format!("open in-memory: {e}")))?;

        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| SheetpressError::Cache(format!("create table: {e}")))?;

        debug!("in-memory effect cache opened");
        Ok(Self {
            conn: Mutex::new(conn),
            max_bytes,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SheetpressError::Cache("connection lock poisoned".into()))
    }

    /// Total bytes currently cached.
    pub fn total_bytes(&self) -> Result<u64> {
        let conn = self.lock()?;
        total_bytes(&conn)
    }

    /// Number of cached entries.
    pub fn entry_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM effect_cache", [], |row| row.get(0))
            .map_err(|e| SheetpressError::Cache(format!("count: {e}")))?;
        Ok(count as usize)
    }

    /// Delete the oldest entries until the cache fits within `max_bytes`.
    fn evict(&self, conn: &Connection) -> Result<usize> {
        let mut total = total_bytes(conn)?;
        if total <= self.max_bytes {
            return Ok(0);
        }

        let mut stmt = conn
            .prepare("SELECT key, size FROM effect_cache ORDER BY created_at ASC, rowid ASC")
            .map_err(|e| SheetpressError::Cache(format!("prepare evict: {e}")))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| SheetpressError::Cache(format!("query evict: {e}")))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| SheetpressError::Cache(format!("collect evict: {e}")))?;

        let mut victims = Vec::new();
        for (key, size) in rows {
            if total <= self.max_bytes {
                break;
            }
            total = total.saturating_sub(size as u64);
            victims.push(key);
        }

        for key in &victims {
            conn.execute("DELETE FROM effect_cache WHERE key = ?1", params![key])
                .map_err(|e| SheetpressError::Cache(format!("evict: {e}")))?;
        }

        debug!(evicted = victims.len(), remaining_bytes = total, "effect cache evicted");
        Ok(victims.len())
    }
}

impl EffectStore for SqliteEffectStore {
    fn get(&self, key: &EffectKey) -> Result<Option<Vec<u8>>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT data FROM effect_cache WHERE key = ?1",
            params![key.as_str()],
            |row| row.get::<_, Vec<u8>>(0),
        )
        .optional()
        .map_err(|e| SheetpressError::Cache(format!("get: {e}")))
    }

    #[instrument(skip(self, bytes), fields(key = %key, size = bytes.len()))]
    fn put(&self, key: &EffectKey, bytes: &[u8]) -> Result<()> {
        if bytes.len() as u64 > self.max_bytes {
            warn!("entry larger than the whole cache budget, not stored");
            return Ok(());
        }

        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO effect_cache (key, data, size, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                key.as_str(),
                bytes,
                bytes.len() as i64,
                Utc::now().timestamp_millis()
            ],
        )
        .map_err(|e| SheetpressError::Cache(format!("put: {e}")))?;

        self.evict(&conn)?;
        Ok(())
    }
}

fn total_bytes(conn: &Connection) -> Result<u64> {
    let total: i64 = conn
        .query_row("SELECT COALESCE(SUM(size), 0) FROM effect_cache", [], |row| {
            row.get(0)
        })
        .map_err(|e| SheetpressError::Cache(format!("sum sizes: {e}")))?;
    Ok(total as u64)
}
