//! Persistent metadata cache
//!
//! Memoizes expensive attribute values across runs in a single sqlite
//! database (default `~/.cache/ff.db`). Records are keyed by
//! `(path, attribute)` with the live `(mtime_ns, size)` stored
//! alongside; a hit is only honored when both still match the stat of
//! the file, otherwise the record is evicted and recomputed. Values
//! are bincode-serialized [`CachedResult`]s so that "the provider
//! could not produce a value" is remembered too.
//!
//! Concurrent processes may open the database; sqlite serializes
//! access, and a busy timeout covers lock contention.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::Value;

/// What a provider produced for one attribute, persisted as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CachedResult {
    Value(Value),
    /// The provider ran but had no value for this attribute.
    Missing,
}

pub struct MetaCache {
    conn: Mutex<Connection>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MetaCache {
    /// Open or create the cache database.
    pub fn open(path: &Path) -> Result<MetaCache> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(30))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS attrs (
                 path     TEXT    NOT NULL,
                 attr     TEXT    NOT NULL,
                 mtime_ns INTEGER NOT NULL,
                 size     INTEGER NOT NULL,
                 data     BLOB    NOT NULL,
                 PRIMARY KEY (path, attr)
             );",
        )?;

        Ok(MetaCache {
            conn: Mutex::new(conn),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// An in-memory cache, for tests.
    pub fn open_in_memory() -> Result<MetaCache> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS attrs (
                 path     TEXT    NOT NULL,
                 attr     TEXT    NOT NULL,
                 mtime_ns INTEGER NOT NULL,
                 size     INTEGER NOT NULL,
                 data     BLOB    NOT NULL,
                 PRIMARY KEY (path, attr)
             );",
        )?;
        Ok(MetaCache {
            conn: Mutex::new(conn),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Look up an attribute value. Stale records (mtime or size
    /// changed) are deleted on sight.
    pub fn get(&self, path: &str, attr: &str, mtime_ns: i64, size: u64) -> Option<CachedResult> {
        let conn = self.conn.lock();
        let row: Option<(i64, i64, Vec<u8>)> = conn
            .query_row(
                "SELECT mtime_ns, size, data FROM attrs WHERE path = ?1 AND attr = ?2",
                params![path, attr],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .unwrap_or(None);

        match row {
            Some((cached_mtime, cached_size, data))
                if cached_mtime == mtime_ns && cached_size == size as i64 =>
            {
                match bincode::deserialize(&data) {
                    Ok(result) => {
                        self.hits.fetch_add(1, Ordering::Relaxed);
                        Some(result)
                    }
                    Err(err) => {
                        // An unreadable record from an older version.
                        debug!("dropping undecodable cache record for {path:?}: {err}");
                        let _ = conn.execute(
                            "DELETE FROM attrs WHERE path = ?1 AND attr = ?2",
                            params![path, attr],
                        );
                        self.misses.fetch_add(1, Ordering::Relaxed);
                        None
                    }
                }
            }
            Some(_) => {
                let _ = conn.execute(
                    "DELETE FROM attrs WHERE path = ?1 AND attr = ?2",
                    params![path, attr],
                );
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Write an attribute value through to the database.
    pub fn put(&self, path: &str, attr: &str, mtime_ns: i64, size: u64, result: &CachedResult) {
        let data = match bincode::serialize(result) {
            Ok(data) => data,
            Err(err) => {
                warn!("unable to serialize cache record for {path:?}: {err}");
                return;
            }
        };
        let conn = self.conn.lock();
        if let Err(err) = conn.execute(
            "INSERT OR REPLACE INTO attrs (path, attr, mtime_ns, size, data)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![path, attr, mtime_ns, size as i64, data],
        ) {
            warn!("cache write failed for {path:?}: {err}");
        }
    }

    pub fn delete(&self, path: &str, attr: &str) {
        let conn = self.conn.lock();
        let _ = conn.execute(
            "DELETE FROM attrs WHERE path = ?1 AND attr = ?2",
            params![path, attr],
        );
    }

    /// Remove records whose path no longer exists or whose stat
    /// changed. Returns the number of removed records.
    pub fn clean(&self) -> Result<u64> {
        use std::os::unix::fs::MetadataExt;

        let conn = self.conn.lock();
        let mut stale: Vec<(String, String)> = Vec::new();
        {
            let mut stmt = conn.prepare("SELECT path, attr, mtime_ns, size FROM attrs")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?;

            for row in rows {
                let (path, attr, mtime_ns, size) = row?;
                let keep = match std::fs::symlink_metadata(&path) {
                    Ok(meta) => {
                        let live_mtime = meta.mtime() * 1_000_000_000 + meta.mtime_nsec();
                        live_mtime == mtime_ns && meta.len() as i64 == size
                    }
                    Err(_) => false,
                };
                if !keep {
                    stale.push((path, attr));
                }
            }
        }

        let removed = stale.len() as u64;
        for (path, attr) in stale {
            conn.execute(
                "DELETE FROM attrs WHERE path = ?1 AND attr = ?2",
                params![path, attr],
            )?;
        }
        conn.execute_batch("VACUUM;")?;
        Ok(removed)
    }

    pub fn vacuum(&self) -> Result<()> {
        self.conn.lock().execute_batch("VACUUM;")?;
        Ok(())
    }

    /// (hits, misses) for this process.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}
