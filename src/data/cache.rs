//! Durable memo of every probe that has produced an outcome.
//!
//! Records are never evicted: the table doubles as the record of which guesses
//! have already been tried across runs, so the same probe is never sent twice.

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS results (
    generated_key  TEXT PRIMARY KEY NOT NULL,
    resolved_value TEXT
)";

/// Outcome of inserting a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    /// The key was already present; the stored value was kept.
    AlreadyPresent,
}

/// SQLite-backed probe cache, safe to share between evaluation tasks.
pub struct ResultCache {
    conn: Mutex<Connection>,
}

impl ResultCache {
    /// Open (or create) the cache database and ensure the table exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=5000;",
        )?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(CREATE_TABLE)?;
        log::debug!("result cache ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // Statements are atomic; a poisoned connection is still consistent.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock();
        let value = conn
            .query_row(
                "SELECT resolved_value FROM results WHERE generated_key = ?1",
                params![key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(value.flatten())
    }

    /// Insert a record. A duplicate key is a benign race between concurrent
    /// evaluators: it is logged and the existing value stays authoritative.
    pub fn put(&self, key: &str, value: &str) -> Result<PutOutcome> {
        let conn = self.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO results (generated_key, resolved_value) VALUES (?1, ?2)",
            params![key, value],
        )?;

        if inserted == 0 {
            log::warn!(
                "cache already holds '{}'; keeping the stored value (another evaluator or process got there first)",
                key
            );
            Ok(PutOutcome::AlreadyPresent)
        } else {
            Ok(PutOutcome::Inserted)
        }
    }

    pub fn len(&self) -> Result<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM results", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        conn.close().map_err(|(_, e)| e)?;
        Ok(())
    }
}
