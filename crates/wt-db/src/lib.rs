//! Local store for the web time tracker.
//!
//! Provides persistence for settings and undelivered time buckets using
//! `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! The daemon owns one connection on its event-loop task; CLI commands open
//! their own. SQLite's file locking arbitrates between them, and a busy
//! timeout keeps short overlaps from failing.
//!
//! # Schema
//!
//! ## Buffered buckets
//!
//! `buffered_buckets` holds one row per (owner, domain). `owner` is the
//! identity token, or the empty string for data accrued before any identity
//! was known. Writes are upserts that add to the stored totals, so buffered
//! time is only ever summed, never overwritten.
//!
//! ## Settings
//!
//! `settings` is a key/value table with JSON values. Known keys are
//! `rules` (the classification lists) and `identity`.
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond
//! precision (e.g. `2024-01-15T10:30:00.000Z`).

use std::path::Path;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use wt_core::{BufferKey, Buckets, Domain, Identity, LocalBuffer, RuleSet, TimeBucket};

const UNKEYED_OWNER: &str = "";
const RULES_KEY: &str = "rules";
const IDENTITY_KEY: &str = "identity";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored setting could not be decoded.
    #[error("invalid setting {key}: {source}")]
    InvalidSetting {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// A stored row holds a value the core types reject.
    #[error("invalid stored value: {0}")]
    InvalidValue(#[from] wt_core::ValidationError),
    /// A duration does not fit SQLite's signed integers.
    #[error("duration out of range: {0}")]
    DurationOutOfRange(u64),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Buffered data grouped by owner, for status display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedEntry {
    pub key: BufferKey,
    pub buckets: Buckets,
    pub updated_at: String,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The schema is initialized on first open, and a fresh store is seeded
    /// with the starter classification rules.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- owner: identity token, '' while no identity is known
            -- *_ms: accumulated milliseconds, summed on every write
            CREATE TABLE IF NOT EXISTS buffered_buckets (
                owner TEXT NOT NULL,
                domain TEXT NOT NULL,
                total_ms INTEGER NOT NULL DEFAULT 0,
                productive_ms INTEGER NOT NULL DEFAULT 0,
                unproductive_ms INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (owner, domain)
            );
            ",
        )?;

        let seeded = self.conn.execute(
            "INSERT OR IGNORE INTO settings (key, value, updated_at) VALUES (?, ?, ?)",
            params![RULES_KEY, encode_setting(RULES_KEY, &RuleSet::starter())?, now_text()],
        )?;
        if seeded > 0 {
            tracing::info!("seeded starter classification rules");
        }
        Ok(())
    }

    // ========== Settings ==========

    /// Returns the stored classification rules.
    pub fn rules(&self) -> Result<RuleSet, DbError> {
        Ok(self.get_setting(RULES_KEY)?.unwrap_or_default())
    }

    pub fn set_rules(&self, rules: &RuleSet) -> Result<(), DbError> {
        self.put_setting(RULES_KEY, rules)
    }

    /// Returns the stored identity, if one has been set.
    pub fn identity(&self) -> Result<Option<Identity>, DbError> {
        self.get_setting(IDENTITY_KEY)
    }

    pub fn set_identity(&self, identity: &Identity) -> Result<(), DbError> {
        self.put_setting(IDENTITY_KEY, identity)
    }

    fn get_setting<T: serde::de::DeserializeOwned>(
        &self,
        key: &'static str,
    ) -> Result<Option<T>, DbError> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        value
            .map(|value| {
                serde_json::from_str(&value)
                    .map_err(|source| DbError::InvalidSetting { key, source })
            })
            .transpose()
    }

    fn put_setting<T: serde::Serialize>(
        &self,
        key: &'static str,
        value: &T,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            ",
            params![key, encode_setting(key, value)?, now_text()],
        )?;
        Ok(())
    }

    // ========== Buffered buckets ==========

    /// Lists all buffered data grouped by owner, unkeyed data first.
    pub fn buffered_entries(&self) -> Result<Vec<BufferedEntry>, DbError> {
        let mut entries = Vec::new();
        for key in self.keys()? {
            let buckets = self.load(&key)?;
            let updated_at: String = self.conn.query_row(
                "SELECT MAX(updated_at) FROM buffered_buckets WHERE owner = ?",
                params![owner_of(&key)],
                |row| row.get(0),
            )?;
            entries.push(BufferedEntry {
                key,
                buckets,
                updated_at,
            });
        }
        Ok(entries)
    }
}

impl LocalBuffer for Database {
    type Error = DbError;

    fn load(&self, key: &BufferKey) -> Result<Buckets, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT domain, total_ms, productive_ms, unproductive_ms
            FROM buffered_buckets
            WHERE owner = ?
            ORDER BY domain ASC
            ",
        )?;
        let rows = stmt.query_map(params![owner_of(key)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;
        let mut buckets = Buckets::new();
        for row in rows {
            let (domain, total, productive, unproductive) = row?;
            let bucket = TimeBucket {
                total: from_sql_ms(total),
                productive: from_sql_ms(productive),
                unproductive: from_sql_ms(unproductive),
            };
            buckets.merge_bucket(Domain::new(domain)?, &bucket);
        }
        Ok(buckets)
    }

    fn merge_into(&mut self, key: &BufferKey, buckets: &Buckets) -> Result<(), DbError> {
        if buckets.is_empty() {
            return Ok(());
        }
        let owner = owner_of(key);
        let updated_at = now_text();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO buffered_buckets
                (owner, domain, total_ms, productive_ms, unproductive_ms, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(owner, domain) DO UPDATE SET
                    total_ms = total_ms + excluded.total_ms,
                    productive_ms = productive_ms + excluded.productive_ms,
                    unproductive_ms = unproductive_ms + excluded.unproductive_ms,
                    updated_at = excluded.updated_at
                ",
            )?;
            for (domain, bucket) in buckets {
                stmt.execute(params![
                    owner,
                    domain.as_str(),
                    to_sql_ms(bucket.total)?,
                    to_sql_ms(bucket.productive)?,
                    to_sql_ms(bucket.unproductive)?,
                    updated_at,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(owner = %key, domains = buckets.len(), "buffered buckets merged");
        Ok(())
    }

    fn clear(&mut self, key: &BufferKey) -> Result<(), DbError> {
        let removed = self.conn.execute(
            "DELETE FROM buffered_buckets WHERE owner = ?",
            params![owner_of(key)],
        )?;
        tracing::debug!(owner = %key, removed, "buffered buckets cleared");
        Ok(())
    }

    fn adopt_unkeyed(&mut self, identity: &Identity) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        // The WHERE clause keeps SQLite from parsing ON CONFLICT as a join constraint.
        let moved = tx.execute(
            "
            INSERT INTO buffered_buckets
            (owner, domain, total_ms, productive_ms, unproductive_ms, updated_at)
            SELECT ?1, domain, total_ms, productive_ms, unproductive_ms, ?2
            FROM buffered_buckets
            WHERE owner = ?3
            ON CONFLICT(owner, domain) DO UPDATE SET
                total_ms = total_ms + excluded.total_ms,
                productive_ms = productive_ms + excluded.productive_ms,
                unproductive_ms = unproductive_ms + excluded.unproductive_ms,
                updated_at = excluded.updated_at
            ",
            params![identity.as_str(), now_text(), UNKEYED_OWNER],
        )?;
        tx.execute(
            "DELETE FROM buffered_buckets WHERE owner = ?",
            params![UNKEYED_OWNER],
        )?;
        tx.commit()?;
        if moved > 0 {
            tracing::info!(%identity, domains = moved, "unkeyed buffer assigned to identity");
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<BufferKey>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT owner FROM buffered_buckets ORDER BY owner ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut keys = Vec::new();
        for row in rows {
            let owner = row?;
            if owner == UNKEYED_OWNER {
                keys.push(BufferKey::Unkeyed);
            } else {
                keys.push(BufferKey::Identity(Identity::new(owner)?));
            }
        }
        Ok(keys)
    }
}

fn owner_of(key: &BufferKey) -> &str {
    match key {
        BufferKey::Unkeyed => UNKEYED_OWNER,
        BufferKey::Identity(identity) => identity.as_str(),
    }
}

fn to_sql_ms(ms: u64) -> Result<i64, DbError> {
    i64::try_from(ms).map_err(|_| DbError::DurationOutOfRange(ms))
}

/// Negative values can only come from manual edits; they read as zero.
fn from_sql_ms(ms: i64) -> u64 {
    u64::try_from(ms).unwrap_or(0)
}

fn encode_setting<T: serde::Serialize>(key: &'static str, value: &T) -> Result<String, DbError> {
    serde_json::to_string(value).map_err(|source| DbError::InvalidSetting { key, source })
}

fn now_text() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
