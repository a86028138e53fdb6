//! SQLite persistence layer for signal history and user subscriptions.
//!
//! Two tables:
//! - `signal_log`: append-only system and per-user signal entries
//! - `users`: notification recipients and the markets they follow

use crate::error::{AppError, Result};
use crate::services::signal_log::SignalHistoryStore;
use crate::services::users::UserDirectory;
use crate::types::{
    EntryKey, Interval, MarketTrend, SignalLogEntry, TrendVerdict, TriggerSource, UserProfile, UserRef,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

const ENTRY_COLUMNS: &str = "id, symbol, interval, trend, ma_trend, last_close_price, last_close_at,
     trigger_source, notified, snapshot_json, user_id, created_at";

const LATEST_ORDER: &str = "ORDER BY last_close_at DESC, created_at DESC, seq DESC";

/// SQLite store for signal history and users.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("SQLite store initialized");
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory SQLite store initialized");
        Ok(store)
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(AppError::poisoned)
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        // seq keeps insertion order for tie-breaks
        conn.execute(
            "CREATE TABLE IF NOT EXISTS signal_log (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT UNIQUE NOT NULL,
                symbol TEXT NOT NULL,
                interval TEXT NOT NULL,
                trend TEXT NOT NULL,
                ma_trend TEXT NOT NULL,
                last_close_price REAL NOT NULL,
                last_close_at INTEGER NOT NULL,
                trigger_source TEXT NOT NULL,
                notified INTEGER NOT NULL DEFAULT 0,
                snapshot_json TEXT NOT NULL,
                user_id TEXT,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_signal_log_market
             ON signal_log(symbol, interval, last_close_at DESC, created_at DESC)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_signal_log_user
             ON signal_log(user_id, symbol, interval)",
            [],
        )?;

        // One baseline per market state, whatever the number of restarts
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_signal_log_baseline
             ON signal_log(symbol, interval, trend, last_close_price, last_close_at, trigger_source)
             WHERE user_id IS NULL AND trigger_source = 'app_start'",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                chat_id INTEGER NOT NULL,
                username TEXT,
                symbols_json TEXT NOT NULL DEFAULT '[]',
                intervals_json TEXT NOT NULL DEFAULT '[]',
                notification_enabled INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        info!("SQLite schema initialized");
        Ok(())
    }

    // ========== Signal Log Methods ==========

    fn insert_entry(conn: &Connection, entry: &SignalLogEntry, or_ignore: bool) -> Result<usize> {
        let verb = if or_ignore { "INSERT OR IGNORE" } else { "INSERT" };
        let sql = format!(
            "{} INTO signal_log ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            verb, ENTRY_COLUMNS
        );
        let snapshot_json = serde_json::to_string(&entry.snapshot)?;

        let changed = conn.execute(
            &sql,
            params![
                entry.id.to_string(),
                entry.symbol.to_uppercase(),
                entry.interval.as_str(),
                entry.trend.as_str(),
                entry.ma_trend.as_str(),
                entry.last_close_price,
                entry.last_close_at,
                entry.trigger_source.as_str(),
                entry.notified,
                snapshot_json,
                entry.user.as_ref().map(|u| u.as_str().to_string()),
                entry.created_at,
            ],
        )?;
        Ok(changed)
    }

    fn query_latest(&self, filter: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Option<SignalLogEntry>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM signal_log WHERE {} {} LIMIT 1",
            ENTRY_COLUMNS, filter, LATEST_ORDER
        );
        let entry = conn.query_row(&sql, args, entry_from_row).optional()?;
        Ok(entry)
    }

    /// Total number of signal log entries.
    pub fn entry_count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM signal_log", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ========== User Methods ==========

    /// Get total user count.
    pub fn user_count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn trend_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<MarketTrend> {
    let raw: String = row.get(idx)?;
    MarketTrend::from_str(&raw).ok_or_else(|| conversion_error(idx, format!("unknown trend {}", raw)))
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<SignalLogEntry> {
    let id: String = row.get(0)?;
    let id = Uuid::parse_str(&id).map_err(|e| conversion_error(0, e.to_string()))?;

    let interval: String = row.get(2)?;
    let interval = Interval::from_str(&interval)
        .ok_or_else(|| conversion_error(2, format!("unknown interval {}", interval)))?;

    let trigger: String = row.get(7)?;
    let trigger_source = TriggerSource::from_str(&trigger)
        .ok_or_else(|| conversion_error(7, format!("unknown trigger source {}", trigger)))?;

    let snapshot_json: String = row.get(9)?;
    let snapshot: TrendVerdict =
        serde_json::from_str(&snapshot_json).map_err(|e| conversion_error(9, e.to_string()))?;

    let user: Option<String> = row.get(10)?;

    Ok(SignalLogEntry {
        id,
        symbol: row.get(1)?,
        interval,
        trend: trend_column(row, 3)?,
        ma_trend: trend_column(row, 4)?,
        last_close_price: row.get(5)?,
        last_close_at: row.get(6)?,
        trigger_source,
        notified: row.get(8)?,
        snapshot,
        user: user.map(UserRef),
        created_at: row.get(11)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
    let symbols_json: String = row.get(3)?;
    let intervals_json: String = row.get(4)?;

    Ok(UserProfile {
        id: UserRef(row.get(0)?),
        chat_id: row.get(1)?,
        username: row.get(2)?,
        symbols: serde_json::from_str(&symbols_json).map_err(|e| conversion_error(3, e.to_string()))?,
        intervals: serde_json::from_str(&intervals_json)
            .map_err(|e| conversion_error(4, e.to_string()))?,
        notification_enabled: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl SignalHistoryStore for SqliteStore {
    fn find_latest_system_entry(&self, symbol: &str, interval: Interval) -> Result<Option<SignalLogEntry>> {
        self.query_latest(
            "symbol = ?1 AND interval = ?2 AND user_id IS NULL",
            params![symbol.to_uppercase(), interval.as_str()],
        )
    }

    fn find_latest_user_entry(
        &self,
        user: &UserRef,
        symbol: &str,
        interval: Interval,
    ) -> Result<Option<SignalLogEntry>> {
        self.query_latest(
            "symbol = ?1 AND interval = ?2 AND user_id = ?3 AND notified = 1",
            params![symbol.to_uppercase(), interval.as_str(), user.as_str()],
        )
    }

    fn find_latest_sideway_system_entry(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<Option<SignalLogEntry>> {
        self.query_latest(
            "symbol = ?1 AND interval = ?2 AND user_id IS NULL AND ma_trend = ?3",
            params![symbol.to_uppercase(), interval.as_str(), MarketTrend::Sideway.as_str()],
        )
    }

    fn append_if_absent(&self, entry: &SignalLogEntry, key: &EntryKey) -> Result<bool> {
        let conn = self.conn()?;

        let exists: bool = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM signal_log
                WHERE user_id IS NULL AND symbol = ?1 AND interval = ?2 AND trend = ?3
                  AND last_close_price = ?4 AND last_close_at = ?5 AND trigger_source = ?6
             )",
            params![
                key.symbol.to_uppercase(),
                key.interval.as_str(),
                key.trend.as_str(),
                key.last_close_price,
                key.last_close_at,
                key.trigger_source.as_str(),
            ],
            |row| row.get(0),
        )?;
        if exists {
            return Ok(false);
        }

        let inserted = Self::insert_entry(&conn, entry, true)? > 0;
        if inserted {
            debug!(
                "Appended {} baseline for {} {}",
                entry.trigger_source.as_str(),
                entry.symbol,
                entry.interval
            );
        }
        Ok(inserted)
    }

    fn append(&self, entry: &SignalLogEntry) -> Result<()> {
        let conn = self.conn()?;
        Self::insert_entry(&conn, entry, false)?;
        Ok(())
    }

    fn recent_entries(&self, symbol: &str, interval: Interval, limit: usize) -> Result<Vec<SignalLogEntry>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM signal_log WHERE symbol = ?1 AND interval = ?2 {} LIMIT ?3",
            ENTRY_COLUMNS, LATEST_ORDER
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![symbol.to_uppercase(), interval.as_str(), limit as i64],
            entry_from_row,
        )?;
        let entries = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

impl UserDirectory for SqliteStore {
    fn list_subscribed_users(&self, symbol: &str, interval: Interval) -> Result<Vec<UserProfile>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, username, symbols_json, intervals_json, notification_enabled,
                    created_at, updated_at
             FROM users WHERE notification_enabled = 1 ORDER BY id",
        )?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(users
            .into_iter()
            .filter(|u| u.follows(symbol, interval))
            .collect())
    }

    fn get_user(&self, id: &UserRef) -> Result<Option<UserProfile>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT id, chat_id, username, symbols_json, intervals_json, notification_enabled,
                        created_at, updated_at
                 FROM users WHERE id = ?1",
                params![id.as_str()],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn save_user(&self, user: &UserProfile) -> Result<()> {
        let conn = self.conn()?;
        let symbols_json = serde_json::to_string(&user.symbols)?;
        let intervals_json = serde_json::to_string(&user.intervals)?;

        conn.execute(
            "INSERT INTO users (id, chat_id, username, symbols_json, intervals_json,
                                notification_enabled, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                chat_id = excluded.chat_id,
                username = excluded.username,
                symbols_json = excluded.symbols_json,
                intervals_json = excluded.intervals_json,
                notification_enabled = excluded.notification_enabled,
                updated_at = excluded.updated_at",
            params![
                user.id.as_str(),
                user.chat_id,
                user.username,
                symbols_json,
                intervals_json,
                user.notification_enabled,
                user.created_at,
                user.updated_at,
            ],
        )?;

        debug!("Saved user {}", user.id);
        Ok(())
    }
}
