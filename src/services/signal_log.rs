//! Signal history contract and its in-memory backing.

use std::sync::RwLock;

use crate::error::{AppError, Result};
use crate::types::{EntryKey, Interval, MarketTrend, SignalLogEntry, UserRef};

/// Append-only history of emitted signals.
///
/// "Latest" always means ordered by `last_close_at` desc, then `created_at`
/// desc, with later inserts winning ties. Implementations hold no decision
/// logic.
pub trait SignalHistoryStore: Send + Sync {
    /// Most recent entry with no associated user.
    fn find_latest_system_entry(&self, symbol: &str, interval: Interval) -> Result<Option<SignalLogEntry>>;

    /// Most recent entry actually delivered to `user`.
    fn find_latest_user_entry(
        &self,
        user: &UserRef,
        symbol: &str,
        interval: Interval,
    ) -> Result<Option<SignalLogEntry>>;

    /// Most recent system entry whose MA-trend was Sideway.
    fn find_latest_sideway_system_entry(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<Option<SignalLogEntry>>;

    /// Append unless a system entry already matches `key`. Returns whether
    /// the entry was written.
    fn append_if_absent(&self, entry: &SignalLogEntry, key: &EntryKey) -> Result<bool>;

    fn append(&self, entry: &SignalLogEntry) -> Result<()>;

    /// Entries for the market, newest first.
    fn recent_entries(&self, symbol: &str, interval: Interval, limit: usize) -> Result<Vec<SignalLogEntry>>;
}

/// Vector-backed history, used by tests and when no database is configured.
#[derive(Default)]
pub struct MemorySignalLog {
    entries: RwLock<Vec<SignalLogEntry>>,
}

impl MemorySignalLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every entry in insertion order.
    pub fn all(&self) -> Result<Vec<SignalLogEntry>> {
        Ok(self.entries.read().map_err(AppError::poisoned)?.clone())
    }

    fn latest<F>(&self, filter: F) -> Result<Option<SignalLogEntry>>
    where
        F: Fn(&SignalLogEntry) -> bool,
    {
        let entries = self.entries.read().map_err(AppError::poisoned)?;
        // max_by keeps the last of equal elements, so later inserts win ties.
        Ok(entries
            .iter()
            .filter(|e| filter(e))
            .max_by(|a, b| a.recency_cmp(b))
            .cloned())
    }
}

fn same_market(entry: &SignalLogEntry, symbol: &str, interval: Interval) -> bool {
    entry.interval == interval && entry.symbol.eq_ignore_ascii_case(symbol)
}

impl SignalHistoryStore for MemorySignalLog {
    fn find_latest_system_entry(&self, symbol: &str, interval: Interval) -> Result<Option<SignalLogEntry>> {
        self.latest(|e| e.is_system() && same_market(e, symbol, interval))
    }

    fn find_latest_user_entry(
        &self,
        user: &UserRef,
        symbol: &str,
        interval: Interval,
    ) -> Result<Option<SignalLogEntry>> {
        self.latest(|e| e.notified && e.user.as_ref() == Some(user) && same_market(e, symbol, interval))
    }

    fn find_latest_sideway_system_entry(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<Option<SignalLogEntry>> {
        self.latest(|e| {
            e.is_system() && e.ma_trend == MarketTrend::Sideway && same_market(e, symbol, interval)
        })
    }

    fn append_if_absent(&self, entry: &SignalLogEntry, key: &EntryKey) -> Result<bool> {
        let mut entries = self.entries.write().map_err(AppError::poisoned)?;
        if entries.iter().any(|e| key.matches(e)) {
            return Ok(false);
        }
        entries.push(entry.clone());
        Ok(true)
    }

    fn append(&self, entry: &SignalLogEntry) -> Result<()> {
        self.entries.write().map_err(AppError::poisoned)?.push(entry.clone());
        Ok(())
    }

    fn recent_entries(&self, symbol: &str, interval: Interval, limit: usize) -> Result<Vec<SignalLogEntry>> {
        let entries = self.entries.read().map_err(AppError::poisoned)?;
        let mut matching: Vec<SignalLogEntry> = entries
            .iter()
            .rev()
            .filter(|e| same_market(e, symbol, interval))
            .cloned()
            .collect();
        // Stable sort over the reversed list keeps later inserts first on ties.
        matching.sort_by(|a, b| b.recency_cmp(a));
        matching.truncate(limit);
        Ok(matching)
    }
}
