//! Append-only signal history records.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

use super::{Interval, MarketTrend, TrendVerdict};

/// Opaque reference to a user owned by the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRef(pub String);

impl UserRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What caused an entry to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    ScheduleJob,
    AppStart,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::ScheduleJob => "schedule_job",
            TriggerSource::AppStart => "app_start",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "schedule_job" => Some(TriggerSource::ScheduleJob),
            "app_start" => Some(TriggerSource::AppStart),
            _ => None,
        }
    }
}

/// One emitted signal. `user == None` marks a system-wide entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalLogEntry {
    pub id: Uuid,
    pub symbol: String,
    pub interval: Interval,
    pub trend: MarketTrend,
    pub ma_trend: MarketTrend,
    pub last_close_price: f64,
    pub last_close_at: i64,
    pub trigger_source: TriggerSource,
    pub notified: bool,
    pub snapshot: TrendVerdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRef>,
    pub created_at: i64,
}

impl SignalLogEntry {
    fn from_verdict(
        symbol: &str,
        interval: Interval,
        verdict: &TrendVerdict,
        trigger_source: TriggerSource,
        user: Option<UserRef>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.to_uppercase(),
            interval,
            trend: verdict.trend,
            ma_trend: verdict.ma_trend,
            last_close_price: verdict.last_close_price,
            last_close_at: verdict.last_close_time,
            trigger_source,
            notified: user.is_some(),
            snapshot: verdict.clone(),
            user,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// System-wide entry, never marked as notified.
    pub fn system(
        symbol: &str,
        interval: Interval,
        verdict: &TrendVerdict,
        trigger_source: TriggerSource,
    ) -> Self {
        Self::from_verdict(symbol, interval, verdict, trigger_source, None)
    }

    /// Record of a verdict that was delivered to `user`.
    pub fn delivered_to(user: UserRef, symbol: &str, interval: Interval, verdict: &TrendVerdict) -> Self {
        Self::from_verdict(symbol, interval, verdict, TriggerSource::ScheduleJob, Some(user))
    }

    pub fn is_system(&self) -> bool {
        self.user.is_none()
    }

    /// Natural key used to deduplicate baseline entries.
    pub fn key(&self) -> EntryKey {
        EntryKey {
            symbol: self.symbol.clone(),
            interval: self.interval,
            trend: self.trend,
            last_close_price: self.last_close_price,
            last_close_at: self.last_close_at,
            trigger_source: self.trigger_source,
        }
    }

    /// Recency order: newer `last_close_at` first, then newer `created_at`.
    pub fn recency_cmp(&self, other: &Self) -> Ordering {
        self.last_close_at
            .cmp(&other.last_close_at)
            .then(self.created_at.cmp(&other.created_at))
    }
}

/// Uniqueness key for `append_if_absent`, matched against system entries only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryKey {
    pub symbol: String,
    pub interval: Interval,
    pub trend: MarketTrend,
    pub last_close_price: f64,
    pub last_close_at: i64,
    pub trigger_source: TriggerSource,
}

impl EntryKey {
    pub fn matches(&self, entry: &SignalLogEntry) -> bool {
        entry.is_system()
            && entry.symbol == self.symbol
            && entry.interval == self.interval
            && entry.trend == self.trend
            && entry.last_close_price == self.last_close_price
            && entry.last_close_at == self.last_close_at
            && entry.trigger_source == self.trigger_source
    }
}
