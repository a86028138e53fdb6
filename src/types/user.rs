/**
 * User Types
 *
 * Subscription settings of a notification recipient.
 */

use serde::{Deserialize, Serialize};

use super::{Interval, UserRef};

/// Symbols a new user starts with.
pub const NEW_USER_DEFAULT_SYMBOLS: &[&str] = &["BTCUSDT"];

/// Intervals a new user starts with.
pub const NEW_USER_DEFAULT_INTERVALS: &[Interval] = &[Interval::FifteenMinutes];

/// A notification recipient and the markets they follow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserRef,
    /// Chat the messaging transport delivers to
    pub chat_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    pub symbols: Vec<String>,
    pub intervals: Vec<Interval>,
    pub notification_enabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UserProfile {
    /// Create a profile with the default subscription.
    pub fn new(id: UserRef, chat_id: i64, username: Option<String>) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id,
            chat_id,
            username,
            symbols: NEW_USER_DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            intervals: NEW_USER_DEFAULT_INTERVALS.to_vec(),
            notification_enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this user wants updates for the given market.
    pub fn follows(&self, symbol: &str, interval: Interval) -> bool {
        self.notification_enabled
            && self.intervals.contains(&interval)
            && self.symbols.iter().any(|s| s.eq_ignore_ascii_case(symbol))
    }

    /// Restore the subscription a new user starts with.
    pub fn reset_subscriptions(&mut self) {
        self.symbols = NEW_USER_DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect();
        self.intervals = NEW_USER_DEFAULT_INTERVALS.to_vec();
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }
}

/// Request to register a user (or re-enable an existing one).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUserRequest {
    pub id: String,
    pub chat_id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

/// Request to switch notifications on or off.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationToggleRequest {
    pub enabled: bool,
}
