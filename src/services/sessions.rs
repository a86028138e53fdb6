use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::error::{AppError, Result};
use crate::types::{Interval, UserProfile, UserRef};

/// Which part of a user's configuration a selection edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingAction {
    Symbols,
    Intervals,
}

impl PendingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingAction::Symbols => "symbols",
            PendingAction::Intervals => "intervals",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "symbols" => Some(PendingAction::Symbols),
            "intervals" => Some(PendingAction::Intervals),
            _ => None,
        }
    }
}

/// Pending multi-select state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub action: PendingAction,
    pub values: Vec<String>,
}

impl Selection {
    /// Write the selection into the user's configuration.
    pub fn apply_to(&self, user: &mut UserProfile) {
        match self.action {
            PendingAction::Symbols => user.symbols = self.values.clone(),
            PendingAction::Intervals => {
                user.intervals = self
                    .values
                    .iter()
                    .filter_map(|v| Interval::from_str(v))
                    .collect();
            }
        }
        user.touch();
    }
}

struct Session {
    values: Vec<String>,
    expires_at: Instant,
}

/// Per-(user, action) selection table with expiry.
pub struct SelectionSessions {
    data: DashMap<(UserRef, PendingAction), Session>,
    ttl: Duration,
    symbol_options: Vec<String>,
    interval_options: Vec<Interval>,
}

impl SelectionSessions {
    pub fn new(ttl: Duration, symbol_options: Vec<String>, interval_options: Vec<Interval>) -> Self {
        Self {
            data: DashMap::new(),
            ttl,
            symbol_options: symbol_options.iter().map(|s| s.to_uppercase()).collect(),
            interval_options,
        }
    }

    /// Canonical form of `value`, if it is one of the offered options.
    fn normalize(&self, action: PendingAction, value: &str) -> Result<String> {
        let normalized = match action {
            PendingAction::Symbols => {
                let symbol = value.trim().to_uppercase();
                self.symbol_options.contains(&symbol).then_some(symbol)
            }
            PendingAction::Intervals => Interval::from_str(value.trim())
                .filter(|i| self.interval_options.contains(i))
                .map(|i| i.as_str().to_string()),
        };

        normalized.ok_or_else(|| {
            AppError::BadRequest(format!("{} is not a selectable {}", value, action.as_str()))
        })
    }

    fn seed(action: PendingAction, user: &UserProfile) -> Vec<String> {
        match action {
            PendingAction::Symbols => user.symbols.iter().map(|s| s.to_uppercase()).collect(),
            PendingAction::Intervals => user.intervals.iter().map(|i| i.as_str().to_string()).collect(),
        }
    }

    /// Flip `value` in the pending selection, starting from the user's
    /// current configuration when no live session exists.
    pub fn toggle(&self, user: &UserProfile, action: PendingAction, value: &str) -> Result<Selection> {
        let value = self.normalize(action, value)?;
        let now = Instant::now();

        let mut session = self
            .data
            .entry((user.id.clone(), action))
            .or_insert_with(|| Session {
                values: Self::seed(action, user),
                expires_at: now + self.ttl,
            });

        if session.expires_at <= now {
            session.values = Self::seed(action, user);
        }

        if let Some(pos) = session.values.iter().position(|v| *v == value) {
            session.values.remove(pos);
        } else {
            session.values.push(value);
        }
        session.expires_at = now + self.ttl;

        Ok(Selection {
            action,
            values: session.values.clone(),
        })
    }

    /// Remove and return the selection, if one is live.
    pub fn take(&self, user: &UserRef, action: PendingAction) -> Option<Selection> {
        let (_, session) = self.data.remove(&(user.clone(), action))?;
        (session.expires_at > Instant::now()).then_some(Selection {
            action,
            values: session.values,
        })
    }

    /// Discard every pending selection of `user`. Returns how many were dropped.
    pub fn clear_user(&self, user: &UserRef) -> usize {
        [PendingAction::Symbols, PendingAction::Intervals]
            .into_iter()
            .filter(|action| self.data.remove(&(user.clone(), *action)).is_some())
            .count()
    }

    /// Drop expired sessions.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.data.retain(|_, session| session.expires_at > now);
    }

    /// Number of stored sessions (including expired).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
