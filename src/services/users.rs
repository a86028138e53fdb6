//! User directory contract and an in-memory implementation.

use dashmap::DashMap;

use crate::error::Result;
use crate::types::{Interval, UserProfile, UserRef};

/// Source of notification recipients.
pub trait UserDirectory: Send + Sync {
    /// Enabled users whose configuration includes the symbol and interval.
    fn list_subscribed_users(&self, symbol: &str, interval: Interval) -> Result<Vec<UserProfile>>;

    fn get_user(&self, id: &UserRef) -> Result<Option<UserProfile>>;

    /// Insert or replace.
    fn save_user(&self, user: &UserProfile) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryUserDirectory {
    users: DashMap<UserRef, UserProfile>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserDirectory for MemoryUserDirectory {
    fn list_subscribed_users(&self, symbol: &str, interval: Interval) -> Result<Vec<UserProfile>> {
        let mut users: Vec<UserProfile> = self
            .users
            .iter()
            .filter(|entry| entry.value().follows(symbol, interval))
            .map(|entry| entry.value().clone())
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    fn get_user(&self, id: &UserRef) -> Result<Option<UserProfile>> {
        Ok(self.users.get(id).map(|u| u.clone()))
    }

    fn save_user(&self, user: &UserProfile) -> Result<()> {
        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }
}
