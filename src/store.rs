//! Credential store seam.
//!
//! The session layer persists its facts through this keyed store. In a
//! browser host the implementation is cookies; [`MemoryStore`] gives the
//! same semantics (per-key expiry, silent lapse) in memory for tests and
//! non-browser hosts.

use std::collections::HashMap;
use std::sync::Mutex;

use time::OffsetDateTime;

/// Keyed value store with per-key expiry.
pub trait CredentialStore: Send + Sync {
    /// Returns the value, or `None` if absent or lapsed.
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str, expires_at: OffsetDateTime);
    fn delete(&self, key: &str);
}

/// In-memory [`CredentialStore`] with cookie-like expiry semantics.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (String, OffsetDateTime)>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Internal: read with an explicit clock (for testing).
    pub(crate) fn get_at(&self, key: &str, now: OffsetDateTime) -> Option<String> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match entries.get(key) {
            Some((_, expires_at)) if *expires_at <= now => {
                // Lapsed values disappear, like an expired cookie.
                entries.remove(key);
                None
            }
            Some((value, _)) => Some(value.clone()),
            None => None,
        }
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.get_at(key, OffsetDateTime::now_utc())
    }

    fn set(&self, key: &str, value: &str, expires_at: OffsetDateTime) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(key.to_owned(), (value.to_owned(), expires_at));
    }

    fn delete(&self, key: &str) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.remove(key);
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
