//! Expiring entries layered over a [`KeyValueStore`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{clock::Clock, store::KeyValueStore};

pub const LOCATION_KEY: &str = "location";
pub const PRAYER_TIMES_KEY_PREFIX: &str = "prayerTimesCache";

const MS_PER_HOUR: i64 = 60 * 60 * 1000;

/// Cache key for the prayer times of one calendar day.
pub fn prayer_times_key(date: NaiveDate) -> String {
    format!("{PRAYER_TIMES_KEY_PREFIX}_{}", date.format("%Y-%m-%d"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    pub created_at_ms: i64,
    pub expires_at_ms: i64,
}

impl<T> CacheEntry<T> {
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at_ms
    }
}

#[derive(Debug, Clone)]
pub struct ExpiringCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl ExpiringCache {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl_hours: u32) {
        let now = self.clock.now_ms();
        let entry = CacheEntry {
            value,
            created_at_ms: now,
            expires_at_ms: now + i64::from(ttl_hours) * MS_PER_HOUR,
        };

        match serde_json::to_value(&entry) {
            Ok(json) => self.store.set(key, json),
            Err(e) => warn!(key, error = %e, "failed to serialize cache entry"),
        }
    }

    /// Returns the stored value if present and unexpired. Expired or unreadable
    /// entries are deleted.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.store.get(key)?;

        let entry: CacheEntry<T> = match serde_json::from_value(raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "dropping unreadable cache entry");
                self.store.delete(key);
                return None;
            }
        };

        if !entry.is_valid_at(self.clock.now_ms()) {
            debug!(key, "cache entry expired");
            self.store.delete(key);
            return None;
        }

        debug!(key, "cache hit");
        Some(entry.value)
    }

    pub fn delete(&self, key: &str) {
        self.store.delete(key);
    }

    /// Removes every key this cache knows how to produce for today.
    pub fn clear(&self) {
        for key in self.known_keys() {
            self.delete(&key);
        }
    }

    /// Drops expired entries and prayer times of earlier days. Only stores that
    /// can enumerate their keys are affected.
    pub fn prune_stale(&self) {
        let now_ms = self.now_ms();
        let today = prayer_times_key(self.today());

        self.store.retain(&|key, raw| {
            let past_day = key.starts_with(PRAYER_TIMES_KEY_PREFIX) && key < today.as_str();
            let expired = serde_json::from_value::<CacheEntry<serde_json::Value>>(raw.clone())
                .is_ok_and(|entry| !entry.is_valid_at(now_ms));
            if past_day || expired {
                debug!(key, "pruning stale cache entry");
            }
            !(past_day || expired)
        });
    }

    pub fn known_keys(&self) -> Vec<String> {
        vec![LOCATION_KEY.to_string(), prayer_times_key(self.today())]
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }
}
