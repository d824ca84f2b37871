use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// 5 minutes.
pub const DEFAULT_MAX_AGE_MS: i64 = 5 * 60 * 1000;

#[derive(Clone, Debug)]
pub struct CacheOptions {
    pub enabled: bool,
    /// Maximum age of an entry in milliseconds; non-positive disables expiry.
    pub max_age_ms: i64,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_ms: DEFAULT_MAX_AGE_MS,
        }
    }
}

#[derive(Clone, Debug)]
struct CacheEntry<T> {
    time: Instant,
    value: T,
}

/// Short-TTL key/value cache keyed by logical document path.
///
/// Entries expire only by age, evicted lazily on the read that finds them
/// stale; there is no size bound. Writers invalidate explicitly on delete.
#[derive(Debug)]
pub struct Cache<T> {
    options: CacheOptions,
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
}

impl<T: Clone> Cache<T> {
    pub fn new(options: CacheOptions) -> Self {
        Self {
            options,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<T> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(key)?;
        if self.options.max_age_ms > 0
            && entry.time.elapsed().as_millis() as i64 > self.options.max_age_ms
        {
            log::debug!("evicting stale cache entry for {key}");
            entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn set(&self, key: impl Into<String>, value: T) {
        if !self.options.enabled {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            key.into(),
            CacheEntry {
                time: Instant::now(),
                value,
            },
        );
    }

    pub fn delete(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
    }
}
