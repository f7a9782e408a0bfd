use common::models::WeatherReading;
use std::collections::HashMap;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    reading: WeatherReading,
    fetched_at: Instant,
}

/// Last good reading per city, guarded by a single lock.
///
/// Entries are never evicted. A city with no entry is treated as stale and
/// reads as the zero reading.
#[derive(Debug, Default)]
pub struct RateLimitCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl RateLimitCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the cache lock. Held for the whole check/fetch/update sequence.
    pub async fn lock(&self) -> CacheGuard<'_> {
        CacheGuard {
            entries: self.entries.lock().await,
        }
    }
}

pub struct CacheGuard<'a> {
    entries: MutexGuard<'a, HashMap<String, CacheEntry>>,
}

impl CacheGuard<'_> {
    /// True when `city` was fetched less than `min_gap` before `now`.
    pub fn is_fresh(&self, city: &str, min_gap: Duration, now: Instant) -> bool {
        self.entries
            .get(city)
            .is_some_and(|entry| now.saturating_duration_since(entry.fetched_at) < min_gap)
    }

    pub fn reading(&self, city: &str) -> WeatherReading {
        self.entries
            .get(city)
            .map(|entry| entry.reading)
            .unwrap_or_default()
    }

    #[cfg(test)]
    fn fetched_at(&self, city: &str) -> Option<Instant> {
        self.entries.get(city).map(|entry| entry.fetched_at)
    }

    /// Replaces reading and timestamp together. `fetched_at` never goes backwards.
    pub fn record(&mut self, city: &str, reading: WeatherReading, now: Instant) {
        let fetched_at = match self.entries.get(city) {
            Some(previous) => previous.fetched_at.max(now),
            None => now,
        };
        self.entries
            .insert(city.to_string(), CacheEntry { reading, fetched_at });
    }
}
