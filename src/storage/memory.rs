//! In-process [`ExpiringStore`] for tests and single-node development.
//!
//! Deadlines use `tokio::time::Instant`, so paused-clock tests can drive
//! expiry with `tokio::time::advance`.

use super::{ExpiringStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// A full sweep of expired entries runs once per this many writes.
const SWEEP_INTERVAL: usize = 128;

/// Expiring store held in a concurrent map.
///
/// Expired entries are invisible to readers. They are reaped on access and
/// by a periodic sweep, so keys nobody touches again do not accumulate.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Entry>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count a write and sweep expired entries every `SWEEP_INTERVAL` writes.
    ///
    /// Must not be called while holding a guard into `entries`.
    fn note_write(&self, now: Instant) {
        let count = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if count % SWEEP_INTERVAL == 0 {
            self.entries.retain(|_, e| e.is_live(now));
        }
    }
}

#[async_trait]
impl ExpiringStore for MemoryStore {
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        self.note_write(now);
        let entry = Entry {
            value,
            expires_at: now + ttl,
        };
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_live(now) {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Reap it; the guard above must be released first
        self.entries.remove_if(key, |_, e| !e.is_live(now));
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .map(|(_, e)| e.is_live(now))
            .unwrap_or(false))
    }

    async fn get_and_delete(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        // remove_if holds the shard lock across check and removal
        match self.entries.remove_if(key, |_, e| e.is_live(now)) {
            Some((_, entry)) => Ok(Some(entry.value)),
            None => {
                self.entries.remove_if(key, |_, e| !e.is_live(now));
                Ok(None)
            }
        }
    }

    async fn incr_window(&self, key: &str, window: Duration) -> Result<u64, StoreError> {
        let now = Instant::now();
        self.note_write(now);
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: now + window,
        });

        if !entry.is_live(now) {
            entry.value = "0".to_string();
            entry.expires_at = now + window;
        }

        let count = entry
            .value
            .parse::<u64>()
            .map_err(|e| StoreError::Backend(format!("Counter is not an integer: {}", e)))?
            + 1;
        entry.value = count.to_string();
        Ok(count)
    }
}
