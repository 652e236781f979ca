//! In-memory resource cache
//!
//! Maps a [`ResourceId`] to a [`Resource`] with optional per-entry expiry. Entries are owned by
//! the store: `set` takes the payload by value and `get` hands out an independent deep copy,
//! so no caller can mutate a stored entry or another caller's copy.
//!
//! Expiry is checked lazily: an expired entry is treated as absent and evicted by the read that
//! notices it. Every mutation happens under one short critical section that is never held
//! across an `.await`, so the store is never observed half-updated.

use crate::clock::{Clock, MonotonicClock};
use crate::resource::{Resource, ResourceId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Resource,
    expires_at: Option<u64>,
}

impl CacheEntry {
    fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Resource cache scoped to one client.
#[derive(Debug)]
pub struct CacheStore {
    entries: Mutex<HashMap<ResourceId, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock::default()))
    }

    /// Use `clock` to decide expiry.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { entries: Mutex::new(HashMap::new()), clock }
    }

    /// Copy of the live entry for `id`. An expired entry is evicted and reported as absent.
    pub fn get(&self, id: &ResourceId) -> Option<Resource> {
        let now = self.clock.now_millis();
        let mut entries = self.lock();
        let expired = entries.get(id)?.is_expired(now);
        if expired {
            entries.remove(id);
            tracing::trace!(resource = %id, "evicted expired cache entry");
            return None;
        }
        entries.get(id).map(|entry| entry.value.clone())
    }

    /// Insert or replace the entry for `id`. A zero `ttl` never expires.
    pub fn set(&self, id: ResourceId, value: Resource, ttl: Duration) {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            let ttl_millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            Some(self.clock.now_millis().saturating_add(ttl_millis))
        };
        self.lock().insert(id, CacheEntry { value, expires_at });
    }

    /// Whether a live entry exists for `id`. Does not evict.
    pub fn contains(&self, id: &ResourceId) -> bool {
        let now = self.clock.now_millis();
        self.lock().get(id).is_some_and(|e| !e.is_expired(now))
    }

    /// Remove one entry. Returns whether it was present.
    pub fn invalidate(&self, id: &ResourceId) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Remove every entry whose language matches. Returns how many were removed.
    pub fn invalidate_group(&self, language: &str) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|id, _| id.language() != language);
        before - entries.len()
    }

    pub fn invalidate_all(&self) {
        self.lock().clear();
    }

    /// Stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ResourceId, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}
