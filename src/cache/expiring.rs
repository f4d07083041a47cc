//! Expiring Map
//!
//! Concurrent map whose entries carry two clocks: one reset on write
//! (max lifetime) and one reset on every read or write (max idle). An entry
//! is dead as soon as either clock runs out.
//!
//! # Design
//!
//! - `DashMap` storage, so callers never lock
//! - Lazy eviction on lookup plus an active `purge_expired` sweep
//! - Optional expiry listener, called for entries evicted by time only,
//!   after the shard lock has been released
//!
//! Timestamps use `tokio::time::Instant` so tests can drive expiry with a
//! paused clock.

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

/// Expiry clocks applied to every entry of a map.
///
/// A zero duration disables that clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationPolicy {
    /// Maximum lifetime since the last write
    pub expire_after_write: Duration,
    /// Maximum idle time since the last read or write
    pub expire_after_access: Duration,
}

impl ExpirationPolicy {
    pub fn new(expire_after_write: Duration, expire_after_access: Duration) -> Self {
        Self {
            expire_after_write,
            expire_after_access,
        }
    }

    /// Entries never expire
    pub fn never() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Whether an entry with the given clocks is dead at `now`
    #[inline]
    pub fn is_expired(&self, written_at: Instant, accessed_at: Instant, now: Instant) -> bool {
        let outlived = !self.expire_after_write.is_zero()
            && now.saturating_duration_since(written_at) >= self.expire_after_write;
        let idled = !self.expire_after_access.is_zero()
            && now.saturating_duration_since(accessed_at) >= self.expire_after_access;
        outlived || idled
    }
}

impl Default for ExpirationPolicy {
    fn default() -> Self {
        Self::never()
    }
}

/// Stored value plus its two clocks
#[derive(Debug)]
struct ExpiringEntry<V> {
    value: V,
    written_at: Instant,
    accessed_at: Instant,
}

impl<V> ExpiringEntry<V> {
    fn new(value: V, now: Instant) -> Self {
        Self {
            value,
            written_at: now,
            accessed_at: now,
        }
    }

    #[inline]
    fn is_expired(&self, policy: &ExpirationPolicy, now: Instant) -> bool {
        policy.is_expired(self.written_at, self.accessed_at, now)
    }
}

type ExpiryListener<K, V> = Box<dyn Fn(&K, &V) + Send + Sync>;

/// Concurrent map with per-entry lifetime and idle expiry.
pub struct ExpiringMap<K, V> {
    entries: DashMap<K, ExpiringEntry<V>>,
    policy: ExpirationPolicy,
    listener: Option<ExpiryListener<K, V>>,
    expirations: AtomicU64,
}

impl<K, V> ExpiringMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a map without an expiry listener
    pub fn new(policy: ExpirationPolicy) -> Self {
        Self {
            entries: DashMap::new(),
            policy,
            listener: None,
            expirations: AtomicU64::new(0),
        }
    }

    /// Create a map that reports every time-based eviction to `listener`.
    ///
    /// The listener must not call back into this map.
    pub fn with_expiry_listener<F>(policy: ExpirationPolicy, listener: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        Self {
            listener: Some(Box::new(listener)),
            ..Self::new(policy)
        }
    }

    /// Look up a live value and reset its idle clock.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired(&self.policy, now) => {
                entry.accessed_at = now;
                return Some(entry.value.clone());
            }
            Some(_) => {}
            None => return None,
        }

        self.evict_if_expired(key, now);
        None
    }

    /// Look up a live value without touching its idle clock.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(&self.policy, now) => {
                return Some(entry.value.clone());
            }
            Some(_) => {}
            None => return None,
        }

        self.evict_if_expired(key, now);
        None
    }

    /// Check for a live entry without touching its idle clock
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.peek(key).is_some()
    }

    /// Insert or replace a value, restarting both clocks.
    ///
    /// Returns the replaced value, even if it had already expired.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.entries
            .insert(key, ExpiringEntry::new(value, Instant::now()))
            .map(|old| old.value)
    }

    /// Remove an entry explicitly. The expiry listener is not called.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }

    /// Remove an entry only if `predicate` holds for its value.
    pub fn remove_if<Q>(&self, key: &Q, predicate: impl FnOnce(&V) -> bool) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries
            .remove_if(key, |_, entry| predicate(&entry.value))
            .map(|(_, entry)| entry.value)
    }

    /// Evict every dead entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();

        // Collect first: removing while iterating would deadlock on the shard
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|entry| entry.value().is_expired(&self.policy, now))
            .map(|entry| entry.key().clone())
            .collect();

        expired
            .iter()
            .filter(|key| self.evict_if_expired(*key, now))
            .count()
    }

    /// Values of all live entries, copied out.
    pub fn values(&self) -> Vec<V> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired(&self.policy, now))
            .map(|entry| entry.value().value.clone())
            .collect()
    }

    /// Drop everything without notifying the listener
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, including dead ones not yet evicted
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn policy(&self) -> &ExpirationPolicy {
        &self.policy
    }

    /// Total entries evicted by time so far
    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    fn evict_if_expired<Q>(&self, key: &Q, now: Instant) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(&self.policy, now));

        match removed {
            Some((key, entry)) => {
                self.expirations.fetch_add(1, Ordering::Relaxed);
                if let Some(listener) = &self.listener {
                    listener(&key, &entry.value);
                }
                true
            }
            None => false,
        }
    }
}

impl<K, V> std::fmt::Debug for ExpiringMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringMap")
            .field("policy", &self.policy)
            .field("has_listener", &self.listener.is_some())
            .field("expirations", &self.expirations.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
