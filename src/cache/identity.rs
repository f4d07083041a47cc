//! Identity Cache
//!
//! Dual-index cache of live user records.
//!
//! ```text
//!   get_by_id(uuid) ──────────────────────┐
//!                                         ▼
//!   ┌──────────────────────┐      ┌──────────────────────┐
//!   │ alias index          │      │ primary index        │
//!   │ name ──► uuid        │─────►│ uuid ──► Arc<User>   │
//!   └──────────────────────┘      └──────────────────────┘
//!         ▲                                 │
//!   get_by_name(name)          expiry listener removes the alias
//! ```
//!
//! Both indices expire on their own clocks. Expiry of a primary entry removes
//! its alias; expiry of an alias leaves the primary entry alone, so a name
//! lookup can miss while an id lookup for the same user still hits.
//!
//! Alias removals triggered by the primary index only drop an alias that
//! still points at the same uuid. A name taken over by another user is never
//! removed on behalf of the previous holder.
//!
//! Writes to the two indices are not atomic with respect to each other. Two
//! concurrent `put`s of the same uuid under different names can each write
//! their alias after the other dropped the previous one, leaving two names
//! resolving to one uuid. The stale alias lives until it idles out or the
//! record is removed. Callers that rename a user serialize writes per uuid.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};
use uuid::Uuid;

use super::expiring::{ExpirationPolicy, ExpiringMap};
use crate::config::duration_str;
use crate::domain::User;
use crate::error::{Error, Result};

/// Lower bound for a non-zero sweep interval
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// Configuration
// =============================================================================

/// Identity cache configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityCacheConfig {
    /// Maximum lifetime of an entry since it was written
    #[serde(with = "duration_str")]
    pub expire_after_write: Duration,
    /// Maximum idle time of an entry since it was last read or written
    #[serde(with = "duration_str")]
    pub expire_after_access: Duration,
    /// Period of the background sweep; zero disables the sweeper
    #[serde(with = "duration_str")]
    pub sweep_interval: Duration,
}

impl Default for IdentityCacheConfig {
    fn default() -> Self {
        Self {
            expire_after_write: Duration::from_secs(12 * 3600),
            expire_after_access: Duration::from_secs(2 * 3600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl IdentityCacheConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.sweep_interval.is_zero() && self.sweep_interval < MIN_SWEEP_INTERVAL {
            return Err(Error::Config(format!(
                "identity.sweep_interval must be 0 or at least {:?}, got {:?}",
                MIN_SWEEP_INTERVAL, self.sweep_interval
            )));
        }
        Ok(())
    }

    fn policy(&self) -> ExpirationPolicy {
        ExpirationPolicy::new(self.expire_after_write, self.expire_after_access)
    }
}

// =============================================================================
// Identity Cache
// =============================================================================

/// Thread-safe cache of users by uuid and by display name
pub struct IdentityCache {
    /// Primary index
    by_uuid: ExpiringMap<Uuid, Arc<User>>,
    /// Alias index
    by_name: Arc<ExpiringMap<String, Uuid>>,
    config: IdentityCacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl IdentityCache {
    /// Create a cache with default configuration
    pub fn new() -> Self {
        Self::with_config(IdentityCacheConfig::default())
    }

    /// Create a cache with custom configuration
    pub fn with_config(config: IdentityCacheConfig) -> Self {
        let policy = config.policy();
        let by_name = Arc::new(ExpiringMap::new(policy));

        let aliases = Arc::clone(&by_name);
        let by_uuid = ExpiringMap::with_expiry_listener(policy, move |uuid: &Uuid, user: &Arc<User>| {
            let name = user.name();
            if aliases.remove_if(name.as_str(), |id| id == uuid).is_some() {
                trace!(%uuid, %name, "Dropped alias of expired user");
            }
        });

        Self {
            by_uuid,
            by_name,
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &IdentityCacheConfig {
        &self.config
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert or replace the record for `user.uuid()` and (re)write its alias.
    ///
    /// When the replaced record carried a different name, that alias is
    /// dropped before the new one is written.
    pub fn put(&self, user: Arc<User>) {
        let uuid = user.uuid();
        let name = user.name();

        if let Some(previous) = self.by_uuid.insert(uuid, Arc::clone(&user)) {
            let previous_name = previous.name();
            if previous_name != name {
                self.by_name.remove_if(previous_name.as_str(), |id| *id == uuid);
                debug!(%uuid, from = %previous_name, to = %name, "Replaced user alias");
            }
        }

        self.by_name.insert(name, uuid);
    }

    /// Remove a user and its alias
    pub fn remove(&self, user: &User) -> Option<Arc<User>> {
        self.remove_by_id(user.uuid())
    }

    /// Remove the record for `uuid` and the alias of the record that was cached.
    pub fn remove_by_id(&self, uuid: Uuid) -> Option<Arc<User>> {
        let removed = self.by_uuid.remove(&uuid)?;
        self.by_name.remove_if(removed.name().as_str(), |id| *id == uuid);
        Some(removed)
    }

    /// Remove a user by display name.
    ///
    /// A resolvable name removes both entries; a dangling alias is removed
    /// on its own.
    pub fn remove_by_name(&self, name: &str) -> Option<Arc<User>> {
        match self.by_name.peek(name) {
            Some(uuid) => {
                let removed = self.remove_by_id(uuid);
                // the cached record may carry a newer name than this alias
                self.by_name.remove_if(name, |id| *id == uuid);
                removed
            }
            None => {
                self.by_name.remove(name);
                None
            }
        }
    }

    /// Retarget the alias of a record renamed in place from `old_name`.
    ///
    /// No-op when `old_name` is the current name.
    pub fn rename_alias(&self, user: &Arc<User>, old_name: &str) {
        let uuid = user.uuid();
        let name = user.name();
        if name == old_name {
            return;
        }

        self.by_name.remove_if(old_name, |id| *id == uuid);
        self.by_name.insert(name.clone(), uuid);
        self.by_uuid.insert(uuid, Arc::clone(user));
        debug!(%uuid, from = %old_name, to = %name, "Renamed user alias");
    }

    /// Cache a record loaded from the store, keeping any live record.
    ///
    /// When `uuid` is already cached (for example after its alias idled out),
    /// the cached record wins and only its alias is rewritten. Returns the
    /// record that ends up cached.
    pub fn put_loaded(&self, loaded: Arc<User>) -> Arc<User> {
        let user = self.by_uuid.get(&loaded.uuid()).unwrap_or(loaded);
        self.put(Arc::clone(&user));
        user
    }

    /// Evict everything from both indices
    pub fn clear(&self) {
        self.by_uuid.clear();
        self.by_name.clear();
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Look up a cached user by uuid
    pub fn get_by_id(&self, uuid: Uuid) -> Option<Arc<User>> {
        let found = self.by_uuid.get(&uuid);
        self.record(found.is_some());
        found
    }

    /// Look up a cached user by display name.
    ///
    /// An alias whose primary entry is gone is a miss.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<User>> {
        let found = self
            .by_name
            .get(name)
            .and_then(|uuid| self.by_uuid.get(&uuid));
        self.record(found.is_some());
        found
    }

    /// Apply `action` to a point-in-time copy of every cached user
    pub fn for_each<F>(&self, mut action: F)
    where
        F: FnMut(&Arc<User>),
    {
        for user in self.snapshot() {
            action(&user);
        }
    }

    /// Copy of every live cached user
    pub fn snapshot(&self) -> Vec<Arc<User>> {
        self.by_uuid.values()
    }

    /// Number of stored records, including dead ones not yet swept
    pub fn len(&self) -> usize {
        self.by_uuid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uuid.is_empty()
    }

    fn record(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Evict dead entries from both indices, returning how many went.
    ///
    /// The primary index goes first so its cascades land before the alias sweep.
    pub fn purge_expired(&self) -> usize {
        self.by_uuid.purge_expired() + self.by_name.purge_expired()
    }

    /// Run `purge_expired` every `sweep_interval` until the cache is dropped.
    ///
    /// Returns `None` when the sweep interval is zero.
    pub fn spawn_sweeper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let period = self.config.sweep_interval;
        if period.is_zero() {
            return None;
        }
        let period = period.max(MIN_SWEEP_INTERVAL);
        let weak = Arc::downgrade(self);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else {
                    debug!("Identity cache dropped, stopping sweeper");
                    break;
                };

                let purged = cache.purge_expired();
                if purged > 0 {
                    debug!(purged, remaining = cache.len(), "Swept identity cache");
                }
            }
        }))
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Hit ratio (0.0 - 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    pub fn stats(&self) -> IdentityCacheStats {
        IdentityCacheStats {
            entries: self.by_uuid.len(),
            aliases: self.by_name.len(),
            hits: self.hits(),
            misses: self.misses(),
            hit_ratio: self.hit_ratio(),
            expirations: self.by_uuid.expirations() + self.by_name.expirations(),
        }
    }
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for IdentityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityCache")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Identity cache statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityCacheStats {
    /// Stored primary entries
    pub entries: usize,
    /// Stored alias entries
    pub aliases: usize,
    pub hits: u64,
    pub misses: u64,
    /// Hit ratio (0.0 - 1.0)
    pub hit_ratio: f64,
    /// Entries evicted by time across both indices
    pub expirations: u64,
}

// =============================================================================
// Tests
// =============================================================================
