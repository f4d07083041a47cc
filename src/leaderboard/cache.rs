//! Leaderboard Cache
//!
//! Single-slot cache of the most recent leaderboard snapshot.
//!
//! ```text
//! get_top(n) ──► n <= 0 ? ──yes──► []
//!                  │ no
//!                  ▼
//!          slot usable for n? ──yes──► snapshot.top(n)
//!                  │ no
//!                  ▼
//!     repository.find_top_by_duration(n) under query_timeout
//!          │ ok                        │ error / timeout
//!          ▼                           ▼
//!   replace slot, return top(n)     log, return []
//! ```
//!
//! Concurrent misses each run their own query and the last one to finish
//! wins the slot. Errors never reach the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, error, instrument, warn};

use super::snapshot::LeaderboardSnapshot;
use crate::config::duration_str;
use crate::domain::events::UserEvent;
use crate::domain::ports::{EventPublisher, UserRepository};
use crate::domain::User;
use crate::error::{Error, Result};

// =============================================================================
// Configuration
// =============================================================================

/// Leaderboard cache configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardConfig {
    /// Size used when the caller does not ask for one
    pub query_limit: i32,
    /// Snapshot time-to-live; zero (or negative in YAML) never expires
    #[serde(with = "duration_str")]
    pub cache_expire_after: Duration,
    /// Upper bound on one repository query
    #[serde(with = "duration_str")]
    pub query_timeout: Duration,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            query_limit: 30,
            cache_expire_after: Duration::from_secs(600),
            query_timeout: Duration::from_secs(3),
        }
    }
}

impl LeaderboardConfig {
    pub fn validate(&self) -> Result<()> {
        if self.query_limit <= 0 {
            return Err(Error::Config(format!(
                "leaderboard.query_limit must be positive, got {}",
                self.query_limit
            )));
        }
        if self.query_timeout.is_zero() {
            return Err(Error::Config(
                "leaderboard.query_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Leaderboard Cache
// =============================================================================

/// Cache of the top users by playtime
pub struct LeaderboardCache {
    repository: Arc<dyn UserRepository>,
    config: LeaderboardConfig,
    /// Current snapshot, swapped wholesale
    slot: RwLock<Option<Arc<LeaderboardSnapshot>>>,
    publisher: Option<Arc<dyn EventPublisher>>,
    hits: AtomicU64,
    refreshes: AtomicU64,
    failures: AtomicU64,
}

impl LeaderboardCache {
    pub fn new(config: LeaderboardConfig, repository: Arc<dyn UserRepository>) -> Self {
        Self {
            repository,
            config,
            slot: RwLock::new(None),
            publisher: None,
            hits: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Report refresh outcomes to `publisher`
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn config(&self) -> &LeaderboardConfig {
        &self.config
    }

    /// Top `limit` users by playtime.
    ///
    /// Served from the cached snapshot when it is large and fresh enough,
    /// otherwise refreshed from the repository. Returns an empty list for a
    /// non-positive `limit` and when the refresh fails or times out.
    #[instrument(skip(self), level = "debug")]
    pub async fn get_top(&self, limit: i32) -> Vec<User> {
        let requested = match usize::try_from(limit) {
            Ok(n) if n > 0 => n,
            _ => return Vec::new(),
        };

        if let Some(snapshot) = self.current() {
            if snapshot.is_usable(requested, self.config.cache_expire_after, Instant::now()) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return snapshot.top(requested);
            }
        }

        self.refresh(requested).await
    }

    /// Top users for the configured `query_limit`
    pub async fn get_top_default(&self) -> Vec<User> {
        self.get_top(self.config.query_limit).await
    }

    /// Drop the cached snapshot; the next request goes to the repository.
    pub fn invalidate_all(&self) {
        if self.slot.write().take().is_some() {
            debug!("Leaderboard snapshot invalidated");
        }
    }

    /// Current snapshot, usable or not
    pub fn current(&self) -> Option<Arc<LeaderboardSnapshot>> {
        self.slot.read().clone()
    }

    pub fn stats(&self) -> LeaderboardStats {
        let current = self.current();
        LeaderboardStats {
            hits: self.hits.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            snapshot_size: current.as_ref().map(|s| s.size()),
            snapshot_age: current.map(|s| s.age(Instant::now())),
        }
    }

    async fn refresh(&self, requested: usize) -> Vec<User> {
        let started = Instant::now();
        let timeout = self.config.query_timeout;

        let result = match tokio::time::timeout(
            timeout,
            self.repository.find_top_by_duration(requested),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::timeout("leaderboard refresh", timeout)),
        };

        match result {
            Ok(users) => {
                let snapshot = Arc::new(LeaderboardSnapshot::new(users, requested, Instant::now()));
                let top = snapshot.top(requested);
                *self.slot.write() = Some(Arc::clone(&snapshot));
                self.refreshes.fetch_add(1, Ordering::Relaxed);

                let elapsed = started.elapsed();
                debug!(
                    size = requested,
                    entries = snapshot.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Leaderboard refreshed"
                );
                self.notify(UserEvent::leaderboard_refreshed(
                    requested,
                    snapshot.len(),
                    elapsed.as_millis() as u64,
                ))
                .await;
                top
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                if e.is_timeout() {
                    warn!(size = requested, "Leaderboard refresh failed: {}", e);
                } else {
                    error!(size = requested, "Leaderboard refresh failed: {}", e);
                }
                self.notify(UserEvent::leaderboard_refresh_failed(requested, e.to_string()))
                    .await;
                Vec::new()
            }
        }
    }

    async fn notify(&self, event: UserEvent) {
        if let Some(publisher) = &self.publisher {
            if let Err(e) = publisher.publish(event).await {
                warn!("Failed to publish leaderboard event: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for LeaderboardCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaderboardCache")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Leaderboard cache statistics
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardStats {
    /// Requests served from the snapshot
    pub hits: u64,
    /// Successful repository refreshes
    pub refreshes: u64,
    /// Failed or timed-out refreshes
    pub failures: u64,
    /// Size the current snapshot was built for
    pub snapshot_size: Option<usize>,
    pub snapshot_age: Option<Duration>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryEventCollector, InMemoryUserRepository, UserEntity};
    use uuid::Uuid;

    fn mins(n: u64) -> Duration {
        Duration::from_secs(n * 60)
    }

    /// 60 users, p1 has the most playtime
    fn repository() -> Arc<InMemoryUserRepository> {
        let rows = (1..=60u128).map(|i| UserEntity {
            uuid: Uuid::from_u128(i),
            name: format!("p{}", i),
            playtime_millis: (1_000 - i as u64) * 1_000,
        });
        Arc::new(InMemoryUserRepository::from_entities(rows).unwrap())
    }

    fn cache_over(repo: &Arc<InMemoryUserRepository>) -> LeaderboardCache {
        LeaderboardCache::new(LeaderboardConfig::default(), repo.clone())
    }

    fn uuids(users: &[User]) -> Vec<Uuid> {
        users.iter().map(User::uuid).collect()
    }

    #[test]
    fn test_config_validation() {
        assert!(LeaderboardConfig::default().validate().is_ok());

        let bad_limit = LeaderboardConfig {
            query_limit: 0,
            ..Default::default()
        };
        assert!(bad_limit.validate().is_err());

        let bad_timeout = LeaderboardConfig {
            query_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(bad_timeout.validate().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_larger_snapshot_serves_smaller_request() {
        let repo = repository();
        let cache = cache_over(&repo);

        let fifty = cache.get_top(50).await;
        assert_eq!(fifty.len(), 50);

        tokio::time::advance(Duration::from_secs(1)).await;
        let twenty = cache.get_top(20).await;

        assert_eq!(uuids(&twenty), uuids(&fifty[..20]));
        assert_eq!(repo.top_queries(), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undersized_snapshot_refetches_once() {
        let repo = repository();
        let cache = cache_over(&repo);

        cache.get_top(10).await;
        let twenty = cache.get_top(20).await;
        assert_eq!(twenty.len(), 20);
        assert_eq!(repo.top_queries(), 2);
        assert_eq!(cache.current().unwrap().size(), 20);

        // the new snapshot now answers both sizes
        cache.get_top(20).await;
        cache.get_top(10).await;
        assert_eq!(repo.top_queries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_snapshot_refetches() {
        let repo = repository();
        let cache = cache_over(&repo);

        cache.get_top(20).await;
        tokio::time::advance(mins(9)).await;
        cache.get_top(20).await;
        assert_eq!(repo.top_queries(), 1);

        tokio::time::advance(mins(2)).await;
        cache.get_top(5).await;
        assert_eq!(repo.top_queries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_expiry_never_expires() {
        let repo = repository();
        let config = LeaderboardConfig {
            cache_expire_after: Duration::ZERO,
            ..Default::default()
        };
        let cache = LeaderboardCache::new(config, repo.clone());

        cache.get_top(20).await;
        tokio::time::advance(mins(60 * 24 * 7)).await;
        cache.get_top(20).await;
        assert_eq!(repo.top_queries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_fail_soft() {
        let repo = repository();
        repo.set_latency(Duration::from_secs(5));
        let cache = cache_over(&repo);

        let started = Instant::now();
        assert!(cache.get_top(10).await.is_empty());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(cache.current().is_none());
        assert_eq!(cache.stats().failures, 1);

        // a failed attempt leaves nothing behind, so the next call retries
        repo.set_latency(Duration::ZERO);
        assert_eq!(cache.get_top(10).await.len(), 10);
        assert_eq!(repo.top_queries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repository_error_keeps_previous_snapshot() {
        let repo = repository();
        let cache = cache_over(&repo);

        cache.get_top(10).await;
        repo.set_failing(true);

        assert!(cache.get_top(20).await.is_empty());
        assert_eq!(cache.current().unwrap().size(), 10);
        // smaller requests are still served from the old snapshot
        assert_eq!(cache.get_top(5).await.len(), 5);
        assert_eq!(repo.top_queries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_positive_limit_short_circuits() {
        let repo = repository();
        let cache = cache_over(&repo);

        assert!(cache.get_top(0).await.is_empty());
        assert!(cache.get_top(-5).await.is_empty());
        assert!(cache.get_top(i32::MIN).await.is_empty());
        assert_eq!(repo.top_queries(), 0);
        assert!(cache.current().is_none());
        assert_eq!(cache.stats().hits, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_all_forces_refresh() {
        let repo = repository();
        let cache = cache_over(&repo);

        cache.get_top(10).await;
        cache.invalidate_all();
        assert!(cache.current().is_none());

        cache.get_top(10).await;
        assert_eq!(repo.top_queries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_replaces_larger_snapshot() {
        let repo = repository();
        let cache = cache_over(&repo);

        cache.get_top(50).await;
        tokio::time::advance(mins(11)).await;
        cache.get_top(10).await;
        assert_eq!(cache.current().unwrap().size(), 10);

        cache.get_top(20).await;
        assert_eq!(repo.top_queries(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_is_not_resorted_or_live() {
        let repo = repository();
        let cache = cache_over(&repo);

        let first = cache.get_top(3).await;
        assert_eq!(uuids(&first), (1..=3).map(Uuid::from_u128).collect::<Vec<_>>());

        // store changes are invisible until the snapshot is refreshed
        repo.delete_by_uuid(Uuid::from_u128(1)).await.unwrap();
        assert_eq!(uuids(&cache.get_top(3).await), uuids(&first));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_top_default_uses_query_limit() {
        let repo = repository();
        let cache = cache_over(&repo);

        assert_eq!(cache.get_top_default().await.len(), 30);
        assert_eq!(cache.current().unwrap().size(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_each_query() {
        let repo = repository();
        repo.set_latency(Duration::from_millis(100));
        let cache = cache_over(&repo);

        let results = futures::future::join_all((0..4).map(|_| cache.get_top(10))).await;

        assert!(results.iter().all(|top| top.len() == 10));
        assert_eq!(repo.top_queries(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publishes_refresh_outcomes() {
        let repo = repository();
        let events = Arc::new(InMemoryEventCollector::new());
        let cache = cache_over(&repo).with_publisher(events.clone());

        cache.get_top(10).await;
        repo.set_failing(true);
        cache.get_top(20).await;

        assert_eq!(
            events.event_types(),
            vec!["LeaderboardRefreshed", "LeaderboardRefreshFailed"]
        );
    }
}
