//! User Service
//!
//! Facade composing the identity cache, the leaderboard cache and the
//! repository. Reads try the cache first and fall back to the repository;
//! writes go to the repository and then refresh the cache.
//!
//! Unlike the leaderboard, repository failures here are logged and returned
//! to the caller. Writes never touch the leaderboard snapshot.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::adapters::LoggingEventPublisher;
use crate::cache::IdentityCache;
use crate::config::{duration_str, Settings};
use crate::domain::events::UserEvent;
use crate::domain::ports::{EventPublisher, UserDeleteResult, UserRepository, UserSaveReason};
use crate::domain::User;
use crate::error::{Error, Result};
use crate::leaderboard::LeaderboardCache;

// =============================================================================
// Configuration
// =============================================================================

/// User service configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Upper bound on every repository call made by the service
    #[serde(with = "duration_str")]
    pub repository_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            repository_timeout: Duration::from_secs(2),
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.repository_timeout.is_zero() {
            return Err(Error::Config(
                "service.repository_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// User Service
// =============================================================================

/// Cached access to users
pub struct UserService {
    cache: Arc<IdentityCache>,
    leaderboard: Arc<LeaderboardCache>,
    repository: Arc<dyn UserRepository>,
    publisher: Arc<dyn EventPublisher>,
    config: ServiceConfig,
}

impl UserService {
    pub fn new(
        config: ServiceConfig,
        repository: Arc<dyn UserRepository>,
        cache: Arc<IdentityCache>,
        leaderboard: Arc<LeaderboardCache>,
    ) -> Self {
        Self {
            cache,
            leaderboard,
            repository,
            publisher: Arc::new(LoggingEventPublisher::debug_level()),
            config,
        }
    }

    /// Build the caches and the service from settings.
    ///
    /// No sweeper is started: entries are evicted lazily when read, so
    /// records that are never read again stay cached until
    /// [`IdentityCache::purge_expired`] runs. Start one with
    /// `service.cache().spawn_sweeper()` from inside a tokio runtime.
    pub fn from_settings(settings: &Settings, repository: Arc<dyn UserRepository>) -> Self {
        let cache = Arc::new(IdentityCache::with_config(settings.identity));
        let leaderboard = Arc::new(LeaderboardCache::new(
            settings.leaderboard,
            Arc::clone(&repository),
        ));
        Self::new(settings.service, repository, cache, leaderboard)
    }

    /// Replace the event publisher (tracing at debug level by default)
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn cache(&self) -> &Arc<IdentityCache> {
        &self.cache
    }

    pub fn leaderboard(&self) -> &Arc<LeaderboardCache> {
        &self.leaderboard
    }

    // =========================================================================
    // Cache-only Reads
    // =========================================================================

    pub fn find_cached_by_uuid(&self, uuid: Uuid) -> Option<Arc<User>> {
        self.cache.get_by_id(uuid)
    }

    pub fn find_cached_by_name(&self, name: &str) -> Option<Arc<User>> {
        self.cache.get_by_name(name)
    }

    /// Point-in-time copy of every cached user
    pub fn cached_users(&self) -> Vec<Arc<User>> {
        self.cache.snapshot()
    }

    // =========================================================================
    // Read-through
    // =========================================================================

    /// Find a user by uuid, loading and caching it on a miss
    #[instrument(skip(self))]
    pub async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<Arc<User>>> {
        if let Some(user) = self.cache.get_by_id(uuid) {
            return Ok(Some(user));
        }

        let found = self
            .bounded("find_by_uuid", self.repository.find_by_uuid(uuid))
            .await
            .map_err(|e| {
                error!("Failed to find user with id {}: {}", uuid, e);
                e
            })?;

        Ok(found.map(|user| self.cache_loaded(user)))
    }

    /// Find a user by display name, loading and caching it on a miss
    #[instrument(skip(self))]
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Arc<User>>> {
        if let Some(user) = self.cache.get_by_name(name) {
            return Ok(Some(user));
        }

        let found = self
            .bounded("find_by_name", self.repository.find_by_name(name))
            .await
            .map_err(|e| {
                error!("Failed to find user with name {}: {}", name, e);
                e
            })?;

        Ok(found.map(|user| self.cache_loaded(user)))
    }

    /// Top users by playtime, served by the leaderboard cache
    pub async fn find_top(&self, limit: i32) -> Vec<User> {
        self.leaderboard.get_top(limit).await
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Persist a user and cache it.
    ///
    /// The live record passed in is what ends up cached, so later in-place
    /// updates stay visible to cache readers.
    #[instrument(skip(self, user), fields(uuid = %user.uuid()))]
    pub async fn save(&self, user: Arc<User>, reason: UserSaveReason) -> Result<Arc<User>> {
        self.notify(UserEvent::pre_save(&user, reason)).await;

        self.bounded("save", self.repository.save(&user))
            .await
            .map_err(|e| {
                error!("Failed to save user {}: {}", user.uuid(), e);
                e
            })?;

        self.notify(UserEvent::saved(&user, reason)).await;
        self.cache.put(Arc::clone(&user));
        debug!(%reason, "Saved user {}", user);
        Ok(user)
    }

    /// Delete a user by uuid, evicting it from the cache on success
    #[instrument(skip(self))]
    pub async fn delete_by_uuid(&self, uuid: Uuid) -> Result<UserDeleteResult> {
        let result = self
            .bounded("delete_by_uuid", self.repository.delete_by_uuid(uuid))
            .await
            .map_err(|e| {
                error!("Failed to delete user by uuid {}: {}", uuid, e);
                e
            })?;

        self.notify(UserEvent::deleted(result.user.as_ref(), result.status))
            .await;
        if result.is_success() {
            self.cache.remove_by_id(uuid);
        }
        Ok(result)
    }

    /// Delete a user by display name, evicting it from the cache on success
    #[instrument(skip(self))]
    pub async fn delete_by_name(&self, name: &str) -> Result<UserDeleteResult> {
        let result = self
            .bounded("delete_by_name", self.repository.delete_by_name(name))
            .await
            .map_err(|e| {
                error!("Failed to delete user by name {}: {}", name, e);
                e
            })?;

        self.notify(UserEvent::deleted(result.user.as_ref(), result.status))
            .await;
        if result.is_success() {
            self.cache.remove_by_name(name);
        }
        Ok(result)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn cache_loaded(&self, user: User) -> Arc<User> {
        self.cache.put_loaded(Arc::new(user))
    }

    async fn bounded<T>(&self, operation: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
        let timeout = self.config.repository_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(operation, timeout)),
        }
    }

    async fn notify(&self, event: UserEvent) {
        if let Err(e) = self.publisher.publish(event).await {
            warn!("Failed to publish user event: {}", e);
        }
    }
}

impl std::fmt::Debug for UserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserService")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("leaderboard", &self.leaderboard)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
