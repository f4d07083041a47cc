//! In-Memory User Repository
//!
//! `DashMap`-backed implementation of the `UserRepository` port. Rows are
//! stored as plain `UserEntity` values and every read hands out a detached
//! `User`, like a real database would.
//!
//! Latency and failure can be injected at runtime to exercise timeout and
//! fail-soft paths of the caches built on top of it.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::ports::{UserDeleteResult, UserRepository};
use crate::domain::{PlayTime, User};
use crate::error::{Error, Result};

// =============================================================================
// Stored Row
// =============================================================================

/// Persisted form of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntity {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default)]
    pub playtime_millis: u64,
}

impl UserEntity {
    /// Convert to a domain user, validating identifier and name
    pub fn to_user(&self) -> Result<User> {
        User::with_playtime(
            self.uuid,
            self.name.clone(),
            PlayTime::from_millis(self.playtime_millis),
        )
    }
}

impl From<&User> for UserEntity {
    fn from(user: &User) -> Self {
        Self {
            uuid: user.uuid(),
            name: user.name(),
            playtime_millis: user.playtime().millis(),
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// In-memory user store
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    rows: DashMap<Uuid, UserEntity>,
    /// Artificial delay applied to every call, in milliseconds
    latency_ms: AtomicU64,
    /// When set, every call fails with `Error::Repository`
    failing: AtomicBool,
    reads: AtomicU64,
    top_queries: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository pre-filled with rows.
    ///
    /// Rows with a nil uuid or a blank name are rejected.
    pub fn from_entities(entities: impl IntoIterator<Item = UserEntity>) -> Result<Self> {
        let repo = Self::new();
        for entity in entities {
            entity.to_user()?;
            repo.rows.insert(entity.uuid, entity);
        }
        Ok(repo)
    }

    /// Create a repository from a JSON array of `UserEntity` rows
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entities: Vec<UserEntity> = serde_json::from_str(json)?;
        Self::from_entities(entities)
    }

    /// Load a JSON seed file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let repo = Self::from_json_str(&json)?;
        info!(users = repo.len(), "Seeded repository from {}", path.display());
        Ok(repo)
    }

    /// Delay every subsequent call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(millis, Ordering::Relaxed);
    }

    /// Make every subsequent call fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Lookups by uuid, by name and full scans
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Calls to `find_top_by_duration`
    pub fn top_queries(&self) -> u64 {
        self.top_queries.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn deletes(&self) -> u64 {
        self.deletes.load(Ordering::Relaxed)
    }

    /// Apply injected latency and failure
    async fn simulate(&self, operation: &str) -> Result<()> {
        let latency = self.latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.failing.load(Ordering::Relaxed) {
            return Err(Error::Repository(format!("{} failed: store unavailable", operation)));
        }
        Ok(())
    }

    fn find_row_by_name(&self, name: &str) -> Option<UserEntity> {
        self.rows
            .iter()
            .find(|row| row.value().name == name)
            .map(|row| row.value().clone())
    }

    fn all_users(&self) -> Result<Vec<User>> {
        self.rows.iter().map(|row| row.value().to_user()).collect()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<User>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.simulate("find_by_uuid").await?;

        let row = self.rows.get(&uuid).map(|row| row.value().clone());
        row.map(|row| row.to_user()).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<User>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.simulate("find_by_name").await?;

        self.find_row_by_name(name)
            .map(|row| row.to_user())
            .transpose()
    }

    async fn find_all(&self) -> Result<Vec<User>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.simulate("find_all").await?;

        self.all_users()
    }

    #[instrument(skip(self))]
    async fn find_top_by_duration(&self, limit: usize) -> Result<Vec<User>> {
        self.top_queries.fetch_add(1, Ordering::Relaxed);
        self.simulate("find_top_by_duration").await?;

        let mut users = self.all_users()?;
        users.sort_by(User::ranking_cmp);
        users.truncate(limit);

        debug!(returned = users.len(), "Top users query");
        Ok(users)
    }

    async fn save(&self, user: &User) -> Result<User> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.simulate("save").await?;

        let row = UserEntity::from(user);
        self.rows.insert(row.uuid, row.clone());
        row.to_user()
    }

    async fn delete_by_uuid(&self, uuid: Uuid) -> Result<UserDeleteResult> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        self.simulate("delete_by_uuid").await?;

        match self.rows.remove(&uuid) {
            Some((_, row)) => Ok(UserDeleteResult::deleted(row.to_user()?)),
            None => Ok(UserDeleteResult::not_found()),
        }
    }

    async fn delete_by_name(&self, name: &str) -> Result<UserDeleteResult> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        self.simulate("delete_by_name").await?;

        let Some(row) = self.find_row_by_name(name) else {
            return Ok(UserDeleteResult::not_found());
        };
        // the row may have been renamed or removed since the scan
        match self.rows.remove_if(&row.uuid, |_, current| current.name == name) {
            Some((_, row)) => Ok(UserDeleteResult::deleted(row.to_user()?)),
            None => Ok(UserDeleteResult::not_found()),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
