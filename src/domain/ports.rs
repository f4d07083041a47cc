//! Domain Ports (Port/Adapter Pattern)
//!
//! Trait abstractions for the collaborators the caches depend on. The
//! persistent store and event sinks live outside this crate; adapters
//! implement these traits.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │          UserRepository │ EventPublisher            │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │   InMemoryUserRepository │ LoggingEventPublisher │ ...      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::UserEvent;
use super::user::User;
use crate::error::Result;

// =============================================================================
// Value Objects
// =============================================================================

/// Why a user is being persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserSaveReason {
    /// Player joined; record loaded or created
    PlayerJoin,
    /// Player left; record flushed
    PlayerLeave,
    /// Playtime set by an administrator
    SetCommand,
    /// Playtime reset by an administrator
    ResetCommand,
    /// Periodic flush of online players
    ScheduledSave,
    /// Playtime reset from a GUI action
    GuiResetClick,
}

impl std::fmt::Display for UserSaveReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UserSaveReason::PlayerJoin => "player_join",
            UserSaveReason::PlayerLeave => "player_leave",
            UserSaveReason::SetCommand => "set_command",
            UserSaveReason::ResetCommand => "reset_command",
            UserSaveReason::ScheduledSave => "scheduled_save",
            UserSaveReason::GuiResetClick => "gui_reset_click",
        };
        f.write_str(s)
    }
}

/// Outcome of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserDeleteStatus {
    Deleted,
    NotFound,
    Failed,
}

/// Result of a delete request, with the removed user when there was one.
#[derive(Debug, Clone)]
pub struct UserDeleteResult {
    pub user: Option<User>,
    pub status: UserDeleteStatus,
}

impl UserDeleteResult {
    pub fn deleted(user: User) -> Self {
        Self {
            user: Some(user),
            status: UserDeleteStatus::Deleted,
        }
    }

    pub fn not_found() -> Self {
        Self {
            user: None,
            status: UserDeleteStatus::NotFound,
        }
    }

    pub fn failed() -> Self {
        Self {
            user: None,
            status: UserDeleteStatus::Failed,
        }
    }

    /// The user existed and was removed.
    pub fn is_success(&self) -> bool {
        self.user.is_some() && self.status == UserDeleteStatus::Deleted
    }
}

// =============================================================================
// User Repository Port
// =============================================================================

/// Port for the persistent user store.
///
/// Returned users are detached copies: mutating them does not write through.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Look up a user by identifier.
    async fn find_by_uuid(&self, uuid: Uuid) -> Result<Option<User>>;

    /// Look up a user by display name.
    async fn find_by_name(&self, name: &str) -> Result<Option<User>>;

    /// Every stored user, in no particular order.
    async fn find_all(&self) -> Result<Vec<User>>;

    /// At most `limit` users ordered by [`User::ranking_cmp`]
    /// (descending playtime, ascending uuid on ties).
    async fn find_top_by_duration(&self, limit: usize) -> Result<Vec<User>>;

    /// Insert or update a user, returning the stored copy.
    async fn save(&self, user: &User) -> Result<User>;

    async fn delete_by_uuid(&self, uuid: Uuid) -> Result<UserDeleteResult>;

    async fn delete_by_name(&self, name: &str) -> Result<UserDeleteResult>;
}

// =============================================================================
// Event Publisher Port
// =============================================================================

/// Port for publishing user events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single event.
    async fn publish(&self, event: UserEvent) -> Result<()>;

    /// Publish several events in order.
    async fn publish_all(&self, events: Vec<UserEvent>) -> Result<()> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<P: EventPublisher + ?Sized> EventPublisher for std::sync::Arc<P> {
    async fn publish(&self, event: UserEvent) -> Result<()> {
        (**self).publish(event).await
    }

    async fn publish_all(&self, events: Vec<UserEvent>) -> Result<()> {
        (**self).publish_all(events).await
    }
}
