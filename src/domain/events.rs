//! User Events
//!
//! Immutable records of things that happened to users and to the
//! leaderboard. They feed audit logging and let surrounding glue react to
//! saves and deletes without coupling to the service.
//!
//! ```ignore
//! let event = UserEvent::saved(&user, UserSaveReason::PlayerLeave);
//! publisher.publish(event).await?;
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ports::{UserDeleteStatus, UserSaveReason};
use super::user::User;

/// Event emitted by the user service and the leaderboard cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UserEvent {
    // =========================================================================
    // User Events
    // =========================================================================
    /// A save is about to be sent to the repository.
    UserPreSave {
        uuid: Uuid,
        name: String,
        playtime_ms: u64,
        reason: UserSaveReason,
        timestamp: DateTime<Utc>,
    },

    /// The repository accepted a save.
    UserSaved {
        uuid: Uuid,
        name: String,
        playtime_ms: u64,
        reason: UserSaveReason,
        timestamp: DateTime<Utc>,
    },

    /// A delete request settled.
    UserDeleted {
        uuid: Option<Uuid>,
        name: Option<String>,
        status: UserDeleteStatus,
        timestamp: DateTime<Utc>,
    },

    // =========================================================================
    // Leaderboard Events
    // =========================================================================
    /// A new leaderboard snapshot replaced the slot.
    LeaderboardRefreshed {
        size: usize,
        entries: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A leaderboard refresh failed and an empty result was served.
    LeaderboardRefreshFailed {
        size: usize,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl UserEvent {
    /// Get the event timestamp.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            UserEvent::UserPreSave { timestamp, .. }
            | UserEvent::UserSaved { timestamp, .. }
            | UserEvent::UserDeleted { timestamp, .. }
            | UserEvent::LeaderboardRefreshed { timestamp, .. }
            | UserEvent::LeaderboardRefreshFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            UserEvent::UserPreSave { .. } => "UserPreSave",
            UserEvent::UserSaved { .. } => "UserSaved",
            UserEvent::UserDeleted { .. } => "UserDeleted",
            UserEvent::LeaderboardRefreshed { .. } => "LeaderboardRefreshed",
            UserEvent::LeaderboardRefreshFailed { .. } => "LeaderboardRefreshFailed",
        }
    }

    /// Get the affected user, if the event concerns one.
    pub fn uuid(&self) -> Option<Uuid> {
        match self {
            UserEvent::UserPreSave { uuid, .. } | UserEvent::UserSaved { uuid, .. } => Some(*uuid),
            UserEvent::UserDeleted { uuid, .. } => *uuid,
            _ => None,
        }
    }
}

// =============================================================================
// Event Builders
// =============================================================================

impl UserEvent {
    pub fn pre_save(user: &User, reason: UserSaveReason) -> Self {
        UserEvent::UserPreSave {
            uuid: user.uuid(),
            name: user.name(),
            playtime_ms: user.playtime().millis(),
            reason,
            timestamp: Utc::now(),
        }
    }

    pub fn saved(user: &User, reason: UserSaveReason) -> Self {
        UserEvent::UserSaved {
            uuid: user.uuid(),
            name: user.name(),
            playtime_ms: user.playtime().millis(),
            reason,
            timestamp: Utc::now(),
        }
    }

    /// Build a UserDeleted event; the removed user, when known, fills in the identity.
    pub fn deleted(user: Option<&User>, status: UserDeleteStatus) -> Self {
        UserEvent::UserDeleted {
            uuid: user.map(User::uuid),
            name: user.map(User::name),
            status,
            timestamp: Utc::now(),
        }
    }

    pub fn leaderboard_refreshed(size: usize, entries: usize, duration_ms: u64) -> Self {
        UserEvent::LeaderboardRefreshed {
            size,
            entries,
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    pub fn leaderboard_refresh_failed(size: usize, reason: impl Into<String>) -> Self {
        UserEvent::LeaderboardRefreshFailed {
            size,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }
}
