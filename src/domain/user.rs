//! User Value Types
//!
//! `User` is the live record shared between the identity cache and callers:
//! the identifier is fixed at construction while the display name and the
//! accumulated playtime are updated in place through `&self`.

use std::cmp::Ordering as CmpOrdering;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// =============================================================================
// PlayTime
// =============================================================================

/// Accumulated playtime, stored as whole milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayTime(u64);

impl PlayTime {
    /// No playtime at all
    pub const ZERO: PlayTime = PlayTime(0);

    const MILLIS_PER_SECOND: u64 = 1_000;

    /// Create from milliseconds
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Create from whole seconds (saturating)
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(Self::MILLIS_PER_SECOND))
    }

    /// Create from a `Duration`, truncated to milliseconds
    pub fn from_duration(duration: Duration) -> Self {
        Self(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    /// Raw milliseconds
    #[inline]
    pub const fn millis(&self) -> u64 {
        self.0
    }

    /// Whole seconds (truncated)
    #[inline]
    pub const fn as_secs(&self) -> u64 {
        self.0 / Self::MILLIS_PER_SECOND
    }

    /// Convert to a `Duration`
    #[inline]
    pub const fn as_duration(&self) -> Duration {
        Duration::from_millis(self.0)
    }

    /// Check for zero playtime
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub const fn saturating_add(self, other: PlayTime) -> PlayTime {
        PlayTime(self.0.saturating_add(other.0))
    }

    pub const fn saturating_sub(self, other: PlayTime) -> PlayTime {
        PlayTime(self.0.saturating_sub(other.0))
    }
}

impl std::fmt::Display for PlayTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let total = self.as_secs();
        let (days, rem) = (total / 86_400, total % 86_400);
        let (hours, rem) = (rem / 3_600, rem % 3_600);
        let (minutes, seconds) = (rem / 60, rem % 60);

        if days > 0 {
            write!(f, "{}d {}h {}m", days, hours, minutes)
        } else if hours > 0 {
            write!(f, "{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            write!(f, "{}m {}s", minutes, seconds)
        } else {
            write!(f, "{}s", seconds)
        }
    }
}

impl From<Duration> for PlayTime {
    fn from(duration: Duration) -> Self {
        Self::from_duration(duration)
    }
}

// =============================================================================
// User
// =============================================================================

/// One tracked player.
///
/// Equality and hashing use the identifier only, so two handles to the same
/// player compare equal even after a rename.
pub struct User {
    uuid: Uuid,
    name: RwLock<String>,
    playtime: AtomicU64,
}

impl User {
    /// Create a user with zero playtime.
    ///
    /// Fails with [`Error::InvalidArgument`] for a nil identifier or a blank name.
    pub fn new(uuid: Uuid, name: impl Into<String>) -> Result<Self> {
        Self::with_playtime(uuid, name, PlayTime::ZERO)
    }

    /// Create a user with existing playtime.
    pub fn with_playtime(uuid: Uuid, name: impl Into<String>, playtime: PlayTime) -> Result<Self> {
        if uuid.is_nil() {
            return Err(Error::InvalidArgument("uuid cannot be nil".into()));
        }
        let name = validate_name(name.into())?;

        Ok(Self {
            uuid,
            name: RwLock::new(name),
            playtime: AtomicU64::new(playtime.millis()),
        })
    }

    #[inline]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Current display name
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    /// Replace the display name and return the previous one.
    ///
    /// A cached user must be followed by `IdentityCache::rename_alias` with
    /// the returned name, otherwise name lookups keep resolving the old alias.
    pub fn set_name(&self, name: impl Into<String>) -> Result<String> {
        let name = validate_name(name.into())?;
        Ok(std::mem::replace(&mut *self.name.write(), name))
    }

    pub fn playtime(&self) -> PlayTime {
        PlayTime(self.playtime.load(Ordering::Acquire))
    }

    pub fn set_playtime(&self, playtime: PlayTime) {
        self.playtime.store(playtime.millis(), Ordering::Release);
    }

    /// Add to the accumulated playtime and return the new total
    pub fn add_playtime(&self, delta: PlayTime) -> PlayTime {
        let previous = self
            .playtime
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(delta.millis()))
            })
            .unwrap_or_else(|current| current);
        PlayTime(previous.saturating_add(delta.millis()))
    }

    /// Leaderboard order: most playtime first, ties broken by ascending uuid.
    pub fn ranking_cmp(a: &User, b: &User) -> CmpOrdering {
        b.playtime()
            .cmp(&a.playtime())
            .then_with(|| a.uuid.cmp(&b.uuid))
    }
}

fn validate_name(name: String) -> Result<String> {
    if name.trim().is_empty() {
        return Err(Error::InvalidArgument("name cannot be blank".into()));
    }
    Ok(name)
}

impl Clone for User {
    /// Point-in-time copy; the clone does not observe later updates.
    fn clone(&self) -> Self {
        Self {
            uuid: self.uuid,
            name: RwLock::new(self.name()),
            playtime: AtomicU64::new(self.playtime().millis()),
        }
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for User {}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("uuid", &self.uuid)
            .field("name", &*self.name.read())
            .field("playtime_ms", &self.playtime().millis())
            .finish()
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.uuid)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn uuid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn test_playtime_conversions() {
        assert_eq!(PlayTime::from_secs(90).millis(), 90_000);
        assert_eq!(PlayTime::from_millis(1_999).as_secs(), 1);
        assert_eq!(
            PlayTime::from_duration(Duration::from_secs(5)).as_duration(),
            Duration::from_secs(5)
        );
        assert!(PlayTime::ZERO.is_zero());
        assert_eq!(
            PlayTime::from_millis(5).saturating_sub(PlayTime::from_millis(10)),
            PlayTime::ZERO
        );
    }

    #[test]
    fn test_playtime_display() {
        assert_eq!(PlayTime::from_secs(42).to_string(), "42s");
        assert_eq!(PlayTime::from_secs(125).to_string(), "2m 5s");
        assert_eq!(PlayTime::from_secs(3_725).to_string(), "1h 2m 5s");
        assert_eq!(PlayTime::from_secs(90_060).to_string(), "1d 1h 1m");
    }

    #[test]
    fn test_user_rejects_nil_uuid() {
        assert_matches!(User::new(Uuid::nil(), "Steve"), Err(Error::InvalidArgument(_)));
    }

    #[test]
    fn test_user_rejects_blank_name() {
        assert_matches!(User::new(uuid(1), "   "), Err(Error::InvalidArgument(_)));

        let user = User::new(uuid(1), "Steve").unwrap();
        assert_matches!(user.set_name(""), Err(Error::InvalidArgument(_)));
        assert_eq!(user.name(), "Steve");
    }

    #[test]
    fn test_set_name_returns_previous() {
        let user = User::new(uuid(1), "Steve").unwrap();
        let old = user.set_name("Alex").unwrap();
        assert_eq!(old, "Steve");
        assert_eq!(user.name(), "Alex");
    }

    #[test]
    fn test_add_playtime() {
        let user = User::with_playtime(uuid(1), "Steve", PlayTime::from_secs(10)).unwrap();
        let total = user.add_playtime(PlayTime::from_secs(5));
        assert_eq!(total, PlayTime::from_secs(15));
        assert_eq!(user.playtime(), PlayTime::from_secs(15));
    }

    #[test]
    fn test_equality_by_uuid_only() {
        let a = User::new(uuid(7), "Before").unwrap();
        let b = User::with_playtime(uuid(7), "After", PlayTime::from_secs(1)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_clone_is_detached() {
        let user = User::new(uuid(1), "Steve").unwrap();
        let copy = user.clone();
        user.set_playtime(PlayTime::from_secs(100));
        assert_eq!(copy.playtime(), PlayTime::ZERO);
    }

    #[test]
    fn test_ranking_order() {
        let low = User::with_playtime(uuid(1), "low", PlayTime::from_secs(10)).unwrap();
        let high = User::with_playtime(uuid(9), "high", PlayTime::from_secs(99)).unwrap();
        let tie_a = User::with_playtime(uuid(2), "tie-a", PlayTime::from_secs(50)).unwrap();
        let tie_b = User::with_playtime(uuid(3), "tie-b", PlayTime::from_secs(50)).unwrap();

        let mut users = vec![&low, &tie_b, &high, &tie_a];
        users.sort_by(|a, b| User::ranking_cmp(a, b));

        let names: Vec<String> = users.iter().map(|u| u.name()).collect();
        assert_eq!(names, vec!["high", "tie-a", "tie-b", "low"]);
    }
}
