//! Leaderboard Snapshot
//!
//! Immutable, ranked result of one repository query together with the size
//! it was requested for and the instant it was loaded.

use std::time::Duration;

use tokio::time::Instant;

use crate::domain::User;

/// Ranked users captured at a point in time.
///
/// The users are detached copies owned by the snapshot; later changes to the
/// live records do not show up here.
#[derive(Debug, Clone)]
pub struct LeaderboardSnapshot {
    users: Vec<User>,
    size: usize,
    loaded_at: Instant,
}

impl LeaderboardSnapshot {
    /// Capture `users`, already in ranking order, as the answer for `size`.
    pub fn new(users: Vec<User>, size: usize, loaded_at: Instant) -> Self {
        Self {
            users,
            size,
            loaded_at,
        }
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// Number of users the snapshot was requested for
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn loaded_at(&self) -> Instant {
        self.loaded_at
    }

    /// Number of users actually held (at most `size`, fewer on a small store)
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.loaded_at)
    }

    /// Whether this snapshot can answer a request for `requested` users.
    ///
    /// It must have been built for at least that many, and be younger than
    /// `expire_after` unless that is zero (never expires).
    pub fn is_usable(&self, requested: usize, expire_after: Duration, now: Instant) -> bool {
        if self.size < requested {
            return false;
        }
        expire_after.is_zero() || self.age(now) < expire_after
    }

    /// Copies of the first `n` users
    pub fn top(&self, n: usize) -> Vec<User> {
        self.users.iter().take(n).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlayTime;
    use uuid::Uuid;

    fn users(n: u128) -> Vec<User> {
        (1..=n)
            .map(|i| {
                User::with_playtime(
                    Uuid::from_u128(i),
                    format!("p{}", i),
                    PlayTime::from_secs((100 - i) as u64),
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_usable_by_size() {
        let now = Instant::now();
        let snapshot = LeaderboardSnapshot::new(users(10), 10, now);

        assert!(snapshot.is_usable(5, Duration::ZERO, now));
        assert!(snapshot.is_usable(10, Duration::ZERO, now));
        assert!(!snapshot.is_usable(11, Duration::ZERO, now));
    }

    #[test]
    fn test_small_store_still_counts_as_requested_size() {
        let now = Instant::now();
        // asked for 50, the store only had 3
        let snapshot = LeaderboardSnapshot::new(users(3), 50, now);

        assert!(snapshot.is_usable(50, Duration::ZERO, now));
        assert_eq!(snapshot.top(20).len(), 3);
    }

    #[test]
    fn test_usable_by_age() {
        let loaded = Instant::now();
        let ttl = Duration::from_secs(600);
        let snapshot = LeaderboardSnapshot::new(users(5), 5, loaded);

        assert!(snapshot.is_usable(5, ttl, loaded + Duration::from_secs(599)));
        assert!(!snapshot.is_usable(5, ttl, loaded + Duration::from_secs(600)));
        assert!(!snapshot.is_usable(5, ttl, loaded + Duration::from_secs(660)));
        // zero never expires
        assert!(snapshot.is_usable(5, Duration::ZERO, loaded + Duration::from_secs(86_400)));
    }

    #[test]
    fn test_top_is_prefix_copy() {
        let snapshot = LeaderboardSnapshot::new(users(5), 5, Instant::now());
        let top = snapshot.top(2);

        assert_eq!(top.len(), 2);
        assert_eq!(top[0].uuid(), Uuid::from_u128(1));
        assert_eq!(top[1].uuid(), Uuid::from_u128(2));

        top[0].set_playtime(PlayTime::ZERO);
        assert_eq!(snapshot.users()[0].playtime(), PlayTime::from_secs(99));
    }
}
