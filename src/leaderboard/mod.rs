//! Leaderboard
//!
//! Ranked top-N view of users, cached as one immutable snapshot and
//! refreshed from the repository when it is too small or too old.
//!
//! The leaderboard never consults the identity cache, and writes to the
//! identity cache never invalidate it.

pub mod cache;
pub mod snapshot;

pub use cache::{LeaderboardCache, LeaderboardConfig, LeaderboardStats};
pub use snapshot::LeaderboardSnapshot;
