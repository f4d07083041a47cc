//! playtime-cache - In-memory caching core for player playtime records
//!
//! Shields a persistent user store from repeated lookups during
//! high-frequency events (player join/leave, periodic UI refresh, name
//! resolution).
//!
//! # Architecture
//!
//! ```text
//!                    ┌──────────────────────────┐
//!                    │       UserService        │
//!                    └──────────────────────────┘
//!                      │          │           │
//!                      ▼          ▼           ▼
//!          ┌──────────────┐ ┌────────────┐ ┌────────────────┐
//!          │ IdentityCache│ │ Leaderboard│ │ UserRepository │
//!          │ uuid ◀─ name │ │   Cache    │─▶│    (port)      │
//!          └──────────────┘ └────────────┘ └────────────────┘
//! ```
//!
//! The two caches are independent: neither consults nor invalidates the
//! other.
//!
//! # Modules
//!
//! - [`adapters`] - In-memory repository and event publishers
//! - [`cache`] - Expiring map and the dual-index identity cache
//! - [`config`] - YAML settings and duration parsing
//! - [`domain`] - User value types, ports and events
//! - [`error`] - Error types
//! - [`leaderboard`] - Leaderboard snapshot and single-slot cache
//! - [`service`] - Read-through user service

pub mod adapters;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod leaderboard;
pub mod service;

// Re-export commonly used types
pub use cache::{IdentityCache, IdentityCacheConfig};
pub use config::Settings;
pub use domain::{PlayTime, User, UserRepository};
pub use error::{Error, Result};
pub use leaderboard::{LeaderboardCache, LeaderboardConfig, LeaderboardSnapshot};
pub use service::{ServiceConfig, UserService};
