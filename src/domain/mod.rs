//! Domain Layer
//!
//! Value types, ports and events shared by the caches and the service.
//!
//! - **User** (`user.rs`) - the live player record and its playtime
//! - **Ports** (`ports.rs`) - trait abstractions for the persistent store and event sinks
//! - **Events** (`events.rs`) - user and leaderboard events
//!
//! ```ignore
//! use playtime_cache::domain::{User, UserRepository};
//!
//! async fn top_ten<R: UserRepository>(repo: &R) -> Result<Vec<User>> {
//!     repo.find_top_by_duration(10).await
//! }
//! ```

pub mod events;
pub mod ports;
pub mod user;

pub use events::UserEvent;
pub use ports::{
    EventPublisher, UserDeleteResult, UserDeleteStatus, UserRepository, UserSaveReason,
};
pub use user::{PlayTime, User};
