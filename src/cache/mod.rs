//! User Cache
//!
//! In-memory identity cache keeping live user records reachable by uuid and
//! by display name.
//!
//! - **ExpiringMap** (`expiring.rs`) - concurrent map with lifetime and idle expiry
//! - **IdentityCache** (`identity.rs`) - primary and alias indices with cascading eviction
//!
//! Nothing here performs I/O and nothing blocks. Lookups never fall through
//! to the repository; that is the job of `UserService`.

pub mod expiring;
pub mod identity;

mod proptest;

pub use expiring::{ExpirationPolicy, ExpiringMap};
pub use identity::{IdentityCache, IdentityCacheConfig, IdentityCacheStats};
