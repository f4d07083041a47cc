//! Infrastructure Adapters
//!
//! Implementations of the domain ports, following the Port/Adapter
//! (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │           Ports (Traits): UserRepository │ EventPublisher   │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ InMemoryUserRepository │ LoggingEventPublisher             │ │
//! │  │ InMemoryEventCollector │ CompositeEventPublisher           │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use playtime_cache::adapters::InMemoryUserRepository;
//! use playtime_cache::domain::UserRepository;
//!
//! let repo = InMemoryUserRepository::load("users.json")?;
//! let top = repo.find_top_by_duration(10).await?;
//! ```

mod event_publisher;
mod memory;

pub use event_publisher::{CompositeEventPublisher, InMemoryEventCollector, LoggingEventPublisher};
pub use memory::{InMemoryUserRepository, UserEntity};
