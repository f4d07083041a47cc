//! Event Publisher Adapters
//!
//! `EventPublisher` implementations: a tracing sink for audit trails, an
//! in-memory collector for tests and tooling, and a fan-out composite.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::events::UserEvent;
use crate::domain::ports::EventPublisher;
use crate::error::Result;

/// Publishes user events to the tracing system.
#[derive(Debug, Clone, Default)]
pub struct LoggingEventPublisher {
    /// Log at info level (true) or debug level (false)
    info_level: bool,
}

impl LoggingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info_level() -> Self {
        Self { info_level: true }
    }

    pub fn debug_level() -> Self {
        Self { info_level: false }
    }
}

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(&self, event: UserEvent) -> Result<()> {
        let event_type = event.event_type();
        let json = serde_json::to_string(&event).unwrap_or_else(|_| format!("{:?}", event));
        let uuid = event.uuid().map(|u| u.to_string()).unwrap_or_default();

        if self.info_level {
            info!(event_type, uuid = %uuid, event = %json, "User event");
        } else {
            debug!(event_type, uuid = %uuid, event = %json, "User event");
        }

        Ok(())
    }
}

/// Keeps every published event in memory for later inspection.
#[derive(Debug, Default)]
pub struct InMemoryEventCollector {
    events: RwLock<Vec<UserEvent>>,
}

impl InMemoryEventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// All collected events, oldest first
    pub fn events(&self) -> Vec<UserEvent> {
        self.events.read().clone()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Events with the given `event_type()` name
    pub fn events_of_type(&self, event_type: &str) -> Vec<UserEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }

    /// Events concerning one user
    pub fn events_for(&self, uuid: Uuid) -> Vec<UserEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.uuid() == Some(uuid))
            .cloned()
            .collect()
    }

    /// Event type names in publish order
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.read().iter().map(UserEvent::event_type).collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventCollector {
    async fn publish(&self, event: UserEvent) -> Result<()> {
        self.events.write().push(event);
        Ok(())
    }

    async fn publish_all(&self, events: Vec<UserEvent>) -> Result<()> {
        self.events.write().extend(events);
        Ok(())
    }
}

/// Publishes every event to each inner publisher in turn.
///
/// Stops at the first publisher that fails.
#[derive(Default)]
pub struct CompositeEventPublisher {
    publishers: Vec<Arc<dyn EventPublisher>>,
}

impl CompositeEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_publisher<P: EventPublisher + 'static>(self, publisher: P) -> Self {
        self.with_shared(Arc::new(publisher))
    }

    /// Add a publisher the caller keeps a handle to
    pub fn with_shared(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publishers.push(publisher);
        self
    }

    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }
}

impl std::fmt::Debug for CompositeEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeEventPublisher")
            .field("publisher_count", &self.publishers.len())
            .finish()
    }
}

#[async_trait]
impl EventPublisher for CompositeEventPublisher {
    async fn publish(&self, event: UserEvent) -> Result<()> {
        for publisher in &self.publishers {
            publisher.publish(event.clone()).await?;
        }
        Ok(())
    }

    async fn publish_all(&self, events: Vec<UserEvent>) -> Result<()> {
        for publisher in &self.publishers {
            publisher.publish_all(events.clone()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{UserDeleteStatus, UserSaveReason};
    use crate::domain::User;

    fn steve() -> User {
        User::new(Uuid::from_u128(1), "Steve").unwrap()
    }

    #[tokio::test]
    async fn test_logging_publisher() {
        let publisher = LoggingEventPublisher::info_level();
        let event = UserEvent::saved(&steve(), UserSaveReason::PlayerJoin);

        publisher.publish(event).await.unwrap();
    }

    #[tokio::test]
    async fn test_in_memory_collector() {
        let collector = InMemoryEventCollector::new();
        assert!(collector.is_empty());

        let user = steve();
        collector
            .publish(UserEvent::pre_save(&user, UserSaveReason::SetCommand))
            .await
            .unwrap();
        collector
            .publish(UserEvent::saved(&user, UserSaveReason::SetCommand))
            .await
            .unwrap();
        collector
            .publish(UserEvent::leaderboard_refreshed(10, 3, 1))
            .await
            .unwrap();

        assert_eq!(collector.len(), 3);
        assert_eq!(collector.events_of_type("UserSaved").len(), 1);
        assert_eq!(collector.events_for(user.uuid()).len(), 2);
        assert_eq!(
            collector.event_types(),
            vec!["UserPreSave", "UserSaved", "LeaderboardRefreshed"]
        );

        collector.clear();
        assert!(collector.is_empty());
    }

    #[tokio::test]
    async fn test_composite_publisher_fans_out() {
        let first = Arc::new(InMemoryEventCollector::new());
        let second = Arc::new(InMemoryEventCollector::new());
        let composite = CompositeEventPublisher::new()
            .with_publisher(LoggingEventPublisher::debug_level())
            .with_shared(first.clone())
            .with_shared(second.clone());
        assert_eq!(composite.len(), 3);

        composite
            .publish(UserEvent::deleted(None, UserDeleteStatus::NotFound))
            .await
            .unwrap();
        composite
            .publish_all(vec![
                UserEvent::leaderboard_refreshed(5, 5, 0),
                UserEvent::leaderboard_refresh_failed(5, "boom"),
            ])
            .await
            .unwrap();

        assert_eq!(first.len(), 3);
        assert_eq!(second.event_types(), first.event_types());
    }
}
