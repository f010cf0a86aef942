//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`PlatformEvent`]s. It is
//! shared via `Arc<EventBus>` across the application.

use charm_core::types::DbId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Dot-separated names of the events proposal operations publish.
pub mod event_types {
    pub const PROPOSAL_CREATED: &str = "proposal.created";
    pub const PROPOSAL_PUBLISHED: &str = "proposal.published";
    pub const PROPOSAL_ARCHIVED: &str = "proposal.archived";
    pub const EVALUATION_CHANGED: &str = "proposal.evaluation_changed";
    pub const EVALUATION_APPEALED: &str = "proposal.evaluation_appealed";
    pub const VOTE_CREATED: &str = "proposal.vote_created";
    pub const RUBRIC_ANSWERS_UPDATED: &str = "proposal.rubric_answers_updated";
    pub const REWARDS_PUBLISHED: &str = "proposal.rewards_published";
}

/// Source entity kinds attached to events.
pub const ENTITY_PROPOSAL: &str = "proposal";
pub const ENTITY_EVALUATION: &str = "proposal_evaluation";

// ---------------------------------------------------------------------------
// PlatformEvent
// ---------------------------------------------------------------------------

/// A domain event that occurred on the platform.
///
/// Constructed via [`PlatformEvent::new`] and enriched with
/// [`with_source`](PlatformEvent::with_source),
/// [`with_actor`](PlatformEvent::with_actor) and
/// [`with_payload`](PlatformEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    /// Dot-separated event name, e.g. `"proposal.published"`.
    pub event_type: String,

    pub source_entity_type: Option<String>,

    pub source_entity_id: Option<DbId>,

    /// The user whose action triggered the event.
    pub actor_user_id: Option<DbId>,

    /// Event-specific data.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl PlatformEvent {
    /// Create a new event with only the required `event_type`.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source_entity_type: None,
            source_entity_id: None,
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_source(mut self, entity_type: impl Into<String>, entity_id: DbId) -> Self {
        self.source_entity_type = Some(entity_type.into());
        self.source_entity_id = Some(entity_id);
        self
    }

    pub fn with_actor(mut self, user_id: DbId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use charm_events::bus::{EventBus, PlatformEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(PlatformEvent::new("proposal.published"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<PlatformEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest unread events are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With no subscribers the event is dropped.
    pub fn publish(&self, event: PlatformEvent) {
        tracing::debug!(event_type = %event.event_type, "Publishing event");
        // SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlatformEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let proposal_id = DbId::new_v4();
        let actor = DbId::new_v4();

        bus.publish(
            PlatformEvent::new(event_types::PROPOSAL_PUBLISHED)
                .with_source(ENTITY_PROPOSAL, proposal_id)
                .with_actor(actor)
                .with_payload(serde_json::json!({ "evaluations": 2 })),
        );

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, "proposal.published");
        assert_eq!(received.source_entity_type.as_deref(), Some("proposal"));
        assert_eq!(received.source_entity_id, Some(proposal_id));
        assert_eq!(received.actor_user_id, Some(actor));
        assert_eq!(received.payload["evaluations"], 2);
    }

    #[tokio::test]
    async fn every_subscriber_receives_the_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(PlatformEvent::new(event_types::EVALUATION_CHANGED));

        assert_eq!(rx1.recv().await.unwrap().event_type, event_types::EVALUATION_CHANGED);
        assert_eq!(rx2.recv().await.unwrap().event_type, event_types::EVALUATION_CHANGED);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        EventBus::default().publish(PlatformEvent::new("orphan.event"));
    }

    #[test]
    fn new_event_has_empty_optional_fields() {
        let event = PlatformEvent::new("bare.event");
        assert!(event.source_entity_type.is_none());
        assert!(event.actor_user_id.is_none());
        assert!(event.payload.is_object());
    }
}
