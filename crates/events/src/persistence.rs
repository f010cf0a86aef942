//! Durable event persistence service.
//!
//! [`EventPersistence`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and writes every received [`PlatformEvent`] to the `events` table. It runs
//! as a long-lived background task and exits when the bus is dropped.

use std::sync::Arc;

use charm_core::types::DbId;
use charm_db::models::event::NewEvent;
use charm_db::ProposalStore;
use tokio::sync::broadcast;

use crate::bus::PlatformEvent;

/// Background service that persists platform events.
pub struct EventPersistence;

impl EventPersistence {
    /// Run the persistence loop until the channel closes.
    pub async fn run(
        store: Arc<dyn ProposalStore>,
        mut receiver: broadcast::Receiver<PlatformEvent>,
    ) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = Self::persist(store.as_ref(), &event).await {
                        tracing::error!(
                            error = %e,
                            event_type = %event.event_type,
                            "Failed to persist event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Event persistence lagged, some events were not persisted"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, persistence shutting down");
                    break;
                }
            }
        }
    }

    /// Write a single event row.
    pub async fn persist(
        store: &dyn ProposalStore,
        event: &PlatformEvent,
    ) -> Result<DbId, sqlx::Error> {
        store
            .insert_event(&NewEvent {
                event_type: event.event_type.clone(),
                source_entity_type: event.source_entity_type.clone(),
                source_entity_id: event.source_entity_id,
                actor_user_id: event.actor_user_id,
                payload: event.payload.clone(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{event_types, EventBus, ENTITY_PROPOSAL};
    use charm_db::MemoryProposalStore;

    #[tokio::test]
    async fn persists_events_until_bus_closes() {
        let store = Arc::new(MemoryProposalStore::new());
        let bus = EventBus::default();
        let handle = tokio::spawn(EventPersistence::run(store.clone(), bus.subscribe()));

        let proposal_id = DbId::new_v4();
        bus.publish(
            PlatformEvent::new(event_types::PROPOSAL_ARCHIVED).with_source(ENTITY_PROPOSAL, proposal_id),
        );
        drop(bus);
        handle.await.expect("persistence task should exit cleanly");

        let events = store.list_recent_events(10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "proposal.archived");
        assert_eq!(events[0].source_entity_id, Some(proposal_id));
    }
}
