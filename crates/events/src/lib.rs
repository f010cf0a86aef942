//! Proposal event bus and outbound delivery.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`]: the domain event envelope, with the proposal event
//!   names in [`event_types`].
//! - [`EventPersistence`]: background service writing every event to the
//!   `events` table through the proposal store.
//! - [`AnalyticsWebhook`]: best-effort forwarding of events to an analytics
//!   endpoint.

pub mod analytics;
pub mod bus;
pub mod persistence;

pub use analytics::{AnalyticsWebhook, WebhookError};
pub use bus::{event_types, EventBus, PlatformEvent};
pub use persistence::EventPersistence;
