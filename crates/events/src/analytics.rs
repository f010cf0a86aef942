//! Best-effort analytics forwarding.
//!
//! [`AnalyticsWebhook`] POSTs each [`PlatformEvent`] once to a configured
//! URL. Failures are logged and dropped: analytics never blocks or fails the
//! operation that produced the event, and nothing is retried.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::bus::PlatformEvent;

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("Webhook returned HTTP {0}")]
    HttpStatus(u16),
}

/// Forwards platform events to an analytics endpoint.
pub struct AnalyticsWebhook {
    client: reqwest::Client,
    url: String,
}

impl AnalyticsWebhook {
    pub fn new(url: impl Into<String>) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// The JSON body sent for an event.
    pub fn body(event: &PlatformEvent) -> serde_json::Value {
        serde_json::json!({
            "event": event.event_type,
            "properties": event.payload,
            "entity_type": event.source_entity_type,
            "entity_id": event.source_entity_id,
            "user_id": event.actor_user_id,
            "timestamp": event.timestamp,
        })
    }

    /// Send one event. A single attempt.
    pub async fn deliver(&self, event: &PlatformEvent) -> Result<(), WebhookError> {
        let response = self
            .client
            .post(&self.url)
            .json(&Self::body(event))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WebhookError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }

    /// Forward events from the bus until it closes.
    pub async fn run(self, mut receiver: broadcast::Receiver<PlatformEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = self.deliver(&event).await {
                        tracing::warn!(
                            error = %e,
                            event_type = %event.event_type,
                            "Analytics delivery failed, event dropped"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Analytics forwarding lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, analytics forwarding shutting down");
                    break;
                }
            }
        }
    }
}
