//! Delivery of pipeline events to external consumers.
//!
//! The worker publishes completion and failure events through the
//! [`EventPublisher`] trait. Nothing in the pipeline depends on delivery
//! succeeding: a failed publish is logged and the job stays as persisted.

pub mod broadcast;
pub mod webhook;

use async_trait::async_trait;

use crate::config::NotificationConfig;
use crate::error::AppResult;
use crate::models::JobEvent;

pub use broadcast::BroadcastPublisher;
pub use webhook::WebhookPublisher;

// =============================================================================
// Event Publisher Trait
// =============================================================================

/// Sink for pipeline events (Strategy pattern)
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a single event
    async fn publish(&self, event: &JobEvent) -> AppResult<()>;
}

// =============================================================================
// Publisher Factory
// =============================================================================

/// Webhook delivery when a URL is configured, an in-process broadcast
/// channel otherwise
pub fn create_publisher(config: &NotificationConfig) -> AppResult<Box<dyn EventPublisher>> {
    match config.webhook_url {
        Some(ref url) => {
            let publisher = WebhookPublisher::new(url, config.webhook_secret.clone())?;
            log::info!("Publishing completion events to webhook {}", url);
            Ok(Box::new(publisher))
        }
        None => Ok(Box::new(BroadcastPublisher::new(64))),
    }
}
