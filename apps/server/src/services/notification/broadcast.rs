//! In-process event fan-out over a tokio broadcast channel.

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::EventPublisher;
use crate::error::AppResult;
use crate::models::JobEvent;

/// Publishes events to any number of in-process subscribers
#[derive(Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<JobEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, event: &JobEvent) -> AppResult<()> {
        // No subscribers is not an error: consumers are optional
        if self.sender.send(event.clone()).is_err() {
            log::debug!("No subscribers for {} ({})", event.name(), event.job_id());
        }
        Ok(())
    }
}
