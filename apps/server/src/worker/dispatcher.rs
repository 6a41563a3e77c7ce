use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::{GenerationWorker, WorkerOutcome};
use crate::error::{AppError, AppResult};
use crate::models::GenerateRequested;

/// Hands `content.generate` events to the asynchronous substrate
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    /// Queues the event and returns without waiting for the worker
    async fn dispatch(&self, event: GenerateRequested) -> AppResult<()>;
}

type Slots = Arc<Mutex<HashMap<String, Arc<Semaphore>>>>;

/// Runs each event on a tokio task, with at most `per_user_limit` workers
/// active per user. Further events for that user wait in FIFO order.
pub struct TokioDispatcher {
    worker: Arc<GenerationWorker>,
    per_user_limit: usize,
    slots: Slots,
}

impl TokioDispatcher {
    pub fn new(worker: Arc<GenerationWorker>, per_user_limit: usize) -> Self {
        Self {
            worker,
            per_user_limit: per_user_limit.max(1),
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn slot_for(&self, user_id: &str) -> AppResult<Arc<Semaphore>> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| AppError::Internal("Dispatcher slot table poisoned".to_string()))?;

        Ok(slots
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_user_limit)))
            .clone())
    }

    /// Drops the user's semaphore once nobody holds or waits on it
    fn release_slot(slots: &Slots, user_id: &str, semaphore: Arc<Semaphore>) {
        if let Ok(mut slots) = slots.lock() {
            // One reference lives in the map, the other is ours
            if Arc::strong_count(&semaphore) == 2 {
                slots.remove(user_id);
            }
        }
    }

    /// Number of users with queued or running jobs
    pub fn active_users(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Spawns the worker for `event`, returning a handle to its outcome
    pub fn spawn(&self, event: GenerateRequested) -> AppResult<JoinHandle<WorkerOutcome>> {
        let semaphore = self.slot_for(&event.user_id)?;
        let worker = Arc::clone(&self.worker);
        let slots = Arc::clone(&self.slots);

        Ok(tokio::spawn(async move {
            let outcome = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(_permit) => worker.run(&event).await,
                Err(_) => {
                    // Semaphores are never closed, but do not lose the job silently
                    log::error!("Dispatcher slot closed for user {}", event.user_id);
                    worker.run(&event).await
                }
            };

            Self::release_slot(&slots, &event.user_id, semaphore);
            outcome
        }))
    }
}

#[async_trait]
impl JobDispatcher for TokioDispatcher {
    async fn dispatch(&self, event: GenerateRequested) -> AppResult<()> {
        log::debug!("Dispatching content.generate for job {}", event.job_id);
        self.spawn(event)?;
        Ok(())
    }
}
