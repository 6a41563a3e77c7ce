//! Client-side polling contract with a bounded budget.
//!
//! A client reads the job after an initial delay and then at a fixed
//! interval until it reaches a terminal state. Once `max_wait` has passed
//! the poller gives up and reports the job as stalled, which is distinct
//! from `Failed`.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::GenerationJob;
use crate::store::JobStore;

/// How a poll loop ended
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// Completed or Failed
    Terminal(GenerationJob),
    /// Still non-terminal when the budget ran out
    Stalled(GenerationJob),
}

impl PollOutcome {
    pub fn job(&self) -> &GenerationJob {
        match self {
            PollOutcome::Terminal(job) | PollOutcome::Stalled(job) => job,
        }
    }
}

#[derive(Clone)]
pub struct JobPoller {
    store: Arc<dyn JobStore>,
    pub initial_delay: Duration,
    pub interval: Duration,
    pub max_wait: Duration,
}

impl JobPoller {
    /// Poller with the default schedule: 3s initial delay, 2s interval, 5 minute budget
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            initial_delay: Duration::from_secs(3),
            interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(300),
        }
    }

    pub fn with_schedule(mut self, initial_delay: Duration, interval: Duration) -> Self {
        self.initial_delay = initial_delay;
        self.interval = interval;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    async fn read(&self, job_id: Uuid) -> AppResult<GenerationJob> {
        self.store
            .get(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))
    }

    /// Polls `job_id` until it is terminal or the budget is exhausted
    pub async fn wait_for(&self, job_id: Uuid) -> AppResult<PollOutcome> {
        let deadline = Instant::now() + self.max_wait;
        tokio::time::sleep(self.initial_delay.min(self.max_wait)).await;

        loop {
            let job = self.read(job_id).await?;
            if job.status.is_terminal() {
                return Ok(PollOutcome::Terminal(job));
            }

            let now = Instant::now();
            if now >= deadline {
                log::warn!(
                    "Job {} still {} after {}s of polling",
                    job_id,
                    job.status,
                    self.max_wait.as_secs()
                );
                return Ok(PollOutcome::Stalled(job));
            }

            tokio::time::sleep(self.interval.min(deadline - now)).await;
        }
    }
}
