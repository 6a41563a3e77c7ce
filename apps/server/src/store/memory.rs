use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::{JobStore, Regeneration, UsageStore};
use crate::error::{AppError, AppResult};
use crate::models::{Content, GenerationJob, JobStatus, UsageCounter};

fn poisoned<T>(_: T) -> AppError {
    AppError::Internal("In-memory store lock poisoned".to_string())
}

/// In-process job store
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<Uuid, GenerationJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn finish(
        &self,
        id: Uuid,
        status: JobStatus,
        content: Content,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut jobs = self.jobs.lock().map_err(poisoned)?;
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;

        if !job.status.can_transition_to(status) {
            log::warn!(
                "Ignoring {} write for job {}: already {}",
                status,
                id,
                job.status
            );
            return Ok(());
        }

        job.status = status;
        job.title = content.title.clone();
        job.content = content;
        job.updated_at = now;
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: &GenerationJob) -> AppResult<()> {
        let mut jobs = self.jobs.lock().map_err(poisoned)?;
        if jobs.contains_key(&job.id) {
            return Err(AppError::Conflict(format!("Job {} already exists", job.id)));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<GenerationJob>> {
        let jobs = self.jobs.lock().map_err(poisoned)?;
        Ok(jobs.get(&id).cloned())
    }

    async fn begin_regeneration(
        &self,
        id: Uuid,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Regeneration>> {
        let mut jobs = self.jobs.lock().map_err(poisoned)?;
        let job = match jobs.get_mut(&id) {
            Some(job) if job.is_owned_by(user_id) && job.status.is_terminal() => job,
            _ => return Ok(None),
        };

        let previous = job.clone();
        *job = previous.regenerating(now);
        Ok(Some(Regeneration {
            job: job.clone(),
            previous,
        }))
    }

    async fn revert_regeneration(&self, previous: &GenerationJob) -> AppResult<()> {
        let mut jobs = self.jobs.lock().map_err(poisoned)?;
        let job = jobs
            .get_mut(&previous.id)
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", previous.id)))?;

        if job.status == JobStatus::Regenerating {
            *job = previous.clone();
        } else {
            log::warn!(
                "Not reverting job {}: expected regenerating, found {}",
                previous.id,
                job.status
            );
        }
        Ok(())
    }

    async fn complete(&self, id: Uuid, content: &Content, now: DateTime<Utc>) -> AppResult<()> {
        self.finish(id, JobStatus::Completed, content.clone(), now)
    }

    async fn fail(&self, id: Uuid, diagnostic: &str, now: DateTime<Utc>) -> AppResult<()> {
        self.finish(id, JobStatus::Failed, Content::failure(diagnostic), now)
    }

    async fn health_check(&self) -> bool {
        self.jobs.lock().is_ok()
    }
}

/// In-process usage counters, keyed by (user, day)
#[derive(Default)]
pub struct MemoryUsageStore {
    counters: Mutex<HashMap<(String, NaiveDate), UsageCounter>>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a counter, mostly useful in tests
    pub fn counter(&self, user_id: &str, date_key: NaiveDate) -> Option<UsageCounter> {
        self.counters
            .lock()
            .ok()?
            .get(&(user_id.to_string(), date_key))
            .cloned()
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn increment_if_below(
        &self,
        user_id: &str,
        date_key: NaiveDate,
        limit: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Option<i32>> {
        if limit <= 0 {
            return Ok(None);
        }

        // The lock spans check and write, which is what makes this atomic
        let mut counters = self.counters.lock().map_err(poisoned)?;
        let counter = counters
            .entry((user_id.to_string(), date_key))
            .or_insert_with(|| UsageCounter {
                user_id: user_id.to_string(),
                date_key,
                count: 0,
                last_at: now,
            });

        if counter.count >= limit {
            return Ok(None);
        }

        counter.count += 1;
        counter.last_at = now;
        Ok(Some(counter.count))
    }

    async fn current(&self, user_id: &str, date_key: NaiveDate) -> AppResult<i32> {
        let counters = self.counters.lock().map_err(poisoned)?;
        Ok(counters
            .get(&(user_id.to_string(), date_key))
            .map(|c| c.count)
            .unwrap_or(0))
    }
}
