//! Persistence contracts for jobs and usage counters.
//!
//! The pipeline only depends on these traits. `postgres` backs them with
//! sqlx, `memory` with in-process maps that follow the same semantics.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Content, GenerationJob};

pub use memory::{MemoryJobStore, MemoryUsageStore};
pub use postgres::{PgJobStore, PgUsageStore};

/// Result of a successful Completed/Failed to Regenerating transition
#[derive(Debug, Clone)]
pub struct Regeneration {
    /// The job as it was right before the transition
    pub previous: GenerationJob,
    pub job: GenerationJob,
}

/// Create/read/update contract for generation jobs
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts a new job record
    async fn create(&self, job: &GenerationJob) -> AppResult<()>;

    /// Reads the latest committed state of a job
    async fn get(&self, id: Uuid) -> AppResult<Option<GenerationJob>>;

    /// Moves a Completed or Failed job owned by `user_id` to Regenerating
    /// with placeholder content.
    ///
    /// Returns `None` when no job matched, either because it does not exist,
    /// belongs to someone else, or is not in a terminal state.
    async fn begin_regeneration(
        &self,
        id: Uuid,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Regeneration>>;

    /// Undoes `begin_regeneration` by restoring `previous` in full.
    ///
    /// Only a job still in Regenerating is restored; anything else is left
    /// alone.
    async fn revert_regeneration(&self, previous: &GenerationJob) -> AppResult<()>;

    /// Writes final content and marks the job Completed.
    ///
    /// Only Pending, Generating and Regenerating jobs are written. A job that
    /// is already terminal is left untouched and the call still succeeds, so
    /// replays are harmless.
    async fn complete(&self, id: Uuid, content: &Content, now: DateTime<Utc>) -> AppResult<()>;

    /// Marks the job Failed with a diagnostic body. Same guard as `complete`.
    async fn fail(&self, id: Uuid, diagnostic: &str, now: DateTime<Utc>) -> AppResult<()>;

    /// Whether the backing store is reachable
    async fn health_check(&self) -> bool;
}

/// Per-user daily counters used by the quota tracker
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Atomically creates the counter at 1 or increments it, but only while
    /// the stored count is below `limit`.
    ///
    /// Returns the new count, or `None` when the limit was already reached
    /// (in which case nothing is written).
    async fn increment_if_below(
        &self,
        user_id: &str,
        date_key: NaiveDate,
        limit: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Option<i32>>;

    /// Current count for the day, 0 when no counter exists
    async fn current(&self, user_id: &str, date_key: NaiveDate) -> AppResult<i32>;
}
