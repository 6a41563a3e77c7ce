use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{JobStore, Regeneration, UsageStore};
use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::{Content, GenerationJob, JobStatus};

const JOB_COLUMNS: &str =
    "id, user_id, prompt, tags, status, title, content, created_at, updated_at";

/// Job store backed by the `generation_jobs` table
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn finish(
        &self,
        id: Uuid,
        status: JobStatus,
        content: &Content,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE generation_jobs
            SET status = $2, title = $3, content = $4, updated_at = $5
            WHERE id = $1 AND status IN ('pending', 'generating', 'regenerating')
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(&content.title)
        .bind(Json(content))
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current: Option<JobStatus> =
                sqlx::query_scalar("SELECT status FROM generation_jobs WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?;

            match current {
                None => return Err(AppError::NotFound(format!("Job {} not found", id))),
                Some(current) => log::warn!(
                    "Ignoring {} write for job {}: already {}",
                    status,
                    id,
                    current
                ),
            }
        }

        Ok(())
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, job: &GenerationJob) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO generation_jobs (
                id, user_id, prompt, tags, status, title, content, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(job.id)
        .bind(&job.user_id)
        .bind(&job.prompt)
        .bind(&job.tags)
        .bind(job.status)
        .bind(&job.title)
        .bind(Json(&job.content))
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<GenerationJob>> {
        let query = format!("SELECT {} FROM generation_jobs WHERE id = $1", JOB_COLUMNS);
        let job = sqlx::query_as::<_, GenerationJob>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(job)
    }

    async fn begin_regeneration(
        &self,
        id: Uuid,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Regeneration>> {
        let placeholder = Content::placeholder(JobStatus::Regenerating);

        // Row lock plus status predicate make this a compare-and-set: of two
        // concurrent regenerations the second re-checks the status after the
        // first commits and matches nothing. The locked row comes back as the
        // pre-transition state.
        let query = format!(
            r#"
            WITH previous AS (
                SELECT {}
                FROM generation_jobs
                WHERE id = $1 AND user_id = $2 AND status IN ('completed', 'failed')
                FOR UPDATE
            )
            UPDATE generation_jobs AS j
            SET status = $3, title = $4, content = $5, updated_at = $6
            FROM previous
            WHERE j.id = previous.id
            RETURNING previous.*
            "#,
            JOB_COLUMNS
        );

        let previous = sqlx::query_as::<_, GenerationJob>(&query)
            .bind(id)
            .bind(user_id)
            .bind(JobStatus::Regenerating)
            .bind(&placeholder.title)
            .bind(Json(&placeholder))
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;

        Ok(previous.map(|previous| Regeneration {
            job: previous.regenerating(now),
            previous,
        }))
    }

    async fn revert_regeneration(&self, previous: &GenerationJob) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE generation_jobs
            SET status = $2, title = $3, content = $4, updated_at = $5
            WHERE id = $1 AND status = 'regenerating'
            "#,
        )
        .bind(previous.id)
        .bind(previous.status)
        .bind(&previous.title)
        .bind(Json(&previous.content))
        .bind(previous.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            log::warn!("Not reverting job {}: no longer regenerating", previous.id);
        }

        Ok(())
    }

    async fn complete(&self, id: Uuid, content: &Content, now: DateTime<Utc>) -> AppResult<()> {
        self.finish(id, JobStatus::Completed, content, now).await
    }

    async fn fail(&self, id: Uuid, diagnostic: &str, now: DateTime<Utc>) -> AppResult<()> {
        self.finish(id, JobStatus::Failed, &Content::failure(diagnostic), now)
            .await
    }

    async fn health_check(&self) -> bool {
        db::health_check(&self.pool).await
    }
}

/// Usage counters backed by the `usage_counters` table
#[derive(Clone)]
pub struct PgUsageStore {
    pool: PgPool,
}

impl PgUsageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageStore for PgUsageStore {
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

        // Conditional upsert: the row is created at 1 or incremented only
        // while below the limit. When the predicate fails no row is returned
        // and nothing is written.
        let count: Option<i32> = sqlx::query_scalar(
            r#"
            INSERT INTO usage_counters (user_id, date_key, count, last_at)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (user_id, date_key) DO UPDATE
            SET count = usage_counters.count + 1,
                last_at = EXCLUDED.last_at
            WHERE usage_counters.count < $4
            RETURNING count
            "#,
        )
        .bind(user_id)
        .bind(date_key)
        .bind(now)
        .bind(limit)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count)
    }

    async fn current(&self, user_id: &str, date_key: NaiveDate) -> AppResult<i32> {
        let count: Option<i32> = sqlx::query_scalar(
            "SELECT count FROM usage_counters WHERE user_id = $1 AND date_key = $2",
        )
        .bind(user_id)
        .bind(date_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count.unwrap_or(0))
    }
}
