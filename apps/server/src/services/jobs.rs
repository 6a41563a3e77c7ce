use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, AppResult, FieldError};
use crate::models::{GenerateRequested, GenerationJob, JobView, SubmitRequest, UsageSummary};
use crate::services::QuotaTracker;
use crate::store::JobStore;
use crate::worker::JobDispatcher;

pub const MAX_PROMPT_CHARS: usize = 1000;
pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_CHARS: usize = 50;

/// Response for an accepted submission or regeneration
#[derive(Debug, Clone, Serialize)]
pub struct Accepted {
    pub job: GenerationJob,
    pub usage: UsageSummary,
}

/// Reads a submission from raw JSON so type errors are reported per field
pub fn parse_submission(body: &Value) -> AppResult<SubmitRequest> {
    let mut errors = Vec::new();

    let prompt = match body.get("prompt") {
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            errors.push(FieldError::new("prompt", "must be a string"));
            String::new()
        }
        None => {
            errors.push(FieldError::new("prompt", "is required"));
            String::new()
        }
    };

    let tags = match body.get("tags") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let tags: Vec<String> = items
                .iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect();
            if tags.len() != items.len() {
                errors.push(FieldError::new("tags", "must be a list of strings"));
            }
            tags
        }
        Some(_) => {
            errors.push(FieldError::new("tags", "must be a list of strings"));
            Vec::new()
        }
    };

    if errors.is_empty() {
        Ok(SubmitRequest { prompt, tags })
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Checks lengths and normalizes whitespace, returning the prompt and tags
/// that will be stored
pub fn validate_submission(request: &SubmitRequest) -> AppResult<(String, Vec<String>)> {
    let mut errors = Vec::new();

    let prompt = request.prompt.trim();
    let prompt_chars = prompt.chars().count();
    if prompt_chars == 0 {
        errors.push(FieldError::new("prompt", "cannot be empty"));
    } else if prompt_chars > MAX_PROMPT_CHARS {
        errors.push(FieldError::new(
            "prompt",
            format!("cannot exceed {} characters", MAX_PROMPT_CHARS),
        ));
    }

    if request.tags.len() > MAX_TAGS {
        errors.push(FieldError::new(
            "tags",
            format!("cannot contain more than {} tags", MAX_TAGS),
        ));
    }

    let tags: Vec<String> = request.tags.iter().map(|t| t.trim().to_string()).collect();
    for (i, tag) in tags.iter().enumerate() {
        let len = tag.chars().count();
        if len == 0 {
            errors.push(FieldError::new(&format!("tags[{}]", i), "cannot be empty"));
        } else if len > MAX_TAG_CHARS {
            errors.push(FieldError::new(
                &format!("tags[{}]", i),
                format!("cannot exceed {} characters", MAX_TAG_CHARS),
            ));
        }
    }

    if errors.is_empty() {
        Ok((prompt.to_string(), tags))
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Synchronous half of the pipeline: validation, quota, placeholder job,
/// dispatch. Everything after dispatch is only visible through `read`.
pub struct JobService {
    store: Arc<dyn JobStore>,
    quota: QuotaTracker,
    dispatcher: Arc<dyn JobDispatcher>,
    stall_after: Duration,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        quota: QuotaTracker,
        dispatcher: Arc<dyn JobDispatcher>,
        stall_after: Duration,
    ) -> Self {
        Self {
            store,
            quota,
            dispatcher,
            stall_after,
        }
    }

    async fn admit(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<UsageSummary> {
        let usage = self.quota.admit(user_id, now).await;
        if !usage.allowed {
            return Err(AppError::QuotaExceeded {
                count: usage.count,
                limit: usage.limit,
                reset_at: self.quota.reset_at(now),
            });
        }
        Ok(usage.into())
    }

    async fn dispatch(&self, job: &GenerationJob) -> AppResult<()> {
        let event = GenerateRequested {
            job_id: job.id,
            user_id: job.user_id.clone(),
            prompt: job.prompt.clone(),
            tags: job.tags.clone(),
        };

        if let Err(e) = self.dispatcher.dispatch(event).await {
            log::error!("Failed to dispatch job {}: {}", job.id, e);
            // No worker will ever pick this job up, so close it now
            let diagnostic = format!("Job could not be scheduled: {}", e);
            if let Err(fail_err) = self.store.fail(job.id, &diagnostic, Utc::now()).await {
                log::error!("Failed to mark undispatched job {} as failed: {}", job.id, fail_err);
            }
            return Err(e);
        }

        Ok(())
    }

    /// Accepts a new generation request and returns before generation starts
    pub async fn submit(&self, user_id: &str, request: SubmitRequest) -> AppResult<Accepted> {
        let (prompt, tags) = validate_submission(&request)?;
        let now = Utc::now();

        let usage = self.admit(user_id, now).await?;

        let job = GenerationJob::new_generating(user_id, &prompt, tags, now);
        self.store.create(&job).await?;
        self.dispatch(&job).await?;

        log::info!(
            "Accepted job {} for user {} ({} today)",
            job.id,
            user_id,
            usage
        );

        Ok(Accepted { job, usage })
    }

    /// Re-runs generation for a finished job, replacing its content entirely.
    ///
    /// The job is claimed before quota is charged, so a regenerate that loses
    /// a race or hits an in-flight job gets `Conflict` and costs nothing. When
    /// quota then rejects, the claim is reverted.
    pub async fn regenerate(&self, job_id: Uuid, user_id: &str) -> AppResult<Accepted> {
        let job = self.owned_job(job_id, user_id).await?;

        if job.status.is_in_flight() {
            return Err(AppError::Conflict(format!(
                "Job {} is already {}",
                job_id, job.status
            )));
        }

        let now = Utc::now();
        let regeneration = self
            .store
            .begin_regeneration(job_id, user_id, now)
            .await?
            .ok_or_else(|| {
                AppError::Conflict(format!("Job {} is already being regenerated", job_id))
            })?;

        let usage = match self.admit(user_id, now).await {
            Ok(usage) => usage,
            Err(e) => {
                if let Err(revert_err) = self.store.revert_regeneration(&regeneration.previous).await
                {
                    log::error!(
                        "Failed to revert regeneration of job {}: {}",
                        job_id,
                        revert_err
                    );
                }
                return Err(e);
            }
        };

        let job = regeneration.job;
        self.dispatch(&job).await?;

        log::info!("Regenerating job {} for user {}", job.id, user_id);

        Ok(Accepted { job, usage })
    }

    /// Current state of a job owned by `user_id`
    pub async fn read(&self, job_id: Uuid, user_id: &str) -> AppResult<JobView> {
        let job = self.owned_job(job_id, user_id).await?;
        let stalled = job.is_stalled(Utc::now(), self.stall_after);
        if stalled {
            log::warn!("Job {} looks stalled in status {}", job.id, job.status);
        }
        Ok(JobView { job, stalled })
    }

    /// Missing and foreign jobs are indistinguishable to the caller
    async fn owned_job(&self, job_id: Uuid, user_id: &str) -> AppResult<GenerationJob> {
        self.store
            .get(job_id)
            .await?
            .filter(|job| job.is_owned_by(user_id))
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))
    }
}
