use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::generator::{generate_with_timeout, ContentGenerator, GenerationInput};
use crate::models::{Content, GenerateRequested, JobEvent};
use crate::services::fallback;
use crate::services::notification::EventPublisher;
use crate::services::RetryPolicy;
use crate::store::JobStore;

/// Where the persisted content came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    Generator,
    Fallback,
}

/// Final state a worker run left the job in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    Completed(ContentSource),
    /// Persisting content failed; the job was marked Failed instead
    Failed,
    /// Neither content nor the failure could be written. The job stays
    /// non-terminal and only shows up as stalled.
    Stuck,
}

/// Drives one dispatched job to a terminal state: generate (with retries,
/// falling back to synthesized content), persist, notify.
pub struct GenerationWorker {
    store: Arc<dyn JobStore>,
    publisher: Arc<dyn EventPublisher>,
    generator: Option<Arc<dyn ContentGenerator>>,
    retry: RetryPolicy,
    call_timeout: Duration,
    job_deadline: Duration,
}

impl GenerationWorker {
    /// Worker without an external generator: every job gets fallback content
    pub fn new(store: Arc<dyn JobStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            store,
            publisher,
            generator: None,
            retry: RetryPolicy::default(),
            call_timeout: Duration::from_secs(30),
            job_deadline: Duration::from_secs(120),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn ContentGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Upper bound for a single generator call
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Upper bound for the whole generate step, backoff included
    pub fn with_job_deadline(mut self, deadline: Duration) -> Self {
        self.job_deadline = deadline;
        self
    }

    /// Step 1. Always yields content: any generator failure, exhausted
    /// retries, or an overrun of the job deadline falls back to synthesis.
    pub async fn generate(&self, request: &GenerateRequested) -> (Content, ContentSource) {
        let fallback = || {
            (
                fallback::synthesize(&request.prompt, &request.tags),
                ContentSource::Fallback,
            )
        };

        let generator: &dyn ContentGenerator = match self.generator {
            Some(ref generator) => generator.as_ref(),
            None => return fallback(),
        };

        let input = GenerationInput {
            prompt: request.prompt.clone(),
            tags: request.tags.clone(),
        };
        let input = &input;
        let call_timeout = self.call_timeout;
        let job_id = request.job_id;

        let attempts = self.retry.run(move |attempt| {
            log::debug!("Job {}: generator attempt {}", job_id, attempt);
            generate_with_timeout(generator, input, call_timeout)
        });

        match tokio::time::timeout(self.job_deadline, attempts).await {
            Ok(Ok(content)) => (content, ContentSource::Generator),
            Ok(Err(e)) => {
                log::warn!("Job {}: using fallback content after error: {}", job_id, e);
                fallback()
            }
            Err(_) => {
                log::warn!(
                    "Job {}: generation exceeded {}s deadline, using fallback content",
                    job_id,
                    self.job_deadline.as_secs()
                );
                fallback()
            }
        }
    }

    async fn notify(&self, event: JobEvent) {
        if let Err(e) = self.publisher.publish(&event).await {
            log::warn!(
                "Failed to publish {} for job {}: {}",
                event.name(),
                event.job_id(),
                e
            );
        }
    }

    /// Runs every step for one dispatched event. Safe to replay: generation
    /// has no side effects and persisting the same job twice is idempotent.
    pub async fn run(&self, request: &GenerateRequested) -> WorkerOutcome {
        let (content, source) = self.generate(request).await;

        match self.store.complete(request.job_id, &content, Utc::now()).await {
            Ok(()) => {
                log::info!("Job {} completed ({:?})", request.job_id, source);
                self.notify(JobEvent::Completed {
                    job_id: request.job_id,
                    user_id: request.user_id.clone(),
                    content,
                })
                .await;
                WorkerOutcome::Completed(source)
            }
            Err(persist_err) => {
                log::error!(
                    "Job {}: failed to persist content: {}",
                    request.job_id,
                    persist_err
                );
                let diagnostic = format!("Failed to save generated content: {}", persist_err);

                match self.store.fail(request.job_id, &diagnostic, Utc::now()).await {
                    Ok(()) => {
                        self.notify(JobEvent::Failed {
                            job_id: request.job_id,
                            user_id: request.user_id.clone(),
                            error: diagnostic,
                        })
                        .await;
                        WorkerOutcome::Failed
                    }
                    Err(fail_err) => {
                        log::error!(
                            "Job {} left in a non-terminal state: could not record failure: {}",
                            request.job_id,
                            fail_err
                        );
                        WorkerOutcome::Stuck
                    }
                }
            }
        }
    }
}
