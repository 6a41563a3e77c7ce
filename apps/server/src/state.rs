//! Wiring of the pipeline components shared by all handlers.

use std::sync::Arc;

use crate::config::{Config, StorageBackend};
use crate::db;
use crate::error::{AppError, AppResult};
use crate::generator::{ContentGenerator, HttpGenerator};
use crate::services::{create_publisher, EventPublisher, JobService, QuotaTracker, RetryPolicy};
use crate::store::{JobStore, MemoryJobStore, MemoryUsageStore, PgJobStore, PgUsageStore, UsageStore};
use crate::worker::{GenerationWorker, TokioDispatcher};

/// Job and usage persistence
#[derive(Clone)]
pub struct Stores {
    pub jobs: Arc<dyn JobStore>,
    pub usage: Arc<dyn UsageStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            jobs: Arc::new(MemoryJobStore::new()),
            usage: Arc::new(MemoryUsageStore::new()),
        }
    }

    /// Connects to the configured backend, running migrations for Postgres
    pub async fn connect(config: &Config) -> AppResult<Self> {
        match config.storage {
            StorageBackend::Memory => {
                log::warn!("Using in-memory storage; jobs and quotas are lost on restart");
                Ok(Self::in_memory())
            }
            StorageBackend::Postgres => {
                let database = config.database.as_ref().ok_or_else(|| {
                    AppError::Internal("Postgres storage selected without DATABASE_URL".to_string())
                })?;
                let pool = db::init(database).await?;
                Ok(Self {
                    jobs: Arc::new(PgJobStore::new(pool.clone())),
                    usage: Arc::new(PgUsageStore::new(pool)),
                })
            }
        }
    }
}

/// Shared handler state
pub struct AppState {
    pub jobs: JobService,
    pub job_store: Arc<dyn JobStore>,
    pub dispatcher: Arc<TokioDispatcher>,
}

impl AppState {
    /// Builds the worker, dispatcher and job service on top of the given parts
    pub fn assemble(
        config: &Config,
        stores: Stores,
        publisher: Arc<dyn EventPublisher>,
        generator: Option<Arc<dyn ContentGenerator>>,
    ) -> Self {
        let mut worker = GenerationWorker::new(Arc::clone(&stores.jobs), publisher)
            .with_retry_policy(RetryPolicy::from_config(&config.generator))
            .with_call_timeout(config.generator.timeout)
            .with_job_deadline(config.worker.job_deadline);
        if let Some(generator) = generator {
            worker = worker.with_generator(generator);
        }

        let dispatcher = Arc::new(TokioDispatcher::new(
            Arc::new(worker),
            config.worker.max_concurrent_jobs_per_user,
        ));

        let quota = QuotaTracker::new(stores.usage, &config.quota);
        let jobs = JobService::new(
            Arc::clone(&stores.jobs),
            quota,
            dispatcher.clone(),
            config.worker.stall_after,
        );

        Self {
            jobs,
            job_store: stores.jobs,
            dispatcher,
        }
    }

    /// Builds the full production state from configuration
    pub async fn from_config(config: &Config) -> AppResult<Self> {
        let stores = Stores::connect(config).await?;
        let publisher: Arc<dyn EventPublisher> = Arc::from(create_publisher(&config.notification)?);

        let generator: Option<Arc<dyn ContentGenerator>> = if config.generator.enabled {
            Some(Arc::new(HttpGenerator::new(&config.generator)?))
        } else {
            log::warn!("Generator disabled; every job will receive fallback content");
            None
        };

        Ok(Self::assemble(config, stores, publisher, generator))
    }
}
