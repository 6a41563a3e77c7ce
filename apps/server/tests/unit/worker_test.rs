//! Unit tests for the generation worker
//!
//! Every run must leave the job Completed or Failed unless the store
//! refuses both writes.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use eduforge::generator::{ContentGenerator, GeneratorError, GeneratorErrorKind};
use eduforge::models::{Content, GenerationJob, JobEvent, JobStatus};
use eduforge::services::fallback::synthesize;
use eduforge::services::{BroadcastPublisher, RetryPolicy};
use eduforge::store::{JobStore, MemoryJobStore};
use eduforge::worker::{ContentSource, GenerationWorker, WorkerOutcome};
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::{generated_content, request_for, retryable, FlakyJobStore, StubGenerator, USER};

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(2000),
        max_jitter: Duration::from_millis(1000),
    }
}

async fn seeded_job(store: &dyn JobStore) -> GenerationJob {
    let job = GenerationJob::new_generating(
        USER,
        "Daur ulang plastik",
        vec!["plastik".to_string()],
        Utc::now(),
    );
    store.create(&job).await.unwrap();
    job
}

fn worker_with(
    store: Arc<dyn JobStore>,
    generator: Arc<dyn ContentGenerator>,
) -> (GenerationWorker, BroadcastPublisher) {
    let publisher = BroadcastPublisher::new(16);
    let worker = GenerationWorker::new(store, Arc::new(publisher.clone()))
        .with_generator(generator)
        .with_retry_policy(fast_retry());
    (worker, publisher)
}

#[tokio::test(start_paused = true)]
async fn test_generated_content_is_persisted_and_announced() {
    let store = Arc::new(MemoryJobStore::new());
    let job = seeded_job(store.as_ref()).await;
    let stub = Arc::new(StubGenerator::succeeding(generated_content("Plastik", 3)));
    let (worker, publisher) = worker_with(store.clone(), stub.clone());
    let mut events = publisher.subscribe();

    let outcome = worker.run(&request_for(&job)).await;

    assert_eq!(outcome, WorkerOutcome::Completed(ContentSource::Generator));
    let stored = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.title, "Plastik");
    assert_eq!(stored.content, generated_content("Plastik", 3));

    match events.recv().await.unwrap() {
        JobEvent::Completed {
            job_id, content, ..
        } => {
            assert_eq!(job_id, job.id);
            assert_eq!(content.title, "Plastik");
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[rstest]
#[case::one_failure(1)]
#[case::two_failures(2)]
#[tokio::test(start_paused = true)]
async fn test_retryable_failures_then_success(#[case] failures: usize) {
    let store = Arc::new(MemoryJobStore::new());
    let job = seeded_job(store.as_ref()).await;
    let stub = Arc::new(StubGenerator::failing_then(
        failures,
        retryable(GeneratorErrorKind::Overloaded),
        generated_content("Plastik", 2),
    ));
    let (worker, _publisher) = worker_with(store.clone(), stub.clone());

    let outcome = worker.run(&request_for(&job)).await;

    assert_eq!(outcome, WorkerOutcome::Completed(ContentSource::Generator));
    assert_eq!(stub.calls(), failures + 1);
    assert_eq!(store.get(job.id).await.unwrap().unwrap().title, "Plastik");
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_fall_back_and_still_complete() {
    let store = Arc::new(MemoryJobStore::new());
    let job = seeded_job(store.as_ref()).await;
    let stub = Arc::new(StubGenerator::failing(retryable(GeneratorErrorKind::RateLimited)));
    let (worker, _publisher) = worker_with(store.clone(), stub.clone());

    let outcome = worker.run(&request_for(&job)).await;

    assert_eq!(outcome, WorkerOutcome::Completed(ContentSource::Fallback));
    assert_eq!(stub.calls(), 3);
    let stored = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.content, synthesize(&job.prompt, &job.tags));
}

#[tokio::test(start_paused = true)]
async fn test_fatal_error_falls_back_after_one_call() {
    let store = Arc::new(MemoryJobStore::new());
    let job = seeded_job(store.as_ref()).await;
    let stub = Arc::new(StubGenerator::failing(GeneratorError::malformed("no json")));
    let (worker, _publisher) = worker_with(store.clone(), stub.clone());

    let outcome = worker.run(&request_for(&job)).await;

    assert_eq!(outcome, WorkerOutcome::Completed(ContentSource::Fallback));
    assert_eq!(stub.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_generator_hits_call_timeout_and_is_retried() {
    let store = Arc::new(MemoryJobStore::new());
    let job = seeded_job(store.as_ref()).await;
    let stub = Arc::new(
        StubGenerator::succeeding(generated_content("Terlambat", 1))
            .with_delay(Duration::from_secs(3600)),
    );
    let (worker, _publisher) = worker_with(store.clone(), stub.clone());
    let worker = worker.with_call_timeout(Duration::from_secs(30));

    let outcome = worker.run(&request_for(&job)).await;

    // Three 30s timeouts plus backoff stay under the 120s deadline
    assert_eq!(outcome, WorkerOutcome::Completed(ContentSource::Fallback));
    assert_eq!(stub.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_job_deadline_cuts_generation_short() {
    let store = Arc::new(MemoryJobStore::new());
    let job = seeded_job(store.as_ref()).await;
    let stub = Arc::new(
        StubGenerator::succeeding(generated_content("Terlambat", 1))
            .with_delay(Duration::from_secs(3600)),
    );
    let (worker, _publisher) = worker_with(store.clone(), stub.clone());
    let worker = worker
        .with_call_timeout(Duration::from_secs(30))
        .with_job_deadline(Duration::from_secs(10));
    let started = tokio::time::Instant::now();

    let outcome = worker.run(&request_for(&job)).await;

    assert_eq!(outcome, WorkerOutcome::Completed(ContentSource::Fallback));
    assert_eq!(stub.calls(), 1);
    assert!(started.elapsed() < Duration::from_secs(30));
}

#[tokio::test]
async fn test_without_generator_uses_fallback() {
    let store = Arc::new(MemoryJobStore::new());
    let job = seeded_job(store.as_ref()).await;
    let worker = GenerationWorker::new(store.clone(), Arc::new(BroadcastPublisher::new(4)));

    let outcome = worker.run(&request_for(&job)).await;

    assert_eq!(outcome, WorkerOutcome::Completed(ContentSource::Fallback));
    assert_eq!(
        store.get(job.id).await.unwrap().unwrap().title,
        "Panduan Singkat: Daur ulang plastik"
    );
}

#[tokio::test]
async fn test_persist_failure_marks_job_failed() {
    let store = Arc::new(FlakyJobStore::new().breaking_complete());
    let job = seeded_job(store.as_ref()).await;
    let stub = Arc::new(StubGenerator::succeeding(generated_content("Plastik", 1)));
    let (worker, publisher) = worker_with(store.clone(), stub);
    let mut events = publisher.subscribe();

    let outcome = worker.run(&request_for(&job)).await;

    assert_eq!(outcome, WorkerOutcome::Failed);
    let stored = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.content.body.contains("disk full"));

    match events.recv().await.unwrap() {
        JobEvent::Failed { job_id, error, .. } => {
            assert_eq!(job_id, job.id);
            assert!(error.contains("disk full"));
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_job_stays_in_flight_when_both_writes_fail() {
    let store = Arc::new(FlakyJobStore::new().breaking_complete().breaking_fail());
    let job = seeded_job(store.as_ref()).await;
    let stub = Arc::new(StubGenerator::succeeding(generated_content("Plastik", 1)));
    let (worker, _publisher) = worker_with(store.clone(), stub);

    let outcome = worker.run(&request_for(&job)).await;

    assert_eq!(outcome, WorkerOutcome::Stuck);
    let stored = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Generating);
    assert_eq!(stored.content, Content::placeholder(JobStatus::Generating));
    // Only detectable through the stalled flag once enough time has passed
    assert!(stored.is_stalled(Utc::now() + chrono::Duration::minutes(6), Duration::from_secs(300)));
}

#[tokio::test]
async fn test_replaying_a_run_is_idempotent() {
    let store = Arc::new(MemoryJobStore::new());
    let job = seeded_job(store.as_ref()).await;
    let stub = Arc::new(StubGenerator::succeeding(generated_content("Plastik", 2)));
    let (worker, _publisher) = worker_with(store.clone(), stub);
    let request = request_for(&job);

    worker.run(&request).await;
    let first = store.get(job.id).await.unwrap().unwrap();
    worker.run(&request).await;
    let second = store.get(job.id).await.unwrap().unwrap();

    assert_eq!(first.status, second.status);
    assert_eq!(first.content, second.content);
}
