//! Unit tests for the per-user bounded dispatcher

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use eduforge::models::{GenerationJob, JobStatus};
use eduforge::services::BroadcastPublisher;
use eduforge::store::{JobStore, MemoryJobStore};
use eduforge::worker::{
    ContentSource, GenerationWorker, JobDispatcher, TokioDispatcher, WorkerOutcome,
};

use crate::common::{request_for, ConcurrencyProbe, OTHER_USER, USER};

async fn jobs_for(store: &MemoryJobStore, user: &str, count: usize) -> Vec<GenerationJob> {
    let mut jobs = Vec::new();
    for i in 0..count {
        let job = GenerationJob::new_generating(user, &format!("Topik {}", i), vec![], Utc::now());
        store.create(&job).await.unwrap();
        jobs.push(job);
    }
    jobs
}

fn dispatcher(
    store: Arc<MemoryJobStore>,
    probe: Arc<ConcurrencyProbe>,
    per_user: usize,
) -> TokioDispatcher {
    let worker = GenerationWorker::new(store, Arc::new(BroadcastPublisher::new(64)))
        .with_generator(probe);
    TokioDispatcher::new(Arc::new(worker), per_user)
}

#[tokio::test(start_paused = true)]
async fn test_per_user_concurrency_is_capped() {
    let store = Arc::new(MemoryJobStore::new());
    let probe = Arc::new(ConcurrencyProbe::holding_for(Duration::from_secs(5)));
    let dispatcher = dispatcher(store.clone(), probe.clone(), 2);

    let jobs = jobs_for(&store, USER, 5).await;
    let handles: Vec<_> = jobs
        .iter()
        .map(|job| dispatcher.spawn(request_for(job)).unwrap())
        .collect();

    for handle in handles {
        assert_eq!(
            handle.await.unwrap(),
            WorkerOutcome::Completed(ContentSource::Generator)
        );
    }

    assert_eq!(probe.peak(), 2);
    for job in jobs {
        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
    }
}

#[tokio::test(start_paused = true)]
async fn test_users_do_not_share_slots() {
    let store = Arc::new(MemoryJobStore::new());
    let probe = Arc::new(ConcurrencyProbe::holding_for(Duration::from_secs(5)));
    let dispatcher = dispatcher(store.clone(), probe.clone(), 1);

    let mut jobs = jobs_for(&store, USER, 2).await;
    jobs.extend(jobs_for(&store, OTHER_USER, 2).await);
    let handles: Vec<_> = jobs
        .iter()
        .map(|job| dispatcher.spawn(request_for(job)).unwrap())
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    // One slot each, two users
    assert_eq!(probe.peak(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_slots_are_released_after_completion() {
    let store = Arc::new(MemoryJobStore::new());
    let probe = Arc::new(ConcurrencyProbe::holding_for(Duration::from_millis(10)));
    let dispatcher = dispatcher(store.clone(), probe, 2);

    let jobs = jobs_for(&store, USER, 3).await;
    let handles: Vec<_> = jobs
        .iter()
        .map(|job| dispatcher.spawn(request_for(job)).unwrap())
        .collect();
    assert_eq!(dispatcher.active_users(), 1);

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(dispatcher.active_users(), 0);
}

#[tokio::test]
async fn test_dispatch_returns_before_the_worker_finishes() {
    let store = Arc::new(MemoryJobStore::new());
    let probe = Arc::new(ConcurrencyProbe::holding_for(Duration::from_secs(3600)));
    let dispatcher = dispatcher(store.clone(), probe, 2);
    let job = jobs_for(&store, USER, 1).await.remove(0);

    dispatcher.dispatch(request_for(&job)).await.unwrap();

    let stored = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Generating);
}
