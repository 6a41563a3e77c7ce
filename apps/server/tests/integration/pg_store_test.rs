//! Integration tests for the Postgres job and usage stores
//!
//! Each test starts its own PostgreSQL container.

use std::sync::Arc;

use chrono::Utc;
use eduforge::config::QuotaConfig;
use eduforge::models::{Content, GenerationJob, JobStatus};
use eduforge::services::QuotaTracker;
use eduforge::store::{JobStore, UsageStore};
use pretty_assertions::assert_eq;

use crate::common::{day, generated_content, TestDb, OTHER_USER, USER};

// =============================================================================
// Job Store
// =============================================================================

#[tokio::test]
async fn test_job_round_trips_through_postgres() {
    let db = TestDb::new().await;
    let store = db.job_store();
    let job = GenerationJob::new_generating(
        USER,
        "Daur ulang plastik",
        vec!["plastik".to_string(), "rumah".to_string()],
        Utc::now(),
    );

    store.create(&job).await.unwrap();
    let stored = store.get(job.id).await.unwrap().unwrap();

    assert_eq!(stored.id, job.id);
    assert_eq!(stored.user_id, USER);
    assert_eq!(stored.tags, job.tags);
    assert_eq!(stored.status, JobStatus::Generating);
    assert_eq!(stored.content, Content::placeholder(JobStatus::Generating));
}

#[tokio::test]
async fn test_complete_overwrites_content_and_is_idempotent() {
    let db = TestDb::new().await;
    let store = db.job_store();
    let job = GenerationJob::new_generating(USER, "Kompos", vec![], Utc::now());
    store.create(&job).await.unwrap();
    let content = generated_content("Kompos Rumahan", 3);

    store.complete(job.id, &content, Utc::now()).await.unwrap();
    store.complete(job.id, &content, Utc::now()).await.unwrap();

    let stored = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.title, "Kompos Rumahan");
    assert_eq!(stored.content, content);
}

#[tokio::test]
async fn test_writes_to_missing_job_are_not_found() {
    let db = TestDb::new().await;
    let store = db.job_store();

    let result = store
        .fail(uuid::Uuid::new_v4(), "disk full", Utc::now())
        .await;

    assert!(matches!(result, Err(eduforge::error::AppError::NotFound(_))));
}

#[tokio::test]
async fn test_regeneration_is_compare_and_set() {
    let db = TestDb::new().await;
    let store = db.job_store();
    let job = GenerationJob::new_generating(USER, "Kompos", vec![], Utc::now());
    store.create(&job).await.unwrap();

    // In flight: no transition
    assert!(store.begin_regeneration(job.id, USER, Utc::now()).await.unwrap().is_none());

    store
        .complete(job.id, &generated_content("Kompos", 4), Utc::now())
        .await
        .unwrap();

    // Wrong owner: no transition
    assert!(store
        .begin_regeneration(job.id, OTHER_USER, Utc::now())
        .await
        .unwrap()
        .is_none());

    let regeneration = store
        .begin_regeneration(job.id, USER, Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(regeneration.job.status, JobStatus::Regenerating);
    assert_eq!(regeneration.job.content, Content::placeholder(JobStatus::Regenerating));
    assert_eq!(regeneration.previous.status, JobStatus::Completed);
    assert_eq!(regeneration.previous.title, "Kompos");

    let stored = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Regenerating);

    // Second attempt loses
    assert!(store.begin_regeneration(job.id, USER, Utc::now()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_regenerations_have_one_winner() {
    let db = TestDb::new().await;
    let store = Arc::new(db.job_store());
    let job = GenerationJob::new_generating(USER, "Kompos", vec![], Utc::now());
    store.create(&job).await.unwrap();
    store
        .complete(job.id, &generated_content("Kompos", 1), Utc::now())
        .await
        .unwrap();

    let job_id = job.id;
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.begin_regeneration(job_id, USER, Utc::now()).await })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_revert_restores_the_finished_job() {
    let db = TestDb::new().await;
    let store = db.job_store();
    let job = GenerationJob::new_generating(USER, "Kompos", vec![], Utc::now());
    store.create(&job).await.unwrap();
    let content = generated_content("Kompos", 2);
    store.complete(job.id, &content, Utc::now()).await.unwrap();

    let regeneration = store
        .begin_regeneration(job.id, USER, Utc::now())
        .await
        .unwrap()
        .unwrap();
    store.revert_regeneration(&regeneration.previous).await.unwrap();

    let stored = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Completed);
    assert_eq!(stored.content, content);
    assert_eq!(stored.updated_at, regeneration.previous.updated_at);
}

#[tokio::test]
async fn test_terminal_job_ignores_late_writes() {
    let db = TestDb::new().await;
    let store = db.job_store();
    let job = GenerationJob::new_generating(USER, "Kompos", vec![], Utc::now());
    store.create(&job).await.unwrap();

    store.fail(job.id, "disk full", Utc::now()).await.unwrap();
    store
        .complete(job.id, &generated_content("Basi", 1), Utc::now())
        .await
        .unwrap();

    let stored = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.content, Content::failure("disk full"));
}

// =============================================================================
// Usage Store
// =============================================================================

#[tokio::test]
async fn test_increment_stops_at_limit() {
    let db = TestDb::new().await;
    let store = db.usage_store();
    let today = day(2025, 3, 1);
    let now = Utc::now();

    for expected in 1..=3 {
        assert_eq!(
            store.increment_if_below(USER, today, 3, now).await.unwrap(),
            Some(expected)
        );
    }
    assert_eq!(store.increment_if_below(USER, today, 3, now).await.unwrap(), None);
    assert_eq!(store.current(USER, today).await.unwrap(), 3);

    // Next day and other users start fresh
    assert_eq!(
        store.increment_if_below(USER, day(2025, 3, 2), 3, now).await.unwrap(),
        Some(1)
    );
    assert_eq!(
        store.increment_if_below(OTHER_USER, today, 3, now).await.unwrap(),
        Some(1)
    );
}

#[tokio::test]
async fn test_concurrent_admissions_never_exceed_limit() {
    let db = TestDb::new().await;
    let tracker = QuotaTracker::new(
        Arc::new(db.usage_store()),
        &QuotaConfig {
            daily_limit: 10,
            utc_offset_minutes: 420,
        },
    );
    let now = Utc::now();

    let handles: Vec<_> = (0..40)
        .map(|_| {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.admit(USER, now).await })
        })
        .collect();

    let mut allowed = 0;
    for handle in handles {
        if handle.await.unwrap().allowed {
            allowed += 1;
        }
    }

    assert_eq!(allowed, 10);
    let count = db
        .usage_store()
        .current(USER, tracker.date_key(now))
        .await
        .unwrap();
    assert_eq!(count, 10);
}
