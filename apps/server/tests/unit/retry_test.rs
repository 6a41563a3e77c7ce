//! Unit tests for generator retry with exponential backoff
//!
//! Time is paused so backoff sleeps complete instantly while still being
//! measurable through `tokio::time::Instant`.

use std::time::Duration;

use eduforge::generator::{ContentGenerator, GenerationInput, GeneratorError, GeneratorErrorKind};
use eduforge::services::RetryPolicy;
use rstest::rstest;
use tokio::time::Instant;

use crate::common::{generated_content, retryable, StubGenerator};

fn input() -> GenerationInput {
    GenerationInput {
        prompt: "Daur ulang plastik".to_string(),
        tags: vec!["plastik".to_string()],
    }
}

fn policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(2000),
        max_jitter: Duration::from_millis(1000),
    }
}

#[test]
fn test_backoff_doubles_each_attempt() {
    let policy = policy();

    assert_eq!(policy.backoff(1), Duration::from_millis(2000));
    assert_eq!(policy.backoff(2), Duration::from_millis(4000));
    assert_eq!(policy.backoff(3), Duration::from_millis(8000));
}

#[test]
fn test_backoff_saturates_instead_of_overflowing() {
    let policy = policy();

    assert!(policy.backoff(200) >= policy.backoff(40));
}

#[rstest]
#[case::first_try(0)]
#[case::one_retry(1)]
#[case::two_retries(2)]
#[tokio::test(start_paused = true)]
async fn test_succeeds_after_k_retryable_failures(#[case] failures: usize) {
    let stub = StubGenerator::failing_then(
        failures,
        retryable(GeneratorErrorKind::Overloaded),
        generated_content("Plastik", 2),
    );
    let input = input();

    let result = policy().run(|_| stub.generate(&input)).await;

    assert_eq!(result.unwrap().title, "Plastik");
    assert_eq!(stub.calls(), failures + 1);
}

#[rstest]
#[case::timeout(GeneratorErrorKind::Timeout)]
#[case::overloaded(GeneratorErrorKind::Overloaded)]
#[case::rate_limited(GeneratorErrorKind::RateLimited)]
#[tokio::test(start_paused = true)]
async fn test_always_retryable_stops_at_max_attempts(#[case] kind: GeneratorErrorKind) {
    let stub = StubGenerator::failing(retryable(kind));
    let input = input();

    let err = policy().run(|_| stub.generate(&input)).await.unwrap_err();

    assert_eq!(err.kind, kind);
    assert_eq!(stub.calls(), 3);
}

#[rstest]
#[case::malformed(GeneratorErrorKind::Malformed)]
#[case::http(GeneratorErrorKind::Http)]
#[case::transport(GeneratorErrorKind::Transport)]
#[tokio::test(start_paused = true)]
async fn test_fatal_error_is_not_retried(#[case] kind: GeneratorErrorKind) {
    let stub = StubGenerator::failing(GeneratorError::new(kind, "fatal"));
    let input = input();
    let started = Instant::now();

    let err = policy().run(|_| stub.generate(&input)).await.unwrap_err();

    assert_eq!(err.kind, kind);
    assert_eq!(stub.calls(), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_with_jitter_between_attempts() {
    let stub = StubGenerator::failing_then(
        2,
        retryable(GeneratorErrorKind::RateLimited),
        generated_content("Plastik", 1),
    );
    let input = input();
    let started = Instant::now();

    policy().run(|_| stub.generate(&input)).await.unwrap();

    // 2s + 4s of backoff, plus up to 1s of jitter per retry
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(6000), "elapsed {:?}", elapsed);
    assert!(elapsed <= Duration::from_millis(8000), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_numbers_are_one_based() {
    let stub = StubGenerator::failing(retryable(GeneratorErrorKind::Timeout));
    let input = input();
    let mut seen = Vec::new();

    let _ = policy()
        .run(|attempt| {
            seen.push(attempt);
            stub.generate(&input)
        })
        .await;

    assert_eq!(seen, vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_zero_attempts_still_calls_once() {
    let stub = StubGenerator::failing(retryable(GeneratorErrorKind::Timeout));
    let input = input();
    let policy = RetryPolicy {
        max_attempts: 0,
        ..policy()
    };

    let _ = policy.run(|_| stub.generate(&input)).await;

    assert_eq!(stub.calls(), 1);
}
