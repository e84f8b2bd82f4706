//! Retry budget E2E tests.

use std::sync::Arc;

use infraprobe_core::error::ProviderError;
use infraprobe_core::types::Phase;
use infraprobe_harness::{Scenario, Verdict};

use crate::helpers::fake_cloud::FakeCloud;
use crate::helpers::fake_engine::{FakeEngine, NETWORK};
use crate::helpers::{builder, manager, quick_retry};

fn transient(n: usize) -> Vec<ProviderError> {
    (0..n)
        .map(|i| ProviderError::NotYetVisible(format!("InvalidVpcID.NotFound ({i})")))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_e2e_n_transient_failures_succeed_with_n_plus_one_attempts() {
    // Given: 2 transient failures, budget of 3
    let cloud = Arc::new(FakeCloud::new());
    let m = manager(FakeEngine::new(cloud.clone()).failing_apply(transient(2)), cloud);

    // When
    let result = m
        .run(Scenario::new(
            builder("eventual").target(NETWORK).retry(quick_retry(3)),
        ))
        .await;

    // Then
    assert_eq!(result.verdict, Verdict::Passed);
    assert_eq!(m.engine().apply_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_e2e_n_transient_failures_exhaust_budget_of_n() {
    // Given: 2 transient failures, budget of 2
    let cloud = Arc::new(FakeCloud::new());
    let m = manager(
        FakeEngine::new(cloud.clone()).failing_apply(transient(2)),
        cloud.clone(),
    );

    // When
    let result = m
        .run(Scenario::new(
            builder("exhausted").target(NETWORK).retry(quick_retry(2)),
        ))
        .await;

    // Then: LifecycleError after exactly 2 attempts, cleanup still ran
    assert_eq!(result.verdict, Verdict::ApplyFailed);
    let err = result.apply_error.expect("apply error recorded");
    assert_eq!(err.phase, Phase::Apply);
    assert_eq!(err.attempts_used, 2);
    assert!(err.exhausted());
    assert_eq!(m.engine().apply_calls(), 2);
    assert_eq!(m.engine().destroy_calls("exhausted"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_e2e_fatal_error_is_not_retried() {
    // Given: a fatal error on the first attempt with plenty of budget
    let cloud = Arc::new(FakeCloud::new());
    let m = manager(
        FakeEngine::new(cloud.clone())
            .failing_apply([ProviderError::Fatal("UnauthorizedOperation".to_owned())]),
        cloud,
    );

    // When
    let result = m
        .run(Scenario::new(
            builder("fatal").target(NETWORK).retry(quick_retry(5)),
        ))
        .await;

    // Then: one invocation, immediate failure
    assert_eq!(result.verdict, Verdict::ApplyFailed);
    assert_eq!(m.engine().apply_calls(), 1);
    let err = result.apply_error.expect("apply error recorded");
    assert_eq!(err.attempts_used, 1);
    assert!(!err.exhausted());
}
