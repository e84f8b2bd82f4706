//! Teardown guarantee E2E tests.
//!
//! Every scenario that reaches `Applying` gets exactly one destroy pass,
//! whatever happens during apply and validation.

use std::sync::Arc;

use infraprobe_core::error::ProviderError;
use infraprobe_core::types::Phase;
use infraprobe_harness::{
    Expectation, LifecyclePhase, Scenario, TeardownOutcome, ValidationOutcome, Verdict,
};

use crate::helpers::fake_cloud::FakeCloud;
use crate::helpers::fake_engine::{FakeEngine, NETWORK};
use crate::helpers::{builder, manager, quick_retry};

fn network_scenario(name: &str, expected_cidr: &str) -> Scenario {
    Scenario::new(builder(name).target(NETWORK).variable("cidr", "10.0.0.0/16"))
        .expect(Expectation::equals("network(vpc_id).cidr_block", expected_cidr).unwrap())
}

#[tokio::test(start_paused = true)]
async fn test_e2e_apply_failure_still_destroys_partial_resources() {
    // Given: an apply that creates resources and then fails fatally
    let cloud = Arc::new(FakeCloud::new());
    let engine = FakeEngine::new(cloud.clone())
        .partially_failing_apply(ProviderError::Fatal("InvalidAMIID.Malformed".to_owned()));
    let m = manager(engine, cloud.clone());

    // When
    let result = m.run(network_scenario("partial", "10.0.0.0/16")).await;

    // Then: apply failed, validation skipped, one destroy pass cleaned up
    assert_eq!(result.verdict, Verdict::ApplyFailed);
    assert_eq!(result.validation, ValidationOutcome::NotRun);
    assert_eq!(result.destroy_passes(), 1);
    assert_eq!(m.engine().destroy_calls("partial"), 1);
    assert_eq!(cloud.live_count(), 0, "partial apply leaked resources");
    assert_eq!(
        result.apply_error.as_ref().map(|e| e.phase),
        Some(Phase::Apply)
    );
}

#[tokio::test(start_paused = true)]
async fn test_e2e_expectation_mismatch_still_destroys() {
    // Given: a wrong cidr expectation
    let cloud = Arc::new(FakeCloud::new());
    let m = manager(FakeEngine::new(cloud.clone()), cloud.clone());

    // When
    let result = m.run(network_scenario("mismatch", "192.168.0.0/16")).await;

    // Then
    assert_eq!(result.verdict, Verdict::ExpectationMismatch);
    let failures = result.failed_expectations();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].actual, Some("10.0.0.0/16".into()));
    assert_eq!(m.engine().destroy_calls("mismatch"), 1);
    assert_eq!(cloud.live_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_e2e_validation_panic_still_destroys() {
    // Given: output reads panic inside validation
    let cloud = Arc::new(FakeCloud::new());
    let m = manager(FakeEngine::new(cloud.clone()).panicking_reads(), cloud.clone());

    // When
    let result = m.run(network_scenario("panic", "10.0.0.0/16")).await;

    // Then: the panic is a validation error, not a skipped teardown
    assert_eq!(result.verdict, Verdict::ValidationErrored);
    assert!(matches!(result.validation, ValidationOutcome::Errored(_)));
    assert!(
        result
            .transitions
            .contains(&LifecyclePhase::ValidationFailed)
    );
    assert_eq!(result.teardown, TeardownOutcome::Destroyed);
    assert_eq!(m.engine().destroy_calls("panic"), 1);
    assert_eq!(cloud.live_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_e2e_apply_and_validation_faults_destroy_once() {
    // Given: transient apply failures followed by a panicking validation
    let cloud = Arc::new(FakeCloud::new());
    let engine = FakeEngine::new(cloud.clone())
        .failing_apply([
            ProviderError::RateLimited("RequestLimitExceeded".to_owned()),
            ProviderError::Network("connection reset by peer".to_owned()),
        ])
        .panicking_reads();
    let m = manager(engine, cloud.clone());

    // When
    let result = m.run(network_scenario("both", "10.0.0.0/16")).await;

    // Then
    assert_eq!(m.engine().apply_calls(), 3);
    assert_eq!(result.verdict, Verdict::ValidationErrored);
    assert_eq!(result.destroy_passes(), 1);
    assert_eq!(m.engine().destroy_calls("both"), 1);
    assert_eq!(cloud.live_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_e2e_destroy_failure_is_a_leak() {
    // Given: destroy always fails fatally
    let cloud = Arc::new(FakeCloud::new());
    let engine = FakeEngine::new(cloud.clone())
        .failing_destroy([ProviderError::Fatal("DependencyViolation".to_owned())]);
    let m = manager(engine, cloud.clone());

    // When
    let result = m.run(network_scenario("leaky", "10.0.0.0/16")).await;

    // Then: reported as leaked, resources still alive
    assert_eq!(result.verdict, Verdict::Leaked);
    assert!(result.transitions.contains(&LifecyclePhase::DestroyFailed));
    assert_eq!(m.engine().destroy_calls("leaky"), 1);
    assert_eq!(cloud.live_scopes(), ["leaky".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn test_e2e_transient_destroy_failure_is_retried_within_one_pass() {
    // Given: destroy throttled once
    let cloud = Arc::new(FakeCloud::new());
    let engine = FakeEngine::new(cloud.clone())
        .failing_destroy([ProviderError::RateLimited("Throttling".to_owned())]);
    let m = manager(engine, cloud.clone());

    // When
    let result = m
        .run(
            Scenario::new(builder("throttled").target(NETWORK).retry(quick_retry(2)))
                .expect(Expectation::truthy("network(vpc_id).dns_support").unwrap()),
        )
        .await;

    // Then: one Destroying phase, two engine calls
    assert_eq!(result.verdict, Verdict::Passed);
    assert_eq!(result.destroy_passes(), 1);
    assert_eq!(m.engine().destroy_calls("throttled"), 2);
    assert_eq!(cloud.live_count(), 0);
}

#[tokio::test]
async fn test_e2e_unknown_target_provisions_nothing() {
    // Given: a target the module does not declare
    let cloud = Arc::new(FakeCloud::new());
    let m = manager(FakeEngine::new(cloud.clone()), cloud.clone());

    // When
    let result = m
        .run(Scenario::new(builder("typo").target("module.netwrk")))
        .await;

    // Then: rejected before Applying, so no teardown is owed
    assert_eq!(result.verdict, Verdict::InvalidDeclaration);
    assert!(result.config_error.as_deref().unwrap().contains("module.netwrk"));
    assert_eq!(result.teardown, TeardownOutcome::NotRequired);
    assert_eq!(m.engine().apply_calls(), 0);
    assert_eq!(m.engine().total_destroy_calls(), 0);
}
