//! Targeted network apply E2E tests.

use std::sync::Arc;

use infraprobe_core::types::ResourceKind;
use infraprobe_harness::{Expectation, LifecyclePhase, Scenario, TeardownOutcome, Verdict};

use crate::helpers::fake_cloud::FakeCloud;
use crate::helpers::fake_engine::{FakeEngine, NETWORK, PUBLIC_SUBNET};
use crate::helpers::{builder, manager};

fn core_network() -> Scenario {
    Scenario::new(
        builder("core-network")
            .targets([NETWORK.to_owned(), PUBLIC_SUBNET.to_owned()])
            .variable("cidr", "10.0.0.0/16"),
    )
    .expect(Expectation::equals("network(vpc_id).cidr_block", "10.0.0.0/16").unwrap())
    .expect(Expectation::truthy("network(vpc_id).dns_support").unwrap())
    .expect(Expectation::truthy("subnet(public_subnet_id).map_public_ip_on_launch").unwrap())
}

#[tokio::test]
async fn test_e2e_core_network_validates_then_destroys() {
    // Given
    let cloud = Arc::new(FakeCloud::new());
    let m = manager(FakeEngine::new(cloud.clone()), cloud.clone());

    // When
    let result = m.run(core_network()).await;

    // Then
    assert_eq!(result.verdict, Verdict::Passed);
    assert_eq!(
        result.transitions,
        [
            LifecyclePhase::Idle,
            LifecyclePhase::Applying,
            LifecyclePhase::Applied,
            LifecyclePhase::Validating,
            LifecyclePhase::Validated,
            LifecyclePhase::Destroying,
            LifecyclePhase::Destroyed,
            LifecyclePhase::Done,
        ]
    );
    assert_eq!(result.teardown, TeardownOutcome::Destroyed);
    assert_eq!(cloud.live_count(), 0);
}

#[tokio::test]
async fn test_e2e_targets_limit_what_is_provisioned() {
    // Given: a network-only target set, but a storage expectation
    let cloud = Arc::new(FakeCloud::new());
    let m = manager(FakeEngine::new(cloud.clone()), cloud.clone());
    let scenario = core_network().expect(Expectation::equals("output.bucket_name", "x").unwrap());

    // When
    let result = m.run(scenario).await;

    // Then: storage was outside the target scope, so its output is absent
    assert_eq!(result.verdict, Verdict::ExpectationMismatch);
    let failures = result.failed_expectations();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].actual, None);
}

#[tokio::test]
async fn test_e2e_dns_disabled_fails_truthy_check() {
    // Given
    let cloud = Arc::new(FakeCloud::new());
    let m = manager(FakeEngine::new(cloud.clone()), cloud.clone());
    let scenario = Scenario::new(
        builder("no-dns")
            .target(NETWORK)
            .variable("enable_dns", false),
    )
    .expect(Expectation::truthy("network(vpc_id).dns_support").unwrap())
    .expect(Expectation::falsy("network(vpc_id).dns_hostnames").unwrap());

    // When
    let result = m.run(scenario).await;

    // Then: only the truthy expectation fails
    assert_eq!(result.failed_expectations().len(), 1);
    assert_eq!(cloud.live_count(), 0);
}

#[tokio::test]
async fn test_e2e_denied_subnet_lookup_still_checks_the_network() {
    // Given: subnet describes are denied, and one network expectation is wrong
    let cloud = Arc::new(FakeCloud::new());
    cloud.deny(ResourceKind::Subnet);
    let m = manager(FakeEngine::new(cloud.clone()), cloud.clone());
    let scenario =
        core_network().expect(Expectation::equals("network(vpc_id).cidr_block", "10.9.0.0/16").unwrap());

    // When
    let result = m.run(scenario).await;

    // Then: the mismatch and the lookup error are both reported, teardown still runs
    assert_eq!(result.verdict, Verdict::ValidationErrored);
    let failures = result.failed_expectations();
    assert_eq!(failures.len(), 2);
    assert!(failures[0].errored);
    assert!(failures[0].reason.contains("AccessDenied"));
    assert!(!failures[1].errored);
    assert_eq!(failures[1].actual, Some(serde_json::json!("10.0.0.0/16")));
    assert_eq!(result.teardown, TeardownOutcome::Destroyed);
    assert_eq!(cloud.live_count(), 0);
}
