//! Concurrent scenario isolation E2E tests.

use std::sync::Arc;

use infraprobe_harness::{Expectation, Scenario, Verdict};

use crate::helpers::fake_cloud::FakeCloud;
use crate::helpers::fake_engine::{FakeEngine, NETWORK};
use crate::helpers::{builder, runner};

/// Scenario on the shared module whose expectation matches its own cidr.
fn cidr_scenario(name: &str, cidr: &str, expected: &str) -> Scenario {
    Scenario::new(
        builder(name)
            .target(NETWORK)
            .unique_scope(true)
            .variable("cidr", cidr),
    )
    .expect(Expectation::equals("network(vpc_id).cidr_block", expected).unwrap())
}

#[tokio::test]
async fn test_e2e_colliding_expectations_report_independently() {
    // Given: three scenarios on the same module, same output names, different cidrs
    let cloud = Arc::new(FakeCloud::new());
    let r = runner(FakeEngine::new(cloud.clone()), cloud.clone());

    // When: all run concurrently
    let report = r
        .run(vec![
            cidr_scenario("lab", "10.0.0.0/16", "10.0.0.0/16"),
            cidr_scenario("lab-b", "10.1.0.0/16", "10.1.0.0/16"),
            cidr_scenario("lab-c", "10.2.0.0/16", "10.0.0.0/16"),
        ])
        .await;

    // Then: each saw only its own network
    let verdicts: Vec<Verdict> = report.results.iter().map(|r| r.verdict).collect();
    assert_eq!(
        verdicts,
        [Verdict::Passed, Verdict::Passed, Verdict::ExpectationMismatch]
    );
    let failure = &report.results[2].failed_expectations()[0];
    assert_eq!(failure.actual, Some("10.2.0.0/16".into()));

    // Then: distinct scopes, each destroyed once, nothing left
    let scopes: Vec<&str> = report
        .results
        .iter()
        .filter_map(|r| r.scope.as_deref())
        .collect();
    assert_eq!(scopes.len(), 3);
    assert!(scopes[0] != scopes[1] && scopes[1] != scopes[2] && scopes[0] != scopes[2]);
    for scope in &scopes {
        assert_eq!(r.manager().engine().destroy_calls(scope), 1);
    }
    assert_eq!(cloud.live_count(), 0);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_e2e_same_label_twice_gets_distinct_scopes() {
    // Given: the same declaration twice with unique scopes
    let cloud = Arc::new(FakeCloud::new());
    let r = runner(FakeEngine::new(cloud.clone()), cloud.clone()).with_max_parallel(2);

    // When
    let report = r
        .run(vec![
            cidr_scenario("twin", "10.0.0.0/16", "10.0.0.0/16"),
            cidr_scenario("twin", "10.0.0.0/16", "10.0.0.0/16"),
        ])
        .await;

    // Then
    assert!(report.all_passed());
    assert_ne!(report.results[0].scope, report.results[1].scope);
    assert_eq!(r.manager().engine().total_destroy_calls(), 2);
}
