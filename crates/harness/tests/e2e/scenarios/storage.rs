//! Storage bucket and encryption E2E tests.

use std::sync::Arc;

use infraprobe_harness::{Expectation, Scenario, Verdict};

use crate::helpers::fake_cloud::FakeCloud;
use crate::helpers::fake_engine::{FakeEngine, SPOT_NODE, STORAGE};
use crate::helpers::{builder, manager};

#[tokio::test]
async fn test_e2e_bucket_encryption_is_aes256() {
    // Given
    let cloud = Arc::new(FakeCloud::new());
    let m = manager(FakeEngine::new(cloud.clone()), cloud.clone());
    let scenario = Scenario::new(builder("ddve").target(STORAGE))
        .expect(Expectation::truthy("bucket(bucket_name).exists").unwrap())
        .expect(Expectation::equals("bucket_encryption(bucket_name).algorithm", "AES256").unwrap());

    // When
    let result = m.run(scenario).await;

    // Then
    assert_eq!(result.verdict, Verdict::Passed, "{result:?}");
    assert_eq!(cloud.live_count(), 0);
}

#[tokio::test]
async fn test_e2e_encryption_member_of_accepts_either_algorithm() {
    // Given
    let cloud = Arc::new(FakeCloud::new());
    let m = manager(FakeEngine::new(cloud.clone()), cloud.clone());
    let scenario = Scenario::new(builder("ddve-kms").target(STORAGE)).expect(
        Expectation::member_of(
            "bucket_encryption(bucket_name).algorithm",
            ["aws:kms", "AES256"],
        )
        .unwrap(),
    );

    // When
    let result = m.run(scenario).await;

    // Then
    assert!(result.is_success());
}

#[tokio::test]
async fn test_e2e_spot_instance_mode() {
    // Given
    let cloud = Arc::new(FakeCloud::new());
    let m = manager(FakeEngine::new(cloud.clone()), cloud.clone());
    let scenario = Scenario::new(
        builder("spot")
            .target(SPOT_NODE)
            .variable("use_spot", true),
    )
    .expect(Expectation::equals("instance(instance_id).lifecycle", "spot").unwrap());

    // When
    let result = m.run(scenario).await;

    // Then
    assert_eq!(result.verdict, Verdict::Passed);
    assert_eq!(cloud.live_count(), 0);
}
