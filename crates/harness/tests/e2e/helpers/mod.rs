//! Shared E2E test helpers.
//!
//! Provides an in-memory cloud, a fake engine that provisions into it with
//! injectable faults, and small builders for scenarios and managers.

pub mod fake_cloud;
pub mod fake_engine;

use std::sync::Arc;
use std::time::Duration;

use infraprobe_core::types::CloudContext;
use infraprobe_harness::{LifecycleManager, RetryPolicy, ScenarioConfigBuilder, ScenarioRunner};

use fake_cloud::FakeCloud;
use fake_engine::FakeEngine;

/// Region every fake scenario runs in unless it overrides it.
pub const REGION: &str = "us-east-1";

/// Retry policy with short delays for tests running on paused time.
#[allow(dead_code)]
pub fn quick_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_secs(2))
}

/// Scenario builder against the fake network module.
#[allow(dead_code)]
pub fn builder(name: &str) -> ScenarioConfigBuilder {
    ScenarioConfigBuilder::new(name, "/modules/networker-lab").retry(quick_retry(3))
}

/// Lifecycle manager over a fake engine sharing `cloud`.
#[allow(dead_code)]
pub fn manager(
    engine: FakeEngine,
    cloud: Arc<FakeCloud>,
) -> LifecycleManager<FakeEngine, FakeCloud> {
    LifecycleManager::new(Arc::new(engine), cloud, CloudContext::new(REGION))
}

/// Scenario runner over a fake engine sharing `cloud`.
#[allow(dead_code)]
pub fn runner(engine: FakeEngine, cloud: Arc<FakeCloud>) -> ScenarioRunner<FakeEngine, FakeCloud> {
    ScenarioRunner::new(manager(engine, cloud))
}
