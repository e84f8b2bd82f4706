//! Example suite E2E tests.
//!
//! Loads the shipped `scenarios/networker-lab.toml` and checks every declaration
//! against the real module files, without touching a cloud.

use std::path::PathBuf;
use std::sync::Arc;

use infraprobe_core::config::EngineConfig;
use infraprobe_harness::{RetryPolicy, Suite, TerraformEngine, Verdict};
use serde_json::Value;

use crate::helpers::fake_cloud::FakeCloud;
use crate::helpers::fake_engine::FakeEngine;
use crate::helpers::{quick_retry, runner};

fn suite_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../scenarios/networker-lab.toml")
}

#[test]
fn test_e2e_example_suite_declares_three_scenarios() {
    let suite = Suite::load(&suite_path()).expect("example suite should load");
    let names: Vec<&str> = suite
        .declarations()
        .iter()
        .map(|d| d.name.as_str())
        .collect();
    assert_eq!(names, ["core-network", "ddve-deployment", "spot-instance"]);
}

#[test]
fn test_e2e_example_suite_targets_exist_in_module() {
    // Given: the real terraform engine, used only for its target check
    let engine = TerraformEngine::from_config(&EngineConfig::default()).unwrap();
    let suite = Suite::load(&suite_path()).unwrap();

    for scenario in suite.scenarios(RetryPolicy::default()) {
        // When
        let config = scenario
            .prepare(&engine)
            .unwrap_or_else(|e| panic!("{} is invalid: {e}", scenario.name()));

        // Then: var file merged, scope injected, explicit vars win
        assert_eq!(config.variables()["vpc_cidr"], "10.0.0.0/16");
        assert_eq!(config.variables()["use_spot_instances"], Value::Bool(true));
        assert_eq!(
            config.variables()["project_name"],
            Value::from(config.scope())
        );
    }
}

#[test]
fn test_e2e_per_scenario_retry_overrides_defaults() {
    let suite = Suite::load(&suite_path()).unwrap();
    let defaults = quick_retry(7);
    let scenarios = suite.scenarios(defaults);
    let engine = TerraformEngine::from_config(&EngineConfig::default()).unwrap();

    let core = scenarios[0].prepare(&engine).unwrap();
    let ddve = scenarios[1].prepare(&engine).unwrap();
    assert_eq!(core.retry(), defaults);
    assert_eq!(ddve.retry().max_attempts(), 3);
}

#[tokio::test]
async fn test_e2e_filtered_suite_runs_only_matching_scenarios() {
    // Given: the suite filtered to one scenario, run through the fake engine
    let suite = Suite::load(&suite_path()).unwrap().filter("core");
    let scenarios = suite.scenarios(quick_retry(1));
    let cloud = Arc::new(FakeCloud::new());
    let r = runner(FakeEngine::new(cloud.clone()), cloud.clone());

    // When
    let report = r.run(scenarios).await;

    // Then: the fake module does not know the real addresses, so the
    // declaration is rejected before anything is provisioned
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].verdict, Verdict::InvalidDeclaration);
    assert_eq!(r.manager().engine().apply_calls(), 0);
    assert_eq!(report.exit_code(), 2);
}

