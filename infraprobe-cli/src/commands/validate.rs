//! `infraprobe validate` command handler
//!
//! Builds every scenario's configuration (variable files, type checks, target
//! addresses) without running the engine or calling the cloud.

use std::io::Write;

use serde::Serialize;
use tracing::info;

use infraprobe_core::config::HarnessConfig;
use infraprobe_harness::{RetryPolicy, TerraformEngine};

use crate::cli::SuiteArgs;
use crate::commands::load_suite;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `validate` command and return the process exit code.
pub async fn execute(
    args: SuiteArgs,
    config: &HarnessConfig,
    writer: &OutputWriter,
) -> Result<i32, CliError> {
    let suite = load_suite(&args)?;
    let defaults = RetryPolicy::from_config(&config.retry)?;
    let engine = TerraformEngine::from_config(&config.engine)?;

    let scenarios: Vec<ScenarioCheck> = suite
        .scenarios(defaults)
        .iter()
        .map(|scenario| match scenario.prepare(&engine) {
            Ok(config) => ScenarioCheck {
                name: scenario.name().to_owned(),
                valid: true,
                variables: config.variables().len(),
                targets: config.targets().len(),
                expectations: scenario.expectations().len(),
                error: None,
            },
            Err(e) => ScenarioCheck {
                name: scenario.name().to_owned(),
                valid: false,
                variables: 0,
                targets: 0,
                expectations: scenario.expectations().len(),
                error: Some(e.to_string()),
            },
        })
        .collect();

    let report = SuiteValidationReport {
        suite: args.suite.display().to_string(),
        invalid: scenarios.iter().filter(|s| !s.valid).count(),
        scenarios,
    };
    info!(
        suite = report.suite.as_str(),
        invalid = report.invalid,
        "suite validated"
    );

    writer.render(&report)?;
    Ok(if report.invalid > 0 { 2 } else { 0 })
}

#[derive(Serialize)]
pub struct SuiteValidationReport {
    pub suite: String,
    pub invalid: usize,
    pub scenarios: Vec<ScenarioCheck>,
}

#[derive(Serialize)]
pub struct ScenarioCheck {
    pub name: String,
    pub valid: bool,
    pub variables: usize,
    pub targets: usize,
    pub expectations: usize,
    pub error: Option<String>,
}

impl Render for SuiteValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Suite Validation: {}", self.suite.bold())?;
        writeln!(
            w,
            "  Scenarios: {} total, {} valid, {} invalid",
            self.scenarios.len(),
            (self.scenarios.len() - self.invalid).to_string().green(),
            if self.invalid > 0 {
                self.invalid.to_string().red()
            } else {
                self.invalid.to_string().normal()
            }
        )?;
        writeln!(w)?;

        for s in &self.scenarios {
            match &s.error {
                None => writeln!(
                    w,
                    "  {} {} ({} variables, {} targets, {} expectations)",
                    "ok".green(),
                    s.name,
                    s.variables,
                    s.targets,
                    s.expectations
                )?,
                Some(e) => writeln!(w, "  {} {}: {}", "invalid".red(), s.name, e)?,
            }
        }
        Ok(())
    }
}
