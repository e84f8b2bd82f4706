//! `infraprobe run` command handler

use std::io::Write;
use std::sync::Arc;

use tracing::{error, info};

use infraprobe_core::config::HarnessConfig;
use infraprobe_harness::{
    AwsCloudQuery, LifecycleManager, RetryPolicy, RunReport, ScenarioResult, ScenarioRunner,
    TeardownOutcome, TerraformEngine, ValidationOutcome, Verdict,
};

use crate::cli::RunArgs;
use crate::commands::load_suite;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, seconds};

/// Execute the `run` command and return the process exit code.
pub async fn execute(
    args: RunArgs,
    config: &HarnessConfig,
    writer: &OutputWriter,
) -> Result<i32, CliError> {
    let suite = load_suite(&args.suite)?;
    let defaults = RetryPolicy::from_config(&config.retry)?;
    let engine = TerraformEngine::from_config(&config.engine)?;

    let mut ctx = config.cloud_context();
    if let Some(region) = args.region {
        ctx.default_region = region;
    }
    let max_parallel = args.max_parallel.unwrap_or(config.runner.max_parallel);

    info!(
        scenarios = suite.declarations().len(),
        region = ctx.default_region.as_str(),
        max_parallel,
        "running suite"
    );

    let manager = LifecycleManager::new(Arc::new(engine), Arc::new(AwsCloudQuery::new()), ctx);
    let runner = ScenarioRunner::new(manager).with_max_parallel(max_parallel);
    let report = runner.run(suite.scenarios(defaults)).await;

    for leaked in report.leaked() {
        error!(
            scenario = leaked.name.as_str(),
            scope = leaked.scope.as_deref().unwrap_or("unknown"),
            "infrastructure may have leaked, clean up manually"
        );
    }

    writer.render(&report)?;
    Ok(report.exit_code())
}

impl Render for RunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Scenarios: {} total, {} passed, {} failed ({})",
            self.results.len().to_string().bold(),
            self.passed().to_string().green(),
            if self.failed() > 0 {
                self.failed().to_string().red()
            } else {
                self.failed().to_string().normal()
            },
            seconds(self.duration.as_millis())
        )?;
        writeln!(w)?;
        writeln!(
            w,
            "{:<24} {:<22} {:<32} {:>9}",
            "Name", "Verdict", "Scope", "Duration"
        )?;
        writeln!(w, "{}", "-".repeat(90))?;

        for r in &self.results {
            let verdict = match r.verdict {
                Verdict::Passed => r.verdict.as_str().green(),
                Verdict::Leaked => r.verdict.as_str().red().bold(),
                Verdict::ValidationErrored => r.verdict.as_str().magenta(),
                _ => r.verdict.as_str().yellow(),
            };
            writeln!(
                w,
                "{:<24} {:<22} {:<32} {:>9}",
                r.name,
                verdict,
                r.scope.as_deref().unwrap_or("-"),
                seconds(r.duration.as_millis())
            )?;
        }

        let failures: Vec<&ScenarioResult> =
            self.results.iter().filter(|r| !r.is_success()).collect();
        if !failures.is_empty() {
            writeln!(w)?;
            writeln!(w, "Failures:")?;
            for r in failures {
                render_failure(r, w)?;
            }
        }
        Ok(())
    }
}

fn render_failure(r: &ScenarioResult, w: &mut dyn Write) -> std::io::Result<()> {
    use colored::Colorize;

    writeln!(w, "  {} ({})", r.name.bold(), r.verdict)?;
    if let Some(e) = &r.config_error {
        writeln!(w, "    declaration: {e}")?;
    }
    if let Some(e) = &r.apply_error {
        writeln!(w, "    apply: {e}")?;
    }
    match &r.validation {
        ValidationOutcome::Failed(failures) => {
            for f in failures {
                writeln!(w, "    expectation: {f}")?;
            }
        }
        ValidationOutcome::Errored(reason) => writeln!(w, "    validation: {reason}")?,
        ValidationOutcome::NotRun | ValidationOutcome::Validated => {}
    }
    if let TeardownOutcome::Failed(e) = &r.teardown {
        writeln!(
            w,
            "    {} {e}; resources in scope '{}' may still exist",
            "TEARDOWN FAILED:".red().bold(),
            r.scope.as_deref().unwrap_or("unknown")
        )?;
    }
    Ok(())
}
