//! `infraprobe list` command handler

use std::io::Write;

use serde::Serialize;

use crate::cli::SuiteArgs;
use crate::commands::load_suite;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `list` command.
pub fn execute(args: SuiteArgs, writer: &OutputWriter) -> Result<i32, CliError> {
    let suite = load_suite(&args)?;

    let report = ScenarioListReport {
        total: suite.declarations().len(),
        scenarios: suite
            .declarations()
            .iter()
            .map(|d| ScenarioEntry {
                name: d.name.clone(),
                module_dir: d.module_dir.display().to_string(),
                region: d.region.clone(),
                targets: d.targets.clone(),
                expectations: d.expect.len(),
            })
            .collect(),
    };

    writer.render(&report)?;
    Ok(0)
}

#[derive(Serialize)]
pub struct ScenarioListReport {
    pub total: usize,
    pub scenarios: Vec<ScenarioEntry>,
}

#[derive(Serialize)]
pub struct ScenarioEntry {
    pub name: String,
    pub module_dir: String,
    pub region: Option<String>,
    pub targets: Vec<String>,
    pub expectations: usize,
}

impl Render for ScenarioListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Scenarios ({} total)", self.total.to_string().bold())?;
        writeln!(w)?;
        writeln!(
            w,
            "{:<24} {:<24} {:<12} {:>7} {:>12}",
            "Name", "Module", "Region", "Targets", "Expectations"
        )?;
        writeln!(w, "{}", "-".repeat(83))?;

        for s in &self.scenarios {
            let targets = if s.targets.is_empty() {
                "all".to_owned()
            } else {
                s.targets.len().to_string()
            };
            writeln!(
                w,
                "{:<24} {:<24} {:<12} {:>7} {:>12}",
                s.name,
                s.module_dir,
                s.region.as_deref().unwrap_or("default"),
                targets,
                s.expectations
            )?;
        }
        Ok(())
    }
}
