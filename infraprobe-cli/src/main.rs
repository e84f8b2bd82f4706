//! infraprobe CLI entry point.
//!
//! Loads configuration, initializes logging and the optional metrics export,
//! dispatches the subcommand and maps the outcome to a process exit code.

mod cli;
mod commands;
mod error;
mod logging;
mod metrics_export;
mod output;

use clap::Parser;

use cli::{Cli, Commands};
use error::CliError;
use output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            e.exit_code()
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32, CliError> {
    let mut config = commands::load_config(cli.config.as_deref()).await?;
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    logging::init_tracing(&config.general).map_err(|e| CliError::Config(e.to_string()))?;
    let metrics = metrics_export::install_metrics_recorder(&config.metrics)
        .map_err(|e| CliError::Command(e.to_string()))?;

    tracing::debug!(
        engine = config.engine.binary.as_str(),
        region = config.cloud.default_region.as_str(),
        "infraprobe starting"
    );

    let writer = OutputWriter::new(cli.output);
    let outcome = match cli.command {
        Commands::Run(args) => commands::run::execute(args, &config, &writer).await,
        Commands::Validate(args) => commands::validate::execute(args, &config, &writer).await,
        Commands::List(args) => commands::list::execute(args, &writer),
    };

    // A failed metrics write never replaces the command's exit code
    if let Some(export) = &metrics {
        if let Err(e) = export.flush().await {
            tracing::warn!(error = %e, "failed to write metrics textfile");
        }
    }
    outcome
}
