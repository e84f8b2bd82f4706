//! Command handlers -- one module per subcommand

pub mod list;
pub mod run;
pub mod validate;

use std::path::Path;

use tracing::info;

use infraprobe_core::config::HarnessConfig;
use infraprobe_harness::Suite;

use crate::cli::SuiteArgs;
use crate::error::CliError;

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "infraprobe.toml";

/// Loads the harness configuration.
///
/// An explicit path must exist. Without one, `./infraprobe.toml` is used when
/// present; otherwise built-in defaults plus environment overrides.
pub async fn load_config(path: Option<&Path>) -> Result<HarnessConfig, CliError> {
    let path = match path {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Path::new(DEFAULT_CONFIG_PATH),
        None => {
            let mut config = HarnessConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            return Ok(config);
        }
    };
    Ok(HarnessConfig::load(path).await?)
}

/// Loads a suite and applies the optional name filter.
pub fn load_suite(args: &SuiteArgs) -> Result<Suite, CliError> {
    let suite = Suite::load(&args.suite)?;
    let suite = match &args.filter {
        Some(pattern) => suite.filter(pattern),
        None => suite,
    };
    info!(
        suite = %args.suite.display(),
        scenarios = suite.declarations().len(),
        "suite loaded"
    );
    Ok(suite)
}
