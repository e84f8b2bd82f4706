//! CLI-specific error types and exit code mapping

use infraprobe_core::error::{ConfigError, InfraprobeError};
use infraprobe_harness::HarnessError;

/// CLI-specific error type.
///
/// Scenario failures are not errors: they are reported in the run report and
/// mapped to an exit code by `RunReport::exit_code`.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from infraprobe-core.
    #[error("{0}")]
    Core(#[from] InfraprobeError),

    /// Wrapped harness error (suite loading etc.).
    #[error("{0}")]
    Harness(#[from] HarnessError),
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::Core(InfraprobeError::Config(e))
    }
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                   |
    /// |------|-------------------------------------------|
    /// | 0    | Every scenario passed                     |
    /// | 1    | Scenario failure / general command error  |
    /// | 2    | Configuration or declaration error        |
    /// | 3    | Teardown failed (infrastructure leaked)   |
    /// | 4    | Validation could not observe the result   |
    /// | 10   | IO error                                  |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Core(InfraprobeError::Config(_)) => 2,
            Self::Harness(HarnessError::Config(_) | HarnessError::SuiteLoad { .. }) => 2,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) | Self::Harness(_) => 1,
        }
    }
}
