//! Terraform-compatible engine driven through its command-line interface.
//!
//! Each scenario gets its own working directory under `work_root` (a copy of the
//! module directory) so parallel scenarios applying the same module never share
//! local state. Resolved variables are written to `<work_root>/<scope>.tfvars.json`
//! and passed with `-var-file`; targets are passed verbatim with `-target`.
//!
//! The working directory is removed after a successful destroy and kept when the
//! destroy fails, so an operator can clean up the leaked resources by hand.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info, warn};

use infraprobe_core::config::EngineConfig;
use infraprobe_core::error::{ConfigError, ProviderError};
use infraprobe_core::types::CloudContext;

use crate::binding::ScenarioConfig;
use crate::engine::classify::{ErrorClassifier, summarize};
use crate::engine::{DestroyTarget, ProvisionHandle, ProvisioningEngine};

/// `resource "type" "name"` / `data "type" "name"` block headers
static BLOCK_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*(resource|data)\s+"([^"]+)"\s+"([^"]+)""#).ok()
});

/// `module "name"` block headers
static MODULE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(?m)^\s*module\s+"([^"]+)""#).ok());

/// Resource index suffixes such as `[0]` or `["a"]`
static INDEX_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\[[^\]]*\]").ok());

/// Directories and files never copied into an isolated working directory.
const SKIPPED_ENTRIES: &[&str] = &[".terraform", "terraform.tfstate", "terraform.tfstate.backup"];

/// Production engine invoking a `terraform` (or compatible) binary.
#[derive(Debug, Clone)]
pub struct TerraformEngine {
    binary: String,
    work_root: PathBuf,
    no_color: bool,
    isolate_workdir: bool,
    classifier: ErrorClassifier,
}

impl TerraformEngine {
    /// Creates an engine from the `[engine]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if an extra retryable pattern is not a valid regex.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            binary: config.binary.clone(),
            work_root: PathBuf::from(&config.work_root),
            no_color: config.no_color,
            isolate_workdir: config.isolate_workdir,
            classifier: ErrorClassifier::new(&config.extra_retryable_errors)?,
        })
    }

    /// Working directory for a scope.
    pub fn workdir_for(&self, config: &ScenarioConfig) -> PathBuf {
        if self.isolate_workdir {
            self.work_root.join(config.scope())
        } else {
            config.module_dir().to_path_buf()
        }
    }

    /// Generated variable file for a scope.
    pub fn var_file_for(&self, scope: &str) -> PathBuf {
        self.work_root.join(format!("{scope}.tfvars.json"))
    }

    /// Copies the module (when isolating) and writes the resolved variable file.
    async fn prepare(&self, config: &ScenarioConfig) -> Result<PathBuf, ProviderError> {
        let workdir = self.workdir_for(config);
        let var_file = self.var_file_for(config.scope());
        let module_dir = config.module_dir().to_path_buf();
        let variables = serde_json::to_vec_pretty(config.variables())
            .map_err(|e| ProviderError::Fatal(format!("failed to encode variables: {e}")))?;
        let isolate = self.isolate_workdir;
        let work_root = self.work_root.clone();
        let target = workdir.clone();

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&work_root)?;
            if isolate {
                copy_module_dir(&module_dir, &target)?;
            }
            std::fs::write(&var_file, variables)
        })
        .await
        .map_err(|e| ProviderError::Fatal(format!("workdir preparation task failed: {e}")))?
        .map_err(|e| {
            ProviderError::Fatal(format!(
                "failed to prepare working directory {}: {e}",
                workdir.display()
            ))
        })?;

        Ok(workdir)
    }

    /// Removes the isolated working directory and variable file of a destroyed scope.
    async fn cleanup(&self, scope: &str, workdir: &Path) {
        if let Err(e) = tokio::fs::remove_file(self.var_file_for(scope)).await {
            debug!(scope = scope, error = %e, "variable file already removed");
        }
        if self.isolate_workdir {
            if let Err(e) = tokio::fs::remove_dir_all(workdir).await {
                warn!(
                    scope = scope,
                    workdir = %workdir.display(),
                    error = %e,
                    "failed to remove working directory"
                );
            }
        }
    }

    fn common_flags(&self) -> Vec<String> {
        let mut flags = vec!["-input=false".to_owned()];
        if self.no_color {
            flags.push("-no-color".to_owned());
        }
        flags
    }

    fn scoped_args(&self, command: &str, scope: &str, targets: &[String]) -> Vec<String> {
        let mut args = vec![command.to_owned(), "-auto-approve".to_owned()];
        args.extend(self.common_flags());
        args.push(format!("-var-file={}", self.var_file_for(scope).display()));
        args.extend(targets.iter().map(|t| format!("-target={t}")));
        args
    }

    async fn init(
        &self,
        ctx: &CloudContext,
        region: &str,
        workdir: &Path,
    ) -> Result<(), ProviderError> {
        let mut args = vec!["init".to_owned()];
        args.extend(self.common_flags());
        self.run(ctx, region, workdir, &args).await.map(|_| ())
    }

    /// Runs the binary and returns stdout, or the classified error on a non-zero exit.
    async fn run(
        &self,
        ctx: &CloudContext,
        region: &str,
        workdir: &Path,
        args: &[String],
    ) -> Result<String, ProviderError> {
        debug!(
            binary = self.binary.as_str(),
            command = args.first().map(String::as_str).unwrap_or_default(),
            workdir = %workdir.display(),
            "invoking engine"
        );

        let mut cmd = Command::new(&self.binary);
        cmd.args(args)
            .current_dir(workdir)
            .env("TF_IN_AUTOMATION", "1")
            .env("AWS_REGION", region)
            .env("AWS_DEFAULT_REGION", region)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(profile) = &ctx.profile {
            cmd.env("AWS_PROFILE", profile);
        }

        let output = cmd.output().await.map_err(|e| {
            ProviderError::Fatal(format!("failed to launch '{}': {e}", self.binary))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(self.classifier.classify(&format!("{stderr}\n{stdout}")))
    }
}

impl ProvisioningEngine for TerraformEngine {
    fn check_targets(&self, config: &ScenarioConfig) -> Result<(), ConfigError> {
        if config.targets().is_empty() {
            return Ok(());
        }

        let addresses = declared_addresses(config.module_dir())?;
        for target in config.targets() {
            let root = root_address(target);
            if !addresses.contains(&root) {
                return Err(ConfigError::UnknownTarget {
                    target: target.clone(),
                    module_dir: config.module_dir().display().to_string(),
                });
            }
        }
        Ok(())
    }

    async fn apply(
        &self,
        ctx: &CloudContext,
        config: &ScenarioConfig,
    ) -> Result<ProvisionHandle, ProviderError> {
        let region = config.region_in(ctx);
        let workdir = self.prepare(config).await?;

        self.init(ctx, region, &workdir).await?;
        let args = self.scoped_args("apply", config.scope(), config.targets());
        self.run(ctx, region, &workdir, &args).await?;

        info!(
            scenario = config.name(),
            scope = config.scope(),
            workdir = %workdir.display(),
            "engine apply completed"
        );
        Ok(ProvisionHandle::new(
            config.scope(),
            workdir,
            config.targets().to_vec(),
            region,
        ))
    }

    async fn destroy(
        &self,
        ctx: &CloudContext,
        target: DestroyTarget<'_>,
    ) -> Result<(), ProviderError> {
        let (scope, workdir, targets, region) = match target {
            DestroyTarget::Handle(handle) => (
                handle.scope(),
                handle.workdir().to_path_buf(),
                handle.targets(),
                handle.region(),
            ),
            DestroyTarget::Config(config) => {
                let workdir = self.workdir_for(config);
                if !tokio::fs::try_exists(&workdir).await.unwrap_or(false) {
                    info!(
                        scope = config.scope(),
                        "no working directory exists, nothing to destroy"
                    );
                    return Ok(());
                }
                let workdir = self.prepare(config).await?;
                self.init(ctx, config.region_in(ctx), &workdir).await?;
                (
                    config.scope(),
                    workdir,
                    config.targets(),
                    config.region_in(ctx),
                )
            }
        };

        let args = self.scoped_args("destroy", scope, targets);
        self.run(ctx, region, &workdir, &args).await?;
        info!(scope = scope, "engine destroy completed");

        self.cleanup(scope, &workdir).await;
        Ok(())
    }

    async fn read_output(
        &self,
        handle: &ProvisionHandle,
        name: &str,
    ) -> Result<Option<Value>, ProviderError> {
        let mut cmd = Command::new(&self.binary);
        let mut args = vec!["output".to_owned(), "-json".to_owned()];
        if self.no_color {
            args.push("-no-color".to_owned());
        }
        args.push(name.to_owned());
        cmd.args(&args)
            .current_dir(handle.workdir())
            .env("TF_IN_AUTOMATION", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = cmd.output().await.map_err(|e| {
            ProviderError::Fatal(format!("failed to launch '{}': {e}", self.binary))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("not found") {
                return Ok(None);
            }
            return Err(ProviderError::Fatal(summarize(&stderr)));
        }

        serde_json::from_slice(&output.stdout)
            .map(Some)
            .map_err(|e| ProviderError::Fatal(format!("output '{name}' is not valid JSON: {e}")))
    }
}

/// Collects the root addresses declared by the top-level `.tf` files of a module.
///
/// Addresses take the forms `type.name`, `data.type.name` and `module.name`.
fn declared_addresses(module_dir: &Path) -> Result<BTreeSet<String>, ConfigError> {
    let (Some(block_re), Some(module_re)) = (BLOCK_RE.as_ref(), MODULE_RE.as_ref()) else {
        return Err(ConfigError::InvalidValue {
            field: "targets".to_owned(),
            reason: "target address patterns failed to compile".to_owned(),
        });
    };

    let entries = std::fs::read_dir(module_dir).map_err(|e| ConfigError::InvalidValue {
        field: "module_dir".to_owned(),
        reason: format!("cannot read {}: {e}", module_dir.display()),
    })?;

    let mut addresses = BTreeSet::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("tf") {
            continue;
        }
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::ParseFailed {
            reason: format!("{}: {e}", path.display()),
        })?;

        for caps in block_re.captures_iter(&content) {
            let address = match &caps[1] {
                "data" => format!("data.{}.{}", &caps[2], &caps[3]),
                _ => format!("{}.{}", &caps[2], &caps[3]),
            };
            addresses.insert(address);
        }
        for caps in module_re.captures_iter(&content) {
            addresses.insert(format!("module.{}", &caps[1]));
        }
    }
    Ok(addresses)
}

/// Reduces a target address to the root node it refers to.
///
/// `module.network.aws_subnet.public[0]` → `module.network`,
/// `aws_subnet.public["a"]` → `aws_subnet.public`.
fn root_address(target: &str) -> String {
    let stripped = match INDEX_RE.as_ref() {
        Some(re) => re.replace_all(target, "").into_owned(),
        None => target.to_owned(),
    };
    let segments: Vec<&str> = stripped.split('.').collect();
    let take = match segments.first() {
        Some(&"data") => 3,
        _ => 2,
    };
    segments
        .iter()
        .take(take)
        .copied()
        .collect::<Vec<_>>()
        .join(".")
}

/// Recursively copies a module directory, skipping engine state and caches.
fn copy_module_dir(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        if name
            .to_str()
            .is_some_and(|n| SKIPPED_ENTRIES.contains(&n))
        {
            continue;
        }
        let from = entry.path();
        let to = dst.join(&name);
        if entry.file_type()?.is_dir() {
            copy_module_dir(&from, &to)?;
        } else {
            std::fs::copy(&from, &to)?;
        }
    }
    Ok(())
}
