//! Provisioning engine abstraction.
//!
//! The [`ProvisioningEngine`] trait hides the IaC tool behind four operations so the
//! lifecycle manager can be driven by [`TerraformEngine`] in production and by a
//! fault-injecting mock in tests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ LifecycleManager │
//! └────────┬─────────┘
//!          │  (through RetryPolicy)
//!          ▼
//!  ┌───────────────────┐
//!  │ProvisioningEngine │ (trait)
//!  └───────────────────┘
//!        │        │
//!        ▼        ▼
//!  ┌─────────┐ ┌──────┐
//!  │Terraform│ │ Mock │
//!  └────┬────┘ └──────┘
//!       │
//!       ▼
//!  terraform binary
//! ```

pub mod classify;
pub mod terraform;

use std::future::Future;
use std::path::{Path, PathBuf};

use serde_json::Value;

use infraprobe_core::error::{ConfigError, ProviderError};
use infraprobe_core::types::CloudContext;

use crate::binding::ScenarioConfig;

pub use classify::ErrorClassifier;
pub use terraform::TerraformEngine;

/// Result of a successful apply.
///
/// Owns everything needed to read outputs from and destroy exactly the provisioned
/// set: the naming scope, the working directory holding engine state, the target
/// scope and the region. A handle never outlives its scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionHandle {
    scope: String,
    workdir: PathBuf,
    targets: Vec<String>,
    region: String,
}

impl ProvisionHandle {
    /// Creates a handle for an applied scope.
    pub fn new(
        scope: impl Into<String>,
        workdir: impl Into<PathBuf>,
        targets: Vec<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            scope: scope.into(),
            workdir: workdir.into(),
            targets,
            region: region.into(),
        }
    }

    /// Naming scope of the provisioned set.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Working directory holding the engine state.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Target scope the apply was limited to (empty = full graph).
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// Region the infrastructure was provisioned in.
    pub fn region(&self) -> &str {
        &self.region
    }
}

/// What a destroy call should tear down.
#[derive(Debug, Clone, Copy)]
pub enum DestroyTarget<'a> {
    /// The set recorded by a successful apply.
    Handle(&'a ProvisionHandle),
    /// Best-effort cleanup after a failed apply, when no handle exists.
    Config(&'a ScenarioConfig),
}

impl DestroyTarget<'_> {
    /// Naming scope being destroyed.
    pub fn scope(&self) -> &str {
        match self {
            Self::Handle(h) => h.scope(),
            Self::Config(c) => c.scope(),
        }
    }
}

/// Trait abstracting the IaC provisioning engine.
///
/// The trait is `Send + Sync + 'static` so one engine can be shared by every
/// concurrently running scenario.
///
/// # Error Handling
///
/// Engine failures are reported as [`ProviderError`] already classified as
/// retryable or fatal; the retry policy never inspects raw engine output.
pub trait ProvisioningEngine: Send + Sync + 'static {
    /// Verifies that every target address refers to a node of the module graph.
    ///
    /// Called before the scenario enters `Applying`. The default accepts any target.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownTarget` for a target that matches nothing.
    fn check_targets(&self, _config: &ScenarioConfig) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Applies the scenario's (optionally targeted) graph.
    fn apply(
        &self,
        ctx: &CloudContext,
        config: &ScenarioConfig,
    ) -> impl Future<Output = Result<ProvisionHandle, ProviderError>> + Send;

    /// Destroys a provisioned set.
    fn destroy(
        &self,
        ctx: &CloudContext,
        target: DestroyTarget<'_>,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;

    /// Reads a named output of an applied set. `Ok(None)` if the output is not defined.
    fn read_output(
        &self,
        handle: &ProvisionHandle,
        name: &str,
    ) -> impl Future<Output = Result<Option<Value>, ProviderError>> + Send;
}

/// 테스트용 Mock 엔진
///
/// 설정 가능한 출력과 실패를 반환하여 IaC 도구 없이도 테스트할 수 있습니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockEngine {
    /// apply 성공 후 반환할 출력
    pub outputs: std::collections::BTreeMap<String, Value>,
    /// apply가 앞에서부터 차례로 반환할 에러
    pub apply_errors: std::sync::Mutex<std::collections::VecDeque<ProviderError>>,
    /// destroy가 앞에서부터 차례로 반환할 에러
    pub destroy_errors: std::sync::Mutex<std::collections::VecDeque<ProviderError>>,
    /// read_output 호출 시 panic
    pub panic_on_read: bool,
    /// apply 호출 횟수
    pub apply_calls: std::sync::atomic::AtomicU32,
    /// destroy 호출 기록 (스코프, handle 여부)
    pub destroy_calls: std::sync::Mutex<Vec<(String, bool)>>,
}

#[cfg(test)]
impl MockEngine {
    /// 빈 출력으로 mock 엔진을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 출력을 추가합니다.
    pub fn with_output(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.outputs.insert(name.to_owned(), value.into());
        self
    }

    /// apply 에러를 순서대로 추가합니다.
    pub fn with_apply_errors(self, errors: Vec<ProviderError>) -> Self {
        self.apply_errors.lock().unwrap().extend(errors);
        self
    }

    /// destroy 에러를 순서대로 추가합니다.
    pub fn with_destroy_errors(self, errors: Vec<ProviderError>) -> Self {
        self.destroy_errors.lock().unwrap().extend(errors);
        self
    }

    /// 출력 조회 시 panic하도록 설정합니다.
    pub fn with_panicking_reads(mut self) -> Self {
        self.panic_on_read = true;
        self
    }

    /// destroy 호출 기록
    pub fn destroy_log(&self) -> Vec<(String, bool)> {
        self.destroy_calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl ProvisioningEngine for MockEngine {
    async fn apply(
        &self,
        ctx: &CloudContext,
        config: &ScenarioConfig,
    ) -> Result<ProvisionHandle, ProviderError> {
        self.apply_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if let Some(err) = self.apply_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(ProvisionHandle::new(
            config.scope(),
            config.module_dir(),
            config.targets().to_vec(),
            config.region_in(ctx),
        ))
    }

    async fn destroy(
        &self,
        _ctx: &CloudContext,
        target: DestroyTarget<'_>,
    ) -> Result<(), ProviderError> {
        self.destroy_calls.lock().unwrap().push((
            target.scope().to_owned(),
            matches!(target, DestroyTarget::Handle(_)),
        ));
        match self.destroy_errors.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn read_output(
        &self,
        _handle: &ProvisionHandle,
        name: &str,
    ) -> Result<Option<Value>, ProviderError> {
        if self.panic_on_read {
            panic!("mock engine read_output panic");
        }
        Ok(self.outputs.get(name).cloned())
    }
}
