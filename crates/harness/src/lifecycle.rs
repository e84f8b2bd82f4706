//! 프로비저닝 라이프사이클 매니저 -- apply → validate → destroy
//!
//! [`LifecycleManager`]는 시나리오 하나를 끝까지 구동합니다.
//! `Applying` 상태에 진입한 시나리오는 apply/검증 결과와 무관하게 정확히 한 번
//! `Destroying`을 거칩니다. 검증은 별도 태스크에서 실행되므로 협력 객체의 panic도
//! `ValidationFailed`로 기록될 뿐 teardown을 건너뛰게 만들지 못합니다.
//!
//! # 내부 흐름
//! ```text
//! Scenario ──build/check_targets──> ScenarioConfig
//!                                        |
//!                          RetryPolicy.run(engine.apply)
//!                             |                  |
//!                        ProvisionHandle     LifecycleError
//!                             |                  |
//!                 spawn(Evidence::collect + evaluate)
//!                             |                  |
//!                          RetryPolicy.run(engine.destroy)
//!                                        |
//!                                  ScenarioResult
//! ```

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use infraprobe_core::error::ConfigError;
use infraprobe_core::metrics as m;
use infraprobe_core::types::{CloudContext, Phase};

use crate::assertion::{Evidence, Expectation, evaluate};
use crate::binding::{ScenarioConfig, ScenarioConfigBuilder};
use crate::engine::{DestroyTarget, ProvisionHandle, ProvisioningEngine};
use crate::query::CloudQuery;
use crate::result::{LifecyclePhase, ScenarioResult, TeardownOutcome, ValidationOutcome};

/// 시나리오 선언 -- 구성 빌더와 기대값
#[derive(Debug, Clone)]
pub struct Scenario {
    builder: ScenarioConfigBuilder,
    expectations: Vec<Expectation>,
    declaration_error: Option<ConfigError>,
}

impl Scenario {
    /// 구성 빌더로 시나리오를 생성합니다.
    pub fn new(builder: ScenarioConfigBuilder) -> Self {
        Self {
            builder,
            expectations: Vec::new(),
            declaration_error: None,
        }
    }

    /// 선언 단계에서 이미 잘못된 것으로 판명된 시나리오를 생성합니다.
    ///
    /// 실행하면 프로비저닝 없이 `invalid_declaration`으로 보고됩니다.
    pub fn invalid(builder: ScenarioConfigBuilder, err: ConfigError) -> Self {
        Self {
            builder,
            expectations: Vec::new(),
            declaration_error: Some(err),
        }
    }

    /// 기대값을 추가합니다.
    pub fn expect(mut self, expectation: Expectation) -> Self {
        self.expectations.push(expectation);
        self
    }

    /// 여러 기대값을 추가합니다.
    pub fn expect_all(mut self, expectations: impl IntoIterator<Item = Expectation>) -> Self {
        self.expectations.extend(expectations);
        self
    }

    /// 시나리오 이름
    pub fn name(&self) -> &str {
        self.builder.name()
    }

    /// 기대값 목록
    pub fn expectations(&self) -> &[Expectation] {
        &self.expectations
    }

    /// 선언을 검증하고 구성을 만듭니다. 클라우드 호출은 하지 않습니다.
    ///
    /// # Errors
    /// 선언 에러, 변수 바인딩 에러, 존재하지 않는 타깃이면 `ConfigError`.
    pub fn prepare<E: ProvisioningEngine>(&self, engine: &E) -> Result<ScenarioConfig, ConfigError> {
        if let Some(err) = &self.declaration_error {
            return Err(err.clone());
        }
        let config = self.builder.clone().build()?;
        engine.check_targets(&config)?;
        Ok(config)
    }
}

/// 라이프사이클 매니저
///
/// 엔진과 조회 어댑터는 `Arc`로 공유되며, 시나리오 간 가변 상태는 없습니다.
pub struct LifecycleManager<E: ProvisioningEngine, Q: CloudQuery> {
    engine: Arc<E>,
    query: Arc<Q>,
    ctx: CloudContext,
}

impl<E: ProvisioningEngine, Q: CloudQuery> LifecycleManager<E, Q> {
    /// 새 라이프사이클 매니저를 생성합니다.
    pub fn new(engine: Arc<E>, query: Arc<Q>, ctx: CloudContext) -> Self {
        Self { engine, query, ctx }
    }

    /// 프로비저닝 엔진
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// 클라우드 컨텍스트
    pub fn context(&self) -> &CloudContext {
        &self.ctx
    }

    /// 시나리오를 apply → validate → destroy 순서로 실행합니다.
    ///
    /// 실패는 반환값이 아니라 [`ScenarioResult`]에 기록됩니다.
    pub async fn run(&self, scenario: Scenario) -> ScenarioResult {
        let started = Instant::now();
        let mut run = Transitions::new(scenario.name());

        let config = match scenario.prepare(&*self.engine) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    scenario = scenario.name(),
                    error = %e,
                    "invalid scenario declaration, nothing provisioned"
                );
                return run.finish(
                    None,
                    Some(e.to_string()),
                    None,
                    ValidationOutcome::NotRun,
                    TeardownOutcome::NotRequired,
                    started,
                );
            }
        };
        run.scope = config.scope().to_owned();
        let retry = config.retry();
        let scope = config.scope();

        info!(
            scenario = config.name(),
            scope = scope,
            targets = config.targets().len(),
            region = config.region_in(&self.ctx),
            "applying scenario"
        );
        run.enter(LifecyclePhase::Applying);
        let applied = retry
            .run(Phase::Apply, scope, |_| self.engine.apply(&self.ctx, &config))
            .await;

        let (handle, apply_error, validation) = match applied {
            Ok(handle) => {
                run.enter(LifecyclePhase::Applied);
                let handle = Arc::new(handle);

                run.enter(LifecyclePhase::Validating);
                let validation = self
                    .validate(handle.clone(), config.name(), scenario.expectations)
                    .await;
                match &validation {
                    ValidationOutcome::Validated => run.enter(LifecyclePhase::Validated),
                    _ => run.enter(LifecyclePhase::ValidationFailed),
                }
                (Some(handle), None, validation)
            }
            Err(e) => {
                error!(scenario = config.name(), scope = scope, error = %e, "apply failed");
                run.enter(LifecyclePhase::ApplyFailed);
                (None, Some(e), ValidationOutcome::NotRun)
            }
        };

        // apply 결과와 무관하게 정확히 한 번 진입
        run.enter(LifecyclePhase::Destroying);
        let target = match handle.as_deref() {
            Some(handle) => DestroyTarget::Handle(handle),
            None => DestroyTarget::Config(&config),
        };
        let teardown = match retry
            .run(Phase::Destroy, scope, |_| self.engine.destroy(&self.ctx, target))
            .await
        {
            Ok(()) => {
                run.enter(LifecyclePhase::Destroyed);
                info!(scenario = config.name(), scope = scope, "teardown completed");
                TeardownOutcome::Destroyed
            }
            Err(e) => {
                run.enter(LifecyclePhase::DestroyFailed);
                metrics::counter!(m::TEARDOWN_FAILURES_TOTAL).increment(1);
                error!(
                    scenario = config.name(),
                    scope = scope,
                    attempts = e.attempts_used,
                    error = %e,
                    "TEARDOWN FAILED: infrastructure may have leaked"
                );
                TeardownOutcome::Failed(e)
            }
        };

        let scope = Some(config.scope().to_owned());
        run.finish(
            scope,
            None,
            apply_error,
            validation,
            teardown,
            started,
        )
    }

    /// 검증을 별도 태스크에서 실행합니다.
    ///
    /// 태스크가 panic하면 `ValidationOutcome::Errored`. 개별 조회 실패는
    /// 해당 기대값의 `errored` 실패로 남습니다.
    async fn validate(
        &self,
        handle: Arc<ProvisionHandle>,
        scenario: &str,
        expectations: Vec<Expectation>,
    ) -> ValidationOutcome {
        let engine = Arc::clone(&self.engine);
        let query = Arc::clone(&self.query);
        let ctx = self.ctx.clone();

        let task = tokio::spawn(async move {
            let evidence = Evidence::collect(&*engine, &*query, &ctx, &handle, &expectations).await;
            evaluate(&expectations, &evidence)
        });

        match task.await {
            Ok(failures) if failures.is_empty() => {
                info!(scenario = scenario, "all expectations met");
                ValidationOutcome::Validated
            }
            Ok(failures) => {
                for failure in &failures {
                    warn!(
                        scenario = scenario,
                        failure = %failure,
                        errored = failure.errored,
                        "expectation not met"
                    );
                }
                ValidationOutcome::Failed(failures)
            }
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    format!("validation panicked: {}", panic_message(join_err.into_panic()))
                } else {
                    format!("validation task cancelled: {join_err}")
                };
                error!(scenario = scenario, reason = reason.as_str(), "validation task failed");
                ValidationOutcome::Errored(reason)
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

/// 상태 전이 기록
struct Transitions {
    name: String,
    scope: String,
    phases: Vec<LifecyclePhase>,
}

impl Transitions {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            scope: String::new(),
            phases: vec![LifecyclePhase::Idle],
        }
    }

    fn enter(&mut self, phase: LifecyclePhase) {
        debug!(
            scenario = self.name.as_str(),
            scope = self.scope.as_str(),
            phase = phase.as_str(),
            "lifecycle transition"
        );
        self.phases.push(phase);
    }

    fn finish(
        mut self,
        scope: Option<String>,
        config_error: Option<String>,
        apply_error: Option<infraprobe_core::error::LifecycleError>,
        validation: ValidationOutcome,
        teardown: TeardownOutcome,
        started: Instant,
    ) -> ScenarioResult {
        self.enter(LifecyclePhase::Done);
        let verdict = ScenarioResult::compute_verdict(
            config_error.as_deref(),
            apply_error.as_ref(),
            &validation,
            &teardown,
        );
        let duration = started.elapsed();

        metrics::counter!(m::SCENARIOS_TOTAL, m::LABEL_VERDICT => verdict.as_str()).increment(1);
        metrics::histogram!(m::SCENARIO_DURATION_SECONDS).record(duration.as_secs_f64());
        info!(
            scenario = self.name.as_str(),
            verdict = verdict.as_str(),
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            "scenario finished"
        );

        ScenarioResult {
            name: self.name,
            scope,
            verdict,
            transitions: self.phases,
            config_error,
            apply_error,
            validation,
            teardown,
            duration,
        }
    }
}
