//! 시나리오 결과 -- 라이프사이클 단계, 판정, 실행 보고서

use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

use infraprobe_core::error::{LifecycleError, ProviderError};
use infraprobe_core::types::Phase;

use crate::assertion::FailedExpectation;

/// 라이프사이클 상태
///
/// ```text
/// Idle → Applying → (Applied | ApplyFailed) → Validating → (Validated | ValidationFailed)
///      → Destroying → (Destroyed | DestroyFailed) → Done
/// ```
/// `ApplyFailed`는 `Validating`을 건너뛰고 바로 `Destroying`으로 갑니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Idle,
    Applying,
    Applied,
    ApplyFailed,
    Validating,
    Validated,
    ValidationFailed,
    Destroying,
    Destroyed,
    DestroyFailed,
    Done,
}

impl LifecyclePhase {
    /// 로그용 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Applying => "applying",
            Self::Applied => "applied",
            Self::ApplyFailed => "apply_failed",
            Self::Validating => "validating",
            Self::Validated => "validated",
            Self::ValidationFailed => "validation_failed",
            Self::Destroying => "destroying",
            Self::Destroyed => "destroyed",
            Self::DestroyFailed => "destroy_failed",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 검증 단계의 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// apply가 실패하거나 선언이 잘못되어 검증하지 않음
    NotRun,
    /// 모든 기대값 충족
    Validated,
    /// 충족되지 않은 기대값 목록
    Failed(Vec<FailedExpectation>),
    /// 검증 태스크 자체가 중단됨 (panic, 취소)
    Errored(String),
}

/// teardown 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum TeardownOutcome {
    /// 선언이 잘못되어 프로비저닝을 시도하지 않음
    NotRequired,
    /// destroy 성공
    Destroyed,
    /// destroy 실패 -- 인프라 누수 가능
    Failed(LifecycleError),
}

/// 시나리오 판정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// 검증 통과 + destroy 성공
    Passed,
    /// 프로비저닝 전에 선언 에러로 중단
    InvalidDeclaration,
    /// apply 실패 (destroy는 성공)
    ApplyFailed,
    /// 기대값 불일치 (destroy는 성공)
    ExpectationMismatch,
    /// 관측 실패 또는 panic으로 검증을 끝까지 하지 못함 (destroy는 성공)
    ValidationErrored,
    /// destroy 실패 -- 인프라 누수
    Leaked,
}

impl Verdict {
    /// 메트릭 레이블/출력용 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::InvalidDeclaration => "invalid_declaration",
            Self::ApplyFailed => "apply_failed",
            Self::ExpectationMismatch => "expectation_mismatch",
            Self::ValidationErrored => "validation_errored",
            Self::Leaked => "leaked",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 시나리오의 최종 기록
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// 시나리오 이름
    pub name: String,
    /// 네이밍 스코프 (선언 에러로 만들어지지 못했으면 `None`)
    pub scope: Option<String>,
    /// 판정
    pub verdict: Verdict,
    /// 거쳐 간 라이프사이클 상태 (순서대로)
    pub transitions: Vec<LifecyclePhase>,
    /// 선언 에러
    pub config_error: Option<String>,
    /// apply 에러
    pub apply_error: Option<LifecycleError>,
    /// 검증 결과
    pub validation: ValidationOutcome,
    /// teardown 결과
    pub teardown: TeardownOutcome,
    /// 소요 시간
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl ScenarioResult {
    /// 각 단계 결과로부터 판정을 계산합니다.
    ///
    /// 우선순위: leaked > invalid_declaration > apply_failed > validation_errored
    /// > expectation_mismatch > passed
    ///
    /// 조회 에러 때문에 실패한 기대값이 하나라도 있으면 `validation_errored`입니다.
    pub fn compute_verdict(
        config_error: Option<&str>,
        apply_error: Option<&LifecycleError>,
        validation: &ValidationOutcome,
        teardown: &TeardownOutcome,
    ) -> Verdict {
        if matches!(teardown, TeardownOutcome::Failed(_)) {
            Verdict::Leaked
        } else if config_error.is_some() {
            Verdict::InvalidDeclaration
        } else if apply_error.is_some() {
            Verdict::ApplyFailed
        } else {
            match validation {
                ValidationOutcome::Errored(_) => Verdict::ValidationErrored,
                ValidationOutcome::Failed(failures) if failures.iter().any(|f| f.errored) => {
                    Verdict::ValidationErrored
                }
                ValidationOutcome::Failed(_) => Verdict::ExpectationMismatch,
                ValidationOutcome::NotRun | ValidationOutcome::Validated => Verdict::Passed,
            }
        }
    }

    /// 태스크가 중단되어 teardown 완료 여부를 알 수 없는 시나리오의 결과를 만듭니다.
    ///
    /// teardown을 확인할 수 없으므로 누수로 보고합니다.
    pub fn lost(name: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        let teardown = TeardownOutcome::Failed(LifecycleError {
            phase: Phase::Destroy,
            last_error: ProviderError::Fatal(format!(
                "scenario task aborted before teardown completed: {reason}"
            )),
            attempts_used: 0,
        });
        Self {
            name: name.into(),
            scope: None,
            verdict: Verdict::Leaked,
            transitions: Vec::new(),
            config_error: None,
            apply_error: None,
            validation: ValidationOutcome::Errored(reason),
            teardown,
            duration: Duration::ZERO,
        }
    }

    /// 검증 통과 + destroy 성공 여부
    pub fn is_success(&self) -> bool {
        self.verdict == Verdict::Passed
    }

    /// 충족되지 않은 기대값 (검증이 실패하지 않았으면 빈 슬라이스)
    pub fn failed_expectations(&self) -> &[FailedExpectation] {
        match &self.validation {
            ValidationOutcome::Failed(failures) => failures,
            _ => &[],
        }
    }

    /// destroy 호출 횟수 (재시도 포함 엔진 호출이 아니라 destroy 단계 진입 횟수)
    pub fn destroy_passes(&self) -> usize {
        self.transitions
            .iter()
            .filter(|p| **p == LifecyclePhase::Destroying)
            .count()
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// 시나리오 실행 전체 보고서
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// 선언 순서대로의 결과
    pub results: Vec<ScenarioResult>,
    /// 전체 소요 시간
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl RunReport {
    /// 통과한 시나리오 수
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// 통과하지 못한 시나리오 수
    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    /// 모든 시나리오 통과 여부
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(ScenarioResult::is_success)
    }

    /// 인프라가 누수되었을 수 있는 시나리오
    pub fn leaked(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.results.iter().filter(|r| r.verdict == Verdict::Leaked)
    }

    /// 프로세스 종료 코드
    ///
    /// - 0: 모두 통과
    /// - 3: 누수 (다른 실패보다 우선)
    /// - 2: 선언 에러
    /// - 4: 검증 에러 (하네스가 인프라를 관측하지 못함)
    /// - 1: 기대값 불일치, apply 실패
    pub fn exit_code(&self) -> i32 {
        if self.leaked().next().is_some() {
            3
        } else if self
            .results
            .iter()
            .any(|r| r.verdict == Verdict::InvalidDeclaration)
        {
            2
        } else if self
            .results
            .iter()
            .any(|r| r.verdict == Verdict::ValidationErrored)
        {
            4
        } else if self.all_passed() {
            0
        } else {
            1
        }
    }
}
