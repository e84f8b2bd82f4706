//! 에러 타입 -- 도메인별 에러 정의
//!
//! 하네스 보고서는 아래 네 가지 실패를 구분해야 합니다.
//! - [`ConfigError`]: 시나리오 선언 자체가 잘못됨 (프로비저닝 전에 검출)
//! - [`LifecycleError`]: apply/destroy가 재시도 예산을 소진했거나 치명적 에러를 만남
//! - [`NotFoundError`]: 조회 어댑터가 식별자로 리소스를 찾지 못함
//! - 검증 실패: 에러가 아니라 `ScenarioResult`의 정상 상태 (harness 크레이트)

use serde::{Deserialize, Serialize};

use crate::types::{Phase, ResourceKind};

/// infraprobe 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum InfraprobeError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 라이프사이클(apply/destroy) 에러
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// 리소스 조회 에러
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// 프로바이더 에러
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
///
/// 하네스 설정 파일과 시나리오 선언 양쪽에서 사용합니다.
/// 이 에러는 항상 클라우드 호출 이전에 발생하므로 teardown이 필요 없습니다.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 변수 값의 타입이 다른 곳에서 선언된 타입과 충돌
    #[error("variable '{name}' expects {expected} but {source_name} provides {found}")]
    TypeConflict {
        /// 변수 이름
        name: String,
        /// 기대 타입
        expected: String,
        /// 실제로 제공된 값의 종류
        found: String,
        /// 충돌을 일으킨 레이어 (파일 경로 또는 "explicit")
        source_name: String,
    },

    /// 타깃 주소가 인프라 그래프에 존재하지 않음
    #[error("target '{target}' does not match any resource, data source or module in {module_dir}")]
    UnknownTarget { target: String, module_dir: String },
}

/// 프로바이더(IaC 엔진 또는 클라우드 API)가 반환한 에러
///
/// 재시도 정책은 [`ProviderError::is_retryable`]만 보고 재시도 여부를 결정합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ProviderError {
    /// 요청 제한 (throttling, 429)
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// 일시적 네트워크 에러 (연결 리셋, TLS 핸드셰이크 타임아웃 등)
    #[error("transient network error: {0}")]
    Network(String),

    /// 최종 일관성: 방금 만든 리소스가 아직 보이지 않음
    #[error("resource not yet visible: {0}")]
    NotYetVisible(String),

    /// 재시도해도 소용없는 에러
    #[error("{0}")]
    Fatal(String),
}

impl ProviderError {
    /// 재시도 가능한 에러인지 반환합니다.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Fatal(_))
    }

    /// 메트릭/로그용 고정 분류명
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::RateLimited(_) => "rate_limited",
            Self::Network(_) => "network",
            Self::NotYetVisible(_) => "not_yet_visible",
            Self::Fatal(_) => "fatal",
        }
    }
}

/// 식별자로 리소스를 찾을 수 없음
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} '{id}' not found in region {region}")]
pub struct NotFoundError {
    /// 리소스 종류
    pub kind: ResourceKind,
    /// 조회한 식별자
    pub id: String,
    /// 조회한 리전
    pub region: String,
}

/// 리소스 조회 에러
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    /// 리소스가 존재하지 않음
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// 조회 중 프로바이더 에러
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// apply 또는 destroy가 최종적으로 실패함
///
/// 재시도 예산을 모두 소진했거나 재시도 불가능한 에러를 만났을 때 생성됩니다.
/// destroy 단계의 `LifecycleError`는 인프라 누수를 의미하므로 절대 경고로 격하되면 안 됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{phase} failed after {attempts_used} attempt(s): {last_error}")]
pub struct LifecycleError {
    /// 실패한 단계
    pub phase: Phase,
    /// 마지막 시도의 에러
    pub last_error: ProviderError,
    /// 사용한 시도 횟수
    pub attempts_used: u32,
}

impl LifecycleError {
    /// 재시도 예산 소진 때문인지 (치명적 에러로 즉시 중단된 것이 아닌지) 반환합니다.
    pub fn exhausted(&self) -> bool {
        self.last_error.is_retryable()
    }
}
