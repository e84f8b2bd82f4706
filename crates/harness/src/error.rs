//! 하네스 에러 타입
//!
//! [`HarnessError`]는 시나리오 실행 자체가 아니라 하네스 운영 중 발생하는 에러를 표현합니다
//! (스위트 파일 로딩, 엔진 구성 등). 시나리오 단위의 실패는 에러로 전파되지 않고
//! [`ScenarioResult`](crate::result::ScenarioResult)에 기록됩니다.
//!
//! `From<HarnessError> for InfraprobeError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use infraprobe_core::error::{ConfigError, InfraprobeError, LifecycleError, QueryError};

/// 하네스 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// 선언 또는 설정 에러
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 스위트 파일 로딩 실패
    #[error("suite load error: {path}: {reason}")]
    SuiteLoad {
        /// 스위트 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 라이프사이클 에러
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// 조회 에러
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl From<HarnessError> for InfraprobeError {
    fn from(err: HarnessError) -> Self {
        match err {
            HarnessError::Config(e) => InfraprobeError::Config(e),
            HarnessError::SuiteLoad { path, reason } => {
                InfraprobeError::Config(ConfigError::ParseFailed {
                    reason: format!("{path}: {reason}"),
                })
            }
            HarnessError::Lifecycle(e) => InfraprobeError::Lifecycle(e),
            HarnessError::Query(e) => InfraprobeError::Query(e),
        }
    }
}
