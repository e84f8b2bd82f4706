//! 설정 관리 -- infraprobe.toml 파싱 및 런타임 설정
//!
//! [`HarnessConfig`]는 하네스 전체 실행에 적용되는 설정을 담는 최상위 구조체입니다.
//! 시나리오별 선언(변수, 타깃, 기대값)은 harness 크레이트의 스위트 파일이 담당합니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`INFRAPROBE_ENGINE_BINARY=tofu` 형식)
//! 3. 설정 파일 (`infraprobe.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), infraprobe_core::error::InfraprobeError> {
//! use infraprobe_core::config::HarnessConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = HarnessConfig::load("infraprobe.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = HarnessConfig::parse("[retry]\nmax_attempts = 5")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, InfraprobeError};
use crate::types::CloudContext;

/// infraprobe 통합 설정
///
/// `infraprobe.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 프로비저닝 엔진 설정
    #[serde(default)]
    pub engine: EngineConfig,
    /// 기본 재시도 예산
    #[serde(default)]
    pub retry: RetryConfig,
    /// 클라우드 컨텍스트 설정
    #[serde(default)]
    pub cloud: CloudConfig,
    /// 시나리오 러너 설정
    #[serde(default)]
    pub runner: RunnerConfig,
    /// 메트릭 내보내기 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl HarnessConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 유효성 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, InfraprobeError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, InfraprobeError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                InfraprobeError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                InfraprobeError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, InfraprobeError> {
        toml::from_str(toml_str).map_err(|e| {
            InfraprobeError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `INFRAPROBE_{SECTION}_{FIELD}`
    /// 예: `INFRAPROBE_RETRY_MAX_ATTEMPTS=5`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "INFRAPROBE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "INFRAPROBE_GENERAL_LOG_FORMAT");

        // Engine
        override_string(&mut self.engine.binary, "INFRAPROBE_ENGINE_BINARY");
        override_string(&mut self.engine.work_root, "INFRAPROBE_ENGINE_WORK_ROOT");
        override_bool(&mut self.engine.no_color, "INFRAPROBE_ENGINE_NO_COLOR");
        override_bool(
            &mut self.engine.isolate_workdir,
            "INFRAPROBE_ENGINE_ISOLATE_WORKDIR",
        );
        override_csv(
            &mut self.engine.extra_retryable_errors,
            "INFRAPROBE_ENGINE_EXTRA_RETRYABLE_ERRORS",
        );

        // Retry
        override_u32(&mut self.retry.max_attempts, "INFRAPROBE_RETRY_MAX_ATTEMPTS");
        override_u64(&mut self.retry.delay_secs, "INFRAPROBE_RETRY_DELAY_SECS");
        override_string(&mut self.retry.backoff, "INFRAPROBE_RETRY_BACKOFF");
        override_u64(
            &mut self.retry.max_delay_secs,
            "INFRAPROBE_RETRY_MAX_DELAY_SECS",
        );

        // Cloud
        override_string(
            &mut self.cloud.default_region,
            "INFRAPROBE_CLOUD_DEFAULT_REGION",
        );
        override_string(&mut self.cloud.profile, "INFRAPROBE_CLOUD_PROFILE");

        // Runner
        override_usize(
            &mut self.runner.max_parallel,
            "INFRAPROBE_RUNNER_MAX_PARALLEL",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "INFRAPROBE_METRICS_ENABLED");
        override_string(
            &mut self.metrics.textfile_path,
            "INFRAPROBE_METRICS_TEXTFILE_PATH",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), InfraprobeError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.engine.binary.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "engine.binary".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        for pattern in &self.engine.extra_retryable_errors {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(ConfigError::InvalidValue {
                    field: "engine.extra_retryable_errors".to_owned(),
                    reason: format!("invalid pattern '{pattern}': {e}"),
                }
                .into());
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts".to_owned(),
                reason: "must be at least 1".to_owned(),
            }
            .into());
        }

        let valid_backoffs = ["fixed", "exponential"];
        if !valid_backoffs.contains(&self.retry.backoff.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "retry.backoff".to_owned(),
                reason: format!("must be one of: {}", valid_backoffs.join(", ")),
            }
            .into());
        }

        if self.retry.max_delay_secs < self.retry.delay_secs {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_delay_secs".to_owned(),
                reason: "must be greater than or equal to retry.delay_secs".to_owned(),
            }
            .into());
        }

        if self.cloud.default_region.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "cloud.default_region".to_owned(),
                reason: "must not be empty".to_owned(),
            }
            .into());
        }

        if self.metrics.enabled && !self.metrics.textfile_path.ends_with(".prom") {
            return Err(ConfigError::InvalidValue {
                field: "metrics.textfile_path".to_owned(),
                reason: "must name a '.prom' file when metrics are enabled".to_owned(),
            }
            .into());
        }

        Ok(())
    }

    /// 설정으로부터 프로세스 전역 클라우드 컨텍스트를 만듭니다.
    pub fn cloud_context(&self) -> CloudContext {
        let ctx = CloudContext::new(self.cloud.default_region.clone());
        if self.cloud.profile.is_empty() {
            ctx
        } else {
            ctx.with_profile(self.cloud.profile.clone())
        }
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 프로비저닝 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 엔진 실행 파일 (terraform 또는 호환 CLI)
    pub binary: String,
    /// 시나리오별 작업 디렉토리의 루트
    pub work_root: String,
    /// 엔진 출력에서 ANSI 색상 제거
    pub no_color: bool,
    /// 시나리오마다 모듈 디렉토리를 복사해 로컬 상태를 분리
    pub isolate_workdir: bool,
    /// 기본 목록 외에 재시도 가능으로 분류할 에러 패턴 (정규식)
    pub extra_retryable_errors: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: "terraform".to_owned(),
            work_root: std::env::temp_dir()
                .join("infraprobe")
                .display()
                .to_string(),
            no_color: true,
            isolate_workdir: true,
            extra_retryable_errors: Vec::new(),
        }
    }
}

/// 기본 재시도 예산
///
/// 시나리오가 `retry`를 지정하지 않으면 이 값을 사용합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 최대 시도 횟수 (첫 시도 포함)
    pub max_attempts: u32,
    /// 시도 간 대기 (초)
    pub delay_secs: u64,
    /// 대기 방식 (fixed, exponential)
    pub backoff: String,
    /// 지수 백오프의 대기 상한 (초)
    pub max_delay_secs: u64,
}

impl RetryConfig {
    /// 시도 간 대기 시간
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    /// 대기 상한
    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_secs: 5,
            backoff: "fixed".to_owned(),
            max_delay_secs: 60,
        }
    }
}

/// 클라우드 컨텍스트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// 기본 리전
    pub default_region: String,
    /// 자격 증명 프로파일 (빈 문자열이면 환경 기본값)
    pub profile: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            default_region: "us-east-1".to_owned(),
            profile: String::new(),
        }
    }
}

/// 시나리오 러너 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// 동시에 실행할 최대 시나리오 수 (0 = 제한 없음)
    pub max_parallel: usize,
}

/// 메트릭 내보내기 설정
///
/// 활성화하면 실행이 끝날 때 Prometheus 텍스트 형식으로 `textfile_path`에 기록합니다.
/// node_exporter의 textfile collector 디렉토리를 가리키게 하면 됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 메트릭 기록 활성화
    pub enabled: bool,
    /// 기록할 파일 경로 (`.prom`)
    pub textfile_path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            textfile_path: std::env::temp_dir()
                .join("infraprobe")
                .join("infraprobe.prom")
                .display()
                .to_string(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
