//! 재시도 정책 -- 일시적 프로바이더 에러에 대한 제한된 재시도
//!
//! [`RetryPolicy`]는 apply와 destroy를 감싸는 재시도 루프입니다.
//! [`ProviderError::is_retryable`]가 참인 에러만 재시도하며, 그 외 에러는 즉시 실패합니다.
//! 정책은 공유 상태가 없는 `Copy` 값이므로 여러 시나리오에서 동시에 사용해도 안전합니다.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use infraprobe_core::config::RetryConfig;
use infraprobe_core::error::{ConfigError, LifecycleError, ProviderError};
use infraprobe_core::metrics as m;
use infraprobe_core::types::Phase;

/// 시도 간 대기 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// 매번 같은 간격
    #[default]
    Fixed,
    /// `delay * 2^(n-1)` (n = 재시도 순번)
    Exponential,
}

impl fmt::Display for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => f.write_str("fixed"),
            Self::Exponential => f.write_str("exponential"),
        }
    }
}

impl FromStr for Backoff {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "exponential" => Ok(Self::Exponential),
            other => Err(ConfigError::InvalidValue {
                field: "retry.backoff".to_owned(),
                reason: format!("unknown backoff '{other}' (expected fixed or exponential)"),
            }),
        }
    }
}

/// 재시도 정책
///
/// # 사용 예시
/// ```ignore
/// let policy = RetryPolicy::new(3, Duration::from_secs(5));
/// let handle = policy
///     .run(Phase::Apply, "lab-a1b2", |_attempt| engine.apply(&ctx, &config))
///     .await?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    backoff: Backoff,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
            backoff: Backoff::Fixed,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// 고정 간격 정책을 생성합니다. `max_attempts`는 최소 1로 보정됩니다.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff: Backoff::Fixed,
            max_delay: delay,
        }
    }

    /// 대기 방식과 대기 상한을 지정합니다.
    pub fn with_backoff(mut self, backoff: Backoff, max_delay: Duration) -> Self {
        self.backoff = backoff;
        self.max_delay = max_delay;
        self
    }

    /// 하네스 설정의 `[retry]` 섹션에서 정책을 만듭니다.
    pub fn from_config(config: &RetryConfig) -> Result<Self, ConfigError> {
        let backoff = config.backoff.parse::<Backoff>()?;
        Ok(Self::new(config.max_attempts, config.delay()).with_backoff(backoff, config.max_delay()))
    }

    /// 최대 시도 횟수
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 기본 대기 간격
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// 대기 방식
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// 대기 상한
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// `retry`번째 재시도(1부터) 직전에 기다릴 시간을 계산합니다.
    ///
    /// 대기 상한은 지수 방식에만 적용됩니다.
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let exponent = retry.saturating_sub(1).min(31);
                self.delay
                    .saturating_mul(1u32 << exponent)
                    .min(self.max_delay.max(self.delay))
            }
        }
    }

    /// 연산을 최대 `max_attempts`번 실행합니다.
    ///
    /// `op`는 1부터 시작하는 시도 번호를 받습니다. 재시도 가능한 에러면 대기 후 다시 호출하고,
    /// 재시도 불가능한 에러나 예산 소진 시 [`LifecycleError`]를 반환합니다.
    pub async fn run<T, F, Fut>(
        &self,
        phase: Phase,
        scope: &str,
        mut op: F,
    ) -> Result<T, LifecycleError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 1;
        loop {
            metrics::counter!(m::RETRY_ATTEMPTS_TOTAL, m::LABEL_PHASE => phase.as_str())
                .increment(1);
            debug!(
                phase = phase.as_str(),
                scope = scope,
                attempt = attempt,
                max_attempts = self.max_attempts,
                "running provider operation"
            );

            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(
                            phase = phase.as_str(),
                            scope = scope,
                            attempt = attempt,
                            "provider operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let backoff = self.delay_before_retry(attempt);
                    metrics::counter!(
                        m::RETRIES_TOTAL,
                        m::LABEL_PHASE => phase.as_str(),
                        m::LABEL_ERROR_KIND => e.kind_name()
                    )
                    .increment(1);
                    warn!(
                        phase = phase.as_str(),
                        scope = scope,
                        attempt = attempt,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "retrying provider operation"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        phase = phase.as_str(),
                        scope = scope,
                        attempt = attempt,
                        retryable = e.is_retryable(),
                        error = %e,
                        "provider operation failed"
                    );
                    return Err(LifecycleError {
                        phase,
                        last_error: e,
                        attempts_used: attempt,
                    });
                }
            }
        }
    }
}
