//! 엔진 출력 분류 -- 알려진 일시적 에러 패턴 카탈로그
//!
//! IaC 엔진은 실패 원인을 종료 코드로 구분해 주지 않으므로, stderr/stdout 텍스트를
//! 정규식 카탈로그와 대조하여 [`ProviderError`] 종류를 결정합니다.
//! 어떤 패턴에도 맞지 않으면 [`ProviderError::Fatal`]입니다.

use regex::Regex;

use infraprobe_core::error::{ConfigError, ProviderError};

/// 분류 결과 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    RateLimited,
    Network,
    NotYetVisible,
}

/// 요청 제한 패턴
const RATE_LIMIT_PATTERNS: &[&str] = &[
    r"RequestLimitExceeded",
    r"Throttling(Exception)?",
    r"TooManyRequestsException",
    r"SlowDown",
    r"(?i)status code:?\s*429",
    r"(?i)429 Too Many Requests",
];

/// 일시적 네트워크/레지스트리 패턴
const NETWORK_PATTERNS: &[&str] = &[
    r"(?i)connection reset by peer",
    r"(?i)TLS handshake timeout",
    r"(?i)i/o timeout",
    r"Error installing provider",
    r"Failed to query available provider packages",
    r"timeout while waiting for plugin to start",
    r"timed out waiting for server handshake",
    r"(?i)could not query provider registry",
    r"(?i)registry\.terraform\.io.*(timeout|unreachable|connection refused)",
    r"(?i)unexpected EOF",
];

/// 최종 일관성 패턴
///
/// 같은 apply에서 방금 만든 리소스를 참조할 때 나오는 코드만 포함합니다.
/// `InvalidAMIID.NotFound`처럼 입력값이 틀린 경우는 재시도해도 해결되지 않습니다.
const NOT_YET_VISIBLE_PATTERNS: &[&str] = &[
    r"\bInvalid(VpcID|SubnetID|Group|RouteTableID|InternetGatewayID|InstanceID|NetworkInterfaceID|NatGatewayID)\.NotFound\b",
    r"(?i)does not exist.*eventual consistency",
];

/// 출력 요약에 남길 최대 길이
const MAX_SUMMARY_LEN: usize = 2000;

/// 엔진 출력 분류기
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    rules: Vec<(Regex, Kind)>,
}

impl ErrorClassifier {
    /// 기본 카탈로그에 추가 패턴(네트워크 에러로 취급)을 더해 분류기를 생성합니다.
    ///
    /// # Errors
    /// 추가 패턴이 유효한 정규식이 아니면 `ConfigError::InvalidValue`.
    pub fn new(extra_retryable: &[String]) -> Result<Self, ConfigError> {
        let mut rules = Vec::new();
        for (patterns, kind) in [
            (RATE_LIMIT_PATTERNS, Kind::RateLimited),
            (NETWORK_PATTERNS, Kind::Network),
            (NOT_YET_VISIBLE_PATTERNS, Kind::NotYetVisible),
        ] {
            for pattern in patterns {
                rules.push((compile(pattern)?, kind));
            }
        }
        for pattern in extra_retryable {
            rules.push((compile(pattern)?, Kind::Network));
        }
        Ok(Self { rules })
    }

    /// 엔진 출력을 분류합니다.
    pub fn classify(&self, output: &str) -> ProviderError {
        let summary = summarize(output);
        match self.rules.iter().find(|(re, _)| re.is_match(output)) {
            Some((_, Kind::RateLimited)) => ProviderError::RateLimited(summary),
            Some((_, Kind::Network)) => ProviderError::Network(summary),
            Some((_, Kind::NotYetVisible)) => ProviderError::NotYetVisible(summary),
            None => ProviderError::Fatal(summary),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidValue {
        field: "engine.extra_retryable_errors".to_owned(),
        reason: format!("invalid pattern '{pattern}': {e}"),
    })
}

/// 엔진 출력에서 에러 줄만 추려 한 줄로 만듭니다.
///
/// 엔진의 박스 장식 문자(`│`, `╷`, `╵`)를 제거하고, `Error` 로 시작하는 줄이 없으면
/// 마지막 비어 있지 않은 줄을 사용합니다.
pub fn summarize(output: &str) -> String {
    let lines: Vec<&str> = output
        .lines()
        .map(|l| l.trim_start_matches(['│', '╷', '╵', ' ']).trim_end())
        .filter(|l| !l.is_empty())
        .collect();

    let errors: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|l| l.starts_with("Error"))
        .collect();

    let mut summary = if errors.is_empty() {
        lines.last().copied().unwrap_or("engine failed without output").to_owned()
    } else {
        errors.join("; ")
    };

    if summary.len() > MAX_SUMMARY_LEN {
        let mut cut = MAX_SUMMARY_LEN;
        while !summary.is_char_boundary(cut) {
            cut -= 1;
        }
        summary.truncate(cut);
        summary.push_str("...");
    }
    summary
}
