//! 메트릭 상수 및 설명 등록
//!
//! 하네스가 기록하는 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()` 매크로를 호출합니다.
//! 레코더는 CLI가 `[metrics]` 설정에 따라 설치하며, 설치되지 않으면 기록은 no-op입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `infraprobe_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)
//!
//! # 사용 예시
//!
//! ```ignore
//! use infraprobe_core::metrics;
//! use metrics::counter;
//!
//! counter!(metrics::RETRY_ATTEMPTS_TOTAL, metrics::LABEL_PHASE => "apply").increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 단계 레이블 키 (apply, destroy)
pub const LABEL_PHASE: &str = "phase";

/// 판정 레이블 키 (passed, expectation_mismatch, validation_errored, apply_failed, leaked,
/// invalid_declaration)
pub const LABEL_VERDICT: &str = "verdict";

/// 에러 분류 레이블 키 (rate_limited, network, not_yet_visible, fatal)
pub const LABEL_ERROR_KIND: &str = "error_kind";

/// 리소스 종류 레이블 키
pub const LABEL_RESOURCE_KIND: &str = "resource_kind";

// ─── 라이프사이클 메트릭 ────────────────────────────────────────────

/// 재시도 정책이 수행한 시도 수 (counter, label: phase)
pub const RETRY_ATTEMPTS_TOTAL: &str = "infraprobe_retry_attempts_total";

/// 재시도 가능 에러로 인해 재시도한 횟수 (counter, labels: phase, error_kind)
pub const RETRIES_TOTAL: &str = "infraprobe_retries_total";

/// 완료된 시나리오 수 (counter, label: verdict)
pub const SCENARIOS_TOTAL: &str = "infraprobe_scenarios_total";

/// teardown 실패 수 (counter)
pub const TEARDOWN_FAILURES_TOTAL: &str = "infraprobe_teardown_failures_total";

/// 시나리오 소요 시간 (histogram, 초)
pub const SCENARIO_DURATION_SECONDS: &str = "infraprobe_scenario_duration_seconds";

// ─── 조회 메트릭 ────────────────────────────────────────────────────

/// 클라우드 조회 수 (counter, label: resource_kind)
pub const QUERIES_TOTAL: &str = "infraprobe_queries_total";

/// 클라우드 조회 실패 수 (counter, labels: resource_kind, error_kind)
pub const QUERY_FAILURES_TOTAL: &str = "infraprobe_query_failures_total";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 레코더가 설치되지 않은 상태에서 호출해도 안전합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        RETRY_ATTEMPTS_TOTAL,
        "Total number of apply/destroy attempts made by the retry policy"
    );
    describe_counter!(
        RETRIES_TOTAL,
        "Total number of retries triggered by a retryable provider error"
    );
    describe_counter!(SCENARIOS_TOTAL, "Total number of scenarios finished by verdict");
    describe_counter!(
        TEARDOWN_FAILURES_TOTAL,
        "Total number of destroy phases that failed and may have leaked infrastructure"
    );
    describe_histogram!(
        SCENARIO_DURATION_SECONDS,
        "Wall-clock time of a scenario from apply to teardown in seconds"
    );
    describe_counter!(QUERIES_TOTAL, "Total number of cloud resource queries");
    describe_counter!(
        QUERY_FAILURES_TOTAL,
        "Total number of cloud resource queries that returned an error"
    );
}
