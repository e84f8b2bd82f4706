#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`binding`]: 변수/타깃 바인딩 (`ScenarioConfigBuilder`, `ScenarioConfig`)
//! - [`retry`]: 일시적 프로바이더 에러 재시도 (`RetryPolicy`)
//! - [`engine`]: 프로비저닝 엔진 추상화 (`ProvisioningEngine` trait, `TerraformEngine`)
//! - [`query`]: 읽기 전용 리소스 조회 (`CloudQuery` trait, `AwsCloudQuery`)
//! - [`assertion`]: 기대값 평가 (`Expectation`, `Evidence`, `evaluate`)
//! - [`lifecycle`]: 시나리오 상태 기계 (`LifecycleManager`, `Scenario`)
//! - [`runner`]: 동시 시나리오 실행 (`ScenarioRunner`)
//! - [`result`]: 판정과 보고서 (`ScenarioResult`, `RunReport`)
//! - [`suite`]: TOML 스위트 파일 (`Suite`)
//! - [`error`]: 하네스 에러 (`HarnessError`)
//!
//! # Architecture
//!
//! ```text
//! Suite ──> Vec<Scenario> ──> ScenarioRunner ──spawn──> LifecycleManager (시나리오당 하나의 태스크)
//!                                                          |
//!                                   RetryPolicy ──> ProvisioningEngine.apply
//!                                                          |
//!                          Evidence::collect (ProvisioningEngine.read_output + CloudQuery.describe)
//!                                                          |
//!                                                      evaluate
//!                                                          |
//!                                   RetryPolicy ──> ProvisioningEngine.destroy (항상)
//!                                                          |
//!                                                     RunReport
//! ```

pub mod assertion;
pub mod binding;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod query;
pub mod result;
pub mod retry;
pub mod runner;
pub mod suite;

// --- Public API Re-exports ---

// Lifecycle / runner
pub use lifecycle::{LifecycleManager, Scenario};
pub use runner::ScenarioRunner;

// Declarations
pub use assertion::{Comparator, Evidence, Expectation, FailedExpectation, Subject, evaluate};
pub use binding::{ScenarioConfig, ScenarioConfigBuilder, VarType, load_var_file};
pub use retry::{Backoff, RetryPolicy};
pub use suite::Suite;

// Engine / query
pub use engine::{DestroyTarget, ProvisionHandle, ProvisioningEngine, TerraformEngine};
#[cfg(feature = "aws")]
pub use query::AwsCloudQuery;
pub use query::CloudQuery;

// Results
pub use result::{LifecyclePhase, RunReport, ScenarioResult, TeardownOutcome, ValidationOutcome, Verdict};

// Error
pub use error::HarnessError;
