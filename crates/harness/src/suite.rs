//! 시나리오 스위트 파일 로딩
//!
//! 스위트는 `[[scenario]]` 테이블의 목록인 TOML 파일입니다.
//!
//! ```toml
//! [[scenario]]
//! name = "core-network"
//! module_dir = "../modules/networker"
//! targets = ["module.network", "aws_subnet.public"]
//! unique_scope = true
//! scope_variable = "project_id"
//!
//! [scenario.variables]
//! cidr = "10.0.0.0/16"
//!
//! [[scenario.expect]]
//! path = "network(vpc_id).cidr_block"
//! comparator = "equals"
//! expected = "10.0.0.0/16"
//! ```
//!
//! `module_dir`는 스위트 파일 기준, `var_files`는 `module_dir` 기준 상대 경로입니다.
//! 스위트 전체를 망가뜨리는 에러(파싱 실패, 이름 중복)는 [`HarnessError::SuiteLoad`]로,
//! 시나리오 하나에 국한된 에러(잘못된 기대값 경로 등)는 해당 시나리오의
//! `invalid_declaration` 판정으로 보고됩니다.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use infraprobe_core::error::ConfigError;

use crate::assertion::{Comparator, Expectation};
use crate::binding::{ScenarioConfigBuilder, VarType};
use crate::error::HarnessError;
use crate::lifecycle::Scenario;
use crate::retry::{Backoff, RetryPolicy};

/// 스위트 파일 최대 크기 (1 MiB)
const MAX_SUITE_FILE_SIZE: u64 = 1024 * 1024;

/// 로드된 시나리오 스위트
#[derive(Debug, Clone)]
pub struct Suite {
    path: PathBuf,
    scenarios: Vec<ScenarioDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SuiteFile {
    #[serde(default, rename = "scenario")]
    scenarios: Vec<ScenarioDecl>,
}

/// 스위트 파일의 `[[scenario]]` 항목
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioDecl {
    /// 시나리오 이름
    pub name: String,
    /// IaC 모듈 디렉토리 (스위트 파일 기준 상대 경로 허용)
    pub module_dir: PathBuf,
    /// 리전 (없으면 기본 리전)
    #[serde(default)]
    pub region: Option<String>,
    /// 네이밍 스코프 (없으면 이름)
    #[serde(default)]
    pub scope: Option<String>,
    /// 스코프에 임의 접미사 추가
    #[serde(default)]
    pub unique_scope: bool,
    /// 스코프를 주입할 변수 이름
    #[serde(default)]
    pub scope_variable: Option<String>,
    /// 명시적 변수
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
    /// 선언된 변수 타입
    #[serde(default)]
    pub variable_types: BTreeMap<String, VarType>,
    /// 변수 파일 (`module_dir` 기준 상대 경로 허용)
    #[serde(default)]
    pub var_files: Vec<PathBuf>,
    /// 타깃 주소
    #[serde(default)]
    pub targets: Vec<String>,
    /// 재시도 설정 재정의
    #[serde(default)]
    pub retry: RetryOverride,
    /// 기대값
    #[serde(default)]
    pub expect: Vec<ExpectDecl>,
}

/// 시나리오별 재시도 재정의 (지정하지 않은 필드는 하네스 기본값)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryOverride {
    pub max_attempts: Option<u32>,
    pub delay_secs: Option<u64>,
    pub backoff: Option<Backoff>,
    pub max_delay_secs: Option<u64>,
}

impl RetryOverride {
    /// 기본 정책 위에 시나리오별 재시도 설정을 덮어씁니다.
    ///
    /// 대기 상한을 생략하면 기본 상한과 선언된 대기 간격 중 큰 값을 사용합니다.
    ///
    /// # Errors
    /// 명시한 `max_delay_secs`가 대기 간격보다 작으면 `ConfigError::InvalidValue`.
    fn apply(&self, defaults: RetryPolicy) -> Result<RetryPolicy, ConfigError> {
        let delay = self
            .delay_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.delay());
        let max_delay = match self.max_delay_secs {
            Some(secs) if Duration::from_secs(secs) < delay => {
                return Err(ConfigError::InvalidValue {
                    field: "retry.max_delay_secs".to_owned(),
                    reason: format!(
                        "{secs}s is shorter than the retry delay of {}s",
                        delay.as_secs()
                    ),
                });
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.max_delay().max(delay),
        };
        Ok(
            RetryPolicy::new(self.max_attempts.unwrap_or(defaults.max_attempts()), delay)
                .with_backoff(self.backoff.unwrap_or(defaults.backoff()), max_delay),
        )
    }
}

/// `[[scenario.expect]]` 항목
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectDecl {
    /// `output.<name>` 또는 `<kind>(<id_output>).<attribute>`
    pub path: String,
    /// 비교 연산자
    pub comparator: Comparator,
    /// 기대값 (`truthy`는 생략 시 `true`)
    #[serde(default)]
    pub expected: Option<Value>,
}

impl ExpectDecl {
    fn to_expectation(&self) -> Result<Expectation, ConfigError> {
        let expected = match (&self.expected, self.comparator) {
            (Some(v), _) => v.clone(),
            (None, Comparator::Truthy) => Value::Bool(true),
            (None, _) => {
                return Err(ConfigError::InvalidValue {
                    field: format!("expect '{}'", self.path),
                    reason: format!("{} requires an expected value", self.comparator),
                });
            }
        };
        Expectation::new(&self.path, self.comparator, expected)
    }
}

impl ScenarioDecl {
    /// 실행 가능한 [`Scenario`]로 변환합니다.
    ///
    /// 기대값이나 재시도 설정이 잘못되었으면 실행 시 `invalid_declaration`으로 보고되는
    /// 시나리오를 반환합니다.
    /// 변수 파일 존재 여부와 타입 충돌은 실행 시점(`build`)에 검사됩니다.
    pub fn to_scenario(&self, suite_dir: &Path, defaults: RetryPolicy) -> Scenario {
        let module_dir = suite_dir.join(&self.module_dir);
        let retry = self.retry.apply(defaults);
        let mut builder = ScenarioConfigBuilder::new(self.name.clone(), module_dir.clone())
            .variables(self.variables.clone())
            .targets(self.targets.clone())
            .retry(retry.as_ref().copied().unwrap_or(defaults))
            .unique_scope(self.unique_scope);

        for (name, ty) in &self.variable_types {
            builder = builder.var_type(name.clone(), *ty);
        }
        for file in &self.var_files {
            builder = builder.var_file(module_dir.join(file));
        }
        if let Some(region) = &self.region {
            builder = builder.region(region.clone());
        }
        if let Some(scope) = &self.scope {
            builder = builder.scope(scope.clone());
        }
        if let Some(var) = &self.scope_variable {
            builder = builder.scope_variable(var.clone());
        }

        let expectations: Result<Vec<_>, _> =
            self.expect.iter().map(ExpectDecl::to_expectation).collect();
        match retry.and(expectations) {
            Ok(expectations) => Scenario::new(builder).expect_all(expectations),
            Err(e) => Scenario::invalid(builder, e),
        }
    }
}

impl Suite {
    /// 스위트 파일을 로드합니다.
    ///
    /// # Errors
    /// 파일을 읽을 수 없거나, 너무 크거나, TOML 파싱에 실패하거나,
    /// 시나리오 이름/고정 스코프가 중복되면 `HarnessError::SuiteLoad`.
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| suite_error(path, format!("failed to read metadata: {e}")))?;

        if metadata.len() > MAX_SUITE_FILE_SIZE {
            return Err(suite_error(
                path,
                format!(
                    "file too large: {} bytes (max: {MAX_SUITE_FILE_SIZE})",
                    metadata.len()
                ),
            ));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| suite_error(path, format!("failed to read file: {e}")))?;
        let suite = Self::parse(path, &content)?;
        debug!(
            path = %path.display(),
            scenarios = suite.scenarios.len(),
            "loaded scenario suite"
        );
        Ok(suite)
    }

    /// TOML 문자열을 파싱합니다. `path`는 상대 경로 해석과 에러 메시지에 사용됩니다.
    pub fn parse(path: &Path, content: &str) -> Result<Self, HarnessError> {
        let file: SuiteFile = toml::from_str(content)
            .map_err(|e| suite_error(path, format!("failed to parse TOML: {e}")))?;

        let mut names = HashSet::new();
        let mut scopes = HashSet::new();
        for decl in &file.scenarios {
            if !names.insert(decl.name.as_str()) {
                return Err(suite_error(
                    path,
                    format!("duplicate scenario name '{}'", decl.name),
                ));
            }
            // 고유 접미사가 없는 스코프는 시나리오 간에 겹치면 안 됨
            if !decl.unique_scope {
                let scope = decl.scope.as_deref().unwrap_or(&decl.name);
                if !scopes.insert(scope) {
                    return Err(suite_error(
                        path,
                        format!("scenario '{}' reuses scope '{scope}'", decl.name),
                    ));
                }
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            scenarios: file.scenarios,
        })
    }

    /// 스위트 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 시나리오 선언 목록 (선언 순서)
    pub fn declarations(&self) -> &[ScenarioDecl] {
        &self.scenarios
    }

    /// 이름에 `pattern`이 포함된 시나리오만 남깁니다.
    pub fn filter(mut self, pattern: &str) -> Self {
        self.scenarios.retain(|d| d.name.contains(pattern));
        self
    }

    /// 실행 가능한 시나리오 목록을 만듭니다.
    pub fn scenarios(&self, defaults: RetryPolicy) -> Vec<Scenario> {
        let suite_dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        self.scenarios
            .iter()
            .map(|d| d.to_scenario(suite_dir, defaults))
            .collect()
    }
}

fn suite_error(path: &Path, reason: String) -> HarnessError {
    HarnessError::SuiteLoad {
        path: path.display().to_string(),
        reason,
    }
}
