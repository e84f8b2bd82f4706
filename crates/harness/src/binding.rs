//! 변수 및 타깃 바인딩 -- 시나리오 입력 구성
//!
//! [`ScenarioConfigBuilder`]는 모듈 디렉토리, 명시적 변수, 순서 있는 변수 파일 오버레이,
//! 타깃 범위를 모아 불변 [`ScenarioConfig`]를 만듭니다.
//!
//! # 우선순위
//! 명시적 변수 > 나중 파일 > 앞선 파일
//!
//! # 지원 변수 파일 형식
//! - `*.json`, `*.tfvars.json`: JSON 객체
//! - 그 밖의 모든 파일 (`*.tfvars`, `terraform.tfvars.test` 등): HCL 속성 할당
//!
//! 모든 검증은 `build()` 시점에 수행되며, 엔진이나 네트워크 호출 전에 실패합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use infraprobe_core::error::ConfigError;
use infraprobe_core::types::{CloudContext, describe_value};

use crate::assertion::is_identifier;
use crate::retry::RetryPolicy;

/// 명시적 변수 레이어의 이름 (에러 메시지용)
const EXPLICIT_SOURCE: &str = "explicit";

/// 변수 파일 최대 크기 (1 MiB)
const MAX_VAR_FILE_SIZE: u64 = 1024 * 1024;

/// 변수 타입
///
/// IaC 엔진의 변수 타입 강제 규칙을 따릅니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    /// 문자열 (숫자/불리언도 문자열로 변환)
    String,
    /// 숫자 (숫자 문자열 허용)
    Number,
    /// 불리언 (`"true"`/`"false"` 문자열 허용)
    Bool,
    /// 리스트
    List,
    /// 맵
    Map,
    /// 제약 없음
    Any,
}

impl VarType {
    /// 값이 스스로 나타내는 타입
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Any,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::List,
            Value::Object(_) => Self::Map,
        }
    }

    /// 값을 이 타입으로 강제 변환합니다. 변환할 수 없으면 `None`.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        if value.is_null() {
            return Some(Value::Null);
        }
        match (self, value) {
            (Self::Any, v) => Some(v.clone()),
            (Self::Bool, Value::Bool(_)) => Some(value.clone()),
            (Self::Bool, Value::String(s)) => match s.as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            (Self::Number, Value::Number(_)) => Some(value.clone()),
            (Self::Number, Value::String(s)) => parse_number(s),
            (Self::String, Value::String(_)) => Some(value.clone()),
            (Self::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (Self::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
            (Self::List, Value::Array(_)) => Some(value.clone()),
            (Self::Map, Value::Object(_)) => Some(value.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Bool => "bool",
            Self::List => "list",
            Self::Map => "map",
            Self::Any => "any",
        };
        f.write_str(name)
    }
}

impl FromStr for VarType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "bool" => Ok(Self::Bool),
            "list" => Ok(Self::List),
            "map" => Ok(Self::Map),
            "any" => Ok(Self::Any),
            other => Err(ConfigError::InvalidValue {
                field: "variable_types".to_owned(),
                reason: format!("unknown variable type '{other}'"),
            }),
        }
    }
}

fn parse_number(s: &str) -> Option<Value> {
    let trimmed = s.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Value::from(i));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

/// 시나리오의 불변 입력 구성
///
/// [`ScenarioConfigBuilder::build`]로만 생성되며 이후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    name: String,
    module_dir: PathBuf,
    variables: BTreeMap<String, Value>,
    var_files: Vec<PathBuf>,
    targets: Vec<String>,
    retry: RetryPolicy,
    region: Option<String>,
    scope: String,
}

impl ScenarioConfig {
    /// 시나리오 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    /// IaC 모듈 디렉토리
    pub fn module_dir(&self) -> &Path {
        &self.module_dir
    }

    /// 모든 레이어를 병합한 최종 변수
    pub fn variables(&self) -> &BTreeMap<String, Value> {
        &self.variables
    }

    /// 적용된 변수 파일 (적용 순서대로)
    pub fn var_files(&self) -> &[PathBuf] {
        &self.var_files
    }

    /// 타깃 범위 (비어 있으면 전체 그래프)
    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// 재시도 예산
    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// 시나리오가 직접 지정한 리전
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// 리전을 결정합니다. 시나리오 지정값이 없으면 컨텍스트 기본 리전을 사용합니다.
    pub fn region_in<'a>(&'a self, ctx: &'a CloudContext) -> &'a str {
        self.region.as_deref().unwrap_or(&ctx.default_region)
    }

    /// 네이밍 스코프 레이블
    pub fn scope(&self) -> &str {
        &self.scope
    }
}

/// [`ScenarioConfig`] 빌더
#[derive(Debug, Clone)]
pub struct ScenarioConfigBuilder {
    name: String,
    module_dir: PathBuf,
    variables: BTreeMap<String, Value>,
    var_types: BTreeMap<String, VarType>,
    var_files: Vec<PathBuf>,
    targets: Vec<String>,
    retry: RetryPolicy,
    region: Option<String>,
    scope: Option<String>,
    unique_scope: bool,
    scope_variable: Option<String>,
}

impl ScenarioConfigBuilder {
    /// 시나리오 이름과 모듈 디렉토리로 빌더를 생성합니다.
    pub fn new(name: impl Into<String>, module_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            module_dir: module_dir.into(),
            variables: BTreeMap::new(),
            var_types: BTreeMap::new(),
            var_files: Vec::new(),
            targets: Vec::new(),
            retry: RetryPolicy::default(),
            region: None,
            scope: None,
            unique_scope: false,
            scope_variable: None,
        }
    }

    /// 시나리오 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 명시적 변수를 설정합니다.
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// 여러 명시적 변수를 설정합니다.
    pub fn variables(mut self, vars: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.variables.extend(vars);
        self
    }

    /// 변수의 타입을 선언합니다.
    pub fn var_type(mut self, name: impl Into<String>, ty: VarType) -> Self {
        self.var_types.insert(name.into(), ty);
        self
    }

    /// 변수 파일 오버레이를 추가합니다 (나중에 추가한 파일이 우선).
    pub fn var_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.var_files.push(path.into());
        self
    }

    /// 타깃 주소를 추가합니다.
    pub fn target(mut self, address: impl Into<String>) -> Self {
        self.targets.push(address.into());
        self
    }

    /// 여러 타깃 주소를 추가합니다.
    pub fn targets(mut self, addresses: impl IntoIterator<Item = String>) -> Self {
        self.targets.extend(addresses);
        self
    }

    /// 재시도 예산을 설정합니다.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 리전을 지정합니다.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// 네이밍 스코프 레이블을 지정합니다 (기본: 시나리오 이름).
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// 스코프 레이블에 짧은 임의 접미사를 붙입니다.
    pub fn unique_scope(mut self, unique: bool) -> Self {
        self.unique_scope = unique;
        self
    }

    /// 스코프 레이블을 주입할 변수 이름을 지정합니다.
    pub fn scope_variable(mut self, name: impl Into<String>) -> Self {
        self.scope_variable = Some(name.into());
        self
    }

    /// 변수 레이어를 병합하고 검증하여 [`ScenarioConfig`]를 만듭니다.
    ///
    /// # Errors
    /// - 이름이 비어 있거나 스코프가 식별자 형식이 아니면 `ConfigError::InvalidValue`
    /// - 변수 파일이 없으면 `ConfigError::FileNotFound`
    /// - 변수 파일을 파싱할 수 없으면 `ConfigError::ParseFailed`
    /// - 변수 값이 선언된 타입과 맞지 않으면 `ConfigError::TypeConflict`
    pub fn build(self) -> Result<ScenarioConfig, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "name".to_owned(),
                reason: "scenario name must not be empty".to_owned(),
            });
        }

        let base_scope = self.scope.clone().unwrap_or_else(|| self.name.clone());
        // 스코프는 작업 디렉토리 이름이 되므로 경로 구분자를 허용하지 않음
        if !is_identifier(&base_scope) {
            return Err(ConfigError::InvalidValue {
                field: "scope".to_owned(),
                reason: format!(
                    "scope label '{base_scope}' must be non-empty and contain only ASCII letters, digits, '-' or '_'"
                ),
            });
        }
        let scope = if self.unique_scope {
            let suffix = uuid::Uuid::new_v4().simple().to_string();
            format!("{base_scope}-{}", &suffix[..6])
        } else {
            base_scope
        };

        let mut resolver = Resolver::new(&self.var_types);
        for path in &self.var_files {
            let layer = load_var_file(path)?;
            resolver.apply(layer, &path.display().to_string())?;
        }
        let explicit: Map<String, Value> = self.variables.clone().into_iter().collect();
        resolver.apply(explicit, EXPLICIT_SOURCE)?;

        let mut variables = resolver.finish();
        if let Some(var) = &self.scope_variable {
            if !self.variables.contains_key(var) {
                variables.insert(var.clone(), Value::String(scope.clone()));
            }
        }

        debug!(
            scenario = self.name.as_str(),
            scope = scope.as_str(),
            variables = variables.len(),
            var_files = self.var_files.len(),
            targets = self.targets.len(),
            "scenario config built"
        );

        Ok(ScenarioConfig {
            name: self.name,
            module_dir: self.module_dir,
            variables,
            var_files: self.var_files,
            targets: self.targets,
            retry: self.retry,
            region: self.region,
            scope,
        })
    }
}

/// 레이어별 변수 병합기
///
/// 변수의 타입은 선언 타입이 있으면 그것을, 없으면 처음 값을 설정한 레이어의 타입을 따릅니다.
struct Resolver<'a> {
    declared: &'a BTreeMap<String, VarType>,
    established: BTreeMap<String, VarType>,
    values: BTreeMap<String, Value>,
}

impl<'a> Resolver<'a> {
    fn new(declared: &'a BTreeMap<String, VarType>) -> Self {
        Self {
            declared,
            established: BTreeMap::new(),
            values: BTreeMap::new(),
        }
    }

    fn apply(&mut self, layer: Map<String, Value>, source: &str) -> Result<(), ConfigError> {
        for (name, value) in layer {
            let expected = self
                .declared
                .get(&name)
                .or_else(|| self.established.get(&name))
                .copied();

            let resolved = match expected {
                Some(ty) => ty.coerce(&value).ok_or_else(|| ConfigError::TypeConflict {
                    name: name.clone(),
                    expected: ty.to_string(),
                    found: describe_value(&value),
                    source_name: source.to_owned(),
                })?,
                None => {
                    let ty = VarType::of(&value);
                    if ty != VarType::Any {
                        self.established.insert(name.clone(), ty);
                    }
                    value
                }
            };
            self.values.insert(name, resolved);
        }
        Ok(())
    }

    fn finish(self) -> BTreeMap<String, Value> {
        self.values
    }
}

/// 변수 파일 하나를 읽어 `이름 -> 값` 맵으로 반환합니다.
pub fn load_var_file(path: &Path) -> Result<Map<String, Value>, ConfigError> {
    let display = path.display().to_string();
    let metadata = std::fs::metadata(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound {
                path: display.clone(),
            }
        } else {
            ConfigError::ParseFailed {
                reason: format!("{display}: failed to read metadata: {e}"),
            }
        }
    })?;

    if metadata.len() > MAX_VAR_FILE_SIZE {
        return Err(ConfigError::ParseFailed {
            reason: format!(
                "{display}: file too large: {} bytes (max: {MAX_VAR_FILE_SIZE})",
                metadata.len()
            ),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseFailed {
        reason: format!("{display}: failed to read file: {e}"),
    })?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    if file_name.ends_with(".json") {
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(ConfigError::ParseFailed {
                reason: format!("{display}: expected a JSON object, found {}", describe_value(&other)),
            }),
            Err(e) => Err(ConfigError::ParseFailed {
                reason: format!("{display}: invalid JSON: {e}"),
            }),
        }
    } else {
        hcl::from_str::<Map<String, Value>>(&content).map_err(|e| ConfigError::ParseFailed {
            reason: format!("{display}: invalid HCL variable file: {e}"),
        })
    }
}
