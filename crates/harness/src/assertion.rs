//! 단언 레이어 -- 출력값과 리소스 속성에 대한 선언적 기대값 검사
//!
//! 경로 문법:
//! - `output.<name>`: 엔진 출력값
//! - `<kind>(<id_output>).<attribute>`: `id_output` 출력값을 식별자로 조회한 리소스의 속성
//!
//! 모든 기대값은 독립적으로 평가되며(단락 평가 없음), 실패한 항목만 반환됩니다.
//! 조회 결과가 `NotFound`인 리소스의 기대값은 실제값 없음으로 실패합니다.
//! 조회 자체가 실패하면 해당 출력/리소스를 참조하는 기대값만 `errored`로 실패하고,
//! 나머지 기대값은 그대로 평가됩니다.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use infraprobe_core::error::{ConfigError, QueryError};
use infraprobe_core::types::{CloudContext, ResourceDescriptor, ResourceKind};

use crate::engine::{ProvisionHandle, ProvisioningEngine};
use crate::query::CloudQuery;

/// 기대값이 가리키는 대상
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Subject {
    /// 엔진 출력값
    Output {
        /// 출력 이름
        name: String,
    },
    /// 리소스 디스크립터 속성
    Resource {
        /// 리소스 종류
        kind: ResourceKind,
        /// 리소스 식별자를 담은 출력 이름
        id_output: String,
        /// 속성 이름
        attribute: String,
    },
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output { name } => write!(f, "output.{name}"),
            Self::Resource {
                kind,
                id_output,
                attribute,
            } => write!(f, "{kind}({id_output}).{attribute}"),
        }
    }
}

impl FromStr for Subject {
    type Err = ConfigError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            field: format!("expect.path '{path}'"),
            reason,
        };

        if let Some(name) = path.strip_prefix("output.") {
            if !is_identifier(name) {
                return Err(invalid("output name must be a non-empty identifier".to_owned()));
            }
            return Ok(Self::Output {
                name: name.to_owned(),
            });
        }

        let (kind, rest) = path.split_once('(').ok_or_else(|| {
            invalid("expected output.<name> or <kind>(<id_output>).<attribute>".to_owned())
        })?;
        let (id_output, attribute) = rest
            .split_once(").")
            .ok_or_else(|| invalid("expected <kind>(<id_output>).<attribute>".to_owned()))?;
        let kind = kind.parse::<ResourceKind>().map_err(invalid)?;

        if !is_identifier(id_output) {
            return Err(invalid("id output must be a non-empty identifier".to_owned()));
        }
        if !is_identifier(attribute) {
            return Err(invalid("attribute must be a non-empty identifier".to_owned()));
        }

        Ok(Self::Resource {
            kind,
            id_output: id_output.to_owned(),
            attribute: attribute.to_owned(),
        })
    }
}

impl TryFrom<String> for Subject {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Subject> for String {
    fn from(subject: Subject) -> Self {
        subject.to_string()
    }
}

/// ASCII 영숫자, `_`, `-`로만 이루어진 비어 있지 않은 문자열인지 확인합니다.
pub(crate) fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// 비교 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    /// JSON 값 동등 (숫자는 수치 비교)
    Equals,
    /// 실제값의 참/거짓이 기대 불리언과 일치
    Truthy,
    /// 실제값이 기대 배열의 원소
    MemberOf,
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals => f.write_str("equals"),
            Self::Truthy => f.write_str("truthy"),
            Self::MemberOf => f.write_str("member_of"),
        }
    }
}

/// 기대값 `(경로, 비교 연산자, 기대값)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expectation {
    /// 대상 경로
    pub path: Subject,
    /// 비교 연산자
    pub comparator: Comparator,
    /// 기대값
    pub expected: Value,
}

impl Expectation {
    /// 경로 문자열을 파싱하고 비교 연산자와 기대값의 조합을 검증합니다.
    pub fn new(path: &str, comparator: Comparator, expected: Value) -> Result<Self, ConfigError> {
        let path = path.parse::<Subject>()?;
        match comparator {
            Comparator::Truthy if !expected.is_boolean() => {
                return Err(ConfigError::InvalidValue {
                    field: format!("expect '{path}'"),
                    reason: "truthy expects a boolean".to_owned(),
                });
            }
            Comparator::MemberOf if !expected.is_array() => {
                return Err(ConfigError::InvalidValue {
                    field: format!("expect '{path}'"),
                    reason: "member_of expects an array".to_owned(),
                });
            }
            _ => {}
        }
        Ok(Self {
            path,
            comparator,
            expected,
        })
    }

    /// `path == expected`
    pub fn equals(path: &str, expected: impl Into<Value>) -> Result<Self, ConfigError> {
        Self::new(path, Comparator::Equals, expected.into())
    }

    /// `path`가 참
    pub fn truthy(path: &str) -> Result<Self, ConfigError> {
        Self::new(path, Comparator::Truthy, Value::Bool(true))
    }

    /// `path`가 거짓
    pub fn falsy(path: &str) -> Result<Self, ConfigError> {
        Self::new(path, Comparator::Truthy, Value::Bool(false))
    }

    /// `path`가 `candidates` 중 하나
    pub fn member_of(
        path: &str,
        candidates: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Result<Self, ConfigError> {
        let list = candidates.into_iter().map(Into::into).collect();
        Self::new(path, Comparator::MemberOf, Value::Array(list))
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.path, self.comparator, self.expected)
    }
}

/// 충족되지 않은 기대값
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedExpectation {
    /// 원래 기대값
    pub expectation: Expectation,
    /// 실제값 (없으면 `None`)
    pub actual: Option<Value>,
    /// 실패 사유
    pub reason: String,
    /// 실제값을 관측하지 못해 실패했는지 (조회 에러)
    #[serde(default)]
    pub errored: bool,
}

impl fmt::Display for FailedExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actual = self
            .actual
            .as_ref()
            .map(Value::to_string)
            .unwrap_or_else(|| "none".to_owned());
        if self.errored {
            return write!(f, "{}: lookup error ({})", self.expectation.path, self.reason);
        }
        write!(
            f,
            "{}: expected {} {}, actual {} ({})",
            self.expectation.path,
            self.expectation.comparator,
            self.expectation.expected,
            actual,
            self.reason
        )
    }
}

/// 평가에 필요한 관측값 모음
///
/// 출력값은 이름별로, 리소스는 `(종류, 식별자)`별로 보관합니다.
/// 값이 `None`이면 조회했지만 존재하지 않은 것입니다.
/// 조회 자체가 실패한 항목은 `*_errors`에 에러 메시지로 남습니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evidence {
    /// 출력 이름 -> 값
    pub outputs: BTreeMap<String, Option<Value>>,
    /// (종류, 식별자) -> 디스크립터
    pub resources: BTreeMap<(ResourceKind, String), Option<ResourceDescriptor>>,
    /// 읽기에 실패한 출력 이름 -> 에러
    pub output_errors: BTreeMap<String, String>,
    /// 조회에 실패한 리소스 -> 에러
    pub resource_errors: BTreeMap<(ResourceKind, String), String>,
}

/// 경로의 실제값을 얻지 못한 이유
enum Unresolved {
    /// 값이 존재하지 않음
    Missing(String),
    /// 조회가 실패함
    LookupFailed(String),
}

impl Evidence {
    /// 출력값을 기록합니다.
    pub fn with_output(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.outputs.insert(name.to_owned(), Some(value.into()));
        self
    }

    /// 디스크립터를 기록합니다.
    pub fn with_resource(mut self, descriptor: ResourceDescriptor) -> Self {
        self.resources
            .insert((descriptor.kind, descriptor.id.clone()), Some(descriptor));
        self
    }

    /// 조회 결과 존재하지 않은 리소스를 기록합니다.
    pub fn with_missing_resource(mut self, kind: ResourceKind, id: &str) -> Self {
        self.resources.insert((kind, id.to_owned()), None);
        self
    }

    /// 조회에 실패한 리소스를 기록합니다.
    pub fn with_resource_error(mut self, kind: ResourceKind, id: &str, error: &str) -> Self {
        self.resource_errors
            .insert((kind, id.to_owned()), error.to_owned());
        self
    }

    /// 기대값들이 참조하는 출력과 리소스를 한 번씩 수집합니다.
    ///
    /// `NotFound`는 존재하지 않음으로, 그 밖의 조회/출력 에러는 항목별 에러로 기록됩니다.
    pub async fn collect<E, Q>(
        engine: &E,
        query: &Q,
        ctx: &CloudContext,
        handle: &ProvisionHandle,
        expectations: &[Expectation],
    ) -> Self
    where
        E: ProvisioningEngine,
        Q: CloudQuery,
    {
        let mut evidence = Self::default();

        for expectation in expectations {
            let output_name = match &expectation.path {
                Subject::Output { name } => name,
                Subject::Resource { id_output, .. } => id_output,
            };
            if evidence.outputs.contains_key(output_name)
                || evidence.output_errors.contains_key(output_name)
            {
                continue;
            }
            match engine.read_output(handle, output_name).await {
                Ok(value) => {
                    evidence.outputs.insert(output_name.clone(), value);
                }
                Err(e) => {
                    warn!(output = output_name.as_str(), error = %e, "output read failed during validation");
                    evidence.output_errors.insert(output_name.clone(), e.to_string());
                }
            }
        }

        for expectation in expectations {
            let Subject::Resource {
                kind, id_output, ..
            } = &expectation.path
            else {
                continue;
            };
            let Some(Some(Value::String(id))) = evidence.outputs.get(id_output) else {
                continue;
            };
            let key = (*kind, id.clone());
            if evidence.resources.contains_key(&key) || evidence.resource_errors.contains_key(&key)
            {
                continue;
            }

            match query.describe(ctx, *kind, id, handle.region()).await {
                Ok(d) => {
                    evidence.resources.insert(key, Some(d));
                }
                Err(QueryError::NotFound(e)) => {
                    debug!(error = %e, "resource not found during validation");
                    evidence.resources.insert(key, None);
                }
                Err(e) => {
                    warn!(kind = %kind, id = id.as_str(), error = %e, "resource lookup failed during validation");
                    evidence.resource_errors.insert(key, e.to_string());
                }
            }
        }

        evidence
    }

    /// 경로의 실제값을 찾습니다.
    fn resolve(&self, subject: &Subject) -> Result<Value, Unresolved> {
        match subject {
            Subject::Output { name } => self.output(name).cloned(),
            Subject::Resource {
                kind,
                id_output,
                attribute,
            } => {
                let id = match self.output(id_output)? {
                    Value::String(id) => id,
                    other => {
                        return Err(Unresolved::Missing(format!(
                            "output '{id_output}' is not a resource identifier: {other}"
                        )));
                    }
                };
                let key = (*kind, id.clone());
                if let Some(e) = self.resource_errors.get(&key) {
                    return Err(Unresolved::LookupFailed(format!(
                        "{kind} '{id}' lookup failed: {e}"
                    )));
                }
                match self.resources.get(&key) {
                    Some(Some(descriptor)) => {
                        descriptor.attribute(attribute).cloned().ok_or_else(|| {
                            Unresolved::Missing(format!(
                                "{kind} '{id}' has no attribute '{attribute}'"
                            ))
                        })
                    }
                    _ => Err(Unresolved::Missing(format!("{kind} '{id}' not found"))),
                }
            }
        }
    }

    fn output(&self, name: &str) -> Result<&Value, Unresolved> {
        if let Some(e) = self.output_errors.get(name) {
            return Err(Unresolved::LookupFailed(format!(
                "output '{name}' could not be read: {e}"
            )));
        }
        match self.outputs.get(name) {
            Some(Some(value)) => Ok(value),
            _ => Err(Unresolved::Missing(format!("output '{name}' is not defined"))),
        }
    }
}

/// 모든 기대값을 평가하고 실패한 항목을 선언 순서대로 반환합니다.
///
/// 빈 결과는 검증 통과를 의미합니다.
pub fn evaluate(expectations: &[Expectation], evidence: &Evidence) -> Vec<FailedExpectation> {
    expectations
        .iter()
        .filter_map(|expectation| {
            let failure = match evidence.resolve(&expectation.path) {
                Ok(actual) => check(expectation, &actual).err().map(|reason| FailedExpectation {
                    expectation: expectation.clone(),
                    actual: Some(actual),
                    reason,
                    errored: false,
                }),
                Err(Unresolved::Missing(reason)) => Some(FailedExpectation {
                    expectation: expectation.clone(),
                    actual: None,
                    reason,
                    errored: false,
                }),
                Err(Unresolved::LookupFailed(reason)) => Some(FailedExpectation {
                    expectation: expectation.clone(),
                    actual: None,
                    reason,
                    errored: true,
                }),
            };
            if let Some(f) = &failure {
                debug!(expectation = %f.expectation, reason = f.reason.as_str(), "expectation failed");
            }
            failure
        })
        .collect()
}

fn check(expectation: &Expectation, actual: &Value) -> Result<(), String> {
    match expectation.comparator {
        Comparator::Equals => {
            if values_equal(actual, &expectation.expected) {
                Ok(())
            } else {
                Err("values differ".to_owned())
            }
        }
        Comparator::Truthy => {
            let want = expectation.expected.as_bool().unwrap_or(true);
            if truthiness(actual) == want {
                Ok(())
            } else if want {
                Err("value is not truthy".to_owned())
            } else {
                Err("value is not falsy".to_owned())
            }
        }
        Comparator::MemberOf => match expectation.expected.as_array() {
            Some(candidates) if candidates.iter().any(|c| values_equal(actual, c)) => Ok(()),
            Some(_) => Err("value is not one of the expected values".to_owned()),
            None => Err("member_of expects an array".to_owned()),
        },
    }
}

/// JSON 동등 비교. 숫자는 정수/실수 표현과 무관하게 수치로 비교합니다.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

/// 값의 참/거짓. 엔진 출력이 문자열로 오는 경우를 위해 `"false"`, `"0"`, `""`는 거짓입니다.
fn truthiness(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !matches!(s.as_str(), "" | "false" | "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
