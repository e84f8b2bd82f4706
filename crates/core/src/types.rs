//! 도메인 타입 -- 하네스 전역에서 사용되는 공통 타입
//!
//! 조회 어댑터, 라이프사이클 매니저, 단언 레이어가 공유하는 데이터 구조를 정의합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 재시도 정책으로 감싸는 프로비저닝 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// 인프라 생성
    Apply,
    /// 인프라 제거
    Destroy,
}

impl Phase {
    /// 메트릭 레이블/로그용 고정 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apply => "apply",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 조회 가능한 클라우드 리소스 종류
///
/// 종류마다 별도의 조회 연산이 있지만 모두 `식별자 -> ResourceDescriptor` 형태를 따릅니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// 가상 네트워크 (VPC)
    Network,
    /// 서브넷
    Subnet,
    /// 보안 그룹
    SecurityGroup,
    /// 컴퓨트 인스턴스
    Instance,
    /// 스토리지 버킷 존재 여부
    Bucket,
    /// 버킷 서버측 암호화 상태
    BucketEncryption,
}

impl ResourceKind {
    /// 모든 종류 (선언 파일 에러 메시지용)
    pub const ALL: [ResourceKind; 6] = [
        Self::Network,
        Self::Subnet,
        Self::SecurityGroup,
        Self::Instance,
        Self::Bucket,
        Self::BucketEncryption,
    ];

    /// 경로 표기와 직렬화에 쓰이는 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Subnet => "subnet",
            Self::SecurityGroup => "security_group",
            Self::Instance => "instance",
            Self::Bucket => "bucket",
            Self::BucketEncryption => "bucket_encryption",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(ResourceKind::as_str).collect();
                format!("unknown resource kind '{s}' (expected one of: {})", names.join(", "))
            })
    }
}

/// 라이브 클라우드 리소스의 읽기 전용 스냅샷
///
/// 조회 시점의 상태를 그대로 담으며, 시나리오 간에 캐시되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// 리소스 종류
    pub kind: ResourceKind,
    /// 리소스 식별자
    pub id: String,
    /// 조회한 리전
    pub region: String,
    /// 속성 (예: `cidr_block`, `dns_support`, `algorithm`)
    pub attributes: BTreeMap<String, Value>,
}

impl ResourceDescriptor {
    /// 빈 속성 맵으로 디스크립터를 생성합니다.
    pub fn new(kind: ResourceKind, id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            region: region.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// 속성을 추가합니다 (builder 스타일).
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// 속성 값을 조회합니다.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// 프로세스 전역 클라우드 컨텍스트
///
/// 자격 증명 프로파일과 기본 리전은 실행 전체와 수명을 같이 하며,
/// 전역 상태 대신 모든 apply/destroy/describe 호출에 명시적으로 전달됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudContext {
    /// 시나리오가 리전을 지정하지 않았을 때 사용할 리전
    pub default_region: String,
    /// 자격 증명 프로파일 이름 (없으면 환경 기본값)
    pub profile: Option<String>,
}

impl CloudContext {
    /// 기본 리전으로 컨텍스트를 생성합니다.
    pub fn new(default_region: impl Into<String>) -> Self {
        Self {
            default_region: default_region.into(),
            profile: None,
        }
    }

    /// 자격 증명 프로파일을 지정합니다.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }
}

/// 값의 종류를 사람이 읽을 수 있는 형태로 반환합니다 (에러 메시지용).
pub fn describe_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(b) => format!("bool {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string {s:?}"),
        Value::Array(items) => format!("list of {}", items.len()),
        Value::Object(map) => format!("map of {}", map.len()),
    }
}
