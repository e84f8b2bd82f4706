//! Resource query adapter.
//!
//! [`CloudQuery`] is the narrow read-only interface the assertion layer uses to look
//! up a live resource by identifier. Every kind shares one contract shape:
//! `identifier -> ResourceDescriptor | NotFoundError | ProviderError`.
//! Lookups are idempotent and never cached.

#[cfg(feature = "aws")]
pub mod aws;

use std::future::Future;

use infraprobe_core::error::QueryError;
use infraprobe_core::types::{CloudContext, ResourceDescriptor, ResourceKind};

#[cfg(feature = "aws")]
pub use aws::AwsCloudQuery;

/// Trait abstracting read-only cloud lookups.
///
/// # Implementations
///
/// - `AwsCloudQuery`: EC2/S3 describe calls (behind the `aws` feature)
/// - `MockCloudQuery`: in-memory descriptors (available in tests only)
pub trait CloudQuery: Send + Sync + 'static {
    /// Describes a resource of `kind` identified by `id` in `region`.
    ///
    /// # Errors
    ///
    /// - `QueryError::NotFound`: no resource with this identifier exists
    /// - `QueryError::Provider`: the provider call failed
    fn describe(
        &self,
        ctx: &CloudContext,
        kind: ResourceKind,
        id: &str,
        region: &str,
    ) -> impl Future<Output = Result<ResourceDescriptor, QueryError>> + Send;
}

/// 테스트용 Mock 조회 어댑터
#[cfg(test)]
#[derive(Default)]
pub struct MockCloudQuery {
    /// 조회 가능한 디스크립터
    pub resources: Vec<ResourceDescriptor>,
    /// 모든 조회를 이 에러로 실패시킴
    pub failure: Option<infraprobe_core::error::ProviderError>,
}

#[cfg(test)]
impl MockCloudQuery {
    /// 빈 mock 어댑터를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 조회 가능한 리소스를 추가합니다.
    pub fn with_resource(mut self, descriptor: ResourceDescriptor) -> Self {
        self.resources.push(descriptor);
        self
    }

    /// 모든 조회가 실패하도록 설정합니다.
    pub fn with_failure(mut self, err: infraprobe_core::error::ProviderError) -> Self {
        self.failure = Some(err);
        self
    }
}

#[cfg(test)]
impl CloudQuery for MockCloudQuery {
    async fn describe(
        &self,
        _ctx: &CloudContext,
        kind: ResourceKind,
        id: &str,
        region: &str,
    ) -> Result<ResourceDescriptor, QueryError> {
        if let Some(err) = &self.failure {
            return Err(QueryError::Provider(err.clone()));
        }
        self.resources
            .iter()
            .find(|d| d.kind == kind && d.id == id && d.region == region)
            .cloned()
            .ok_or_else(|| {
                QueryError::NotFound(infraprobe_core::error::NotFoundError {
                    kind,
                    id: id.to_owned(),
                    region: region.to_owned(),
                })
            })
    }
}
