//! AWS implementation of [`CloudQuery`] using the EC2 and S3 SDKs.
//!
//! One describe call per resource kind; each maps the SDK response into a
//! [`ResourceDescriptor`] with a fixed attribute set. SDK configuration is loaded
//! per call from the process-wide [`CloudContext`] (profile) and the scenario region.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types::VpcAttributeName;
use tracing::debug;

use infraprobe_core::error::{NotFoundError, ProviderError, QueryError};
use infraprobe_core::metrics as m;
use infraprobe_core::types::{CloudContext, ResourceDescriptor, ResourceKind};

use crate::query::CloudQuery;

/// Error codes AWS returns when throttling a caller.
const RATE_LIMIT_CODES: &[&str] = &[
    "RequestLimitExceeded",
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "SlowDown",
];

/// S3 code for a bucket without a server-side encryption configuration.
const NO_ENCRYPTION_CODE: &str = "ServerSideEncryptionConfigurationNotFoundError";

/// Read-only AWS lookups for every [`ResourceKind`].
#[derive(Debug, Default, Clone)]
pub struct AwsCloudQuery;

impl AwsCloudQuery {
    /// Creates the adapter. Credentials are resolved lazily on each call.
    pub fn new() -> Self {
        Self
    }

    async fn sdk_config(ctx: &CloudContext, region: &str) -> SdkConfig {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_owned()));
        if let Some(profile) = &ctx.profile {
            loader = loader.profile_name(profile);
        }
        loader.load().await
    }

    async fn ec2(ctx: &CloudContext, region: &str) -> aws_sdk_ec2::Client {
        aws_sdk_ec2::Client::new(&Self::sdk_config(ctx, region).await)
    }

    async fn s3(ctx: &CloudContext, region: &str) -> aws_sdk_s3::Client {
        aws_sdk_s3::Client::new(&Self::sdk_config(ctx, region).await)
    }

    async fn describe_network(
        ctx: &CloudContext,
        id: &str,
        region: &str,
    ) -> Result<ResourceDescriptor, QueryError> {
        let kind = ResourceKind::Network;
        let client = Self::ec2(ctx, region).await;
        let out = client
            .describe_vpcs()
            .vpc_ids(id)
            .send()
            .await
            .map_err(|e| classify(e, kind, id, region))?;
        let vpc = out
            .vpcs()
            .first()
            .ok_or_else(|| not_found(kind, id, region))?;

        let dns_support = client
            .describe_vpc_attribute()
            .vpc_id(id)
            .attribute(VpcAttributeName::EnableDnsSupport)
            .send()
            .await
            .map_err(|e| classify(e, kind, id, region))?
            .enable_dns_support()
            .and_then(|a| a.value());
        let dns_hostnames = client
            .describe_vpc_attribute()
            .vpc_id(id)
            .attribute(VpcAttributeName::EnableDnsHostnames)
            .send()
            .await
            .map_err(|e| classify(e, kind, id, region))?
            .enable_dns_hostnames()
            .and_then(|a| a.value());

        Ok(ResourceDescriptor::new(kind, id, region)
            .with_attribute("cidr_block", vpc.cidr_block())
            .with_attribute("state", vpc.state().map(|s| s.as_str()))
            .with_attribute("dns_support", dns_support)
            .with_attribute("dns_hostnames", dns_hostnames)
            .with_attribute("is_default", vpc.is_default()))
    }

    async fn describe_subnet(
        ctx: &CloudContext,
        id: &str,
        region: &str,
    ) -> Result<ResourceDescriptor, QueryError> {
        let kind = ResourceKind::Subnet;
        let out = Self::ec2(ctx, region)
            .await
            .describe_subnets()
            .subnet_ids(id)
            .send()
            .await
            .map_err(|e| classify(e, kind, id, region))?;
        let subnet = out
            .subnets()
            .first()
            .ok_or_else(|| not_found(kind, id, region))?;

        Ok(ResourceDescriptor::new(kind, id, region)
            .with_attribute("cidr_block", subnet.cidr_block())
            .with_attribute("vpc_id", subnet.vpc_id())
            .with_attribute("availability_zone", subnet.availability_zone())
            .with_attribute("map_public_ip_on_launch", subnet.map_public_ip_on_launch()))
    }

    async fn describe_security_group(
        ctx: &CloudContext,
        id: &str,
        region: &str,
    ) -> Result<ResourceDescriptor, QueryError> {
        let kind = ResourceKind::SecurityGroup;
        let out = Self::ec2(ctx, region)
            .await
            .describe_security_groups()
            .group_ids(id)
            .send()
            .await
            .map_err(|e| classify(e, kind, id, region))?;
        let group = out
            .security_groups()
            .first()
            .ok_or_else(|| not_found(kind, id, region))?;

        Ok(ResourceDescriptor::new(kind, id, region)
            .with_attribute("group_name", group.group_name())
            .with_attribute("vpc_id", group.vpc_id())
            .with_attribute("ingress_rule_count", group.ip_permissions().len())
            .with_attribute("egress_rule_count", group.ip_permissions_egress().len()))
    }

    async fn describe_instance(
        ctx: &CloudContext,
        id: &str,
        region: &str,
    ) -> Result<ResourceDescriptor, QueryError> {
        let kind = ResourceKind::Instance;
        let out = Self::ec2(ctx, region)
            .await
            .describe_instances()
            .instance_ids(id)
            .send()
            .await
            .map_err(|e| classify(e, kind, id, region))?;
        let instance = out
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .next()
            .ok_or_else(|| not_found(kind, id, region))?;

        // 수명 주기 필드가 없으면 온디맨드 인스턴스
        let lifecycle = instance
            .instance_lifecycle()
            .map(|l| l.as_str())
            .unwrap_or("on-demand");

        Ok(ResourceDescriptor::new(kind, id, region)
            .with_attribute("instance_type", instance.instance_type().map(|t| t.as_str()))
            .with_attribute(
                "state",
                instance.state().and_then(|s| s.name()).map(|n| n.as_str()),
            )
            .with_attribute("lifecycle", lifecycle)
            .with_attribute("public_ip", instance.public_ip_address())
            .with_attribute("subnet_id", instance.subnet_id()))
    }

    async fn describe_bucket(
        ctx: &CloudContext,
        id: &str,
        region: &str,
    ) -> Result<ResourceDescriptor, QueryError> {
        let kind = ResourceKind::Bucket;
        match Self::s3(ctx, region).await.head_bucket().bucket(id).send().await {
            Ok(_) => Ok(ResourceDescriptor::new(kind, id, region)
                .with_attribute("exists", true)
                .with_attribute("name", id)),
            Err(e) if e.as_service_error().is_some_and(|s| s.is_not_found()) => {
                Err(not_found(kind, id, region))
            }
            Err(e) => Err(classify(e, kind, id, region)),
        }
    }

    async fn describe_bucket_encryption(
        ctx: &CloudContext,
        id: &str,
        region: &str,
    ) -> Result<ResourceDescriptor, QueryError> {
        let kind = ResourceKind::BucketEncryption;
        let result = Self::s3(ctx, region)
            .await
            .get_bucket_encryption()
            .bucket(id)
            .send()
            .await;

        let out = match result {
            Ok(out) => out,
            Err(e) if e.code() == Some(NO_ENCRYPTION_CODE) => {
                return Ok(ResourceDescriptor::new(kind, id, region)
                    .with_attribute("algorithm", serde_json::Value::Null)
                    .with_attribute("kms_key_id", serde_json::Value::Null));
            }
            Err(e) => return Err(classify(e, kind, id, region)),
        };

        let default = out
            .server_side_encryption_configuration()
            .and_then(|c| c.rules().first())
            .and_then(|r| r.apply_server_side_encryption_by_default());

        Ok(ResourceDescriptor::new(kind, id, region)
            .with_attribute("algorithm", default.map(|d| d.sse_algorithm().as_str()))
            .with_attribute("kms_key_id", default.and_then(|d| d.kms_master_key_id())))
    }
}

impl CloudQuery for AwsCloudQuery {
    async fn describe(
        &self,
        ctx: &CloudContext,
        kind: ResourceKind,
        id: &str,
        region: &str,
    ) -> Result<ResourceDescriptor, QueryError> {
        metrics::counter!(m::QUERIES_TOTAL, m::LABEL_RESOURCE_KIND => kind.as_str()).increment(1);
        debug!(kind = kind.as_str(), id = id, region = region, "describing resource");

        let result = match kind {
            ResourceKind::Network => Self::describe_network(ctx, id, region).await,
            ResourceKind::Subnet => Self::describe_subnet(ctx, id, region).await,
            ResourceKind::SecurityGroup => Self::describe_security_group(ctx, id, region).await,
            ResourceKind::Instance => Self::describe_instance(ctx, id, region).await,
            ResourceKind::Bucket => Self::describe_bucket(ctx, id, region).await,
            ResourceKind::BucketEncryption => {
                Self::describe_bucket_encryption(ctx, id, region).await
            }
        };

        if let Err(e) = &result {
            let error_kind = match e {
                QueryError::NotFound(_) => "not_found",
                QueryError::Provider(p) => p.kind_name(),
            };
            metrics::counter!(
                m::QUERY_FAILURES_TOTAL,
                m::LABEL_RESOURCE_KIND => kind.as_str(),
                m::LABEL_ERROR_KIND => error_kind
            )
            .increment(1);
        }
        result
    }
}

fn not_found(kind: ResourceKind, id: &str, region: &str) -> QueryError {
    QueryError::NotFound(NotFoundError {
        kind,
        id: id.to_owned(),
        region: region.to_owned(),
    })
}

/// Maps an SDK error to a query error.
///
/// Transport failures are transient network errors; `*.NotFound`, `NotFound` and
/// `NoSuchBucket` codes mean the resource does not exist; throttling codes are
/// rate limits; everything else is fatal.
fn classify<E>(err: SdkError<E>, kind: ResourceKind, id: &str, region: &str) -> QueryError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    if matches!(
        err,
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) | SdkError::ResponseError(_)
    ) {
        return QueryError::Provider(ProviderError::Network(message));
    }

    let code = err.code().unwrap_or_default();
    if is_not_found_code(code) {
        return not_found(kind, id, region);
    }
    if RATE_LIMIT_CODES.contains(&code) {
        return QueryError::Provider(ProviderError::RateLimited(message));
    }
    QueryError::Provider(ProviderError::Fatal(message))
}

fn is_not_found_code(code: &str) -> bool {
    code == "NotFound" || code == "NoSuchBucket" || code.ends_with(".NotFound")
}
