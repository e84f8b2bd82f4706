//! Fault-injectable fake provisioning engine.
//!
//! Models a small "networker lab" module with four addressable nodes and
//! provisions them into a [`FakeCloud`]. Applies and destroys can be made to
//! fail (optionally after creating resources, like a partial apply), and output
//! reads can be made to panic.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use serde_json::Value;

use infraprobe_core::error::{ConfigError, ProviderError};
use infraprobe_core::types::{CloudContext, ResourceDescriptor, ResourceKind};
use infraprobe_harness::{DestroyTarget, ProvisionHandle, ProvisioningEngine, ScenarioConfig};

use super::fake_cloud::FakeCloud;

/// Addressable nodes of the fake module.
pub const NETWORK: &str = "module.network";
pub const PUBLIC_SUBNET: &str = "aws_subnet.public";
pub const STORAGE: &str = "module.storage";
pub const SPOT_NODE: &str = "aws_instance.node";

const KNOWN_TARGETS: &[&str] = &[NETWORK, PUBLIC_SUBNET, STORAGE, SPOT_NODE];

/// An injected apply failure.
#[derive(Debug, Clone)]
pub struct ApplyFault {
    pub error: ProviderError,
    /// Create the resources before failing.
    pub partial: bool,
}

pub struct FakeEngine {
    cloud: Arc<FakeCloud>,
    apply_faults: Mutex<VecDeque<ApplyFault>>,
    destroy_faults: Mutex<VecDeque<ProviderError>>,
    panic_on_read: AtomicBool,
    outputs: Mutex<HashMap<String, BTreeMap<String, Value>>>,
    apply_calls: AtomicU32,
    destroy_calls: Mutex<HashMap<String, u32>>,
}

#[allow(dead_code)]
impl FakeEngine {
    pub fn new(cloud: Arc<FakeCloud>) -> Self {
        Self {
            cloud,
            apply_faults: Mutex::new(VecDeque::new()),
            destroy_faults: Mutex::new(VecDeque::new()),
            panic_on_read: AtomicBool::new(false),
            outputs: Mutex::new(HashMap::new()),
            apply_calls: AtomicU32::new(0),
            destroy_calls: Mutex::new(HashMap::new()),
        }
    }

    /// Queues apply failures, consumed one per apply call.
    pub fn failing_apply(self, errors: impl IntoIterator<Item = ProviderError>) -> Self {
        self.apply_faults
            .lock()
            .unwrap()
            .extend(errors.into_iter().map(|error| ApplyFault {
                error,
                partial: false,
            }));
        self
    }

    /// Queues one apply failure that happens after resources were created.
    pub fn partially_failing_apply(self, error: ProviderError) -> Self {
        self.apply_faults.lock().unwrap().push_back(ApplyFault {
            error,
            partial: true,
        });
        self
    }

    /// Queues destroy failures, consumed one per destroy call.
    pub fn failing_destroy(self, errors: impl IntoIterator<Item = ProviderError>) -> Self {
        self.destroy_faults.lock().unwrap().extend(errors);
        self
    }

    /// Every output read panics.
    pub fn panicking_reads(self) -> Self {
        self.panic_on_read.store(true, Ordering::SeqCst);
        self
    }

    /// Total apply invocations.
    pub fn apply_calls(&self) -> u32 {
        self.apply_calls.load(Ordering::SeqCst)
    }

    /// Destroy invocations for `scope`.
    pub fn destroy_calls(&self, scope: &str) -> u32 {
        self.destroy_calls
            .lock()
            .unwrap()
            .get(scope)
            .copied()
            .unwrap_or(0)
    }

    /// Destroy invocations across all scopes.
    pub fn total_destroy_calls(&self) -> u32 {
        self.destroy_calls.lock().unwrap().values().sum()
    }

    fn selected(config: &ScenarioConfig, node: &str) -> bool {
        config.targets().is_empty() || config.targets().iter().any(|t| t == node)
    }

    fn string_var(config: &ScenarioConfig, name: &str, default: &str) -> String {
        config
            .variables()
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_owned()
    }

    fn bool_var(config: &ScenarioConfig, name: &str, default: bool) -> bool {
        config
            .variables()
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    /// Creates the selected nodes in the cloud and records outputs.
    fn provision(&self, config: &ScenarioConfig, region: &str) {
        let scope = config.scope();
        let mut outputs = BTreeMap::new();

        if Self::selected(config, NETWORK) {
            let vpc_id = format!("vpc-{scope}");
            self.cloud.create(
                scope,
                ResourceDescriptor::new(ResourceKind::Network, &vpc_id, region)
                    .with_attribute("cidr_block", Self::string_var(config, "cidr", "10.0.0.0/16"))
                    .with_attribute("dns_support", Self::bool_var(config, "enable_dns", true))
                    .with_attribute("dns_hostnames", Self::bool_var(config, "enable_dns", true)),
            );
            outputs.insert("vpc_id".to_owned(), Value::from(vpc_id));
        }
        if Self::selected(config, PUBLIC_SUBNET) {
            let subnet_id = format!("subnet-{scope}");
            self.cloud.create(
                scope,
                ResourceDescriptor::new(ResourceKind::Subnet, &subnet_id, region)
                    .with_attribute(
                        "cidr_block",
                        Self::string_var(config, "public_subnet_cidr", "10.0.1.0/24"),
                    )
                    .with_attribute("map_public_ip_on_launch", true),
            );
            outputs.insert("public_subnet_id".to_owned(), Value::from(subnet_id));
        }
        if Self::selected(config, STORAGE) {
            let bucket = format!("{scope}-ddve");
            self.cloud.create(
                scope,
                ResourceDescriptor::new(ResourceKind::Bucket, &bucket, region)
                    .with_attribute("exists", true)
                    .with_attribute("name", bucket.as_str()),
            );
            self.cloud.create(
                scope,
                ResourceDescriptor::new(ResourceKind::BucketEncryption, &bucket, region)
                    .with_attribute("algorithm", "AES256")
                    .with_attribute("kms_key_id", Value::Null),
            );
            outputs.insert("bucket_name".to_owned(), Value::from(bucket));
        }
        if Self::selected(config, SPOT_NODE) {
            let instance_id = format!("i-{scope}");
            let lifecycle = if Self::bool_var(config, "use_spot", false) {
                "spot"
            } else {
                "on-demand"
            };
            self.cloud.create(
                scope,
                ResourceDescriptor::new(ResourceKind::Instance, &instance_id, region)
                    .with_attribute("lifecycle", lifecycle)
                    .with_attribute("state", "running"),
            );
            outputs.insert("instance_id".to_owned(), Value::from(instance_id));
        }

        self.outputs
            .lock()
            .unwrap()
            .insert(scope.to_owned(), outputs);
    }
}

impl ProvisioningEngine for FakeEngine {
    fn check_targets(&self, config: &ScenarioConfig) -> Result<(), ConfigError> {
        match config
            .targets()
            .iter()
            .find(|t| !KNOWN_TARGETS.contains(&t.as_str()))
        {
            Some(unknown) => Err(ConfigError::UnknownTarget {
                target: unknown.clone(),
                module_dir: config.module_dir().display().to_string(),
            }),
            None => Ok(()),
        }
    }

    async fn apply(
        &self,
        ctx: &CloudContext,
        config: &ScenarioConfig,
    ) -> Result<ProvisionHandle, ProviderError> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        let region = config.region_in(ctx).to_owned();

        let fault = self.apply_faults.lock().unwrap().pop_front();
        if let Some(fault) = fault {
            if fault.partial {
                self.provision(config, &region);
            }
            return Err(fault.error);
        }

        self.provision(config, &region);
        Ok(ProvisionHandle::new(
            config.scope(),
            config.module_dir(),
            config.targets().to_vec(),
            region,
        ))
    }

    async fn destroy(
        &self,
        _ctx: &CloudContext,
        target: DestroyTarget<'_>,
    ) -> Result<(), ProviderError> {
        let scope = target.scope().to_owned();
        *self
            .destroy_calls
            .lock()
            .unwrap()
            .entry(scope.clone())
            .or_default() += 1;

        let fault = self.destroy_faults.lock().unwrap().pop_front();
        if let Some(error) = fault {
            return Err(error);
        }

        self.cloud.delete_scope(&scope);
        self.outputs.lock().unwrap().remove(&scope);
        Ok(())
    }

    async fn read_output(
        &self,
        handle: &ProvisionHandle,
        name: &str,
    ) -> Result<Option<Value>, ProviderError> {
        if self.panic_on_read.load(Ordering::SeqCst) {
            panic!("fake engine: output read blew up");
        }
        Ok(self
            .outputs
            .lock()
            .unwrap()
            .get(handle.scope())
            .and_then(|outputs| outputs.get(name))
            .cloned())
    }
}
