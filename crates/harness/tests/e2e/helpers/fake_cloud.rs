//! In-memory cloud for E2E tests.
//!
//! Holds live resource descriptors grouped by the naming scope that created them,
//! so tests can assert that nothing survives a scenario's teardown.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use infraprobe_core::error::{NotFoundError, ProviderError, QueryError};
use infraprobe_core::types::{CloudContext, ResourceDescriptor, ResourceKind};
use infraprobe_harness::CloudQuery;

/// Live resources keyed by `(kind, id)`, tagged with their owning scope.
#[derive(Default)]
pub struct FakeCloud {
    resources: Mutex<BTreeMap<(ResourceKind, String), (String, ResourceDescriptor)>>,
    denied: Mutex<BTreeSet<ResourceKind>>,
}

#[allow(dead_code)]
impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or replaces) a resource owned by `scope`.
    pub fn create(&self, scope: &str, descriptor: ResourceDescriptor) {
        self.resources.lock().unwrap().insert(
            (descriptor.kind, descriptor.id.clone()),
            (scope.to_owned(), descriptor),
        );
    }

    /// Deletes every resource owned by `scope`. Returns how many were deleted.
    pub fn delete_scope(&self, scope: &str) -> usize {
        let mut resources = self.resources.lock().unwrap();
        let before = resources.len();
        resources.retain(|_, (owner, _)| owner != scope);
        before - resources.len()
    }

    /// Every describe of `kind` fails with an access-denied provider error.
    pub fn deny(&self, kind: ResourceKind) {
        self.denied.lock().unwrap().insert(kind);
    }

    /// Number of resources still alive.
    pub fn live_count(&self) -> usize {
        self.resources.lock().unwrap().len()
    }

    /// Scopes that still own live resources.
    pub fn live_scopes(&self) -> Vec<String> {
        let mut scopes: Vec<String> = self
            .resources
            .lock()
            .unwrap()
            .values()
            .map(|(owner, _)| owner.clone())
            .collect();
        scopes.sort();
        scopes.dedup();
        scopes
    }
}

impl CloudQuery for FakeCloud {
    async fn describe(
        &self,
        _ctx: &CloudContext,
        kind: ResourceKind,
        id: &str,
        region: &str,
    ) -> Result<ResourceDescriptor, QueryError> {
        if self.denied.lock().unwrap().contains(&kind) {
            return Err(QueryError::Provider(ProviderError::Fatal(format!(
                "AccessDenied: not authorized to describe {kind} '{id}'"
            ))));
        }
        let resources = self.resources.lock().unwrap();
        resources
            .get(&(kind, id.to_owned()))
            .map(|(_, d)| d)
            .filter(|d| d.region == region)
            .cloned()
            .ok_or_else(|| {
                QueryError::NotFound(NotFoundError {
                    kind,
                    id: id.to_owned(),
                    region: region.to_owned(),
                })
            })
    }
}
