use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use provar_domain::{
    Facts, ObservedResource, ResourceGroup, ResourceKind, ResourceName, ResourceSpec, Sku,
    TagFilter,
};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::ProviderError;
use crate::provider::{EnsureOutcome, EnsureResult, Provider};

#[derive(Debug, Clone)]
struct StoredResource {
    spec: ResourceSpec,
    observed: ObservedResource,
}

#[derive(Debug, Default)]
struct Inner {
    resources: HashMap<(String, ResourceKind, ResourceName), StoredResource>,
    /// Counter backing synthesized public addresses.
    next_address: u8,
}

/// A simulated cloud held in memory.
///
/// - Synthesizes ids, provisioning states and endpoints so every descriptive
///   field of an observed record is populated.
/// - All state is lost on process exit. Suitable for tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn resource_id(group: &ResourceGroup, kind: ResourceKind, name: &ResourceName) -> String {
        format!(
            "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/{}/providers/memory/{}/{}",
            group, kind, name,
        )
    }

    fn observe(
        group: &ResourceGroup,
        name: &ResourceName,
        spec: &ResourceSpec,
        address_slot: u8,
    ) -> ObservedResource {
        let kind = spec.kind();
        let id = Self::resource_id(group, kind, name);
        let (provisioning_state, sku, version, endpoint) = match spec {
            ResourceSpec::DatabaseServer(s) => (
                "Ready".to_string(),
                Some(s.sku.clone()),
                Some(s.version.clone()),
                Some(format!("{}.mysql.local.test", name)),
            ),
            ResourceSpec::PublicAddress(s) => {
                let endpoint = match &s.domain_name_label {
                    Some(label) => format!("{}.{}.local.test", label, s.location),
                    None => format!("198.51.100.{}", address_slot),
                };
                (
                    "Succeeded".to_string(),
                    Some(Sku {
                        name: "Basic".into(),
                        tier: "Regional".into(),
                        family: None,
                        capacity: None,
                    }),
                    None,
                    Some(endpoint),
                )
            }
            ResourceSpec::LoadBalancer(s) => (
                "Succeeded".to_string(),
                Some(Sku {
                    name: s.sku.clone(),
                    tier: s.sku.clone(),
                    family: None,
                    capacity: None,
                }),
                None,
                Some(format!("{}/frontendIPConfigurations/frontend", id)),
            ),
        };

        ObservedResource {
            id,
            name: name.to_string(),
            kind,
            location: spec.location().to_string(),
            provisioning_state,
            sku,
            version,
            endpoint,
            tags: spec.tags().clone(),
            raw: json!({ "simulated": true }),
        }
    }
}

#[async_trait]
impl Provider for MemoryProvider {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ensure_present(
        &self,
        group: &ResourceGroup,
        name: &ResourceName,
        spec: &ResourceSpec,
    ) -> Result<EnsureResult, ProviderError> {
        spec.validate()
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        let mut guard = self.inner.write().await;

        // A load balancer frontend must reference an address that exists.
        if let ResourceSpec::LoadBalancer(lb) = spec {
            let pip_key = (
                group.as_str().to_string(),
                ResourceKind::PublicAddress,
                lb.frontend_public_address.clone(),
            );
            if !guard.resources.contains_key(&pip_key) {
                return Err(ProviderError::Configuration(format!(
                    "load balancer '{}' references unknown public address '{}'",
                    name, lb.frontend_public_address,
                )));
            }
        }

        let key = (group.as_str().to_string(), spec.kind(), name.clone());
        if let Some(existing) = guard.resources.get(&key) {
            if existing.spec == *spec {
                debug!(%group, %name, "MemoryProvider: already in desired state");
                return Ok(EnsureResult {
                    outcome: EnsureOutcome::Unchanged,
                    observed: existing.observed.clone(),
                });
            }
        }

        let existed = guard.resources.contains_key(&key);
        let slot = guard.next_address;
        guard.next_address = guard.next_address.wrapping_add(1);
        let observed = Self::observe(group, name, spec, slot);
        guard.resources.insert(
            key,
            StoredResource {
                spec: spec.clone(),
                observed: observed.clone(),
            },
        );

        let outcome = if existed {
            EnsureOutcome::Updated
        } else {
            EnsureOutcome::Created
        };
        debug!(%group, %name, %outcome, "MemoryProvider: ensure_present");
        Ok(EnsureResult { outcome, observed })
    }

    async fn ensure_absent(
        &self,
        group: &ResourceGroup,
        kind: ResourceKind,
        name: &ResourceName,
    ) -> Result<(), ProviderError> {
        let mut guard = self.inner.write().await;
        let key = (group.as_str().to_string(), kind, name.clone());
        if guard.resources.remove(&key).is_none() {
            debug!(%group, %name, "MemoryProvider: already absent");
        }
        Ok(())
    }

    async fn describe(
        &self,
        group: &ResourceGroup,
        kind: ResourceKind,
        name: Option<&ResourceName>,
        filter: &TagFilter,
    ) -> Result<Facts, ProviderError> {
        let guard = self.inner.read().await;
        let facts = match name {
            Some(name) => {
                let key = (group.as_str().to_string(), kind, name.clone());
                match guard.resources.get(&key) {
                    Some(stored) => Facts::single(stored.observed.clone()),
                    None => Facts::empty(),
                }
            }
            None => Facts::from_records(
                guard
                    .resources
                    .iter()
                    .filter(|((g, k, _), _)| g == group.as_str() && *k == kind)
                    .map(|(_, stored)| stored.observed.clone()),
            ),
        };
        Ok(facts.filtered(filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provar_domain::{AllocationMethod, DatabaseServerSpec, LoadBalancerSpec, ProbeProtocol};
    use std::collections::HashMap;

    fn group() -> ResourceGroup {
        ResourceGroup::new("provar-ci")
    }

    fn db_spec() -> ResourceSpec {
        ResourceSpec::DatabaseServer(DatabaseServerSpec {
            sku: Sku {
                name: "GP_Gen4_2".into(),
                tier: "GeneralPurpose".into(),
                family: Some("Gen4".into()),
                capacity: Some(2),
            },
            version: "5.7".into(),
            storage_mb: 51200,
            admin_username: "zimxyz".into(),
            admin_password: "Testpasswordxyz12!".into(),
            location: "eastus2".into(),
            tags: HashMap::new(),
        })
    }

    fn pip_spec() -> ResourceSpec {
        ResourceSpec::PublicAddress(provar_domain::PublicAddressSpec {
            allocation_method: AllocationMethod::Static,
            domain_name_label: None,
            location: "eastus2".into(),
            tags: HashMap::new(),
        })
    }

    fn lb_spec(frontend: &str) -> ResourceSpec {
        ResourceSpec::LoadBalancer(LoadBalancerSpec {
            frontend_public_address: ResourceName::new(frontend),
            sku: "Basic".into(),
            probe_port: 8080,
            probe_protocol: ProbeProtocol::Tcp,
            frontend_port: 80,
            backend_port: 8080,
            location: "eastus2".into(),
            tags: HashMap::new(),
        })
    }

    #[tokio::test]
    async fn lifecycle_present_then_absent() {
        let provider = MemoryProvider::new();
        let name = ResourceName::new("db1");

        let result = provider
            .ensure_present(&group(), &name, &db_spec())
            .await
            .unwrap();
        assert_eq!(result.outcome, EnsureOutcome::Created);
        assert!(result.observed.missing_fields().is_empty());

        let scoped = provider
            .describe(&group(), ResourceKind::DatabaseServer, Some(&name), &TagFilter::empty())
            .await
            .unwrap();
        assert!(scoped.contains(&name));
        assert!(!scoped.changed);

        provider
            .ensure_absent(&group(), ResourceKind::DatabaseServer, &name)
            .await
            .unwrap();
        let gone = provider
            .describe(&group(), ResourceKind::DatabaseServer, Some(&name), &TagFilter::empty())
            .await
            .unwrap();
        assert!(gone.is_empty());
    }

    #[tokio::test]
    async fn repeated_ensure_with_same_spec_is_unchanged() {
        let provider = MemoryProvider::new();
        let name = ResourceName::new("db1");

        let first = provider
            .ensure_present(&group(), &name, &db_spec())
            .await
            .unwrap();
        let second = provider
            .ensure_present(&group(), &name, &db_spec())
            .await
            .unwrap();
        assert_eq!(second.outcome, EnsureOutcome::Unchanged);
        assert_eq!(first.observed, second.observed);
    }

    #[tokio::test]
    async fn changed_spec_updates_in_place() {
        let provider = MemoryProvider::new();
        let name = ResourceName::new("db1");
        provider
            .ensure_present(&group(), &name, &db_spec())
            .await
            .unwrap();

        let mut changed = db_spec();
        if let ResourceSpec::DatabaseServer(ref mut s) = changed {
            s.storage_mb = 102400;
        }
        let result = provider
            .ensure_present(&group(), &name, &changed)
            .await
            .unwrap();
        assert_eq!(result.outcome, EnsureOutcome::Updated);
    }

    #[tokio::test]
    async fn absent_twice_is_a_no_op() {
        let provider = MemoryProvider::new();
        let name = ResourceName::new("db1");
        provider
            .ensure_present(&group(), &name, &db_spec())
            .await
            .unwrap();
        provider
            .ensure_absent(&group(), ResourceKind::DatabaseServer, &name)
            .await
            .unwrap();
        provider
            .ensure_absent(&group(), ResourceKind::DatabaseServer, &name)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn group_describe_lists_only_matching_kind() {
        let provider = MemoryProvider::new();
        provider
            .ensure_present(&group(), &ResourceName::new("db1"), &db_spec())
            .await
            .unwrap();
        provider
            .ensure_present(&group(), &ResourceName::new("pip1"), &pip_spec())
            .await
            .unwrap();

        let dbs = provider
            .describe(&group(), ResourceKind::DatabaseServer, None, &TagFilter::empty())
            .await
            .unwrap();
        assert_eq!(dbs.resources.len(), 1);
        let record = dbs.get(&ResourceName::new("db1")).unwrap();
        assert_eq!(record.sku.as_ref().map(|s| s.tier.as_str()), Some("GeneralPurpose"));
    }

    #[tokio::test]
    async fn load_balancer_requires_existing_frontend() {
        let provider = MemoryProvider::new();
        let err = provider
            .ensure_present(&group(), &ResourceName::new("lb1"), &lb_spec("missing-pip"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)), "got: {}", err);

        provider
            .ensure_present(&group(), &ResourceName::new("pip1"), &pip_spec())
            .await
            .unwrap();
        let result = provider
            .ensure_present(&group(), &ResourceName::new("lb1"), &lb_spec("pip1"))
            .await
            .unwrap();
        assert_eq!(result.outcome, EnsureOutcome::Created);
    }

    #[tokio::test]
    async fn tag_filter_narrows_group_describe() {
        let provider = MemoryProvider::new();
        let mut tagged = db_spec();
        if let ResourceSpec::DatabaseServer(ref mut s) = tagged {
            s.tags.insert("env".into(), "ci".into());
        }
        provider
            .ensure_present(&group(), &ResourceName::new("db1"), &tagged)
            .await
            .unwrap();
        provider
            .ensure_present(&group(), &ResourceName::new("db2"), &db_spec())
            .await
            .unwrap();

        let filter = TagFilter::parse_terms(["env:ci"]).unwrap();
        let facts = provider
            .describe(&group(), ResourceKind::DatabaseServer, None, &filter)
            .await
            .unwrap();
        assert_eq!(facts.resources.len(), 1);
        assert!(facts.contains(&ResourceName::new("db1")));
    }
}
