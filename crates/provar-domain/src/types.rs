use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ── Identifiers ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceGroup(pub String);

impl ResourceGroup {
    pub fn new(s: impl Into<String>) -> Self {
        ResourceGroup(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceName(pub String);

impl ResourceName {
    pub fn new(s: impl Into<String>) -> Self {
        ResourceName(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Enums ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    DatabaseServer,
    PublicAddress,
    LoadBalancer,
}

impl ResourceKind {
    /// The name stem a derived resource name starts with for this kind.
    pub fn name_stem(&self) -> &'static str {
        match self {
            ResourceKind::DatabaseServer => "mysqlsrv",
            ResourceKind::PublicAddress => "pip",
            ResourceKind::LoadBalancer => "lb",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::DatabaseServer => write!(f, "database_server"),
            ResourceKind::PublicAddress => write!(f, "public_address"),
            ResourceKind::LoadBalancer => write!(f, "load_balancer"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTarget {
    Arm,
    Memory,
}

impl std::fmt::Display for ProviderTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderTarget::Arm => write!(f, "arm"),
            ProviderTarget::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationMethod {
    Static,
    Dynamic,
}

impl std::fmt::Display for AllocationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocationMethod::Static => write!(f, "Static"),
            AllocationMethod::Dynamic => write!(f, "Dynamic"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeProtocol {
    Tcp,
    Http,
}

impl std::fmt::Display for ProbeProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeProtocol::Tcp => write!(f, "Tcp"),
            ProbeProtocol::Http => write!(f, "Http"),
        }
    }
}

// ── Desired state ─────────────────────────────────────────────────────────────

/// Provider SKU: service level plus sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sku {
    pub name: String,
    pub tier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseServerSpec {
    pub sku: Sku,
    /// Engine version, e.g. "5.7".
    pub version: String,
    pub storage_mb: u32,
    pub admin_username: String,
    pub admin_password: String,
    pub location: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicAddressSpec {
    pub allocation_method: AllocationMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_name_label: Option<String>,
    pub location: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerSpec {
    /// Public address the frontend IP configuration binds to.
    pub frontend_public_address: ResourceName,
    pub sku: String,
    pub probe_port: u16,
    pub probe_protocol: ProbeProtocol,
    pub frontend_port: u16,
    pub backend_port: u16,
    pub location: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

/// Desired state for one managed resource, one variant per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceSpec {
    DatabaseServer(DatabaseServerSpec),
    PublicAddress(PublicAddressSpec),
    LoadBalancer(LoadBalancerSpec),
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::DatabaseServer(_) => ResourceKind::DatabaseServer,
            ResourceSpec::PublicAddress(_) => ResourceKind::PublicAddress,
            ResourceSpec::LoadBalancer(_) => ResourceKind::LoadBalancer,
        }
    }

    pub fn location(&self) -> &str {
        match self {
            ResourceSpec::DatabaseServer(s) => &s.location,
            ResourceSpec::PublicAddress(s) => &s.location,
            ResourceSpec::LoadBalancer(s) => &s.location,
        }
    }

    pub fn tags(&self) -> &HashMap<String, String> {
        match self {
            ResourceSpec::DatabaseServer(s) => &s.tags,
            ResourceSpec::PublicAddress(s) => &s.tags,
            ResourceSpec::LoadBalancer(s) => &s.tags,
        }
    }

    /// Reject payloads a provider would refuse, before any call is made.
    pub fn validate(&self) -> Result<(), crate::error::DomainError> {
        use crate::error::DomainError;
        match self {
            ResourceSpec::DatabaseServer(s) => {
                if s.sku.name.is_empty() || s.sku.tier.is_empty() {
                    return Err(DomainError::InvalidSpec {
                        kind: self.kind(),
                        message: "sku name and tier must be non-empty".into(),
                    });
                }
                if s.admin_username.is_empty() {
                    return Err(DomainError::InvalidSpec {
                        kind: self.kind(),
                        message: "admin_username must be non-empty".into(),
                    });
                }
                if s.storage_mb == 0 {
                    return Err(DomainError::InvalidSpec {
                        kind: self.kind(),
                        message: "storage_mb must be greater than zero".into(),
                    });
                }
                Ok(())
            }
            ResourceSpec::PublicAddress(_) => Ok(()),
            ResourceSpec::LoadBalancer(s) => {
                if s.frontend_public_address.as_str().is_empty() {
                    return Err(DomainError::InvalidSpec {
                        kind: self.kind(),
                        message: "frontend_public_address must be non-empty".into(),
                    });
                }
                if s.probe_port == 0 || s.frontend_port == 0 || s.backend_port == 0 {
                    return Err(DomainError::InvalidSpec {
                        kind: self.kind(),
                        message: "probe, frontend and backend ports must be non-zero".into(),
                    });
                }
                Ok(())
            }
        }
    }
}

// ── Observed state ────────────────────────────────────────────────────────────

/// Read-only snapshot of one resource as the provider reports it right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedResource {
    /// Provider-assigned resource id.
    pub id: String,
    pub name: String,
    pub kind: ResourceKind,
    pub location: String,
    /// Provider visibility / provisioning status, e.g. "Succeeded" or "Ready".
    pub provisioning_state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<Sku>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Connection endpoint: FQDN for a database server, address for a public
    /// IP, frontend configuration id for a load balancer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Full provider payload, stored opaquely for debugging.
    pub raw: serde_json::Value,
}

impl ObservedResource {
    /// Descriptive fields a complete record must populate for this kind.
    /// Returns the names of the ones that are missing or empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.id.is_empty() {
            missing.push("id");
        }
        if self.location.is_empty() {
            missing.push("location");
        }
        if self.provisioning_state.is_empty() {
            missing.push("provisioning_state");
        }
        if self.sku.is_none() {
            missing.push("sku");
        }
        if self.endpoint.is_none() {
            missing.push("endpoint");
        }
        if self.kind == ResourceKind::DatabaseServer && self.version.is_none() {
            missing.push("version");
        }
        missing
    }

    pub fn matches_tags(&self, filter: &TagFilter) -> bool {
        filter.matches(&self.tags)
    }
}

/// Result of a describe call: observed records keyed by resource name.
///
/// `changed` reports whether the query mutated anything; a describe is a pure
/// read, so it is always false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facts {
    pub resources: BTreeMap<ResourceName, ObservedResource>,
    pub changed: bool,
}

impl Facts {
    pub fn empty() -> Self {
        Facts {
            resources: BTreeMap::new(),
            changed: false,
        }
    }

    pub fn single(observed: ObservedResource) -> Self {
        let mut resources = BTreeMap::new();
        resources.insert(ResourceName::new(observed.name.clone()), observed);
        Facts {
            resources,
            changed: false,
        }
    }

    pub fn from_records(records: impl IntoIterator<Item = ObservedResource>) -> Self {
        let resources = records
            .into_iter()
            .map(|r| (ResourceName::new(r.name.clone()), r))
            .collect();
        Facts {
            resources,
            changed: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn contains(&self, name: &ResourceName) -> bool {
        self.resources.contains_key(name)
    }

    pub fn get(&self, name: &ResourceName) -> Option<&ObservedResource> {
        self.resources.get(name)
    }

    /// Keep only records whose tags match every term of the filter.
    pub fn filtered(self, filter: &TagFilter) -> Self {
        if filter.is_empty() {
            return self;
        }
        Facts {
            resources: self
                .resources
                .into_iter()
                .filter(|(_, r)| r.matches_tags(filter))
                .collect(),
            changed: false,
        }
    }
}

// ── Tag filter ────────────────────────────────────────────────────────────────

/// One `key` or `key:value` term of a tag filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagTerm {
    pub key: String,
    pub value: Option<String>,
}

impl TagTerm {
    /// Parse a `key` or `key:value` term.
    pub fn parse(raw: &str) -> Result<Self, crate::error::DomainError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(crate::error::DomainError::InvalidTagTerm(raw.to_string()));
        }
        match raw.split_once(':') {
            Some((key, value)) if !key.is_empty() => Ok(TagTerm {
                key: key.to_string(),
                value: Some(value.to_string()),
            }),
            Some(_) => Err(crate::error::DomainError::InvalidTagTerm(raw.to_string())),
            None => Ok(TagTerm {
                key: raw.to_string(),
                value: None,
            }),
        }
    }
}

/// All terms must match for a resource to pass the filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter(pub Vec<TagTerm>);

impl TagFilter {
    pub fn empty() -> Self {
        TagFilter(Vec::new())
    }

    pub fn parse_terms<'a>(
        raw: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, crate::error::DomainError> {
        let terms = raw
            .into_iter()
            .map(TagTerm::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TagFilter(terms))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, tags: &HashMap<String, String>) -> bool {
        self.0.iter().all(|term| match tags.get(&term.key) {
            Some(v) => term.value.as_deref().map_or(true, |want| want == v),
            None => false,
        })
    }
}
