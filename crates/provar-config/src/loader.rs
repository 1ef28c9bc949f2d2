use std::collections::HashMap;
use std::path::Path;

use provar_domain::{
    AllocationMethod, DatabaseServerSpec, LoadBalancerSpec, ProbeProtocol, ProviderTarget,
    PublicAddressSpec, ResourceGroup, ResourceName, Sku,
};
use tracing::debug;

use crate::error::ConfigError;
use crate::raw::{RawArm, RawDatabaseServer, RawLoadBalancer, RawScenario, RawSku};

/// Database server parameters as configured; location and tags are applied
/// from the scenario when the full spec is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseServerParams {
    pub sku: Sku,
    pub version: String,
    pub storage_mb: u32,
    pub admin_username: String,
    pub admin_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicAddressParams {
    pub allocation_method: AllocationMethod,
    pub domain_name_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancerParams {
    pub sku: String,
    pub probe_port: u16,
    pub probe_protocol: ProbeProtocol,
    pub frontend_port: u16,
    pub backend_port: u16,
    pub public_address: PublicAddressParams,
}

/// ARM credentials and addressing, passed to the arm provider at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmSettings {
    pub subscription_id: String,
    pub tenant_id: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// A validated scenario: which resources to exercise, where, and through
/// which provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub resource_group: ResourceGroup,
    pub location: String,
    pub provider: ProviderTarget,
    pub seed: Option<u32>,
    pub tags: HashMap<String, String>,
    pub database_server: Option<DatabaseServerParams>,
    pub load_balancer: Option<LoadBalancerParams>,
    pub arm: Option<ArmSettings>,
}

impl Scenario {
    pub fn database_server_spec(&self) -> Option<DatabaseServerSpec> {
        self.database_server.as_ref().map(|p| DatabaseServerSpec {
            sku: p.sku.clone(),
            version: p.version.clone(),
            storage_mb: p.storage_mb,
            admin_username: p.admin_username.clone(),
            admin_password: p.admin_password.clone(),
            location: self.location.clone(),
            tags: self.tags.clone(),
        })
    }

    pub fn public_address_spec(&self) -> Option<PublicAddressSpec> {
        self.load_balancer.as_ref().map(|p| PublicAddressSpec {
            allocation_method: p.public_address.allocation_method,
            domain_name_label: p.public_address.domain_name_label.clone(),
            location: self.location.clone(),
            tags: self.tags.clone(),
        })
    }

    /// The load balancer spec, with its frontend bound to `frontend` — the
    /// public address name is only known once the run's suffix is derived.
    pub fn load_balancer_spec(&self, frontend: &ResourceName) -> Option<LoadBalancerSpec> {
        self.load_balancer.as_ref().map(|p| LoadBalancerSpec {
            frontend_public_address: frontend.clone(),
            sku: p.sku.clone(),
            probe_port: p.probe_port,
            probe_protocol: p.probe_protocol,
            frontend_port: p.frontend_port,
            backend_port: p.backend_port,
            location: self.location.clone(),
            tags: self.tags.clone(),
        })
    }
}

/// Load and validate a scenario file.
pub fn load_scenario(path: &Path) -> Result<Scenario, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let raw: RawScenario = serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
        path: path.display().to_string(),
        source: e,
    })?;
    debug!("Loading scenario from {}", path.display());
    convert_scenario(raw, path)
}

fn convert_scenario(raw: RawScenario, path: &Path) -> Result<Scenario, ConfigError> {
    if raw.resource_group.is_empty() {
        return Err(ConfigError::Conversion {
            path: path.display().to_string(),
            message: "resource_group must be non-empty".into(),
        });
    }
    if raw.location.is_empty() {
        return Err(ConfigError::Conversion {
            path: path.display().to_string(),
            message: "location must be non-empty".into(),
        });
    }

    let provider = match raw.provider.as_deref() {
        None | Some("memory") => ProviderTarget::Memory,
        Some("arm") => ProviderTarget::Arm,
        Some(other) => {
            return Err(ConfigError::Conversion {
                path: path.display().to_string(),
                message: format!("unknown provider target '{}'", other),
            })
        }
    };

    let arm = raw.arm.map(convert_arm);
    if provider == ProviderTarget::Arm && arm.is_none() {
        return Err(ConfigError::Conversion {
            path: path.display().to_string(),
            message: "provider 'arm' requires an `arm:` section".into(),
        });
    }

    let database_server = raw
        .database_server
        .map(|d| convert_database_server(d, path))
        .transpose()?;
    let load_balancer = raw
        .load_balancer
        .map(|l| convert_load_balancer(l, path))
        .transpose()?;

    if database_server.is_none() && load_balancer.is_none() {
        return Err(ConfigError::Conversion {
            path: path.display().to_string(),
            message: "scenario declares neither database_server nor load_balancer".into(),
        });
    }

    Ok(Scenario {
        resource_group: ResourceGroup::new(raw.resource_group),
        location: raw.location,
        provider,
        seed: raw.seed,
        tags: raw.tags,
        database_server,
        load_balancer,
        arm,
    })
}

fn convert_database_server(
    raw: RawDatabaseServer,
    path: &Path,
) -> Result<DatabaseServerParams, ConfigError> {
    if raw.admin_username.is_empty() {
        return Err(ConfigError::Conversion {
            path: path.display().to_string(),
            message: "database_server.admin_username must be non-empty".into(),
        });
    }
    Ok(DatabaseServerParams {
        sku: convert_sku(raw.sku, path)?,
        version: raw.version,
        storage_mb: raw.storage_mb,
        admin_username: raw.admin_username,
        admin_password: raw.admin_password,
    })
}

fn convert_load_balancer(
    raw: RawLoadBalancer,
    path: &Path,
) -> Result<LoadBalancerParams, ConfigError> {
    let probe_protocol = parse_probe_protocol(&raw.probe_protocol, path)?;
    let allocation_method = parse_allocation(&raw.public_address.allocation_method, path)?;
    Ok(LoadBalancerParams {
        sku: raw.sku,
        probe_port: raw.probe_port,
        probe_protocol,
        frontend_port: raw.frontend_port,
        backend_port: raw.backend_port,
        public_address: PublicAddressParams {
            allocation_method,
            domain_name_label: raw.public_address.domain_name_label,
        },
    })
}

fn convert_sku(raw: RawSku, path: &Path) -> Result<Sku, ConfigError> {
    if raw.name.is_empty() || raw.tier.is_empty() {
        return Err(ConfigError::Conversion {
            path: path.display().to_string(),
            message: "sku name and tier must be non-empty".into(),
        });
    }
    Ok(Sku {
        name: raw.name,
        tier: raw.tier,
        family: raw.family,
        capacity: raw.capacity,
    })
}

fn convert_arm(raw: RawArm) -> ArmSettings {
    ArmSettings {
        subscription_id: raw.subscription_id,
        tenant_id: raw.tenant_id,
        client_id: raw.client_id,
        client_secret: raw.client_secret,
    }
}

fn parse_probe_protocol(s: &str, path: &Path) -> Result<ProbeProtocol, ConfigError> {
    match s {
        "tcp" => Ok(ProbeProtocol::Tcp),
        "http" => Ok(ProbeProtocol::Http),
        other => Err(ConfigError::Conversion {
            path: path.display().to_string(),
            message: format!("unknown probe protocol '{}'", other),
        }),
    }
}

fn parse_allocation(s: &str, path: &Path) -> Result<AllocationMethod, ConfigError> {
    match s {
        "static" => Ok(AllocationMethod::Static),
        "dynamic" => Ok(AllocationMethod::Dynamic),
        other => Err(ConfigError::Conversion {
            path: path.display().to_string(),
            message: format!("unknown allocation method '{}'", other),
        }),
    }
}
