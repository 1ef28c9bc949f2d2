use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw YAML representation of a scenario file.
#[derive(Debug, Deserialize, Serialize)]
pub struct RawScenario {
    pub resource_group: String,
    pub location: String,
    /// Optional provider target; absent means the in-memory provider.
    pub provider: Option<String>,
    /// Optional naming seed; absent means a fresh random seed per run.
    pub seed: Option<u32>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    pub database_server: Option<RawDatabaseServer>,
    pub load_balancer: Option<RawLoadBalancer>,
    pub arm: Option<RawArm>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RawSku {
    pub name: String,
    pub tier: String,
    pub family: Option<String>,
    pub capacity: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RawDatabaseServer {
    pub sku: RawSku,
    pub version: String,
    #[serde(default = "default_storage_mb")]
    pub storage_mb: u32,
    pub admin_username: String,
    pub admin_password: String,
}

fn default_storage_mb() -> u32 {
    51200
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RawLoadBalancer {
    #[serde(default = "default_lb_sku")]
    pub sku: String,
    pub probe_port: u16,
    #[serde(default = "default_probe_protocol")]
    pub probe_protocol: String,
    pub frontend_port: u16,
    pub backend_port: u16,
    #[serde(default)]
    pub public_address: RawPublicAddress,
}

fn default_lb_sku() -> String {
    "Basic".to_string()
}

fn default_probe_protocol() -> String {
    "tcp".to_string()
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RawPublicAddress {
    #[serde(default = "default_allocation")]
    pub allocation_method: String,
    pub domain_name_label: Option<String>,
}

impl Default for RawPublicAddress {
    fn default() -> Self {
        RawPublicAddress {
            allocation_method: default_allocation(),
            domain_name_label: None,
        }
    }
}

fn default_allocation() -> String {
    "static".to_string()
}

/// ARM credentials and addressing. Required when `provider: arm`.
#[derive(Debug, Deserialize, Serialize)]
pub struct RawArm {
    pub subscription_id: String,
    pub tenant_id: String,
    /// Optional; absent falls back to env vars, IMDS, then the az CLI.
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}
