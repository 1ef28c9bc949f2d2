pub mod error;
pub mod naming;
pub mod types;

mod tests;

pub use error::DomainError;
pub use naming::{derive_prefix, derive_suffix, RunContext};
pub use types::{
    AllocationMethod, DatabaseServerSpec, Facts, LoadBalancerSpec, ObservedResource,
    ProbeProtocol, ProviderTarget, PublicAddressSpec, ResourceGroup, ResourceKind, ResourceName,
    ResourceSpec, Sku, TagFilter, TagTerm,
};
