use sha2::{Digest, Sha256};

use crate::types::{ResourceGroup, ResourceKind, ResourceName};

/// Deterministic per-group name prefix: the first 7 hex chars of the group
/// key's hash. Every resource derived for this group carries it, which is
/// what lets a later cleanup pass find leftovers from any earlier run.
pub fn derive_prefix(group: &ResourceGroup) -> String {
    let digest = Sha256::digest(group.as_str().as_bytes());
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex.truncate(7);
    hex
}

/// Collision-avoiding suffix for one run: the deterministic group prefix plus
/// a sub-1000 random component. Stable within a run, fresh across runs. Low
/// collision probability only; not cryptographically secure.
pub fn derive_suffix(group: &ResourceGroup, seed: u32) -> String {
    format!("{}{}", derive_prefix(group), seed % 1000)
}

/// Naming context threaded explicitly through a run — there is no
/// process-global naming state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub group: ResourceGroup,
    pub suffix: String,
}

impl RunContext {
    pub fn derive(group: ResourceGroup, seed: u32) -> Self {
        let suffix = derive_suffix(&group, seed);
        RunContext { group, suffix }
    }

    /// Resource name for a kind under this run's suffix, e.g. `mysqlsrv1a2b3c4d7`.
    pub fn name_for(&self, kind: ResourceKind) -> ResourceName {
        ResourceName::new(format!("{}{}", kind.name_stem(), self.suffix))
    }
}
