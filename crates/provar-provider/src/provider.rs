use async_trait::async_trait;
use provar_domain::{
    Facts, ObservedResource, ResourceGroup, ResourceKind, ResourceName, ResourceSpec, TagFilter,
};

use crate::error::ProviderError;

/// What an ensure-present call did to converge on the desired state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    Updated,
    /// The resource already matched the desired state; nothing was sent.
    Unchanged,
}

impl std::fmt::Display for EnsureOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnsureOutcome::Created => write!(f, "created"),
            EnsureOutcome::Updated => write!(f, "updated"),
            EnsureOutcome::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Result of a successful ensure-present call.
#[derive(Debug, Clone)]
pub struct EnsureResult {
    pub outcome: EnsureOutcome,
    /// The state the resource converged to, as the provider reports it.
    pub observed: ObservedResource,
}

/// The four idempotent verbs every resource kind supports.
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    // ── Mutating ──────────────────────────────────────────────────────────────

    /// Ensure a resource with this name exists and matches `spec`. A second
    /// call with an identical spec is a no-op.
    async fn ensure_present(
        &self,
        group: &ResourceGroup,
        name: &ResourceName,
        spec: &ResourceSpec,
    ) -> Result<EnsureResult, ProviderError>;

    /// Ensure no resource with this name exists afterward. Deleting an
    /// already-absent resource is a no-op, not an error.
    async fn ensure_absent(
        &self,
        group: &ResourceGroup,
        kind: ResourceKind,
        name: &ResourceName,
    ) -> Result<(), ProviderError>;

    // ── Read-only ─────────────────────────────────────────────────────────────

    /// Describe the current state of matching resources. With `name`, scoped
    /// to that single resource — an absent resource yields empty facts, not
    /// an error. Without, every resource of the kind in the group. The tag
    /// filter keeps only records matching all of its terms.
    async fn describe(
        &self,
        group: &ResourceGroup,
        kind: ResourceKind,
        name: Option<&ResourceName>,
        filter: &TagFilter,
    ) -> Result<Facts, ProviderError>;
}
