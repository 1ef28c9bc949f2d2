use std::sync::Arc;

use chrono::{DateTime, Utc};
use provar_domain::{ResourceGroup, ResourceKind, ResourceName};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// One resource this run provisioned and may need to clean up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub group: ResourceGroup,
    pub kind: ResourceKind,
    pub name: ResourceName,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum AuditEvent {
    RunStarted {
        id: Uuid,
        at: DateTime<Utc>,
        dry_run: bool,
    },
    ResourceEnsured {
        id: Uuid,
        at: DateTime<Utc>,
        name: ResourceName,
        outcome: String,
    },
    FactsVerified {
        id: Uuid,
        at: DateTime<Utc>,
        name: ResourceName,
        findings: usize,
    },
    ResourceRemoved {
        id: Uuid,
        at: DateTime<Utc>,
        name: ResourceName,
    },
    RunCompleted {
        id: Uuid,
        at: DateTime<Utc>,
        steps: usize,
        passed: bool,
    },
}

impl AuditEvent {
    pub fn resource_name(&self) -> Option<&ResourceName> {
        match self {
            AuditEvent::ResourceEnsured { name, .. } => Some(name),
            AuditEvent::FactsVerified { name, .. } => Some(name),
            AuditEvent::ResourceRemoved { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<LedgerEntry>,
    events: Vec<AuditEvent>,
}

/// Run-scoped record of provisioned resources plus an audit trail.
///
/// All data is lost on process exit; no resource logically outlives a run.
#[derive(Debug, Clone, Default)]
pub struct RunLedger {
    inner: Arc<RwLock<Inner>>,
}

impl RunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, entry: LedgerEntry) {
        let mut guard = self.inner.write().await;
        if !guard.entries.contains(&entry) {
            guard.entries.push(entry);
        }
    }

    /// Drop an entry once its resource is confirmed gone.
    pub async fn forget(&self, kind: ResourceKind, name: &ResourceName) {
        let mut guard = self.inner.write().await;
        guard.entries.retain(|e| !(e.kind == kind && &e.name == name));
    }

    /// Entries most-recently-provisioned first — teardown order.
    pub async fn entries_newest_first(&self) -> Vec<LedgerEntry> {
        let guard = self.inner.read().await;
        guard.entries.iter().rev().cloned().collect()
    }

    pub async fn append_event(&self, event: AuditEvent) {
        let mut guard = self.inner.write().await;
        guard.events.push(event);
    }

    pub async fn events(&self, name: Option<&ResourceName>, limit: u32) -> Vec<AuditEvent> {
        let guard = self.inner.read().await;
        let filtered: Vec<AuditEvent> = guard
            .events
            .iter()
            .filter(|ev| {
                if let Some(n) = name {
                    ev.resource_name().map_or(false, |en| en == n)
                } else {
                    true
                }
            })
            .cloned()
            .collect();

        let start = filtered.len().saturating_sub(limit as usize);
        filtered[start..].to_vec()
    }
}
