use provar_config::Scenario;
use provar_domain::{ResourceKind, ResourceName};
use serde::{Deserialize, Serialize};

use crate::ledger::AuditEvent;
use crate::verify::{Finding, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowSelection {
    All,
    DatabaseServer,
    LoadBalancer,
}

impl FlowSelection {
    pub fn includes_database_server(&self) -> bool {
        matches!(self, FlowSelection::All | FlowSelection::DatabaseServer)
    }

    pub fn includes_load_balancer(&self) -> bool {
        matches!(self, FlowSelection::All | FlowSelection::LoadBalancer)
    }
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub scenario: Scenario,
    pub flow: FlowSelection,
    pub dry_run: bool,
    /// Leave resources in place after verification (skip decommissioning).
    pub keep: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step")]
pub enum Step {
    NameDerived {
        kind: ResourceKind,
        name: ResourceName,
    },
    ResourceEnsured {
        kind: ResourceKind,
        name: ResourceName,
        outcome: String,
    },
    FactsObserved {
        kind: ResourceKind,
        /// None for a group-wide describe.
        name: Option<ResourceName>,
        resources: usize,
    },
    ResourceRemoved {
        kind: ResourceKind,
        name: ResourceName,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub dry_run: bool,
    /// The naming suffix every resource of this run carries.
    pub suffix: String,
    pub steps: Vec<Step>,
    pub findings: Vec<Finding>,
    /// Audit trail of the run, oldest first.
    pub events: Vec<AuditEvent>,
}

impl RunReport {
    pub fn new(dry_run: bool, suffix: impl Into<String>) -> Self {
        Self {
            dry_run,
            suffix: suffix.into(),
            steps: Vec::new(),
            findings: Vec::new(),
            events: Vec::new(),
        }
    }

    /// A run passes when no finding is fatal.
    pub fn passed(&self) -> bool {
        self.findings.iter().all(|f| f.severity != Severity::Fatal)
    }
}

/// Best-effort bulk cleanup outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DestroyReport {
    pub removed: Vec<(ResourceKind, ResourceName)>,
    pub failures: Vec<String>,
}
