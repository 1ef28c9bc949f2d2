use provar_domain::{Facts, ResourceName};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Fatal,
}

/// One violated (or suspicious) property of the observed state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    /// Short property label, e.g. "present-scoped" or "read-only".
    pub property: String,
    pub message: String,
}

impl Finding {
    pub fn fatal(property: impl Into<String>, message: impl Into<String>) -> Self {
        Finding {
            severity: Severity::Fatal,
            property: property.into(),
            message: message.into(),
        }
    }

    pub fn warning(property: impl Into<String>, message: impl Into<String>) -> Self {
        Finding {
            severity: Severity::Warning,
            property: property.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sev = match self.severity {
            Severity::Warning => "warning",
            Severity::Fatal => "FAIL",
        };
        write!(f, "[{}] {}: {}", sev, self.property, self.message)
    }
}

/// After provisioning: both describe forms must include the resource with
/// every descriptive field populated, and neither may report a mutation.
pub fn check_present(name: &ResourceName, scoped: &Facts, group_wide: &Facts) -> Vec<Finding> {
    let mut findings = Vec::new();

    for (facts, scope, property) in [
        (scoped, "scoped", "present-scoped"),
        (group_wide, "group-wide", "present-group"),
    ] {
        match facts.get(name) {
            None => findings.push(Finding::fatal(
                property,
                format!("{} describe does not include '{}'", scope, name),
            )),
            Some(record) => {
                let missing = record.missing_fields();
                if !missing.is_empty() {
                    findings.push(Finding::fatal(
                        property,
                        format!(
                            "{} record for '{}' is missing descriptive fields: {}",
                            scope,
                            name,
                            missing.join(", ")
                        ),
                    ));
                }
            }
        }
        if facts.changed {
            findings.push(Finding::fatal(
                "read-only",
                format!("{} describe of '{}' reported changed == true", scope, name),
            ));
        }
    }

    findings
}

/// After decommissioning: both describe forms must omit the resource.
pub fn check_absent(name: &ResourceName, scoped: &Facts, group_wide: &Facts) -> Vec<Finding> {
    let mut findings = Vec::new();

    if scoped.contains(name) {
        findings.push(Finding::fatal(
            "absent-scoped",
            format!("scoped describe still includes '{}' after removal", name),
        ));
    } else if !scoped.is_empty() {
        findings.push(Finding::warning(
            "absent-scoped",
            format!("scoped describe of absent '{}' returned other records", name),
        ));
    }
    if group_wide.contains(name) {
        findings.push(Finding::fatal(
            "absent-group",
            format!("group-wide describe still includes '{}' after removal", name),
        ));
    }
    for (facts, scope) in [(scoped, "scoped"), (group_wide, "group-wide")] {
        if facts.changed {
            findings.push(Finding::fatal(
                "read-only",
                format!("{} describe of '{}' reported changed == true", scope, name),
            ));
        }
    }

    findings
}

/// A second ensure with the identical payload must be a no-op: same observed
/// state, nothing reported as created or updated.
pub fn check_idempotent_ensure(
    name: &ResourceName,
    first: &provar_provider::EnsureResult,
    second: &provar_provider::EnsureResult,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    if second.outcome != provar_provider::EnsureOutcome::Unchanged {
        findings.push(Finding::fatal(
            "ensure-idempotent",
            format!(
                "second ensure of '{}' reported '{}' instead of a no-op",
                name, second.outcome
            ),
        ));
    }
    if first.observed != second.observed {
        findings.push(Finding::fatal(
            "ensure-idempotent",
            format!("observed state of '{}' drifted across identical ensures", name),
        ));
    }
    findings
}
