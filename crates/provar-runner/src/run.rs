use std::sync::Arc;

use chrono::Utc;
use provar_config::Scenario;
use provar_domain::{
    derive_prefix, ResourceKind, ResourceName, ResourceSpec, RunContext, TagFilter,
};
use provar_provider::Provider;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::RunError;
use crate::ledger::{AuditEvent, LedgerEntry, RunLedger};
use crate::report::{DestroyReport, RunRequest, RunReport, Step};
use crate::verify::{self, Finding};

/// Seed for the run's naming suffix when the scenario pins none.
fn random_seed() -> u32 {
    let bytes = Uuid::new_v4().into_bytes();
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Execute the selected flows: derive names, ensure resources, observe and
/// verify facts, then decommission (unless the request keeps them).
pub async fn run(req: RunRequest, provider: Arc<dyn Provider>) -> Result<RunReport, RunError> {
    let scenario = &req.scenario;
    let seed = scenario.seed.unwrap_or_else(random_seed);
    let ctx = RunContext::derive(scenario.resource_group.clone(), seed);
    let mut report = RunReport::new(req.dry_run, ctx.suffix.clone());

    info!(group = %ctx.group, suffix = %ctx.suffix, provider = provider.name(), "starting run");

    let run_db = req.flow.includes_database_server() && scenario.database_server.is_some();
    let run_lb = req.flow.includes_load_balancer() && scenario.load_balancer.is_some();

    if req.dry_run {
        if run_db {
            report.steps.push(Step::NameDerived {
                kind: ResourceKind::DatabaseServer,
                name: ctx.name_for(ResourceKind::DatabaseServer),
            });
        }
        if run_lb {
            report.steps.push(Step::NameDerived {
                kind: ResourceKind::PublicAddress,
                name: ctx.name_for(ResourceKind::PublicAddress),
            });
            report.steps.push(Step::NameDerived {
                kind: ResourceKind::LoadBalancer,
                name: ctx.name_for(ResourceKind::LoadBalancer),
            });
        }
        info!("dry run — skipping provisioning");
        return Ok(report);
    }

    let ledger = RunLedger::new();
    let run_id = Uuid::new_v4();
    ledger
        .append_event(AuditEvent::RunStarted {
            id: run_id,
            at: Utc::now(),
            dry_run: false,
        })
        .await;

    if run_db {
        database_server_flow(scenario, &ctx, &provider, &ledger, &mut report).await?;
    }
    if run_lb {
        load_balancer_flow(scenario, &ctx, &provider, &ledger, &mut report).await?;
    }

    if !req.keep {
        decommission_all(&provider, &ledger, &mut report).await?;
    }

    ledger
        .append_event(AuditEvent::RunCompleted {
            id: run_id,
            at: Utc::now(),
            steps: report.steps.len(),
            passed: report.passed(),
        })
        .await;
    report.events = ledger.events(None, u32::MAX).await;

    info!(
        steps = report.steps.len(),
        findings = report.findings.len(),
        passed = report.passed(),
        "run complete"
    );
    Ok(report)
}

async fn database_server_flow(
    scenario: &Scenario,
    ctx: &RunContext,
    provider: &Arc<dyn Provider>,
    ledger: &RunLedger,
    report: &mut RunReport,
) -> Result<(), RunError> {
    let spec = match scenario.database_server_spec() {
        Some(s) => ResourceSpec::DatabaseServer(s),
        None => return Ok(()),
    };
    let name = ctx.name_for(ResourceKind::DatabaseServer);
    provision_and_observe(provider, ledger, report, ctx, &name, &spec).await
}

async fn load_balancer_flow(
    scenario: &Scenario,
    ctx: &RunContext,
    provider: &Arc<dyn Provider>,
    ledger: &RunLedger,
    report: &mut RunReport,
) -> Result<(), RunError> {
    let pip_spec = match scenario.public_address_spec() {
        Some(s) => ResourceSpec::PublicAddress(s),
        None => return Ok(()),
    };
    let pip_name = ctx.name_for(ResourceKind::PublicAddress);
    provision_and_observe(provider, ledger, report, ctx, &pip_name, &pip_spec).await?;

    let lb_spec = match scenario.load_balancer_spec(&pip_name) {
        Some(s) => ResourceSpec::LoadBalancer(s),
        None => return Ok(()),
    };
    let lb_name = ctx.name_for(ResourceKind::LoadBalancer);
    provision_and_observe(provider, ledger, report, ctx, &lb_name, &lb_spec).await
}

/// Provisioning and observation phases for one resource: ensure it, re-apply
/// the identical payload (must be a no-op), then verify both describe scopes.
async fn provision_and_observe(
    provider: &Arc<dyn Provider>,
    ledger: &RunLedger,
    report: &mut RunReport,
    ctx: &RunContext,
    name: &ResourceName,
    spec: &ResourceSpec,
) -> Result<(), RunError> {
    let kind = spec.kind();
    let group = &ctx.group;

    report.steps.push(Step::NameDerived {
        kind,
        name: name.clone(),
    });

    let first = provider
        .ensure_present(group, name, spec)
        .await
        .map_err(|e| RunError::provider("provisioning", name.as_str(), e))?;
    info!(%name, %kind, outcome = %first.outcome, "resource ensured");
    ledger
        .record(LedgerEntry {
            group: group.clone(),
            kind,
            name: name.clone(),
        })
        .await;
    ledger
        .append_event(AuditEvent::ResourceEnsured {
            id: Uuid::new_v4(),
            at: Utc::now(),
            name: name.clone(),
            outcome: first.outcome.to_string(),
        })
        .await;
    report.steps.push(Step::ResourceEnsured {
        kind,
        name: name.clone(),
        outcome: first.outcome.to_string(),
    });

    let second = provider
        .ensure_present(group, name, spec)
        .await
        .map_err(|e| RunError::provider("provisioning", name.as_str(), e))?;
    report
        .findings
        .extend(verify::check_idempotent_ensure(name, &first, &second));

    let scoped = provider
        .describe(group, kind, Some(name), &TagFilter::empty())
        .await
        .map_err(|e| RunError::provider("observation", name.as_str(), e))?;
    report.steps.push(Step::FactsObserved {
        kind,
        name: Some(name.clone()),
        resources: scoped.resources.len(),
    });
    let group_wide = provider
        .describe(group, kind, None, &TagFilter::empty())
        .await
        .map_err(|e| RunError::provider("observation", group.as_str(), e))?;
    report.steps.push(Step::FactsObserved {
        kind,
        name: None,
        resources: group_wide.resources.len(),
    });

    let findings = verify::check_present(name, &scoped, &group_wide);
    ledger
        .append_event(AuditEvent::FactsVerified {
            id: Uuid::new_v4(),
            at: Utc::now(),
            name: name.clone(),
            findings: findings.len(),
        })
        .await;
    report.findings.extend(findings);
    Ok(())
}

/// Decommissioning phase: replay the ledger newest-first, so dependents go
/// before the resources they reference. Each removal is re-issued once (an
/// absent resource must delete as a no-op) and re-observed in both scopes.
async fn decommission_all(
    provider: &Arc<dyn Provider>,
    ledger: &RunLedger,
    report: &mut RunReport,
) -> Result<(), RunError> {
    for entry in ledger.entries_newest_first().await {
        let LedgerEntry { group, kind, name } = entry;

        provider
            .ensure_absent(&group, kind, &name)
            .await
            .map_err(|e| RunError::provider("decommissioning", name.as_str(), e))?;
        info!(%name, %kind, "resource removed");
        ledger
            .append_event(AuditEvent::ResourceRemoved {
                id: Uuid::new_v4(),
                at: Utc::now(),
                name: name.clone(),
            })
            .await;
        report.steps.push(Step::ResourceRemoved {
            kind,
            name: name.clone(),
        });

        if let Err(e) = provider.ensure_absent(&group, kind, &name).await {
            report.findings.push(Finding::fatal(
                "absent-idempotent",
                format!("second removal of '{}' errored: {}", name, e),
            ));
        }

        let scoped = provider
            .describe(&group, kind, Some(&name), &TagFilter::empty())
            .await
            .map_err(|e| RunError::provider("observation", name.as_str(), e))?;
        let group_wide = provider
            .describe(&group, kind, None, &TagFilter::empty())
            .await
            .map_err(|e| RunError::provider("observation", group.as_str(), e))?;
        report
            .findings
            .extend(verify::check_absent(&name, &scoped, &group_wide));

        ledger.forget(kind, &name).await;
    }
    Ok(())
}

/// Best-effort bulk cleanup: remove every resource in the group whose name
/// carries the group's deterministic prefix — leftovers from any prior run.
/// Failures are logged and skipped, not propagated.
pub async fn destroy(
    scenario: &Scenario,
    provider: Arc<dyn Provider>,
) -> Result<DestroyReport, RunError> {
    let group = scenario.resource_group.clone();
    let prefix = derive_prefix(&group);
    let mut report = DestroyReport::default();

    // Load balancers reference public addresses; remove dependents first.
    for kind in [
        ResourceKind::LoadBalancer,
        ResourceKind::PublicAddress,
        ResourceKind::DatabaseServer,
    ] {
        let facts = provider
            .describe(&group, kind, None, &TagFilter::empty())
            .await
            .map_err(|e| RunError::provider("decommissioning", group.as_str(), e))?;
        for name in facts.resources.keys() {
            if !name.as_str().contains(&prefix) {
                continue;
            }
            match provider.ensure_absent(&group, kind, name).await {
                Ok(()) => {
                    info!(%name, %kind, "leftover removed");
                    report.removed.push((kind, name.clone()));
                }
                Err(e) => {
                    warn!(%name, %kind, error = %e, "leftover removal failed, continuing");
                    report.failures.push(format!("{} {}: {}", kind, name, e));
                }
            }
        }
    }
    Ok(report)
}
