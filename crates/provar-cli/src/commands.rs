use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use provar_config::Scenario;
use provar_domain::{ProviderTarget, ResourceKind, ResourceName, TagFilter};
use provar_provider::{ArmProvider, ArmProviderConfig, MemoryProvider, Provider, ProviderRegistry};
use provar_runner::{FlowSelection, RunRequest};

use crate::cli::{FlowArg, KindArg, OutputArg};
use crate::output;

// ── Run ───────────────────────────────────────────────────────────────────────

pub async fn run(scenario_path: &Path, flow: FlowArg, keep: bool, format: OutputArg) -> Result<()> {
    let scenario = load(scenario_path)?;
    let provider = build_provider(&scenario)?;

    let req = RunRequest {
        scenario,
        flow: flow_selection(flow),
        dry_run: false,
        keep,
    };
    let report = provar_runner::run(req, provider).await?;

    match format {
        OutputArg::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputArg::Text => print!("{}", output::render_report(&report)),
    }

    if !report.passed() {
        let fatal = report
            .findings
            .iter()
            .filter(|f| f.severity == provar_runner::Severity::Fatal)
            .count();
        anyhow::bail!("verification failed with {} fatal finding(s)", fatal);
    }
    Ok(())
}

// ── Diff ──────────────────────────────────────────────────────────────────────

pub async fn diff(scenario_path: &Path) -> Result<()> {
    let scenario = load(scenario_path)?;
    let provider = build_provider(&scenario)?;

    let req = RunRequest {
        scenario,
        flow: FlowSelection::All,
        dry_run: true,
        keep: false,
    };
    let report = provar_runner::run(req, provider).await?;
    print!("{}", output::render_report(&report));
    Ok(())
}

// ── Facts ─────────────────────────────────────────────────────────────────────

pub async fn facts(
    scenario_path: &Path,
    kind: KindArg,
    name: Option<String>,
    tags: Vec<String>,
    format: OutputArg,
) -> Result<()> {
    let scenario = load(scenario_path)?;
    let provider = build_provider(&scenario)?;

    let filter = TagFilter::parse_terms(tags.iter().map(String::as_str))
        .context("invalid --tag filter")?;
    let name = name.map(ResourceName::new);

    let kinds: Vec<ResourceKind> = match kind {
        KindArg::All => vec![
            ResourceKind::DatabaseServer,
            ResourceKind::PublicAddress,
            ResourceKind::LoadBalancer,
        ],
        KindArg::DatabaseServer => vec![ResourceKind::DatabaseServer],
        KindArg::PublicAddress => vec![ResourceKind::PublicAddress],
        KindArg::LoadBalancer => vec![ResourceKind::LoadBalancer],
    };

    let mut sections = Vec::new();
    for kind in kinds {
        let facts = provider
            .describe(&scenario.resource_group, kind, name.as_ref(), &filter)
            .await?;
        sections.push((kind, facts));
    }

    match format {
        OutputArg::Json => {
            let body: serde_json::Map<String, serde_json::Value> = sections
                .iter()
                .map(|(kind, facts)| Ok((kind.to_string(), serde_json::to_value(facts)?)))
                .collect::<Result<_>>()?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputArg::Text => print!("{}", output::render_facts(&sections)),
    }
    Ok(())
}

// ── Destroy ───────────────────────────────────────────────────────────────────

pub async fn destroy(scenario_path: &Path, yes: bool) -> Result<()> {
    let scenario = load(scenario_path)?;
    if !yes {
        anyhow::bail!(
            "this removes every provar-derived resource in group '{}'; re-run with --yes to confirm",
            scenario.resource_group,
        );
    }
    let provider = build_provider(&scenario)?;

    let report = provar_runner::destroy(&scenario, provider).await?;
    print!("{}", output::render_destroy(&report));

    if !report.failures.is_empty() {
        anyhow::bail!("{} resource(s) could not be removed", report.failures.len());
    }
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn load(path: &Path) -> Result<Scenario> {
    provar_config::load_scenario(path)
        .with_context(|| format!("failed to load scenario {}", path.display()))
}

fn flow_selection(flow: FlowArg) -> FlowSelection {
    match flow {
        FlowArg::All => FlowSelection::All,
        FlowArg::Db => FlowSelection::DatabaseServer,
        FlowArg::Lb => FlowSelection::LoadBalancer,
    }
}

/// Build the provider registry for a scenario and resolve its target.
/// The memory provider is always registered; the arm provider only when the
/// scenario carries an `arm:` section.
fn build_provider(scenario: &Scenario) -> Result<Arc<dyn Provider>> {
    let mut registry = ProviderRegistry::new(ProviderTarget::Memory);
    registry.register(ProviderTarget::Memory, Arc::new(MemoryProvider::new()));

    if let Some(arm) = &scenario.arm {
        let config = ArmProviderConfig {
            subscription_id: arm.subscription_id.clone(),
            tenant_id: arm.tenant_id.clone(),
            client_id: arm.client_id.clone(),
            client_secret: arm.client_secret.clone(),
        };
        let provider = ArmProvider::new(config).context("failed to initialise arm provider")?;
        registry.register(ProviderTarget::Arm, Arc::new(provider));
    }

    Ok(registry.resolve(Some(scenario.provider))?)
}
