use provar_domain::{Facts, ResourceKind};
use provar_runner::{DestroyReport, RunReport, Severity, Step};

/// Render a run report as human-readable text.
pub fn render_report(report: &RunReport) -> String {
    let mut out = String::new();

    if report.dry_run {
        out.push_str(&format!("Dry run — suffix {}\n", report.suffix));
    } else {
        out.push_str(&format!("Run — suffix {}\n", report.suffix));
    }

    for step in &report.steps {
        let line = match step {
            Step::NameDerived { kind, name } => format!("  name {} ({})", name, kind),
            Step::ResourceEnsured { kind, name, outcome } => {
                format!("+ {} {} [{}]", kind, name, outcome)
            }
            Step::FactsObserved { kind, name, resources } => match name {
                Some(name) => format!("  ? {} {} -> {} record(s)", kind, name, resources),
                None => format!("  ? {} group-wide -> {} record(s)", kind, resources),
            },
            Step::ResourceRemoved { kind, name } => format!("- {} {}", kind, name),
        };
        out.push_str(&line);
        out.push('\n');
    }

    for finding in &report.findings {
        out.push_str(&format!("  {}\n", finding));
    }

    if report.dry_run {
        out.push_str("No changes applied.\n");
    } else if report.passed() {
        out.push_str("All properties verified.\n");
    } else {
        let fatal = report
            .findings
            .iter()
            .filter(|f| f.severity == Severity::Fatal)
            .count();
        out.push_str(&format!("FAILED: {} fatal finding(s).\n", fatal));
    }
    out
}

/// Render per-kind facts sections as human-readable text.
pub fn render_facts(sections: &[(ResourceKind, Facts)]) -> String {
    let mut out = String::new();
    for (kind, facts) in sections {
        out.push_str(&format!("{}:\n", kind));
        if facts.is_empty() {
            out.push_str("  (none)\n");
            continue;
        }
        for (name, record) in &facts.resources {
            out.push_str(&format!(
                "  {} [{}] {}",
                name, record.provisioning_state, record.location
            ));
            if let Some(sku) = &record.sku {
                out.push_str(&format!(" sku={}/{}", sku.name, sku.tier));
            }
            if let Some(version) = &record.version {
                out.push_str(&format!(" version={}", version));
            }
            if let Some(endpoint) = &record.endpoint {
                out.push_str(&format!(" endpoint={}", endpoint));
            }
            out.push('\n');
        }
    }
    out
}

/// Render a destroy report as human-readable text.
pub fn render_destroy(report: &DestroyReport) -> String {
    let mut out = String::new();
    for (kind, name) in &report.removed {
        out.push_str(&format!("- {} {}\n", kind, name));
    }
    for failure in &report.failures {
        out.push_str(&format!("  ! {}\n", failure));
    }
    out.push_str(&format!(
        "{} removed, {} failure(s).\n",
        report.removed.len(),
        report.failures.len()
    ));
    out
}
