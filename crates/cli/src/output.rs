use std::fmt::Write as _;
use svc_aggregator::{AggregateSummary, HistorySummary};
use svc_auditor::DiscrepancyReport;
use svc_facts::{Catalog, Period};
use svc_store::{AmendOutcome, ResyncSummary};

pub fn render_catalog(catalog: &Catalog) -> String {
    let mut out = String::new();
    for entry in catalog.all() {
        let _ = writeln!(
            out,
            "{:<22} {:<24} {} / {}",
            entry.code.as_str(),
            entry.display_name,
            entry.code.requested_column(),
            entry.code.provided_column()
        );
    }
    out.trim_end().to_string()
}

pub fn render_aggregate(summary: &AggregateSummary) -> String {
    let mut out = format!(
        "Aggregated {}: {} contact(s) across {} period(s), {} row(s) for {} service(s) in {}ms",
        summary.scope,
        summary.contacts,
        summary.periods,
        summary.rows_written,
        summary.services_processed,
        summary.time_ms
    );
    if summary.is_partial() {
        let _ = write!(out, "\nPARTIAL: {} service(s) failed", summary.failures.len());
        for failure in &summary.failures {
            let _ = write!(out, "\n  - {}: {}", failure.service_name, failure.error);
        }
    }
    out
}

pub fn render_plan(plan: &[Period]) -> String {
    if plan.is_empty() {
        return "No contacts; nothing to aggregate".to_string();
    }
    let mut out = format!("Would aggregate {} month(s):", plan.len());
    for period in plan {
        let _ = write!(out, "\n  {period}");
    }
    out
}

pub fn render_history(history: &HistorySummary) -> String {
    let mut out = format!(
        "Historical sweep: {} month(s) succeeded, {} failed, {} row(s) in {}ms",
        history.successful_months, history.failed_months, history.total_rows, history.time_ms
    );
    for month in history.months.iter().filter(|m| !m.succeeded()) {
        match &month.error {
            Some(error) => {
                let _ = write!(out, "\n  - {}: {error}", month.period);
            }
            None => {
                let _ = write!(
                    out,
                    "\n  - {}: {} service(s) failed",
                    month.period, month.failed_services
                );
            }
        }
    }
    out
}

pub fn render_amend(outcome: &AmendOutcome) -> String {
    let mut out = format!("Contact {} updated", outcome.record.id);
    let lists = [
        ("requested +", &outcome.requested_added),
        ("requested -", &outcome.requested_removed),
        ("provided +", &outcome.provided_added),
        ("provided -", &outcome.provided_removed),
    ];
    for (label, names) in lists {
        if !names.is_empty() {
            let _ = write!(out, "\n  {label} {}", names.join(", "));
        }
    }
    if outcome.flag_changes.is_empty() {
        out.push_str("\n  flags unchanged");
    }
    for change in &outcome.flag_changes {
        let _ = write!(
            out,
            "\n  {}: {} -> {}",
            change.column, change.before, change.after
        );
    }
    out
}

pub fn render_resync(summary: &ResyncSummary) -> String {
    format!(
        "Re-synchronized {} of {} contact(s)",
        summary.contacts_changed, summary.contacts_scanned
    )
}

/// Console summary of an audit: counts per discrepancy class and recommendations
pub fn render_audit(report: &DiscrepancyReport) -> String {
    let counts = report.counts();
    let mut out = format!(
        "Audited {} contact(s) and {} summary row(s)\n\
         unexpected service names: {}\n\
         integer without summary:  {}\n\
         list without flag:        {}\n\
         flag without list:        {}\n\
         provided without request: {}",
        report.contacts_scanned,
        report.summary_rows,
        counts.unexpected_services,
        counts.integer_without_summary,
        counts.list_without_flag,
        counts.flag_without_list,
        counts.provided_without_request
    );
    if report.is_clean() {
        out.push_str("\nNo discrepancies found");
    } else {
        out.push_str("\nRecommended actions:");
        for (i, rec) in report.recommendations.iter().enumerate() {
            let _ = write!(out, "\n  {}. {rec}", i + 1);
        }
    }
    out
}
