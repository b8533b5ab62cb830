use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use svc_facts::{Period, ServiceCode, ServiceTotals, Side};
use svc_store::ContactId;

/// Flag-derived totals for one catalog entry across every contact
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServiceFlagAnalysis {
    pub service: ServiceCode,
    pub service_name: String,
    pub requested_count: u64,
    pub provided_count: u64,
    pub completion_rate: f64,
    pub total_records: usize,
}

/// How often a name appears in one list side
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NameFrequency {
    pub name: String,
    pub frequency: usize,
    pub in_catalog: bool,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ListFrequencies {
    pub requested: Vec<NameFrequency>,
    pub provided: Vec<NameFrequency>,
}

/// Per-service view of the stored summary table
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SummaryTableStats {
    pub service: ServiceCode,
    pub service_name: String,
    pub total_records: usize,
    pub earliest_period: Period,
    pub latest_period: Period,
    pub total_requested: u64,
    pub total_provided: u64,
}

/// A list entry that matches no catalog entry
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UnexpectedService {
    pub name: String,
    pub requested_occurrences: usize,
    pub provided_occurrences: usize,
    pub contact_ids: Vec<ContactId>,
}

/// Flag totals for a (service, period) that the summary table does not match
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SummaryMismatch {
    pub service: ServiceCode,
    pub service_name: String,
    pub period: Period,
    pub expected: ServiceTotals,

    /// `None` when no row exists for this key
    pub stored: Option<ServiceTotals>,
}

/// Contacts whose list and flag disagree for one service and side
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FlagDrift {
    pub service: ServiceCode,
    pub service_name: String,
    pub side: Side,
    pub contact_ids: Vec<ContactId>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProvidedWithoutRequest {
    pub service: ServiceCode,
    pub service_name: String,
    pub period: Period,
    pub provided: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct DiscrepancyCounts {
    pub unexpected_services: usize,
    pub integer_without_summary: usize,
    pub list_without_flag: usize,
    pub flag_without_list: usize,
    pub provided_without_request: usize,
}

impl DiscrepancyCounts {
    pub fn total(&self) -> usize {
        self.unexpected_services
            + self.integer_without_summary
            + self.list_without_flag
            + self.flag_without_list
            + self.provided_without_request
    }
}

/// Full audit output. Produced only when every read succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct DiscrepancyReport {
    pub generated_at: DateTime<Utc>,
    pub contacts_scanned: usize,
    pub summary_rows: usize,

    pub flag_analysis: Vec<ServiceFlagAnalysis>,
    pub list_frequencies: ListFrequencies,
    pub summary_table: Vec<SummaryTableStats>,
    pub missing_from_summary: Vec<String>,

    pub unexpected_services: Vec<UnexpectedService>,
    pub integer_without_summary: Vec<SummaryMismatch>,
    pub list_without_flag: Vec<FlagDrift>,
    pub flag_without_list: Vec<FlagDrift>,
    pub provided_without_request: Vec<ProvidedWithoutRequest>,

    pub recommendations: Vec<String>,
}

impl DiscrepancyReport {
    pub fn counts(&self) -> DiscrepancyCounts {
        DiscrepancyCounts {
            unexpected_services: self.unexpected_services.len(),
            integer_without_summary: self.integer_without_summary.len(),
            list_without_flag: self.list_without_flag.len(),
            flag_without_list: self.flag_without_list.len(),
            provided_without_request: self.provided_without_request.len(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.counts().total() == 0
    }

    /// File name for the JSON export, derived from the report timestamp
    pub fn file_name(&self) -> String {
        format!(
            "audit-results-{}.json",
            self.generated_at.format("%Y-%m-%dT%H-%M-%S-%3fZ")
        )
    }
}

pub fn render_markdown(report: &DiscrepancyReport) -> String {
    let counts = report.counts();

    let mut md = String::new();
    md.push_str("# Service consistency audit\n\n");
    let _ = writeln!(md, "- Generated: `{}`", report.generated_at.to_rfc3339());
    let _ = writeln!(md, "- Contacts: `{}`", report.contacts_scanned);
    let _ = writeln!(md, "- Summary rows: `{}`", report.summary_rows);
    let _ = writeln!(md, "- Discrepancies: `{}`\n", counts.total());

    md.push_str("## Flag analysis\n\n");
    md.push_str("| service | requested | provided | completion | records |\n");
    md.push_str("|---|---:|---:|---:|---:|\n");
    for row in &report.flag_analysis {
        let _ = writeln!(
            md,
            "| {} | `{}` | `{}` | `{:.2}%` | `{}` |",
            escape_cell(&row.service_name),
            row.requested_count,
            row.provided_count,
            row.completion_rate,
            row.total_records
        );
    }
    md.push('\n');

    md.push_str("## List frequencies\n\n");
    md.push_str("| side | name | frequency | in catalog |\n");
    md.push_str("|---|---|---:|---|\n");
    let sides = [
        (Side::Requested, &report.list_frequencies.requested),
        (Side::Provided, &report.list_frequencies.provided),
    ];
    for (side, names) in sides {
        for entry in names {
            let _ = writeln!(
                md,
                "| {side} | {} | `{}` | {} |",
                escape_cell(&entry.name),
                entry.frequency,
                if entry.in_catalog { "yes" } else { "**no**" }
            );
        }
    }
    md.push('\n');

    md.push_str("## Summary table\n\n");
    md.push_str("| service | rows | range | requested | provided |\n");
    md.push_str("|---|---:|---|---:|---:|\n");
    for stats in &report.summary_table {
        let _ = writeln!(
            md,
            "| {} | `{}` | {} to {} | `{}` | `{}` |",
            escape_cell(&stats.service_name),
            stats.total_records,
            stats.earliest_period,
            stats.latest_period,
            stats.total_requested,
            stats.total_provided
        );
    }
    if !report.missing_from_summary.is_empty() {
        let _ = writeln!(
            md,
            "\nMissing from summary: {}",
            report.missing_from_summary.join(", ")
        );
    }
    md.push('\n');

    md.push_str("## Discrepancies\n\n");
    if report.is_clean() {
        md.push_str("No discrepancies found.\n");
        return md;
    }

    if !report.unexpected_services.is_empty() {
        md.push_str("### Unexpected service names\n\n");
        for item in &report.unexpected_services {
            let _ = writeln!(
                md,
                "- `{}`: requested {}x, provided {}x (contacts {})",
                item.name,
                item.requested_occurrences,
                item.provided_occurrences,
                join_ids(&item.contact_ids)
            );
        }
        md.push('\n');
    }

    if !report.integer_without_summary.is_empty() {
        md.push_str("### Flags without matching summary rows\n\n");
        md.push_str("| service | period | expected | stored |\n");
        md.push_str("|---|---|---|---|\n");
        for item in &report.integer_without_summary {
            let stored = item.stored.map_or_else(
                || "missing".to_string(),
                |t| format!("{}/{}", t.requested, t.provided),
            );
            let _ = writeln!(
                md,
                "| {} | {} | {}/{} | {} |",
                escape_cell(&item.service_name),
                item.period,
                item.expected.requested,
                item.expected.provided,
                stored
            );
        }
        md.push('\n');
    }

    for (title, drifts) in [
        ("Listed without flag", &report.list_without_flag),
        ("Flagged without list entry", &report.flag_without_list),
    ] {
        if drifts.is_empty() {
            continue;
        }
        let _ = writeln!(md, "### {title}\n");
        for item in drifts {
            let _ = writeln!(
                md,
                "- {} ({}): contacts {}",
                item.service_name,
                item.side,
                join_ids(&item.contact_ids)
            );
        }
        md.push('\n');
    }

    if !report.provided_without_request.is_empty() {
        md.push_str("### Provided without request\n\n");
        for item in &report.provided_without_request {
            let _ = writeln!(
                md,
                "- {} in {}: provided {}x, requested 0x",
                item.service_name, item.period, item.provided
            );
        }
        md.push('\n');
    }

    md.push_str("## Recommended actions\n\n");
    for (i, rec) in report.recommendations.iter().enumerate() {
        let _ = writeln!(md, "{}. {rec}", i + 1);
    }
    md
}

fn join_ids(ids: &[ContactId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
