//! # Service Auditor
//!
//! Read-only consistency check across the three representations of a service fact:
//! contact lists, contact flag rows and the monthly summary table.
//!
//! Discrepancy classes:
//!
//! - **unexpected service names**: list entries that match no catalog entry
//! - **integer without summary**: flag totals with no matching (or a mismatched) summary row,
//!   and summary rows the flags do not back
//! - **list without flag**: a listed service whose flag on that contact is 0
//! - **flag without list**: a flag set to 1 with no matching list entry
//! - **provided without request**: a period where a service was provided but never requested
//!
//! The audit never mutates anything. A store read failure aborts it without a report.

mod auditor;
mod error;
mod report;

pub use auditor::{write_markdown, write_report, Auditor};
pub use error::{AuditorError, Result};
pub use report::{
    render_markdown, DiscrepancyCounts, DiscrepancyReport, FlagDrift, ListFrequencies,
    NameFrequency, ProvidedWithoutRequest, ServiceFlagAnalysis, SummaryMismatch,
    SummaryTableStats, UnexpectedService,
};
