use crate::error::Result;
use crate::stats::{AggregateSummary, HistorySummary, MonthOutcome};
use std::collections::BTreeMap;
use std::time::Instant;
use svc_facts::{AggregateRow, Catalog, Period, Scope, ServiceCode, ServiceTotals};
use svc_store::{ContactRecord, FactStore};

type PeriodTotals = BTreeMap<Period, [ServiceTotals; ServiceCode::COUNT]>;

/// Recomputes the monthly summary table from contact flag rows.
///
/// A run reads one snapshot of the contacts in scope and then replaces, per catalog entry, every
/// row of that entry inside the scope. Rows are overwritten, never incremented, so repeating a
/// run over unchanged contacts yields identical rows.
///
/// Contact writes that commit while a run is in progress are not reflected in that run; the next
/// run picks them up.
pub struct Aggregator<'a, S: FactStore + ?Sized> {
    store: &'a S,
    catalog: &'a Catalog,
}

impl<'a, S: FactStore + ?Sized> Aggregator<'a, S> {
    pub const fn new(store: &'a S, catalog: &'a Catalog) -> Self {
        Self { store, catalog }
    }

    /// Aggregate every period (`Scope::All`) or a single month.
    ///
    /// Fails only when the snapshot cannot be read. A failed catalog entry is logged, recorded
    /// in the summary and skipped; the remaining entries are still written.
    pub async fn aggregate(&self, scope: Scope) -> Result<AggregateSummary> {
        let start = Instant::now();
        log::info!("Aggregating {scope}");

        let contacts = self.store.contacts_in(scope).await?;
        let totals = tally(&contacts);

        let mut summary = AggregateSummary::new(scope);
        summary.contacts = contacts.len();
        summary.periods = totals.len();

        for entry in self.catalog.all() {
            let rows: Vec<AggregateRow> = totals
                .iter()
                .map(|(period, by_service)| {
                    AggregateRow::new(
                        *period,
                        entry.code,
                        entry.display_name.as_str(),
                        by_service[entry.code.index()],
                    )
                })
                .collect();

            match self
                .store
                .replace_service_rows(entry.code, scope, rows)
                .await
            {
                Ok(written) => {
                    log::debug!("{}: wrote {written} row(s) for {scope}", entry.code);
                    summary.rows_written += written;
                    summary.services_processed += 1;
                }
                Err(err) => {
                    log::warn!(
                        "Failed to write {} rows for {scope}: {err}",
                        entry.display_name
                    );
                    summary.add_failure(entry.code, &entry.display_name, err.to_string());
                }
            }
        }

        summary.time_ms = elapsed_ms(start);
        if summary.is_partial() {
            log::warn!(
                "Aggregation of {scope} partially failed: {} of {} service(s) not written",
                summary.failures.len(),
                self.catalog.len()
            );
        } else {
            log::info!(
                "Aggregated {scope}: {} contact(s), {} row(s) in {}ms",
                summary.contacts,
                summary.rows_written,
                summary.time_ms
            );
        }
        Ok(summary)
    }

    /// Every month from the earliest to the latest contact date, gaps included
    pub async fn plan_history(&self) -> Result<Vec<Period>> {
        let contacts = self.store.contacts().await?;
        let first = contacts.iter().map(|c| c.facts.period()).min();
        let last = contacts.iter().map(|c| c.facts.period()).max();
        Ok(match (first, last) {
            (Some(first), Some(last)) => first.through(last),
            _ => Vec::new(),
        })
    }

    /// Run a scoped aggregation for each planned month in chronological order
    pub async fn run_history(&self) -> Result<HistorySummary> {
        let start = Instant::now();
        let plan = self.plan_history().await?;
        log::info!("Historical sweep over {} month(s)", plan.len());

        let mut history = HistorySummary::default();
        for period in plan {
            let outcome = match self.aggregate(Scope::Period(period)).await {
                Ok(summary) => MonthOutcome {
                    period,
                    rows_written: summary.rows_written,
                    failed_services: summary.failures.len(),
                    error: None,
                },
                Err(err) => {
                    log::warn!("Failed to aggregate {period}: {err}");
                    MonthOutcome {
                        period,
                        rows_written: 0,
                        failed_services: 0,
                        error: Some(err.to_string()),
                    }
                }
            };
            history.add_month(outcome);
        }

        history.time_ms = elapsed_ms(start);
        log::info!(
            "Historical sweep done: {} succeeded, {} failed, {} row(s)",
            history.successful_months,
            history.failed_months,
            history.total_rows
        );
        Ok(history)
    }
}

/// Sum flag pairs per period and service
fn tally(contacts: &[ContactRecord]) -> PeriodTotals {
    let mut totals = PeriodTotals::new();
    for contact in contacts {
        let by_service = totals
            .entry(contact.facts.period())
            .or_insert([ServiceTotals::default(); ServiceCode::COUNT]);
        for code in ServiceCode::ALL {
            by_service[code.index()].add(contact.flags.get(code));
        }
    }
    totals
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
