use crate::error::Result;
use crate::report::{
    render_markdown, DiscrepancyReport, FlagDrift, ListFrequencies, NameFrequency,
    ProvidedWithoutRequest, ServiceFlagAnalysis, SummaryMismatch, SummaryTableStats,
    UnexpectedService,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use svc_facts::{
    completion_rate, AggregateRow, Catalog, Period, ServiceCode, ServiceTotals, Side,
};
use svc_store::{ContactId, ContactRecord, FactReader};

type PeriodTotals = BTreeMap<Period, [ServiceTotals; ServiceCode::COUNT]>;

/// Cross-checks the three representations of the service facts.
///
/// Only a [`FactReader`] is required, so an audit cannot write. Discrepancies never abort the
/// audit; a failed read does, and then no report is produced.
pub struct Auditor<'a, R: FactReader + ?Sized> {
    store: &'a R,
    catalog: &'a Catalog,
}

impl<'a, R: FactReader + ?Sized> Auditor<'a, R> {
    pub const fn new(store: &'a R, catalog: &'a Catalog) -> Self {
        Self { store, catalog }
    }

    pub async fn audit(&self) -> Result<DiscrepancyReport> {
        log::info!("Auditing service facts");
        let contacts = self.store.contacts().await?;
        let rows = self.store.aggregate_rows().await?;

        let report = self.build_report(&contacts, &rows, Utc::now());
        let counts = report.counts();
        if report.is_clean() {
            log::info!(
                "Audit clean: {} contact(s), {} summary row(s)",
                report.contacts_scanned,
                report.summary_rows
            );
        } else {
            log::warn!(
                "Audit found {} discrepancy item(s): {} unexpected name(s), {} summary mismatch(es), {} list-without-flag, {} flag-without-list, {} provided-without-request",
                counts.total(),
                counts.unexpected_services,
                counts.integer_without_summary,
                counts.list_without_flag,
                counts.flag_without_list,
                counts.provided_without_request
            );
        }
        Ok(report)
    }

    fn build_report(
        &self,
        contacts: &[ContactRecord],
        rows: &[AggregateRow],
        generated_at: DateTime<Utc>,
    ) -> DiscrepancyReport {
        let per_period = period_totals(contacts);
        let (summary_table, missing_from_summary) = self.summary_table(rows);
        let (list_without_flag, flag_without_list) = self.flag_drift(contacts);

        let mut report = DiscrepancyReport {
            generated_at,
            contacts_scanned: contacts.len(),
            summary_rows: rows.len(),
            flag_analysis: self.flag_analysis(contacts),
            list_frequencies: self.list_frequencies(contacts),
            summary_table,
            missing_from_summary,
            unexpected_services: self.unexpected_services(contacts),
            integer_without_summary: self.integer_without_summary(&per_period, rows),
            list_without_flag,
            flag_without_list,
            provided_without_request: self.provided_without_request(&per_period),
            recommendations: Vec::new(),
        };
        report.recommendations = recommendations(&report);
        report
    }

    fn flag_analysis(&self, contacts: &[ContactRecord]) -> Vec<ServiceFlagAnalysis> {
        self.catalog
            .all()
            .iter()
            .map(|entry| {
                let mut totals = ServiceTotals::default();
                for contact in contacts {
                    totals.add(contact.flags.get(entry.code));
                }
                ServiceFlagAnalysis {
                    service: entry.code,
                    service_name: entry.display_name.clone(),
                    requested_count: totals.requested,
                    provided_count: totals.provided,
                    completion_rate: completion_rate(totals.requested, totals.provided),
                    total_records: contacts.len(),
                }
            })
            .collect()
    }

    fn list_frequencies(&self, contacts: &[ContactRecord]) -> ListFrequencies {
        let mut requested: BTreeMap<&str, usize> = BTreeMap::new();
        let mut provided: BTreeMap<&str, usize> = BTreeMap::new();
        for contact in contacts {
            for name in &contact.facts.requested {
                *requested.entry(name.as_str()).or_insert(0) += 1;
            }
            for service in &contact.facts.provided {
                *provided.entry(service.service.as_str()).or_insert(0) += 1;
            }
        }
        ListFrequencies {
            requested: self.ranked(requested),
            provided: self.ranked(provided),
        }
    }

    fn ranked(&self, counts: BTreeMap<&str, usize>) -> Vec<NameFrequency> {
        let mut out: Vec<NameFrequency> = counts
            .into_iter()
            .map(|(name, frequency)| NameFrequency {
                name: name.to_string(),
                frequency,
                in_catalog: self.catalog.contains_name(name),
            })
            .collect();
        out.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.name.cmp(&b.name)));
        out
    }

    fn unexpected_services(&self, contacts: &[ContactRecord]) -> Vec<UnexpectedService> {
        #[derive(Default)]
        struct Seen {
            requested: usize,
            provided: usize,
            contacts: BTreeSet<ContactId>,
        }

        let mut seen: BTreeMap<&str, Seen> = BTreeMap::new();
        for contact in contacts {
            for name in &contact.facts.requested {
                if !self.catalog.contains_name(name) {
                    let entry = seen.entry(name.as_str()).or_default();
                    entry.requested += 1;
                    entry.contacts.insert(contact.id);
                }
            }
            for service in &contact.facts.provided {
                if !self.catalog.contains_name(&service.service) {
                    let entry = seen.entry(service.service.as_str()).or_default();
                    entry.provided += 1;
                    entry.contacts.insert(contact.id);
                }
            }
        }

        seen.into_iter()
            .map(|(name, seen)| {
                log::debug!("unexpected service name {name:?}");
                UnexpectedService {
                    name: name.to_string(),
                    requested_occurrences: seen.requested,
                    provided_occurrences: seen.provided,
                    contact_ids: seen.contacts.into_iter().collect(),
                }
            })
            .collect()
    }

    fn integer_without_summary(
        &self,
        per_period: &PeriodTotals,
        rows: &[AggregateRow],
    ) -> Vec<SummaryMismatch> {
        let stored: HashMap<(i32, u32, ServiceCode), ServiceTotals> =
            rows.iter().map(|row| (row.key(), row.totals())).collect();

        let mut out = Vec::new();
        for (period, by_service) in per_period {
            for entry in self.catalog.all() {
                let expected = by_service[entry.code.index()];
                if expected.is_zero() {
                    continue;
                }
                let found = stored
                    .get(&(period.year, period.month, entry.code))
                    .copied();
                if found == Some(expected) {
                    continue;
                }
                log::debug!(
                    "{} {period}: flags {}/{}, summary {:?}",
                    entry.code,
                    expected.requested,
                    expected.provided,
                    found
                );
                out.push(SummaryMismatch {
                    service: entry.code,
                    service_name: entry.display_name.clone(),
                    period: *period,
                    expected,
                    stored: found,
                });
            }
        }

        // Rows the flags do not back at all: retracted services, periods without contacts.
        for row in rows {
            let period = row.period();
            let expected = per_period
                .get(&period)
                .map(|by_service| by_service[row.service.index()])
                .unwrap_or_default();
            if !expected.is_zero() || row.totals() == expected {
                continue;
            }
            log::debug!(
                "{} {period}: summary {}/{} without flags",
                row.service,
                row.total_requested,
                row.total_provided
            );
            out.push(SummaryMismatch {
                service: row.service,
                service_name: self.catalog.display_name(row.service).to_string(),
                period,
                expected,
                stored: Some(row.totals()),
            });
        }
        out.sort_by_key(|m| (m.period, m.service));
        out
    }

    /// Compare every contact's resolved list entries with its flags, per service and side
    fn flag_drift(&self, contacts: &[ContactRecord]) -> (Vec<FlagDrift>, Vec<FlagDrift>) {
        let mut listed_only: BTreeMap<(ServiceCode, Side), Vec<ContactId>> = BTreeMap::new();
        let mut flagged_only: BTreeMap<(ServiceCode, Side), Vec<ContactId>> = BTreeMap::new();

        for contact in contacts {
            let requested = self.resolved(contact.facts.requested.iter().map(String::as_str));
            let provided = self.resolved(contact.facts.provided.iter().map(|p| p.service.as_str()));

            for entry in self.catalog.all() {
                let code = entry.code;
                let pair = contact.flags.get(code);
                for (side, listed, flagged) in [
                    (Side::Requested, requested[code.index()], pair.requested),
                    (Side::Provided, provided[code.index()], pair.provided),
                ] {
                    if listed && !flagged {
                        listed_only.entry((code, side)).or_default().push(contact.id);
                    } else if flagged && !listed {
                        flagged_only.entry((code, side)).or_default().push(contact.id);
                    }
                }
            }
        }

        (self.drifts(listed_only), self.drifts(flagged_only))
    }

    fn resolved<'n>(&self, names: impl Iterator<Item = &'n str>) -> [bool; ServiceCode::COUNT] {
        let mut present = [false; ServiceCode::COUNT];
        for name in names {
            if let Some(entry) = self.catalog.resolve(name) {
                present[entry.code.index()] = true;
            }
        }
        present
    }

    fn drifts(&self, grouped: BTreeMap<(ServiceCode, Side), Vec<ContactId>>) -> Vec<FlagDrift> {
        grouped
            .into_iter()
            .map(|((service, side), contact_ids)| FlagDrift {
                service,
                service_name: self.catalog.display_name(service).to_string(),
                side,
                contact_ids,
            })
            .collect()
    }

    fn provided_without_request(&self, per_period: &PeriodTotals) -> Vec<ProvidedWithoutRequest> {
        let mut out = Vec::new();
        for (period, by_service) in per_period {
            for entry in self.catalog.all() {
                let totals = by_service[entry.code.index()];
                if totals.provided > 0 && totals.requested == 0 {
                    out.push(ProvidedWithoutRequest {
                        service: entry.code,
                        service_name: entry.display_name.clone(),
                        period: *period,
                        provided: totals.provided,
                    });
                }
            }
        }
        out
    }

    fn summary_table(&self, rows: &[AggregateRow]) -> (Vec<SummaryTableStats>, Vec<String>) {
        let mut by_service: BTreeMap<usize, SummaryTableStats> = BTreeMap::new();
        for row in rows {
            let period = row.period();
            by_service
                .entry(row.service.index())
                .and_modify(|stats| {
                    stats.total_records += 1;
                    stats.earliest_period = stats.earliest_period.min(period);
                    stats.latest_period = stats.latest_period.max(period);
                    stats.total_requested += row.total_requested;
                    stats.total_provided += row.total_provided;
                })
                .or_insert_with(|| SummaryTableStats {
                    service: row.service,
                    service_name: row.service_name.clone(),
                    total_records: 1,
                    earliest_period: period,
                    latest_period: period,
                    total_requested: row.total_requested,
                    total_provided: row.total_provided,
                });
        }

        let missing = self
            .catalog
            .all()
            .iter()
            .filter(|entry| !by_service.contains_key(&entry.code.index()))
            .map(|entry| entry.display_name.clone())
            .collect();
        (by_service.into_values().collect(), missing)
    }
}

fn period_totals(contacts: &[ContactRecord]) -> PeriodTotals {
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

fn recommendations(report: &DiscrepancyReport) -> Vec<String> {
    let mut out = Vec::new();

    let stale_periods: BTreeSet<Period> = report
        .integer_without_summary
        .iter()
        .map(|m| m.period)
        .collect();
    for period in stale_periods {
        let services: Vec<&str> = report
            .integer_without_summary
            .iter()
            .filter(|m| m.period == period)
            .map(|m| m.service_name.as_str())
            .collect();
        out.push(format!(
            "Run `svc-facts aggregate --year {} --month {}` to rebuild summary rows for {}",
            period.year,
            period.month,
            services.join(", ")
        ));
    }

    for drift in report.list_without_flag.iter().chain(&report.flag_without_list) {
        out.push(format!(
            "Run `svc-facts resync` to re-derive {} flags for {} on contact(s) {}",
            drift.side,
            drift.service_name,
            join_ids(&drift.contact_ids)
        ));
    }

    for item in &report.unexpected_services {
        out.push(format!(
            "Review and standardize service name \"{}\" in contact lists",
            item.name
        ));
    }

    for item in &report.provided_without_request {
        out.push(format!(
            "Check {} in {}: provided {}x with no recorded request",
            item.service_name, item.period, item.provided
        ));
    }
    out
}

fn join_ids(ids: &[ContactId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Write the report as pretty JSON into `dir`, returning the file path
pub async fn write_report(report: &DiscrepancyReport, dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(report.file_name());
    let bytes = serde_json::to_vec_pretty(report)?;
    write_atomic(&path, &bytes).await?;
    log::info!("Audit report written to {}", path.display());
    Ok(path)
}

/// Write the Markdown rendering next to `json_path`, returning its path
pub async fn write_markdown(report: &DiscrepancyReport, json_path: &Path) -> Result<PathBuf> {
    let path = json_path.with_extension("md");
    write_atomic(&path, render_markdown(report).as_bytes()).await?;
    log::info!("Markdown report written to {}", path.display());
    Ok(path)
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    if let Err(err) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use svc_facts::{ContactFacts, FlagRow, ProvidedService, Synchronizer};
    use svc_store::{ContactWriter, FactStore, MemoryStore};

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    async fn audit(store: &MemoryStore) -> DiscrepancyReport {
        let catalog = Catalog::standard();
        Auditor::new(store, &catalog).audit().await.unwrap()
    }

    #[tokio::test]
    async fn empty_store_is_clean() {
        let store = MemoryStore::new();
        let report = audit(&store).await;
        assert!(report.is_clean());
        assert_eq!(report.flag_analysis.len(), ServiceCode::COUNT);
        assert_eq!(report.missing_from_summary.len(), ServiceCode::COUNT);
        assert!(report.recommendations.is_empty());
    }

    #[tokio::test]
    async fn reports_unexpected_names_per_side() {
        let store = MemoryStore::new();
        let sync = Synchronizer::default();
        let writer = ContactWriter::new(&store, &sync);
        writer
            .record(
                ContactFacts::new(jan(5))
                    .request("Fod")
                    .provide(ProvidedService::new("Fod")),
            )
            .await
            .unwrap();
        writer
            .record(ContactFacts::new(jan(6)).request("Fod").request("Food"))
            .await
            .unwrap();

        let report = audit(&store).await;
        assert_eq!(report.unexpected_services.len(), 1);
        let item = &report.unexpected_services[0];
        assert_eq!(item.name, "Fod");
        assert_eq!((item.requested_occurrences, item.provided_occurrences), (2, 1));
        assert_eq!(item.contact_ids, vec![1, 2]);

        let fod = &report.list_frequencies.requested[0];
        assert_eq!((fod.name.as_str(), fod.frequency, fod.in_catalog), ("Fod", 2, false));
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("standardize service name \"Fod\"")));
    }

    #[tokio::test]
    async fn detects_flag_and_list_drift_both_ways() {
        let store = MemoryStore::new();
        let mut hand_edited = FlagRow::zeroed();
        hand_edited.set(ServiceCode::Legal, Side::Provided, true);
        store
            .insert_contact(ContactFacts::new(jan(9)).request("Housing"), hand_edited)
            .await
            .unwrap();

        let report = audit(&store).await;
        assert_eq!(report.list_without_flag.len(), 1);
        assert_eq!(report.list_without_flag[0].service, ServiceCode::Housing);
        assert_eq!(report.list_without_flag[0].side, Side::Requested);
        assert_eq!(report.list_without_flag[0].contact_ids, vec![1]);

        assert_eq!(report.flag_without_list.len(), 1);
        assert_eq!(report.flag_without_list[0].service, ServiceCode::Legal);
        assert_eq!(report.flag_without_list[0].side, Side::Provided);

        assert_eq!(report.provided_without_request.len(), 1);
        assert_eq!(report.provided_without_request[0].provided, 1);
    }

    #[tokio::test]
    async fn reports_missing_and_mismatched_summary_rows() {
        let store = MemoryStore::new();
        let sync = Synchronizer::default();
        let writer = ContactWriter::new(&store, &sync);
        writer
            .record(ContactFacts::new(jan(1)).request("Food"))
            .await
            .unwrap();
        writer
            .record(ContactFacts::new(jan(2)).request("Food").request("Legal"))
            .await
            .unwrap();

        let period = Period::new(2025, 1).unwrap();
        let stale = AggregateRow::new(
            period,
            ServiceCode::Food,
            "Food",
            ServiceTotals {
                requested: 1,
                provided: 0,
            },
        );
        store
            .replace_service_rows(ServiceCode::Food, svc_facts::Scope::All, vec![stale])
            .await
            .unwrap();

        let report = audit(&store).await;
        assert_eq!(report.integer_without_summary.len(), 2);
        let food = &report.integer_without_summary[0];
        assert_eq!(food.service, ServiceCode::Food);
        assert_eq!(food.expected.requested, 2);
        assert_eq!(food.stored.map(|t| t.requested), Some(1));
        let legal = &report.integer_without_summary[1];
        assert_eq!(legal.service, ServiceCode::Legal);
        assert_eq!(legal.stored, None);

        assert_eq!(
            report.recommendations,
            vec!["Run `svc-facts aggregate --year 2025 --month 1` to rebuild summary rows for Food, Legal".to_string()]
        );
        assert_eq!(report.summary_table.len(), 1);
        assert_eq!(report.summary_table[0].total_requested, 1);
    }

    #[tokio::test]
    async fn reports_summary_rows_the_flags_do_not_back() {
        let store = MemoryStore::new();
        let sync = Synchronizer::default();
        ContactWriter::new(&store, &sync)
            .record(ContactFacts::new(jan(7)).request("Housing"))
            .await
            .unwrap();

        let jan_2025 = Period::new(2025, 1).unwrap();
        let jun_2024 = Period::new(2024, 6).unwrap();
        let housing = AggregateRow::new(
            jan_2025,
            ServiceCode::Housing,
            "Housing",
            ServiceTotals {
                requested: 1,
                provided: 0,
            },
        );
        let food = |period, requested, provided| {
            AggregateRow::new(
                period,
                ServiceCode::Food,
                "Food",
                ServiceTotals {
                    requested,
                    provided,
                },
            )
        };
        store
            .replace_service_rows(ServiceCode::Housing, svc_facts::Scope::All, vec![housing])
            .await
            .unwrap();
        store
            .replace_service_rows(
                ServiceCode::Food,
                svc_facts::Scope::All,
                vec![food(jan_2025, 5, 5), food(jun_2024, 9, 0)],
            )
            .await
            .unwrap();

        let report = audit(&store).await;
        assert!(!report.is_clean());
        let found: Vec<(Period, ServiceCode, Option<u64>)> = report
            .integer_without_summary
            .iter()
            .map(|m| (m.period, m.service, m.stored.map(|t| t.requested)))
            .collect();
        assert_eq!(
            found,
            vec![
                (jun_2024, ServiceCode::Food, Some(9)),
                (jan_2025, ServiceCode::Food, Some(5)),
            ]
        );
        assert!(report
            .integer_without_summary
            .iter()
            .all(|m| m.expected.is_zero()));
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("--year 2024 --month 6")));
    }

    #[tokio::test]
    async fn aliases_are_known_names() {
        let store = MemoryStore::new();
        let sync = Synchronizer::default();
        ContactWriter::new(&store, &sync)
            .record(
                ContactFacts::new(jan(8))
                    .request("Occupational")
                    .provide(ProvidedService::new("Occupational").provider("Ana")),
            )
            .await
            .unwrap();

        let report = audit(&store).await;
        assert!(report.unexpected_services.is_empty());
        assert!(report.list_without_flag.is_empty());
        assert!(report.flag_without_list.is_empty());
        assert!(report.list_frequencies.requested[0].in_catalog);
    }
}
