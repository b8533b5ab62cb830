use async_trait::async_trait;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use svc_aggregator::Aggregator;
use svc_auditor::{render_markdown, write_markdown, write_report, Auditor, AuditorError};
use svc_facts::{AggregateRow, Catalog, ContactFacts, ProvidedService, Scope, Synchronizer};
use svc_store::paths::contacts_path;
use svc_store::{
    ContactId, ContactRecord, ContactWriter, FactReader, JsonFileStore, StoreError,
};
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Reader whose summary table cannot be read
struct BrokenSummary;

#[async_trait]
impl FactReader for BrokenSummary {
    async fn contacts(&self) -> svc_store::Result<Vec<ContactRecord>> {
        Ok(Vec::new())
    }

    async fn contact(&self, _id: ContactId) -> svc_store::Result<Option<ContactRecord>> {
        Ok(None)
    }

    async fn aggregate_rows(&self) -> svc_store::Result<Vec<AggregateRow>> {
        Err(StoreError::Other("summary table unavailable".to_string()))
    }
}

#[tokio::test]
async fn synchronized_and_aggregated_store_audits_clean() {
    let temp = TempDir::new().expect("tempdir");
    let store = JsonFileStore::open(temp.path().join("data")).await.expect("open");
    let sync = Synchronizer::default();
    let writer = ContactWriter::new(&store, &sync);
    writer
        .record(
            ContactFacts::new(date(2025, 1, 15))
                .request("Food")
                .provide(ProvidedService::new("Food").provider("Ana")),
        )
        .await
        .expect("record");
    writer
        .record(ContactFacts::new(date(2025, 2, 3)).request("Mental Health"))
        .await
        .expect("record");

    let catalog = Catalog::standard();
    Aggregator::new(&store, &catalog)
        .aggregate(Scope::All)
        .await
        .expect("aggregate");

    let report = Auditor::new(&store, &catalog).audit().await.expect("audit");
    assert!(report.is_clean(), "{:?}", report.counts());
    assert!(report.missing_from_summary.is_empty());
    assert_eq!(report.contacts_scanned, 2);

    let reports_dir = temp.path().join("reports");
    let path = write_report(&report, &reports_dir).await.expect("write report");
    assert!(path.starts_with(&reports_dir));
    let written: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).expect("read report")).expect("json");
    assert_eq!(written["contacts_scanned"], 2);
    assert_eq!(written["flag_analysis"][2]["service_name"], "Food");
    assert_eq!(written["flag_analysis"][2]["completion_rate"], 100.0);

    let md_path = write_markdown(&report, &path).await.expect("write markdown");
    assert_eq!(md_path, path.with_extension("md"));
    let mut names: Vec<String> = std::fs::read_dir(&reports_dir)
        .expect("list reports")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), 2);
    assert!(names.iter().all(|n| n.ends_with(".json") || n.ends_with(".md")));
    assert!(names.iter().all(|n| !n.ends_with(".tmp")));
}

#[tokio::test]
async fn out_of_band_edits_surface_as_discrepancies() {
    let temp = TempDir::new().expect("tempdir");
    let store = JsonFileStore::open(temp.path()).await.expect("open");
    let sync = Synchronizer::default();
    let record = ContactWriter::new(&store, &sync)
        .record(ContactFacts::new(date(2025, 3, 10)).request("Housing"))
        .await
        .expect("record");

    // Append a list entry without touching flags, the way a direct file edit would.
    let path = contacts_path(temp.path());
    let mut doc: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).expect("read")).expect("json");
    doc["contacts"][0]["requested_services"]
        .as_array_mut()
        .expect("array")
        .extend([serde_json::json!("Legal"), serde_json::json!("Housng")]);
    std::fs::write(&path, serde_json::to_vec_pretty(&doc).expect("encode")).expect("write");

    let catalog = Catalog::standard();
    let report = Auditor::new(&store, &catalog).audit().await.expect("audit");
    let counts = report.counts();
    assert_eq!(counts.unexpected_services, 1);
    assert_eq!(counts.list_without_flag, 1);
    assert_eq!(report.list_without_flag[0].contact_ids, vec![record.id]);
    assert_eq!(counts.integer_without_summary, 1);
    assert_eq!(report.integer_without_summary[0].service_name, "Housing");

    let md = render_markdown(&report);
    assert!(md.contains("### Unexpected service names"));
    assert!(md.contains("### Listed without flag"));
    assert!(md.contains("`svc-facts resync`"));
}

#[tokio::test]
async fn read_failure_produces_no_report() {
    let catalog = Catalog::standard();
    let err = Auditor::new(&BrokenSummary, &catalog)
        .audit()
        .await
        .expect_err("audit must fail");
    assert!(matches!(err, AuditorError::StoreError(StoreError::Other(_))));
}
