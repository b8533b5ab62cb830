use chrono::NaiveDate;
use serde_json::Value;
use svc_facts::{ContactFacts, Period, ProvidedService, Scope, ServiceCode, ServiceTotals, AggregateRow, Synchronizer};
use svc_store::paths::{contacts_path, summary_path};
use svc_store::{Amendment, ContactWriter, FactReader, FactStore, JsonFileStore, StoreError};
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn read_json(path: &std::path::Path) -> Value {
    let bytes = std::fs::read(path).expect("read file");
    serde_json::from_slice(&bytes).expect("valid json")
}

#[tokio::test]
async fn contact_lists_and_flags_land_in_one_document() {
    let temp = TempDir::new().expect("tempdir");
    let store = JsonFileStore::open(temp.path()).await.expect("open");
    let sync = Synchronizer::default();
    let writer = ContactWriter::new(&store, &sync);

    let record = writer
        .record(
            ContactFacts::new(date(2025, 1, 15))
                .request("Food")
                .request("Legal")
                .provide(ProvidedService::new("Food").provider("Ana")),
        )
        .await
        .expect("record");

    let doc = read_json(&contacts_path(temp.path()));
    assert_eq!(doc["schema_version"], 1);
    let contact = &doc["contacts"][0];
    assert_eq!(contact["id"], record.id);
    assert_eq!(contact["contact_date"], "2025-01-15");
    assert_eq!(contact["requested_services"][1], "Legal");
    assert_eq!(contact["provided_services"][0]["provider"], "Ana");
    assert_eq!(contact["flags"]["food_requested"], 1);
    assert_eq!(contact["flags"]["food_provided"], 1);
    assert_eq!(contact["flags"]["legal_requested"], 1);
    assert_eq!(contact["flags"]["legal_provided"], 0);
    assert!(!temp.path().join("contacts.json.tmp").exists());
}

#[tokio::test]
async fn amendments_survive_reopen_and_resync_fixes_hand_edits() {
    let temp = TempDir::new().expect("tempdir");
    let sync = Synchronizer::default();

    let id = {
        let store = JsonFileStore::open(temp.path()).await.expect("open");
        let writer = ContactWriter::new(&store, &sync);
        let record = writer
            .record(ContactFacts::new(date(2025, 2, 1)).request("Housing"))
            .await
            .expect("record");
        writer
            .amend(
                record.id,
                Amendment::default().provided(vec![ProvidedService::new("Housing")]),
            )
            .await
            .expect("amend");
        record.id
    };

    // Simulate an out-of-band edit that clears a flag.
    let path = contacts_path(temp.path());
    let mut doc = read_json(&path);
    doc["contacts"][0]["flags"]["housing_provided"] = Value::from(0);
    std::fs::write(&path, serde_json::to_vec_pretty(&doc).expect("encode")).expect("write");

    let store = JsonFileStore::open(temp.path()).await.expect("reopen");
    let writer = ContactWriter::new(&store, &sync);
    let summary = writer.resync_all().await.expect("resync");
    assert_eq!(summary.changed_ids, vec![id]);

    let stored = store.contact(id).await.expect("read").expect("present");
    assert_eq!(stored.flags.column("housing_provided"), Some(1));
    assert_eq!(stored.flags.column("housing_requested"), Some(1));
}

#[tokio::test]
async fn out_of_range_flag_in_file_is_rejected() {
    let temp = TempDir::new().expect("tempdir");
    std::fs::write(
        contacts_path(temp.path()),
        r#"{
          "schema_version": 1,
          "next_id": 1,
          "contacts": [{
            "id": 1,
            "contact_date": "2025-01-01",
            "requested_services": ["Food"],
            "provided_services": [],
            "flags": {"food_requested": 2}
          }]
        }"#,
    )
    .expect("seed");

    let store = JsonFileStore::open(temp.path()).await.expect("open");
    let err = store.contacts().await.expect_err("invalid flag");
    assert!(matches!(err, StoreError::SerializationError(_)), "{err}");
}

#[tokio::test]
async fn service_rows_are_replaced_per_scope() {
    let temp = TempDir::new().expect("tempdir");
    let store = JsonFileStore::open(temp.path()).await.expect("open");
    let jan = Period::new(2025, 1).expect("period");
    let feb = Period::new(2025, 2).expect("period");
    let row = |period, requested, provided| {
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
        .replace_service_rows(ServiceCode::Food, Scope::All, vec![row(jan, 2, 1), row(feb, 4, 4)])
        .await
        .expect("seed rows");
    store
        .replace_service_rows(ServiceCode::Food, Scope::Period(feb), vec![row(feb, 5, 1)])
        .await
        .expect("scoped replace");

    let rows = store.aggregate_rows().await.expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].total_requested, 2);
    assert_eq!(rows[1].total_requested, 5);
    assert_eq!(rows[1].completion_rate, 20.0);

    let stray = store
        .replace_service_rows(ServiceCode::Food, Scope::Period(jan), vec![row(feb, 1, 1)])
        .await;
    assert!(stray.is_err());
    assert_eq!(store.aggregate_rows().await.expect("rows"), rows);

    let doc = read_json(&summary_path(temp.path()));
    assert_eq!(doc["rows"][0]["service"], "food");
    assert_eq!(doc["rows"][0]["service_name"], "Food");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_mark_provided_keeps_both_services() {
    let sync = Synchronizer::default();

    for _ in 0..10 {
        let temp = TempDir::new().expect("tempdir");
        let store = JsonFileStore::open(temp.path()).await.expect("open");
        let writer = ContactWriter::new(&store, &sync);
        let record = writer
            .record(
                ContactFacts::new(date(2025, 4, 2))
                    .request("Food")
                    .request("Housing"),
            )
            .await
            .expect("record");

        let (food, housing) = tokio::join!(
            writer.mark_provided(record.id, ProvidedService::new("Food")),
            writer.mark_provided(record.id, ProvidedService::new("Housing")),
        );
        food.expect("mark food");
        housing.expect("mark housing");

        let stored = store
            .contact(record.id)
            .await
            .expect("read")
            .expect("contact exists");
        let mut provided: Vec<&str> = stored
            .facts
            .provided
            .iter()
            .map(|p| p.service.as_str())
            .collect();
        provided.sort_unstable();
        assert_eq!(provided, vec!["Food", "Housing"]);
        assert_eq!(stored.flags.column("food_provided"), Some(1));
        assert_eq!(stored.flags.column("housing_provided"), Some(1));
    }
}
