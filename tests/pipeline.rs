//! End-to-end preparation runs against in-memory and local storage

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use encoding_rs::WINDOWS_1252;
use std::io::{Cursor, Write};
use std::sync::Arc;
use zip::write::SimpleFileOptions;

use fileprep::catalog::RecordingCatalog;
use fileprep::dataset::{Dataset, ReadOptions};
use fileprep::handlers::{FileHandler, HandlerError, SubUnit};
use fileprep::preparer::PrepareError;
use fileprep::registry::ScriptRegistry;
use fileprep::schema::PrepareFile;
use fileprep::scripts::{Script, ScriptContext, ScriptError};
use fileprep::storage::StorageClient;
use fileprep::tasks::TaskRunner;

const RUN_DIR: &str = "2023-12-14 14-24-00-000000";

fn fixed_clock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 12, 14, 14, 24, 0).unwrap()
}

/// Headered CSV with the member name appended; refuses units containing `boom`
struct MemberCsv;

impl Script for MemberCsv {
    fn run(&self, ctx: &ScriptContext, unit: &SubUnit) -> Result<Dataset, ScriptError> {
        let text = unit.as_text().ok_or(ScriptError::BinaryInput)?;
        if text.contains("boom") {
            return Err(ScriptError::InvalidNumber {
                column: "value".into(),
                value: "boom".into(),
            });
        }

        let mut data = Dataset::read_delimited(text, &ReadOptions::csv())?;
        data.fill_column("member", Some(ctx.filename.clone()))?;
        Ok(data)
    }
}

fn build_zip(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in members {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn request(feed: &str, location: &str, concat: bool) -> PrepareFile {
    PrepareFile {
        feed_identifier: feed.into(),
        feed_version: 1,
        file_location: location.into(),
        data_supplier: "acme".into(),
        start_date: NaiveDate::from_ymd_opt(2023, 12, 14).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2023, 12, 14).unwrap(),
        source_creation_timestamp: DateTime::parse_from_rfc3339("2023-12-15T06:00:00Z").unwrap(),
        concat,
    }
}

struct Harness {
    storage: StorageClient,
    catalog: Arc<RecordingCatalog>,
    runner: TaskRunner,
}

fn harness(registry: ScriptRegistry) -> Harness {
    let storage = StorageClient::in_memory();
    let catalog = Arc::new(RecordingCatalog::new());
    let runner = TaskRunner::new(
        Arc::new(registry),
        storage.clone(),
        catalog.clone(),
        "memory://prepared",
        "atheon",
    )
    .with_clock(fixed_clock);

    Harness {
        storage,
        catalog,
        runner,
    }
}

fn zip_registry() -> ScriptRegistry {
    let mut registry = ScriptRegistry::new();
    registry.register(
        "sales",
        1,
        Arc::new(MemberCsv),
        FileHandler::zip_matching(r".*\.csv$").unwrap(),
    );
    registry
}

async fn read_text(storage: &StorageClient, location: &str) -> String {
    String::from_utf8(storage.read(location).await.unwrap().to_vec()).unwrap()
}

#[tokio::test]
async fn zip_members_concatenate_into_one_file() {
    let h = harness(zip_registry());
    let archive = build_zip(&[
        ("a.csv", b"store,value\n1,10\n"),
        ("notes.txt", b"ignore me"),
        ("b.csv", b"store,value\n2,20\n"),
    ]);
    h.storage
        .write("memory://inbox/sales.zip", archive)
        .await
        .unwrap();

    let paths = h
        .runner
        .prepare_file(request("sales", "memory://inbox/sales.zip", true))
        .await
        .unwrap();

    assert_eq!(
        paths,
        vec![format!("memory://prepared/acme/{RUN_DIR}/sales.0.csv")]
    );
    assert_eq!(
        read_text(&h.storage, &paths[0]).await,
        "store,value,member\n1,10,a.csv\n2,20,b.csv\n"
    );

    let batches = h.catalog.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 1);
    assert_eq!(batches[0][0].file_location, paths[0]);
    assert_eq!(batches[0][0].file_meta["data_provider"], "acme");
}

#[tokio::test]
async fn separate_outputs_share_run_directory() {
    let h = harness(zip_registry());
    let archive = build_zip(&[("a.csv", b"x\n1\n"), ("b.csv", b"y\n2\n")]);
    h.storage
        .write("memory://inbox/sales.zip", archive)
        .await
        .unwrap();

    let paths = h
        .runner
        .prepare_file(request("sales", "memory://inbox/sales.zip", false))
        .await
        .unwrap();

    assert_eq!(
        paths,
        vec![
            format!("memory://prepared/acme/{RUN_DIR}/sales.0.csv"),
            format!("memory://prepared/acme/{RUN_DIR}/sales.1.csv"),
        ]
    );
    assert_eq!(read_text(&h.storage, &paths[0]).await, "x,member\n1,a.csv\n");
    assert_eq!(read_text(&h.storage, &paths[1]).await, "y,member\n2,b.csv\n");

    let records = &h.catalog.batches()[0];
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].file_location, paths[1]);
}

#[tokio::test]
async fn failed_transformation_writes_and_catalogues_nothing() {
    let h = harness(zip_registry());
    let archive = build_zip(&[
        ("a.csv", b"v\n1\n"),
        ("b.csv", b"v\nboom\n"),
        ("c.csv", b"v\n3\n"),
    ]);
    h.storage
        .write("memory://inbox/sales.zip", archive)
        .await
        .unwrap();

    let result = h
        .runner
        .prepare_file(request("sales", "memory://inbox/sales.zip", false))
        .await;

    assert!(matches!(
        result,
        Err(PrepareError::Transformation { index: 1, .. })
    ));
    assert_eq!(h.catalog.calls(), 0);
    assert!(
        !h.storage
            .exists(&format!("memory://prepared/acme/{RUN_DIR}/sales.0.csv"))
            .await
            .unwrap()
    );
    assert_eq!(h.runner.metrics().snapshot().runs_failed, 1);
}

#[tokio::test]
async fn archive_without_matches_is_nothing_to_write() {
    let h = harness(zip_registry());
    h.storage
        .write(
            "memory://inbox/sales.zip",
            build_zip(&[("readme.txt", b"nothing here")]),
        )
        .await
        .unwrap();

    let result = h
        .runner
        .prepare_file(request("sales", "memory://inbox/sales.zip", true))
        .await;

    assert!(matches!(result, Err(PrepareError::NothingToWrite(_))));
    assert_eq!(h.catalog.calls(), 0);
}

#[tokio::test]
async fn missing_input_is_reported() {
    let h = harness(zip_registry());

    let result = h
        .runner
        .prepare_file(request("sales", "memory://inbox/absent.zip", true))
        .await;

    assert!(matches!(
        result,
        Err(PrepareError::Handler(HandlerError::Storage(_)))
    ));
}

#[tokio::test]
async fn reregistered_feed_uses_latest_entry() {
    let mut registry = zip_registry();
    registry.register("sales", 1, Arc::new(MemberCsv), FileHandler::basic());
    let h = harness(registry);
    h.storage
        .write("memory://inbox/sales.csv", b"v\n7\n".to_vec())
        .await
        .unwrap();

    let paths = h
        .runner
        .prepare_file(request("sales", "memory://inbox/sales.csv", true))
        .await
        .unwrap();

    assert_eq!(read_text(&h.storage, &paths[0]).await, "v,member\n7,N/A\n");
}

#[tokio::test]
async fn horizon_report_from_latin1_segments() {
    let h = harness(ScriptRegistry::with_defaults());

    let marker = format!("{}CHUNK{}\n", "#".repeat(114), "#".repeat(114));
    let report = format!(
        "{marker}Item,Dept,Description\n14/12/2023\nCrèmerie\n100,D1,Crème fraîche,2.50,1\n\
         {marker}Item,Dept,Description\n15/12/2023\nBoulangerie\n200,D2,Pain,1,3\n"
    );
    let (encoded, _, _) = WINDOWS_1252.encode(&report);
    h.storage
        .write("memory://inbox/horizon.csv", encoded.into_owned())
        .await
        .unwrap();

    let paths = h
        .runner
        .prepare_file(request(
            "horizon_daily_performance_sales",
            "memory://inbox/horizon.csv",
            true,
        ))
        .await
        .unwrap();

    let csv = read_text(&h.storage, &paths[0]).await;
    let output = Dataset::read_delimited(&csv, &ReadOptions::csv()).unwrap();

    assert_eq!(output.len(), 2);
    assert_eq!(output.value(0, "SKU"), Some("100.0"));
    assert_eq!(output.value(0, "DESCRIPTION"), Some("Crème fraîche"));
    assert_eq!(output.value(0, "CATEGORY"), Some("Crèmerie"));
    assert_eq!(output.value(0, "DAILY"), Some("20231214"));
    assert_eq!(output.value(0, "SALESCASH"), Some("2.5"));
    assert_eq!(output.value(1, "SKU"), Some("200.0"));
    assert_eq!(output.value(1, "DAILY"), Some("20231215"));
    assert_eq!(output.value(1, "CATEGORY"), Some("Boulangerie"));
    // ids restart per segment
    assert_eq!(output.value(1, "ID"), Some("0.0"));
}

#[tokio::test]
async fn local_files_in_and_out() {
    let input_dir = tempfile::TempDir::new().unwrap();
    let output_dir = tempfile::TempDir::new().unwrap();

    let input = input_dir.path().join("sales.tsv");
    std::fs::write(&input, "0001\t42\t0007.0\t2023-12-14\t9.99\t1\t4\n").unwrap();

    let runner = TaskRunner::new(
        Arc::new(ScriptRegistry::with_defaults()),
        StorageClient::in_memory(),
        Arc::new(RecordingCatalog::new()),
        output_dir.path().to_str().unwrap(),
        "atheon",
    )
    .with_clock(fixed_clock);

    let location = format!("file://{}", input.display());
    let paths = runner
        .prepare_file(request("retaillink_daily_sales", &location, true))
        .await
        .unwrap();

    let expected = output_dir
        .path()
        .join("acme")
        .join(RUN_DIR)
        .join("retaillink_daily_sales.0.csv");
    assert_eq!(paths, vec![expected.to_str().unwrap().to_string()]);

    let written = std::fs::read_to_string(expected).unwrap();
    assert!(written.ends_with("0,,,42,0007,2023-12-14,,,9.99,1.0,4.0,1\n"));
}
