//! Loading CSV exports, manuals, and the built-in sample.

use std::fs;

use fleet_cli::ingest::{DOCUMENT_TYPE_KEY, DocumentLoader, SAMPLE_MANUAL_SOURCE, read_csv, sample_manual};
use fleet_rag::{CharacterChunker, RagError};

const LOGS_CSV: &str = "\
vehicle_id,date,service_type,cost
TRK-001,2024-03-01,Oil Change,245.50
TRK-002,2024-03-04,Brake Inspection,180.00
";

fn loader(dir: &std::path::Path) -> DocumentLoader {
    DocumentLoader::new(dir, Box::new(CharacterChunker::new(1000, 200)))
}

#[test]
fn csv_rows_become_documents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("synthetic_maintenance_logs.csv");
    fs::write(&path, LOGS_CSV).unwrap();

    let docs = read_csv(&path, "maintenance_log").unwrap();

    assert_eq!(docs.len(), 2);
    assert_eq!(
        docs[0].content,
        "vehicle_id: TRK-001\ndate: 2024-03-01\nservice_type: Oil Change\ncost: 245.50"
    );
    assert_eq!(docs[1].metadata["row_index"], "1");
    assert_eq!(docs[1].metadata["type"], "csv_data");
    assert_eq!(docs[1].metadata[DOCUMENT_TYPE_KEY], "maintenance_log");
    assert_eq!(docs[1].source(), path.display().to_string());
}

#[test]
fn malformed_csv_contributes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("synthetic_obd_codes.csv"),
        "code,description\nP0217,Engine over temperature,extra\n",
    )
    .unwrap();

    assert!(loader(dir.path()).load_csv("synthetic_obd_codes.csv", "obd_codes").is_empty());
}

#[test]
fn malformed_row_is_an_ingestion_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("synthetic_obd_codes.csv");
    fs::write(&path, "code,description\nP0217,Engine over temperature,extra\n").unwrap();

    match read_csv(&path, "obd_codes").unwrap_err() {
        RagError::Ingestion(message) => assert!(message.contains("malformed row 0")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_csv_is_an_ingestion_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_csv(&dir.path().join("absent.csv"), "fleet_info").unwrap_err();
    assert!(matches!(err, RagError::Ingestion(_)));
}

#[test]
fn missing_sources_fall_back_to_sample_manual() {
    let dir = tempfile::tempdir().unwrap();

    let chunks = loader(dir.path()).load_all();

    assert!(!chunks.is_empty());
    assert!(chunks.iter().all(|c| c.source() == SAMPLE_MANUAL_SOURCE));
    assert!(chunks.iter().all(|c| c.content.chars().count() <= 1000));
}

#[test]
fn loads_csvs_and_raw_manuals() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("synthetic_maintenance_logs.csv"), LOGS_CSV).unwrap();
    fs::write(
        dir.path().join("synthetic_fleet_info.csv"),
        "vehicle_id,make,model\nTRK-001,Freightliner,Cascadia\n",
    )
    .unwrap();
    fs::create_dir(dir.path().join("raw")).unwrap();
    fs::write(dir.path().join("raw/air_brakes.md"), "# Air brakes\nDrain tanks daily.").unwrap();
    fs::write(dir.path().join("raw/notes.pdf"), "binary").unwrap();

    let chunks = loader(dir.path()).without_sample_manual().load_all();

    let types: Vec<&str> = chunks.iter().map(|c| c.metadata[DOCUMENT_TYPE_KEY].as_str()).collect();
    assert_eq!(types, vec!["maintenance_log", "maintenance_log", "fleet_info", "manual"]);
    assert_eq!(chunks[3].content, "# Air brakes\nDrain tanks daily.");
}

#[test]
fn sample_manual_covers_overheating() {
    let manual = sample_manual();
    assert_eq!(manual.source(), SAMPLE_MANUAL_SOURCE);
    assert!(manual.content.contains("### Engine Overheating"));
    assert_eq!(manual.metadata[DOCUMENT_TYPE_KEY], "maintenance_manual");
}
