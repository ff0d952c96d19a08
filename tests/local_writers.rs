use serde_json::{json, Value};
use tempfile::tempdir;

use doc_relay::contract::{ExportWriter, WriteKind};
use doc_relay::export::excel::workbook_bytes;
use doc_relay::export::{LocalExcelWriter, LocalJsonWriter};
use doc_relay::record::{
    DocumentRecord, DocumentType, LineItem, Party, ProcessingResult, Provenance, SourceBackend,
    ValidationPolicy,
};

fn result(number: &str, project: Option<&str>) -> ProcessingResult {
    let record = DocumentRecord {
        document_type: DocumentType::ServiceBill,
        document_number: number.to_string(),
        document_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 31),
        supplier: Party {
            name: "Electric Co".to_string(),
            tax_id: Some("00112233".to_string()),
            address: Some("Kyiv".to_string()),
        },
        customer: Party::named("Office"),
        line_items: vec![LineItem {
            description: "Electricity, January".to_string(),
            quantity: "412".parse().unwrap(),
            unit: Some("kWh".to_string()),
            unit_price: "4.32".parse().unwrap(),
            line_total: "1779.84".parse().unwrap(),
        }],
        currency: "UAH".to_string(),
        total_amount: "1779.84".parse().unwrap(),
        confidence: Some(0.88),
        normalization_notes: vec!["currency missing, used UAH".to_string()],
    };
    let provenance = Provenance::new(
        SourceBackend::N8n,
        json!({"invoice_number": number, "grand_total": "1779.84"}),
        "bill.pdf",
        project.map(str::to_string),
    );
    record.validate(provenance, &ValidationPolicy::default())
}

#[tokio::test]
async fn json_output_reads_back_field_for_field() {
    let dir = tempdir().unwrap();
    let original = result("E-1", None);
    let writer = LocalJsonWriter::new(dir.path().to_path_buf());

    let written = writer.write(std::slice::from_ref(&original)).await.unwrap();
    assert_eq!(written.kind, WriteKind::LocalFile);

    let body = std::fs::read_to_string(&written.location).unwrap();
    let decoded: doc_relay::record::ProcessingResult = serde_json::from_str(&body).unwrap();
    assert_eq!(decoded, original);
}

#[tokio::test]
async fn json_field_names_are_stable() {
    let dir = tempdir().unwrap();
    let writer = LocalJsonWriter::new(dir.path().to_path_buf());
    let written = writer.write(&[result("E-2", None)]).await.unwrap();
    let value: Value = serde_json::from_str(&std::fs::read_to_string(&written.location).unwrap()).unwrap();

    for key in ["record", "provenance", "validation_status", "issues"] {
        assert!(value.get(key).is_some(), "missing top-level key {key}");
    }
    for key in [
        "source_backend",
        "raw_backend_payload",
        "payload_sha256",
        "run_id",
        "received_at",
        "file_name",
        "project",
    ] {
        assert!(value["provenance"].get(key).is_some(), "missing provenance key {key}");
    }
    assert_eq!(value["provenance"]["source_backend"], "n8n");
    assert_eq!(value["record"]["document_type"], "service_bill");
    assert_eq!(value["validation_status"], "valid_with_warnings");
    assert_eq!(value["record"]["line_items"][0]["unit"], "kWh");
}

#[tokio::test]
async fn several_json_results_land_in_one_directory() {
    let dir = tempdir().unwrap();
    let writer = LocalJsonWriter::new(dir.path().join("json_data"));
    let written = writer
        .write(&[result("E-3", None), result("E-4", None)])
        .await
        .unwrap();
    assert_eq!(written.location, dir.path().join("json_data").display().to_string());
    assert_eq!(std::fs::read_dir(dir.path().join("json_data")).unwrap().count(), 2);
}

#[tokio::test]
async fn excel_file_is_named_after_project_and_document() {
    let dir = tempdir().unwrap();
    let writer = LocalExcelWriter::new(dir.path().to_path_buf());
    let written = writer.write(&[result("E/5", Some("Main Office"))]).await.unwrap();

    let file_name = std::path::Path::new(&written.location)
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();
    assert!(file_name.starts_with("Main_Office_analysis_E_5_"), "{file_name}");
    assert!(file_name.ends_with(".xlsx"));

    let bytes = std::fs::read(&written.location).unwrap();
    // xlsx files are zip archives.
    assert_eq!(&bytes[..2], b"PK");
}

#[test]
fn workbook_renders_in_memory() {
    let bytes = workbook_bytes(&[result("E-6", None), result("E-7", None)]).unwrap();
    assert!(bytes.len() > 100);
    assert_eq!(&bytes[..2], b"PK");
}

#[tokio::test]
async fn json_output_keeps_full_float_precision() {
    let dir = tempdir().unwrap();
    let mut original = result("E-8", None);
    original.record.confidence = Some(0.9856906946328695);
    original.provenance.raw_backend_payload = json!({
        "confidence": 0.9856906946328695,
        "scores": [0.1 + 0.2, 1.0 / 3.0, 2.718281828459045],
    });

    let writer = LocalJsonWriter::new(dir.path().to_path_buf());
    let written = writer.write(std::slice::from_ref(&original)).await.unwrap();
    let decoded: ProcessingResult =
        serde_json::from_str(&std::fs::read_to_string(&written.location).unwrap()).unwrap();

    assert_eq!(decoded.record.confidence, Some(0.9856906946328695));
    assert_eq!(decoded.provenance.raw_backend_payload, original.provenance.raw_backend_payload);
    assert_eq!(decoded, original);
}
