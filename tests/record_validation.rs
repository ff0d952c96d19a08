use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::json;

use doc_relay::record::{
    DocumentRecord, DocumentType, LineItem, Party, Provenance, Severity, SourceBackend,
    ValidationPolicy, ValidationStatus,
};

fn dec(s: &str) -> Decimal {
    s.parse().expect("decimal literal")
}

fn item(description: &str, quantity: &str, price: &str, total: &str) -> LineItem {
    LineItem {
        description: description.to_string(),
        quantity: dec(quantity),
        unit: Some("pcs".to_string()),
        unit_price: dec(price),
        line_total: dec(total),
    }
}

fn record(items: Vec<LineItem>, total: &str) -> DocumentRecord {
    DocumentRecord {
        document_type: DocumentType::Invoice,
        document_number: "INV-001".to_string(),
        document_date: NaiveDate::from_ymd_opt(2024, 3, 15),
        supplier: Party::named("Acme LLC"),
        customer: Party::named("Builder Co"),
        line_items: items,
        currency: "UAH".to_string(),
        total_amount: dec(total),
        confidence: Some(0.93),
        normalization_notes: vec![],
    }
}

fn provenance() -> Provenance {
    Provenance::new(SourceBackend::Gemini, json!({"raw": true}), "invoice.jpg", None)
}

#[test]
fn complete_consistent_document_is_valid() {
    let rec = record(
        vec![item("Cement M500", "10", "150", "1500"), item("Sand", "2", "250.50", "501")],
        "2001",
    );
    let result = rec.validate(provenance(), &ValidationPolicy::default());
    assert_eq!(result.validation_status, ValidationStatus::Valid);
    assert!(result.issues.is_empty(), "unexpected issues: {:?}", result.issues);
}

#[test]
fn small_total_mismatch_is_a_warning_not_an_error() {
    // Line items sum to 995, the document claims 1000.
    let rec = record(
        vec![item("Bricks", "100", "5", "500"), item("Mortar", "9", "55", "495")],
        "1000",
    );
    let result = rec.validate(provenance(), &ValidationPolicy::default());

    assert_eq!(result.validation_status, ValidationStatus::ValidWithWarnings);
    let total_issue = result
        .issues
        .iter()
        .find(|i| i.field == "total_amount")
        .expect("total deviation must be reported");
    assert_eq!(total_issue.severity, Severity::Warning);
    assert!(result.issues.iter().all(|i| i.severity == Severity::Warning));
}

#[test]
fn large_total_mismatch_invalidates_the_document() {
    let rec = record(vec![item("Steel beam", "1", "800", "800")], "1000");
    let result = rec.validate(provenance(), &ValidationPolicy::default());
    assert_eq!(result.validation_status, ValidationStatus::Invalid);
    assert!(result
        .issues
        .iter()
        .any(|i| i.field == "total_amount" && i.severity == Severity::Error));
}

#[test]
fn line_total_beyond_tolerance_is_an_error() {
    let rec = record(vec![item("Paint", "3", "100", "250")], "250");
    let result = rec.validate(provenance(), &ValidationPolicy::default());
    assert_eq!(result.validation_status, ValidationStatus::Invalid);
    assert!(result
        .issues
        .iter()
        .any(|i| i.field == "line_items[0].line_total" && i.severity == Severity::Error));
}

#[test]
fn rounding_within_tolerance_passes_silently() {
    let rec = record(vec![item("Screws", "3", "0.333", "1.00")], "1.00");
    let result = rec.validate(provenance(), &ValidationPolicy::default());
    assert_eq!(result.validation_status, ValidationStatus::Valid);
}

#[test]
fn missing_date_and_supplier_downgrade_to_warnings() {
    let mut rec = record(vec![item("Tile", "1", "10", "10")], "10");
    rec.document_date = None;
    rec.supplier = Party::default();
    let result = rec.validate(provenance(), &ValidationPolicy::default());
    assert_eq!(result.validation_status, ValidationStatus::ValidWithWarnings);
    let fields: Vec<&str> = result.issues.iter().map(|i| i.field.as_str()).collect();
    assert!(fields.contains(&"document_date"));
    assert!(fields.contains(&"supplier.name"));
}

#[test]
fn negative_quantity_and_empty_description_are_errors() {
    let rec = record(vec![item("", "-1", "10", "-10")], "-10");
    let (status, issues) = rec.check(&ValidationPolicy::default());
    assert_eq!(status, ValidationStatus::Invalid);
    assert!(issues.iter().any(|i| i.field == "line_items[0].description"));
    assert!(issues.iter().any(|i| i.field == "line_items[0].quantity"));
}

#[test]
fn normalization_notes_surface_as_warnings() {
    let mut rec = record(vec![item("Glue", "1", "20", "20")], "20");
    rec.normalization_notes.push("line item 0: quantity missing, assumed 1".into());
    let result = rec.validate(provenance(), &ValidationPolicy::default());
    assert_eq!(result.validation_status, ValidationStatus::ValidWithWarnings);
    assert!(result.issues.iter().any(|i| i.field == "normalization"));
}

#[test]
fn validation_is_deterministic() {
    let rec = record(vec![item("Pipe", "4", "12.5", "50")], "49");
    let policy = ValidationPolicy::default();
    assert_eq!(rec.check(&policy), rec.check(&policy));
}

#[test]
fn stricter_policy_turns_a_warning_into_an_error() {
    let rec = record(vec![item("Wire", "1", "995", "995")], "1000");
    let strict = ValidationPolicy {
        tolerance: dec("0.01"),
        warning_ratio: dec("0.001"),
    };
    let (status, _) = rec.check(&strict);
    assert_eq!(status, ValidationStatus::Invalid);
}
