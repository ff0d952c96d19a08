use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::json;

use doc_relay::contract::{BackendPayload, ExtractionAdapter};
use doc_relay::error::ExtractionErrorKind;
use doc_relay::extract::{extract_payload, ExtractionDefaults, GeminiAdapter, N8nAdapter};
use doc_relay::record::DocumentType;

fn dec(s: &str) -> Decimal {
    s.parse().expect("decimal literal")
}

fn gemini_document() -> serde_json::Value {
    json!({
        "is_document": true,
        "document_type": "invoice",
        "document_number": "РФ-0042",
        "date": "15.03.2024",
        "supplier": {"name": "ТОВ Будмат", "tax_id": "12345678"},
        "customer": {"name": "ФОП Петренко"},
        "items": [
            {"name": "Цемент М500", "quantity": 10, "unit": "мішок", "price": "150,00", "total": 1500},
            {"name": "Пісок", "quantity": "2", "price": 250.5, "total": "501.00"}
        ],
        "total_amount": "2 001,00",
        "currency": "грн",
        "confidence": 0.91
    })
}

#[test]
fn gemini_document_maps_every_field() {
    let adapter = GeminiAdapter::new(ExtractionDefaults::default());
    let record = adapter.extract(&gemini_document()).expect("document should map");

    assert_eq!(record.document_type, DocumentType::Invoice);
    assert_eq!(record.document_number, "РФ-0042");
    assert_eq!(record.document_date, NaiveDate::from_ymd_opt(2024, 3, 15));
    assert_eq!(record.supplier.name, "ТОВ Будмат");
    assert_eq!(record.supplier.tax_id.as_deref(), Some("12345678"));
    assert_eq!(record.customer.name, "ФОП Петренко");
    assert_eq!(record.line_items.len(), 2);
    assert_eq!(record.line_items[0].description, "Цемент М500");
    assert_eq!(record.line_items[0].unit_price, dec("150.00"));
    assert_eq!(record.line_items[1].quantity, dec("2"));
    assert_eq!(record.line_items[1].line_total, dec("501"));
    assert_eq!(record.total_amount, dec("2001"));
    assert_eq!(record.currency, "UAH");
    assert_eq!(record.confidence, Some(0.91));
    assert!(record.normalization_notes.is_empty(), "{:?}", record.normalization_notes);
}

#[test]
fn gemini_api_envelope_with_fenced_text_is_unwrapped() {
    let text = format!("```json\n{}\n```", gemini_document());
    let envelope = json!({
        "candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}],
        "usageMetadata": {"totalTokenCount": 812}
    });
    let record = GeminiAdapter::new(ExtractionDefaults::default())
        .extract(&envelope)
        .expect("envelope should unwrap");
    assert_eq!(record.document_number, "РФ-0042");
    assert_eq!(record.line_items.len(), 2);
}

#[test]
fn missing_date_yields_none_without_failing() {
    let mut doc = gemini_document();
    doc.as_object_mut().unwrap().remove("date");
    let record = GeminiAdapter::new(ExtractionDefaults::default())
        .extract(&doc)
        .expect("a missing date is not fatal");
    assert_eq!(record.document_date, None);
}

#[test]
fn unparseable_date_leaves_a_note() {
    let mut doc = gemini_document();
    doc["date"] = json!("sometime in spring");
    let record = GeminiAdapter::new(ExtractionDefaults::default())
        .extract(&doc)
        .unwrap();
    assert_eq!(record.document_date, None);
    assert!(record.normalization_notes.iter().any(|n| n.contains("date")));
}

#[test]
fn missing_currency_falls_back_to_the_configured_default() {
    let mut doc = gemini_document();
    doc.as_object_mut().unwrap().remove("currency");
    let defaults = ExtractionDefaults {
        default_currency: "EUR".to_string(),
    };
    let record = GeminiAdapter::new(defaults).extract(&doc).unwrap();
    assert_eq!(record.currency, "EUR");
}

#[test]
fn missing_item_fields_are_defaulted_with_notes() {
    let doc = json!({
        "document_number": "7",
        "items": [{"name": "Delivery", "price": 300}],
        "total_amount": 300
    });
    let record = GeminiAdapter::new(ExtractionDefaults::default())
        .extract(&doc)
        .unwrap();
    let item = &record.line_items[0];
    assert_eq!(item.quantity, Decimal::ONE);
    assert_eq!(item.line_total, dec("300"));
    assert_eq!(record.normalization_notes.len(), 2);
}

#[test]
fn gemini_failure_modes_are_classified() {
    let adapter = GeminiAdapter::new(ExtractionDefaults::default());
    let kind = |v: serde_json::Value| adapter.extract(&v).unwrap_err().kind;

    assert_eq!(kind(json!(null)), ExtractionErrorKind::MalformedPayload);
    assert_eq!(kind(json!({})), ExtractionErrorKind::MalformedPayload);
    assert_eq!(kind(json!("not json at all")), ExtractionErrorKind::MalformedPayload);
    assert_eq!(
        kind(json!({"candidates": [{"content": {"parts": []}}]})),
        ExtractionErrorKind::MalformedPayload
    );
    assert_eq!(kind(json!({"is_document": false})), ExtractionErrorKind::UnsupportedFormat);
    assert_eq!(kind(json!({"weather": "sunny"})), ExtractionErrorKind::UnsupportedFormat);
    assert_eq!(kind(json!([1, 2, 3])), ExtractionErrorKind::UnsupportedFormat);
}

#[test]
fn n8n_wrapped_list_response_maps_with_its_own_keys() {
    let payload = json!([{
        "json": {
            "doc_type": "Видаткова накладна",
            "invoice_number": "ВН-15",
            "issue_date": "2024-02-01",
            "seller": {"company": "ТОВ Склад", "edrpou": "87654321"},
            "buyer": {"company": "ТОВ Ремонт"},
            "positions": [
                {"title": "Плитка", "qty": 20, "uom": "м2", "unit_price": 310, "amount": 6200}
            ],
            "grand_total": 6200,
            "currency_code": "UAH"
        }
    }]);
    let record = N8nAdapter::new(ExtractionDefaults::default())
        .extract(&payload)
        .expect("n8n payload should map");

    assert_eq!(record.document_type, DocumentType::Invoice);
    assert_eq!(record.document_number, "ВН-15");
    assert_eq!(record.document_date, NaiveDate::from_ymd_opt(2024, 2, 1));
    assert_eq!(record.supplier.name, "ТОВ Склад");
    assert_eq!(record.supplier.tax_id.as_deref(), Some("87654321"));
    assert_eq!(record.line_items[0].unit.as_deref(), Some("м2"));
    assert_eq!(record.total_amount, dec("6200"));
}

#[test]
fn n8n_failure_modes_are_classified() {
    let adapter = N8nAdapter::new(ExtractionDefaults::default());
    let kind = |v: serde_json::Value| adapter.extract(&v).unwrap_err().kind;

    assert_eq!(kind(json!(null)), ExtractionErrorKind::MalformedPayload);
    assert_eq!(kind(json!([])), ExtractionErrorKind::MalformedPayload);
    assert_eq!(kind(json!({})), ExtractionErrorKind::MalformedPayload);
    assert_eq!(kind(json!("<html>gateway</html>")), ExtractionErrorKind::MalformedPayload);
    assert_eq!(
        kind(json!({"error": "Workflow could not be started"})),
        ExtractionErrorKind::UnsupportedFormat
    );
    assert_eq!(
        kind(json!([{"number": "1"}, {"number": "2"}])),
        ExtractionErrorKind::UnsupportedFormat
    );
}

#[test]
fn payload_tag_selects_the_adapter() {
    let defaults = ExtractionDefaults::default();
    let n8n_shaped = json!({"invoice_number": "A-1", "grand_total": 10, "positions": []});

    let via_n8n = extract_payload(&BackendPayload::N8n(n8n_shaped.clone()), &defaults).unwrap();
    assert_eq!(via_n8n.document_number, "A-1");
    assert_eq!(via_n8n.total_amount, dec("10"));

    // The Gemini adapter does not know these keys.
    let via_gemini = extract_payload(&BackendPayload::Gemini(n8n_shaped), &defaults);
    assert_eq!(via_gemini.unwrap_err().kind, ExtractionErrorKind::UnsupportedFormat);
}
