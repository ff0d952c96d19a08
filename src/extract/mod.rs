//! Extraction adapters: backend payload → [`DocumentRecord`].
//!
//! Each backend gets its own adapter that knows how to unwrap the backend's
//! envelope and which keys hold which field (a [`FieldMap`]). The mapping
//! itself is shared: missing fields fall back to defaults and leave a
//! normalization note instead of failing the document.

pub mod fields;
mod gemini;
mod n8n;

pub use gemini::GeminiAdapter;
pub use n8n::N8nAdapter;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::contract::{BackendPayload, ExtractionAdapter};
use crate::error::ExtractionError;
use crate::record::{DocumentRecord, DocumentType, LineItem};
use fields::PartyKeys;

/// Defaults applied when a backend leaves a field out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionDefaults {
    pub default_currency: String,
}

impl Default for ExtractionDefaults {
    fn default() -> Self {
        Self {
            default_currency: "UAH".to_string(),
        }
    }
}

/// Backend-specific key names for every canonical field, in lookup order.
pub struct FieldMap {
    pub document_type: &'static [&'static str],
    pub document_number: &'static [&'static str],
    pub document_date: &'static [&'static str],
    pub supplier: &'static [&'static str],
    pub customer: &'static [&'static str],
    pub party: PartyKeys,
    pub line_items: &'static [&'static str],
    pub description: &'static [&'static str],
    pub quantity: &'static [&'static str],
    pub unit: &'static [&'static str],
    pub unit_price: &'static [&'static str],
    pub line_total: &'static [&'static str],
    pub total_amount: &'static [&'static str],
    pub currency: &'static [&'static str],
    pub confidence: &'static [&'static str],
}

impl FieldMap {
    /// Whether `obj` carries at least one document-level field.
    fn recognizes(&self, obj: &Map<String, Value>) -> bool {
        [
            self.document_number,
            self.document_date,
            self.supplier,
            self.customer,
            self.line_items,
            self.total_amount,
        ]
        .iter()
        .any(|keys| keys.iter().any(|k| obj.contains_key(*k)))
    }
}

/// Run the adapter matching the payload's backend tag.
pub fn extract_payload(
    payload: &BackendPayload,
    defaults: &ExtractionDefaults,
) -> Result<DocumentRecord, ExtractionError> {
    let result = match payload {
        BackendPayload::Gemini(raw) => GeminiAdapter::new(defaults.clone()).extract(raw),
        BackendPayload::N8n(raw) => N8nAdapter::new(defaults.clone()).extract(raw),
    };
    match &result {
        Ok(record) => info!(
            backend = %payload.backend(),
            document_number = %record.document_number,
            line_items = record.line_items.len(),
            notes = record.normalization_notes.len(),
            "[EXTRACT] Payload mapped to document record"
        ),
        Err(e) => warn!(backend = %payload.backend(), error = %e, "[EXTRACT] Payload rejected"),
    }
    result
}

/// Shared field mapping used by every adapter once the envelope is unwrapped.
pub(crate) fn map_document(
    obj: &Map<String, Value>,
    map: &FieldMap,
    defaults: &ExtractionDefaults,
) -> Result<DocumentRecord, ExtractionError> {
    if !map.recognizes(obj) {
        return Err(ExtractionError::unsupported(
            "payload carries none of the expected document fields",
        ));
    }

    let mut notes = Vec::new();

    let document_type = fields::first(obj, map.document_type)
        .and_then(fields::text)
        .map(|label| DocumentType::from_label(&label))
        .unwrap_or_default();

    let document_number = fields::first(obj, map.document_number)
        .and_then(fields::text)
        .unwrap_or_default();

    let document_date = match fields::first(obj, map.document_date) {
        Some(raw) => {
            let parsed = fields::date(raw);
            if parsed.is_none() {
                notes.push(format!("document date {raw} could not be parsed"));
            }
            parsed
        }
        None => None,
    };

    let supplier = fields::party(fields::first(obj, map.supplier), &map.party);
    let customer = fields::party(fields::first(obj, map.customer), &map.party);

    let line_items = match fields::first(obj, map.line_items) {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| match item {
                Value::Object(item) => Some(map_line_item(idx, item, map, &mut notes)),
                other => {
                    notes.push(format!("line item {idx} skipped: expected an object, got {other}"));
                    None
                }
            })
            .collect(),
        Some(other) => {
            notes.push(format!("line items ignored: expected a list, got {other}"));
            Vec::new()
        }
        None => Vec::new(),
    };

    let currency = match fields::first(obj, map.currency).and_then(fields::currency) {
        Some(code) => code,
        None => defaults.default_currency.clone(),
    };

    let total_amount = match fields::first(obj, map.total_amount).and_then(fields::decimal) {
        Some(total) => total,
        None => {
            let derived = line_items
                .iter()
                .try_fold(Decimal::ZERO, |acc: Decimal, i: &LineItem| acc.checked_add(i.line_total))
                .unwrap_or(Decimal::ZERO);
            notes.push(format!("total amount missing, derived {derived} from line items"));
            derived
        }
    };

    let confidence = fields::first(obj, map.confidence).and_then(|v| v.as_f64());

    debug!(
        document_type = document_type.as_str(),
        notes = notes.len(),
        "[EXTRACT] Document fields mapped"
    );

    Ok(DocumentRecord {
        document_type,
        document_number,
        document_date,
        supplier,
        customer,
        line_items,
        currency,
        total_amount,
        confidence,
        normalization_notes: notes,
    })
}

fn map_line_item(
    idx: usize,
    item: &Map<String, Value>,
    map: &FieldMap,
    notes: &mut Vec<String>,
) -> LineItem {
    let description = fields::first(item, map.description)
        .and_then(fields::text)
        .unwrap_or_default();
    let unit = fields::first(item, map.unit).and_then(fields::text);

    let quantity = fields::first(item, map.quantity).and_then(fields::decimal);
    let unit_price = fields::first(item, map.unit_price).and_then(fields::decimal);
    let line_total = fields::first(item, map.line_total).and_then(fields::decimal);

    let quantity = quantity.unwrap_or_else(|| {
        notes.push(format!("line item {idx}: quantity missing, assumed 1"));
        Decimal::ONE
    });
    let unit_price = unit_price.unwrap_or_else(|| {
        notes.push(format!("line item {idx}: unit price missing, assumed 0"));
        Decimal::ZERO
    });
    let line_total = line_total.unwrap_or_else(|| {
        let derived = quantity.checked_mul(unit_price).unwrap_or(Decimal::ZERO);
        notes.push(format!("line item {idx}: line total missing, derived {derived}"));
        derived
    });

    LineItem {
        description,
        quantity,
        unit,
        unit_price,
        line_total,
    }
}
