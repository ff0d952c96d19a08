use serde_json::Value;

use super::fields::PartyKeys;
use super::{map_document, ExtractionDefaults, FieldMap};
use crate::contract::ExtractionAdapter;
use crate::error::ExtractionError;
use crate::record::DocumentRecord;

/// Keys emitted by the N8N extraction workflow.
pub(crate) static N8N_FIELDS: FieldMap = FieldMap {
    document_type: &["type", "doc_type", "document_type"],
    document_number: &["number", "invoice_number", "doc_number", "document_number"],
    document_date: &["issue_date", "date", "document_date"],
    supplier: &["seller", "supplier", "vendor"],
    customer: &["buyer", "customer", "client"],
    party: PartyKeys {
        name: &["name", "company", "title"],
        tax_id: &["vat_id", "tax_id", "tax_number", "edrpou"],
        address: &["address", "legal_address"],
    },
    line_items: &["positions", "items", "products"],
    description: &["title", "product", "name", "description"],
    quantity: &["qty", "quantity"],
    unit: &["uom", "unit"],
    unit_price: &["unit_price", "price"],
    line_total: &["amount", "sum", "total"],
    total_amount: &["grand_total", "total_amount", "total"],
    currency: &["currency_code", "currency"],
    confidence: &["confidence", "score"],
};

/// Envelope keys N8N workflows commonly wrap the document in.
const WRAPPERS: [&str; 4] = ["json", "data", "invoice", "document"];

/// Adapter for responses of the N8N document workflow.
pub struct N8nAdapter {
    defaults: ExtractionDefaults,
}

impl N8nAdapter {
    pub fn new(defaults: ExtractionDefaults) -> Self {
        Self { defaults }
    }
}

impl ExtractionAdapter for N8nAdapter {
    fn extract(&self, raw: &Value) -> Result<DocumentRecord, ExtractionError> {
        let mut current = raw;
        loop {
            match current {
                Value::Null => return Err(ExtractionError::malformed("empty N8N response")),
                Value::Array(items) => match items.as_slice() {
                    [] => return Err(ExtractionError::malformed("N8N returned an empty list")),
                    [only] => current = only,
                    _ => {
                        return Err(ExtractionError::unsupported(format!(
                            "N8N returned {} documents for one file",
                            items.len()
                        )))
                    }
                },
                Value::Object(obj) if obj.is_empty() => {
                    return Err(ExtractionError::malformed("empty N8N response"))
                }
                Value::Object(obj) => {
                    if let Some(inner) = WRAPPERS.iter().find_map(|k| obj.get(*k).filter(|v| v.is_object())) {
                        current = inner;
                        continue;
                    }
                    if let Some(Value::String(err)) = obj.get("error") {
                        return Err(ExtractionError::unsupported(format!("N8N workflow error: {err}")));
                    }
                    return map_document(obj, &N8N_FIELDS, &self.defaults);
                }
                Value::String(text) => {
                    return Err(ExtractionError::malformed(format!(
                        "N8N answered with text instead of JSON: {text}"
                    )))
                }
                other => {
                    return Err(ExtractionError::unsupported(format!(
                        "N8N answer is not a document object: {other}"
                    )))
                }
            }
        }
    }
}
