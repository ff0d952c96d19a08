use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::fields::PartyKeys;
use super::{map_document, ExtractionDefaults, FieldMap};
use crate::contract::ExtractionAdapter;
use crate::error::ExtractionError;
use crate::record::DocumentRecord;

/// Keys of the JSON document Gemini is prompted to produce.
pub(crate) static GEMINI_FIELDS: FieldMap = FieldMap {
    document_type: &["document_type", "type"],
    document_number: &["document_number", "number"],
    document_date: &["date", "document_date"],
    supplier: &["supplier", "seller", "vendor"],
    customer: &["customer", "buyer"],
    party: PartyKeys {
        name: &["name"],
        tax_id: &["tax_id", "edrpou", "vat_id"],
        address: &["address"],
    },
    line_items: &["items", "line_items"],
    description: &["name", "description"],
    quantity: &["quantity", "qty"],
    unit: &["unit"],
    unit_price: &["price", "unit_price"],
    line_total: &["total", "line_total", "sum"],
    total_amount: &["total_amount", "total"],
    currency: &["currency"],
    confidence: &["confidence"],
};

/// Adapter for Gemini `generateContent` answers.
///
/// Accepts the full API envelope (`candidates[0].content.parts[*].text`), the
/// answer text on its own, or the decoded document object.
pub struct GeminiAdapter {
    defaults: ExtractionDefaults,
}

impl GeminiAdapter {
    pub fn new(defaults: ExtractionDefaults) -> Self {
        Self { defaults }
    }
}

impl ExtractionAdapter for GeminiAdapter {
    fn extract(&self, raw: &Value) -> Result<DocumentRecord, ExtractionError> {
        match unwrap_envelope(raw)? {
            Value::Object(obj) => {
                if obj.get("is_document") == Some(&Value::Bool(false)) {
                    return Err(ExtractionError::unsupported("Gemini reports the file is not a document"));
                }
                map_document(&obj, &GEMINI_FIELDS, &self.defaults)
            }
            Value::Null => Err(ExtractionError::malformed("Gemini answered with null")),
            other => Err(ExtractionError::unsupported(format!(
                "Gemini answer is not a document object: {other}"
            ))),
        }
    }
}

fn unwrap_envelope(raw: &Value) -> Result<Value, ExtractionError> {
    match raw {
        Value::Null => Err(ExtractionError::malformed("empty Gemini response")),
        Value::String(text) => parse_answer_text(text),
        Value::Object(obj) if obj.is_empty() => Err(ExtractionError::malformed("empty Gemini response")),
        Value::Object(obj) if obj.contains_key("candidates") || obj.contains_key("promptFeedback") => {
            let text = raw
                .pointer("/candidates/0/content/parts")
                .and_then(Value::as_array)
                .map(|parts| {
                    parts
                        .iter()
                        .filter_map(|p| p.get("text").and_then(Value::as_str))
                        .collect::<Vec<_>>()
                        .join("")
                })
                .unwrap_or_default();
            if text.trim().is_empty() {
                return Err(ExtractionError::malformed("Gemini returned no answer text"));
            }
            parse_answer_text(&text)
        }
        other => Ok(other.clone()),
    }
}

fn code_fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$").expect("code fence pattern is valid")
    })
}

/// Parse the model's answer, dropping a surrounding markdown code fence.
fn parse_answer_text(text: &str) -> Result<Value, ExtractionError> {
    let trimmed = text.trim();
    let body = code_fence()
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str());
    if body.is_empty() {
        return Err(ExtractionError::malformed("Gemini answer text is empty"));
    }
    serde_json::from_str(body)
        .map_err(|e| ExtractionError::malformed(format!("Gemini answer is not JSON: {e}")))
}
