//! HTTP clients for the AI backends.
//!
//! Both clients only ship the document out and hand back whatever JSON the
//! backend answered with; interpreting that answer is the job of the
//! [`extract`](crate::extract) adapters.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::config::{InputLimits, PipelineConfig, Secret};
use crate::contract::{AnalysisBackend, BackendPayload, InboundDocument};
use crate::error::ExtractionError;
use crate::record::SourceBackend;

/// Instructions sent along with every file to Gemini.
pub const EXTRACTION_PROMPT: &str = r#"You are given a photo or scan of a business document (invoice, receipt, service bill, rental agreement or supply document).
Extract its contents and answer with a single JSON object, no prose, using exactly these keys:
{
  "is_document": true,
  "document_type": "invoice | receipt | service_bill | rental_agreement | supply_document | unknown",
  "document_number": "string or null",
  "date": "YYYY-MM-DD or null",
  "supplier": {"name": "string", "tax_id": "string or null", "address": "string or null"},
  "customer": {"name": "string", "tax_id": "string or null", "address": "string or null"},
  "items": [{"name": "string", "quantity": number, "unit": "string or null", "price": number, "total": number}],
  "total_amount": number,
  "currency": "ISO 4217 code or null",
  "confidence": number between 0 and 1
}
Keep line items in document order. If the image is not a document, answer {"is_document": false}."#;

/// Reject inputs no backend can work with before spending a network call on them.
pub fn check_format(document: &InboundDocument, limits: &InputLimits) -> Result<(), ExtractionError> {
    if document.bytes.is_empty() {
        return Err(ExtractionError::malformed(format!("{} is empty", document.file_name)));
    }
    if document.bytes.len() as u64 > limits.max_file_size {
        return Err(ExtractionError::unsupported(format!(
            "{} is {} bytes, limit is {}",
            document.file_name,
            document.bytes.len(),
            limits.max_file_size
        )));
    }
    let extension_allowed = document.extension().is_some_and(|ext| {
        limits.image_extensions.contains(&ext) || limits.document_extensions.contains(&ext)
    });
    if document.mime_type.starts_with("image/") || extension_allowed {
        Ok(())
    } else {
        Err(ExtractionError::unsupported(format!(
            "{} ({}) is neither an image nor a supported document",
            document.file_name, document.mime_type
        )))
    }
}

fn transport_error(backend: SourceBackend, e: reqwest::Error) -> ExtractionError {
    if e.is_timeout() {
        ExtractionError::timeout(format!("{backend} request timed out: {e}"))
    } else {
        ExtractionError::backend(format!("{backend} request failed: {e}"))
    }
}

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: Secret,
    model: String,
    base_url: String,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(api_key: Secret, model: String, base_url: String, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url,
            timeout_secs,
        }
    }
}

#[async_trait]
impl AnalysisBackend for GeminiClient {
    fn backend(&self) -> SourceBackend {
        SourceBackend::Gemini
    }

    async fn analyze(&self, document: &InboundDocument) -> Result<BackendPayload, ExtractionError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let data = base64::engine::general_purpose::STANDARD.encode(&document.bytes);
        let body = json!({
            "contents": [{
                "parts": [
                    {"text": EXTRACTION_PROMPT},
                    {"inline_data": {"mime_type": document.mime_type, "data": data}}
                ]
            }],
            "generationConfig": {"responseMimeType": "application/json"}
        });

        info!(file = %document.file_name, model = %self.model, "[BACKEND] Sending document to Gemini");
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose())
            .json(&body)
            .timeout(Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .map_err(|e| transport_error(SourceBackend::Gemini, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, file = %document.file_name, "[BACKEND] Gemini returned error. Response body: {text}");
            return Err(ExtractionError::backend(format!("Gemini returned {status}")));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ExtractionError::malformed(format!("Gemini response is not JSON: {e}")))?;
        info!(file = %document.file_name, "[BACKEND] Gemini answered");
        Ok(BackendPayload::Gemini(value))
    }
}

pub struct N8nClient {
    client: reqwest::Client,
    webhook_url: String,
    timeout_secs: u64,
}

impl N8nClient {
    pub fn new(webhook_url: String, timeout_secs: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
            timeout_secs,
        }
    }
}

#[async_trait]
impl AnalysisBackend for N8nClient {
    fn backend(&self) -> SourceBackend {
        SourceBackend::N8n
    }

    async fn analyze(&self, document: &InboundDocument) -> Result<BackendPayload, ExtractionError> {
        let part = reqwest::multipart::Part::bytes(document.bytes.clone())
            .file_name(document.file_name.clone())
            .mime_str(&document.mime_type)
            .map_err(|e| ExtractionError::unsupported(format!("invalid mime type: {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        info!(file = %document.file_name, "[BACKEND] Posting document to N8N webhook");
        let response = self
            .client
            .post(&self.webhook_url)
            .multipart(form)
            .timeout(Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .map_err(|e| transport_error(SourceBackend::N8n, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(SourceBackend::N8n, e))?;
        if !status.is_success() {
            error!(status = %status, file = %document.file_name, "[BACKEND] N8N returned error. Response body: {text}");
            return Err(ExtractionError::backend(format!("N8N returned {status}")));
        }
        if text.trim().is_empty() {
            return Err(ExtractionError::malformed("N8N returned an empty body"));
        }
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| ExtractionError::malformed(format!("N8N response is not JSON: {e}")))?;
        info!(file = %document.file_name, "[BACKEND] N8N answered");
        Ok(BackendPayload::N8n(value))
    }
}

/// Build the client for the configured `ai_backend`.
pub fn build_backend(
    config: &PipelineConfig,
) -> Result<Arc<dyn AnalysisBackend>, Box<dyn std::error::Error + Send + Sync>> {
    match config.ai_backend {
        SourceBackend::Gemini => {
            let api_key = config.gemini.api_key.clone().ok_or_else(|| {
                error!("GEMINI_API_KEY missing in environment");
                "GEMINI_API_KEY environment variable not set"
            })?;
            Ok(Arc::new(GeminiClient::new(
                api_key,
                config.gemini.model.clone(),
                config.gemini.base_url.clone(),
                config.gemini.timeout_secs,
            )))
        }
        SourceBackend::N8n => {
            let webhook_url = config.n8n.webhook_url.clone().ok_or_else(|| {
                error!("N8N_WEBHOOK_URL missing in configuration and environment");
                "N8N_WEBHOOK_URL environment variable not set"
            })?;
            Ok(Arc::new(N8nClient::new(webhook_url, config.n8n.timeout_secs)))
        }
    }
}
