// doc-relay/src/config.rs

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::extract::ExtractionDefaults;
use crate::record::{DocumentType, SourceBackend, ValidationPolicy};

/// A credential that must never show up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(len={})", self.0.len())
    }
}

/// Everything the pipeline needs, resolved once at startup and passed by value.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub google_sheets_enabled: bool,
    pub google_drive_enabled: bool,
    pub local_fallback_enabled: bool,
    /// Run the reachability check on every constructed sink before selecting it.
    pub probe_reachability: bool,
    pub ai_backend: SourceBackend,
    pub validation: ValidationPolicy,
    pub extraction: ExtractionDefaults,
    pub gemini: GeminiSettings,
    pub n8n: N8nSettings,
    pub google: GoogleSettings,
    pub local: LocalSettings,
    pub limits: InputLimits,
}

impl PipelineConfig {
    /// Seconds to wait on the configured backend before giving up.
    pub fn backend_timeout_secs(&self) -> u64 {
        match self.ai_backend {
            SourceBackend::Gemini => self.gemini.timeout_secs,
            SourceBackend::N8n => self.n8n.timeout_secs,
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            ai_backend = %self.ai_backend,
            google_sheets_enabled = self.google_sheets_enabled,
            google_drive_enabled = self.google_drive_enabled,
            local_fallback_enabled = self.local_fallback_enabled,
            google_token_set = self.google.access_token.is_some(),
            "Loaded PipelineConfig"
        );
        debug!(?self, "PipelineConfig loaded (full debug)");
    }
}

impl Default for PipelineConfig {
    /// Local-only configuration backed by Gemini, with no credentials.
    fn default() -> Self {
        Self {
            google_sheets_enabled: false,
            google_drive_enabled: false,
            local_fallback_enabled: true,
            probe_reachability: true,
            ai_backend: SourceBackend::Gemini,
            validation: ValidationPolicy::default(),
            extraction: ExtractionDefaults::default(),
            gemini: GeminiSettings::default(),
            n8n: N8nSettings::default(),
            google: GoogleSettings::default(),
            local: LocalSettings::default(),
            limits: InputLimits::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Option<Secret>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct N8nSettings {
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for N8nSettings {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GoogleSettings {
    /// OAuth bearer token, minted outside this crate.
    pub access_token: Option<Secret>,
    pub spreadsheet_id: Option<String>,
    /// Worksheet for goods documents.
    pub sheet_name: String,
    /// Worksheet for service bills and rental agreements.
    pub jobs_sheet_name: String,
    /// Project label → spreadsheet id.
    pub project_sheets: BTreeMap<String, String>,
    pub drive_folder_id: Option<String>,
    pub share_links: bool,
    pub sheets_base_url: String,
    pub drive_base_url: String,
}

impl GoogleSettings {
    /// Spreadsheet for `project`, falling back to the default spreadsheet.
    pub fn spreadsheet_for(&self, project: Option<&str>) -> Option<&str> {
        project
            .and_then(|p| self.project_sheets.get(p))
            .or(self.spreadsheet_id.as_ref())
            .map(String::as_str)
    }

    /// Worksheet a document of type `kind` is appended to.
    pub fn worksheet_for(&self, kind: DocumentType) -> &str {
        match kind {
            DocumentType::ServiceBill | DocumentType::RentalAgreement => &self.jobs_sheet_name,
            _ => &self.sheet_name,
        }
    }
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            access_token: None,
            spreadsheet_id: None,
            sheet_name: "materials".to_string(),
            jobs_sheet_name: "jobs".to_string(),
            project_sheets: BTreeMap::new(),
            drive_folder_id: None,
            share_links: false,
            sheets_base_url: "https://sheets.googleapis.com".to_string(),
            drive_base_url: "https://www.googleapis.com".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalSettings {
    pub excel_dir: PathBuf,
    pub json_dir: PathBuf,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            excel_dir: PathBuf::from("excel_data"),
            json_dir: PathBuf::from("json_data"),
        }
    }
}

/// Inbound file limits.
#[derive(Debug, Clone)]
pub struct InputLimits {
    pub max_file_size: u64,
    pub image_extensions: Vec<String>,
    pub document_extensions: Vec<String>,
}

impl Default for InputLimits {
    fn default() -> Self {
        let owned = |exts: &[&str]| exts.iter().map(|e| e.to_string()).collect();
        Self {
            max_file_size: 50 * 1024 * 1024,
            image_extensions: owned(&[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".tiff", ".tif"]),
            document_extensions: owned(&[".pdf", ".docx", ".doc"]),
        }
    }
}
