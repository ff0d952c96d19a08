//! # contract: the seams of the pipeline
//!
//! This module defines the three traits the [`pipeline`](crate::pipeline)
//! coordinator is written against, and the plain data types that cross them:
//!
//! - [`AnalysisBackend`]: sends an [`InboundDocument`] to an AI backend and
//!   returns its opaque answer as a [`BackendPayload`].
//! - [`ExtractionAdapter`]: maps one backend's payload shape into a
//!   [`DocumentRecord`].
//! - [`ExportWriter`]: writes validated results to one sink.
//!
//! ## Mocking & Testing
//! The async traits are annotated for `mockall` (behind the default
//! `test-export-mocks` feature) so integration tests can script backends and
//! sinks without touching the network.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::{ExtractionError, WriteError};
use crate::record::{DocumentRecord, ProcessingResult, SourceBackend};

/// A document as handed over by the messaging collaborator.
#[derive(Debug, Clone)]
pub struct InboundDocument {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    /// Project label used to pick the target spreadsheet.
    pub project: Option<String>,
}

impl InboundDocument {
    /// Read a file from disk, guessing the mime type from its extension.
    pub fn from_path(path: &Path, project: Option<String>) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let mime_type = mime_from_extension(&file_name).to_string();
        Ok(Self {
            file_name,
            mime_type,
            bytes,
            project,
        })
    }

    /// Lowercased extension including the leading dot, e.g. `.pdf`.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
    }
}

fn mime_from_extension(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "doc" => "application/msword",
        _ => "application/octet-stream",
    }
}

/// Raw backend answer, tagged by the backend that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendPayload {
    Gemini(serde_json::Value),
    N8n(serde_json::Value),
}

impl BackendPayload {
    pub fn backend(&self) -> SourceBackend {
        match self {
            BackendPayload::Gemini(_) => SourceBackend::Gemini,
            BackendPayload::N8n(_) => SourceBackend::N8n,
        }
    }

    pub fn raw(&self) -> &serde_json::Value {
        match self {
            BackendPayload::Gemini(v) | BackendPayload::N8n(v) => v,
        }
    }

    pub fn into_raw(self) -> serde_json::Value {
        match self {
            BackendPayload::Gemini(v) | BackendPayload::N8n(v) => v,
        }
    }

    pub fn tagged(backend: SourceBackend, raw: serde_json::Value) -> Self {
        match backend {
            SourceBackend::Gemini => BackendPayload::Gemini(raw),
            SourceBackend::N8n => BackendPayload::N8n(raw),
        }
    }
}

/// Trait for sending a document to an AI backend.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    fn backend(&self) -> SourceBackend;

    /// Submit the document and return the backend's answer, untouched.
    async fn analyze(&self, document: &InboundDocument) -> Result<BackendPayload, ExtractionError>;
}

/// Maps one backend's response shape into the canonical record.
pub trait ExtractionAdapter: Send + Sync {
    fn extract(&self, raw: &serde_json::Value) -> Result<DocumentRecord, ExtractionError>;
}

/// The closed set of sinks, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkName {
    GoogleSheets,
    GoogleDrive,
    LocalExcel,
    LocalJson,
}

impl SinkName {
    pub const PRIORITY: [SinkName; 4] = [
        SinkName::GoogleSheets,
        SinkName::GoogleDrive,
        SinkName::LocalExcel,
        SinkName::LocalJson,
    ];

    pub fn is_cloud(&self) -> bool {
        matches!(self, SinkName::GoogleSheets | SinkName::GoogleDrive)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SinkName::GoogleSheets => "google_sheets",
            SinkName::GoogleDrive => "google_drive",
            SinkName::LocalExcel => "local_excel",
            SinkName::LocalJson => "local_json",
        }
    }
}

impl fmt::Display for SinkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    Spreadsheet,
    CloudFile,
    LocalFile,
}

/// What a writer produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    /// URL or filesystem path of the artifact.
    pub location: String,
    pub kind: WriteKind,
    pub share_link: Option<String>,
}

/// Trait for exporting validated results to one sink.
///
/// Implementations must keep `probe` read-only: the selector may call it on
/// every run and it must never leave partial output behind.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ExportWriter: Send + Sync {
    fn sink(&self) -> SinkName;

    /// Lightweight reachability check. Returns `true` when no cheap check exists.
    async fn probe(&self) -> bool;

    async fn write(&self, results: &[ProcessingResult]) -> Result<WriteResult, WriteError>;
}
