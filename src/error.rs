//! Error taxonomy shared by the extraction and export stages.
//!
//! Both error types carry a coarse `kind` (what the user gets to see in a
//! summary) and a free-form message (what ends up in the logs).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a document could not be turned into a record. Fatal for that document only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionErrorKind {
    MalformedPayload,
    UnsupportedFormat,
    Timeout,
    /// The backend could not be reached or answered with a non-success status.
    BackendFailure,
}

impl ExtractionErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionErrorKind::MalformedPayload => "malformed payload",
            ExtractionErrorKind::UnsupportedFormat => "unsupported format",
            ExtractionErrorKind::Timeout => "timeout",
            ExtractionErrorKind::BackendFailure => "backend failure",
        }
    }
}

impl fmt::Display for ExtractionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ExtractionError {
    pub kind: ExtractionErrorKind,
    pub message: String,
}

impl ExtractionError {
    pub fn new(kind: ExtractionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ExtractionErrorKind::MalformedPayload, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ExtractionErrorKind::UnsupportedFormat, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ExtractionErrorKind::Timeout, message)
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(ExtractionErrorKind::BackendFailure, message)
    }
}

/// Why a single sink write failed. Recovered by the coordinator as a per-sink warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteErrorKind {
    AuthFailure,
    QuotaExceeded,
    IoFailure,
}

impl WriteErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteErrorKind::AuthFailure => "auth failure",
            WriteErrorKind::QuotaExceeded => "quota exceeded",
            WriteErrorKind::IoFailure => "io failure",
        }
    }

    /// Map an HTTP status of a Google API response to a coarse category.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => WriteErrorKind::AuthFailure,
            429 => WriteErrorKind::QuotaExceeded,
            _ => WriteErrorKind::IoFailure,
        }
    }
}

impl fmt::Display for WriteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct WriteError {
    pub kind: WriteErrorKind,
    pub message: String,
}

impl WriteError {
    pub fn new(kind: WriteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(WriteErrorKind::AuthFailure, message)
    }

    pub fn quota(message: impl Into<String>) -> Self {
        Self::new(WriteErrorKind::QuotaExceeded, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(WriteErrorKind::IoFailure, message)
    }
}

impl From<std::io::Error> for WriteError {
    fn from(e: std::io::Error) -> Self {
        WriteError::io(e.to_string())
    }
}

impl From<reqwest::Error> for WriteError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => WriteError::new(WriteErrorKind::from_status(status.as_u16()), e.to_string()),
            None => WriteError::io(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_coarse_kinds() {
        assert_eq!(WriteErrorKind::from_status(401), WriteErrorKind::AuthFailure);
        assert_eq!(WriteErrorKind::from_status(403), WriteErrorKind::AuthFailure);
        assert_eq!(WriteErrorKind::from_status(429), WriteErrorKind::QuotaExceeded);
        assert_eq!(WriteErrorKind::from_status(500), WriteErrorKind::IoFailure);
    }

    #[test]
    fn display_leads_with_the_category() {
        let err = ExtractionError::timeout("gemini took longer than 60s");
        assert_eq!(err.to_string(), "timeout: gemini took longer than 60s");
    }
}
