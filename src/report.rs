//! Per-document summary handed back to the caller.
//!
//! The `Display` rendering is what a user sees: it names sinks, coarse error
//! categories and totals, never raw backend messages or credentials.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::contract::{SinkName, WriteResult};
use crate::error::{ExtractionErrorKind, WriteErrorKind};
use crate::record::{ProcessingResult, ValidationIssue, ValidationStatus};
use crate::select::ProcessingMode;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinkOutcome {
    pub sink: SinkName,
    pub outcome: Result<WriteResult, WriteErrorKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TotalsExcerpt {
    pub document_number: String,
    pub document_date: Option<NaiveDate>,
    pub line_items: usize,
    pub line_total_sum: Option<Decimal>,
    pub total_amount: Decimal,
    pub currency: String,
}

impl TotalsExcerpt {
    pub fn from_result(result: &ProcessingResult) -> Self {
        let record = &result.record;
        Self {
            document_number: record.document_number.clone(),
            document_date: record.document_date,
            line_items: record.line_items.len(),
            line_total_sum: record.line_total_sum(),
            total_amount: record.total_amount,
            currency: record.currency.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HardFailure {
    Extraction(ExtractionErrorKind),
    NoSinkSucceeded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentReport {
    pub file_name: String,
    pub validation_status: Option<ValidationStatus>,
    pub issues: Vec<ValidationIssue>,
    pub mode: Option<ProcessingMode>,
    pub sinks: Vec<SinkOutcome>,
    pub excerpt: Option<TotalsExcerpt>,
    pub failure: Option<HardFailure>,
}

impl DocumentReport {
    pub fn extraction_failed(file_name: impl Into<String>, kind: ExtractionErrorKind) -> Self {
        Self {
            file_name: file_name.into(),
            validation_status: None,
            issues: Vec::new(),
            mode: None,
            sinks: Vec::new(),
            excerpt: None,
            failure: Some(HardFailure::Extraction(kind)),
        }
    }

    /// Build the report for a validated document; zero successful sinks is a hard failure.
    pub fn written(result: &ProcessingResult, mode: ProcessingMode, sinks: Vec<SinkOutcome>) -> Self {
        let failure = if sinks.iter().any(|s| s.outcome.is_ok()) {
            None
        } else {
            Some(HardFailure::NoSinkSucceeded)
        };
        Self {
            file_name: result.provenance.file_name.clone(),
            validation_status: Some(result.validation_status),
            issues: result.issues.clone(),
            mode: Some(mode),
            sinks,
            excerpt: Some(TotalsExcerpt::from_result(result)),
            failure,
        }
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (SinkName, &WriteResult)> + '_ {
        self.sinks
            .iter()
            .filter_map(|s| s.outcome.as_ref().ok().map(|w| (s.sink, w)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (SinkName, WriteErrorKind)> + '_ {
        self.sinks
            .iter()
            .filter_map(|s| s.outcome.as_ref().err().map(|k| (s.sink, *k)))
    }

    pub fn is_hard_failure(&self) -> bool {
        self.failure.is_some()
    }
}

impl fmt::Display for DocumentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.file_name)?;
        match self.failure {
            Some(HardFailure::Extraction(kind)) => {
                return writeln!(f, "  FAILED: could not extract document ({kind})");
            }
            Some(HardFailure::NoSinkSucceeded) => {
                writeln!(f, "  FAILED: no output could be written")?;
            }
            None => {}
        }
        if let Some(status) = self.validation_status {
            writeln!(f, "  validation: {status} ({} issue(s))", self.issues.len())?;
        }
        if let Some(mode) = self.mode {
            writeln!(f, "  mode: {mode}")?;
        }
        if let Some(excerpt) = &self.excerpt {
            let number = if excerpt.document_number.is_empty() {
                "-"
            } else {
                excerpt.document_number.as_str()
            };
            let date = excerpt
                .document_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                f,
                "  document {number} dated {date}: {} item(s), total {} {}",
                excerpt.line_items, excerpt.total_amount, excerpt.currency
            )?;
        }
        for (sink, written) in self.succeeded() {
            match &written.share_link {
                Some(link) => writeln!(f, "  {sink}: {} (shared: {link})", written.location)?,
                None => writeln!(f, "  {sink}: {}", written.location)?,
            }
        }
        for (sink, kind) in self.failed() {
            writeln!(f, "  {sink}: failed ({kind})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::WriteKind;

    #[test]
    fn extraction_failures_render_only_the_category() {
        let report = DocumentReport::extraction_failed("scan.jpg", ExtractionErrorKind::Timeout);
        assert!(report.is_hard_failure());
        let text = report.to_string();
        assert!(text.contains("scan.jpg"));
        assert!(text.contains("(timeout)"));
    }

    #[test]
    fn succeeded_and_failed_split_the_sink_outcomes() {
        let report = DocumentReport {
            file_name: "a.pdf".into(),
            validation_status: Some(ValidationStatus::Valid),
            issues: vec![],
            mode: Some(ProcessingMode::Hybrid),
            sinks: vec![
                SinkOutcome {
                    sink: SinkName::GoogleSheets,
                    outcome: Err(WriteErrorKind::QuotaExceeded),
                },
                SinkOutcome {
                    sink: SinkName::LocalJson,
                    outcome: Ok(WriteResult {
                        location: "json_data/a.json".into(),
                        kind: WriteKind::LocalFile,
                        share_link: None,
                    }),
                },
            ],
            excerpt: None,
            failure: None,
        };
        assert_eq!(report.succeeded().count(), 1);
        assert_eq!(
            report.failed().collect::<Vec<_>>(),
            vec![(SinkName::GoogleSheets, WriteErrorKind::QuotaExceeded)]
        );
        let text = report.to_string();
        assert!(text.contains("google_sheets: failed (quota exceeded)"));
        assert!(text.contains("local_json: json_data/a.json"));
    }
}
