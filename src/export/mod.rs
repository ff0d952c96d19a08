//! Export writers, one per [`SinkName`](crate::contract::SinkName).
//!
//! The Google writers talk plain REST with a bearer token; the local writers
//! put files under the configured directories. All of them share the row
//! layout from [`layout`].

pub mod drive;
pub mod excel;
pub mod json;
pub mod layout;
pub mod sheets;

pub use drive::GoogleDriveWriter;
pub use excel::LocalExcelWriter;
pub use json::LocalJsonWriter;
pub use sheets::GoogleSheetsWriter;

use reqwest::{Response, StatusCode};
use tracing::error;

use crate::error::{WriteError, WriteErrorKind};
use crate::record::ProcessingResult;

/// Turn a non-2xx Google response into a [`WriteError`], keeping the body for the log.
pub(crate) async fn check_google_response(
    sink: &str,
    response: Response,
) -> Result<Response, WriteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(google_error(sink, status, &body))
}

/// Log a rejected Google call and classify it by status.
pub(crate) fn google_error(sink: &str, status: StatusCode, body: &str) -> WriteError {
    let kind = WriteErrorKind::from_status(status.as_u16());
    error!(sink, status = %status, kind = %kind, "[EXPORT] Google API returned error. Response body: {body}");
    WriteError::new(kind, format!("{sink} returned {status}"))
}

/// File stem shared by the local writers and the Drive upload.
///
/// `{project_}analysis_{number|document}_{run}` for a single result, and
/// `{project_}batch_{count}_{run}` for several.
pub fn artifact_stem(results: &[ProcessingResult]) -> String {
    let Some(first) = results.first() else {
        return "analysis_empty".to_string();
    };
    let project = first
        .provenance
        .project
        .as_deref()
        .map(|p| format!("{}_", sanitize(p)))
        .unwrap_or_default();
    let run = first.provenance.run_id.simple().to_string();
    let run = &run[..8];
    if results.len() == 1 {
        format!("{project}analysis_{}_{run}", document_stem(first))
    } else {
        format!("{project}batch_{}_{run}", results.len())
    }
}

/// Document number if there is one, otherwise `document`.
pub(crate) fn document_stem(result: &ProcessingResult) -> String {
    let number = sanitize(&result.record.document_number);
    if number.is_empty() {
        "document".to_string()
    } else {
        number
    }
}

fn sanitize(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}
