use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{check_google_response, google_error};
use super::layout::{document_block, Cell};
use crate::config::{GoogleSettings, Secret};
use crate::contract::{ExportWriter, SinkName, WriteKind, WriteResult};
use crate::error::WriteError;
use crate::record::ProcessingResult;

/// Sheets answers an append to an unknown worksheet with a 400 carrying this text.
const MISSING_RANGE: &str = "Unable to parse range";

/// Appends document blocks to a Google spreadsheet through the Sheets v4 REST API.
pub struct GoogleSheetsWriter {
    client: reqwest::Client,
    token: Secret,
    settings: GoogleSettings,
}

impl GoogleSheetsWriter {
    pub fn new(token: Secret, settings: GoogleSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            settings,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, WriteError> {
        let mut url = Url::parse(&self.settings.sheets_base_url)
            .map_err(|e| WriteError::io(format!("invalid sheets base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| WriteError::io("sheets base url cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send_append(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
        body: &Value,
    ) -> Result<Response, WriteError> {
        let range = format!("{worksheet}!A1:append");
        let mut url = self.endpoint(&["v4", "spreadsheets", spreadsheet_id, "values", range.as_str()])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "USER_ENTERED")
            .append_pair("insertDataOption", "INSERT_ROWS");
        Ok(self
            .client
            .post(url)
            .bearer_auth(self.token.expose())
            .json(body)
            .send()
            .await?)
    }

    async fn add_worksheet(&self, spreadsheet_id: &str, worksheet: &str) -> Result<(), WriteError> {
        let target = format!("{spreadsheet_id}:batchUpdate");
        let url = self.endpoint(&["v4", "spreadsheets", target.as_str()])?;
        let response = self
            .client
            .post(url)
            .bearer_auth(self.token.expose())
            .json(&json!({
                "requests": [{ "addSheet": { "properties": { "title": worksheet } } }]
            }))
            .send()
            .await?;
        check_google_response(SinkName::GoogleSheets.as_str(), response).await?;
        info!(spreadsheet_id, worksheet, "[EXPORT][SHEETS] Worksheet created");
        Ok(())
    }

    /// Append `rows` to `worksheet`, creating the worksheet once if Sheets does not know it.
    async fn append(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
        rows: Vec<Vec<Value>>,
    ) -> Result<(), WriteError> {
        let row_count = rows.len();
        let body = json!({ "values": rows });
        let mut response = self.send_append(spreadsheet_id, worksheet, &body).await?;
        if response.status() == StatusCode::BAD_REQUEST {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            if !text.contains(MISSING_RANGE) {
                return Err(google_error(SinkName::GoogleSheets.as_str(), status, &text));
            }
            warn!(spreadsheet_id, worksheet, "[EXPORT][SHEETS] Worksheet missing");
            self.add_worksheet(spreadsheet_id, worksheet).await?;
            response = self.send_append(spreadsheet_id, worksheet, &body).await?;
        }
        check_google_response(SinkName::GoogleSheets.as_str(), response).await?;
        info!(spreadsheet_id, worksheet, rows = row_count, "[EXPORT][SHEETS] Rows appended");
        Ok(())
    }
}

fn spreadsheet_url(spreadsheet_id: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{spreadsheet_id}/edit")
}

#[async_trait]
impl ExportWriter for GoogleSheetsWriter {
    fn sink(&self) -> SinkName {
        SinkName::GoogleSheets
    }

    async fn probe(&self) -> bool {
        let Some(id) = self
            .settings
            .spreadsheet_id
            .as_deref()
            .or_else(|| self.settings.project_sheets.values().next().map(String::as_str))
        else {
            return false;
        };
        let mut url = match self.endpoint(&["v4", "spreadsheets", id]) {
            Ok(url) => url,
            Err(_) => return false,
        };
        url.query_pairs_mut().append_pair("fields", "spreadsheetId");
        match self.client.get(url).bearer_auth(self.token.expose()).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(status = %resp.status(), "[SELECT] Sheets probe rejected");
                false
            }
            Err(e) => {
                warn!(error = %e, "[SELECT] Sheets probe failed");
                false
            }
        }
    }

    async fn write(&self, results: &[ProcessingResult]) -> Result<WriteResult, WriteError> {
        let mut by_target: BTreeMap<(&str, &str), Vec<&ProcessingResult>> = BTreeMap::new();
        for result in results {
            let id = self
                .settings
                .spreadsheet_for(result.provenance.project.as_deref())
                .ok_or_else(|| {
                    WriteError::io(format!(
                        "no spreadsheet configured for project {:?}",
                        result.provenance.project
                    ))
                })?;
            let worksheet = self.settings.worksheet_for(result.record.document_type);
            by_target.entry((id, worksheet)).or_default().push(result);
        }

        let mut first_location = None;
        for ((id, worksheet), group) in by_target {
            let rows: Vec<Vec<Value>> = group
                .into_iter()
                .flat_map(document_block)
                .map(|row| row.iter().map(Cell::to_json).collect())
                .collect();
            self.append(id, worksheet, rows).await?;
            first_location.get_or_insert_with(|| spreadsheet_url(id));
        }

        let location = first_location.ok_or_else(|| WriteError::io("nothing to write"))?;
        Ok(WriteResult {
            location,
            kind: WriteKind::Spreadsheet,
            share_link: None,
        })
    }
}
