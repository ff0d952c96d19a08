use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::excel::workbook_bytes;
use super::{artifact_stem, check_google_response};
use crate::config::{GoogleSettings, Secret};
use crate::contract::{ExportWriter, SinkName, WriteKind, WriteResult};
use crate::error::WriteError;
use crate::record::ProcessingResult;

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

/// Uploads the Excel rendering of a batch into a Google Drive folder.
pub struct GoogleDriveWriter {
    client: reqwest::Client,
    token: Secret,
    settings: GoogleSettings,
}

impl GoogleDriveWriter {
    pub fn new(token: Secret, settings: GoogleSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            settings,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, WriteError> {
        let mut url = Url::parse(&self.settings.drive_base_url)
            .map_err(|e| WriteError::io(format!("invalid drive base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| WriteError::io("drive base url cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn folder(&self) -> Result<&str, WriteError> {
        self.settings
            .drive_folder_id
            .as_deref()
            .ok_or_else(|| WriteError::io("no drive folder configured"))
    }

    /// Create the file, named and inside `folder`, in one multipart request.
    async fn upload(&self, name: &str, folder: &str, bytes: Vec<u8>) -> Result<String, WriteError> {
        let mut url = self.endpoint(&["upload", "drive", "v3", "files"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "multipart")
            .append_pair("fields", "id");
        let metadata = json!({ "name": name, "parents": [folder], "mimeType": XLSX_MIME });
        let form = Form::new()
            .part(
                "metadata",
                Part::text(metadata.to_string()).mime_str("application/json; charset=UTF-8")?,
            )
            .part("file", Part::bytes(bytes).file_name(name.to_string()).mime_str(XLSX_MIME)?);
        let response = self
            .client
            .post(url)
            .bearer_auth(self.token.expose())
            .multipart(form)
            .send()
            .await?;
        let response = check_google_response(SinkName::GoogleDrive.as_str(), response).await?;
        let file: DriveFile = response.json().await?;
        Ok(file.id)
    }

    async fn share(&self, file_id: &str) -> Result<(), WriteError> {
        let url = self.endpoint(&["drive", "v3", "files", file_id, "permissions"])?;
        let response = self
            .client
            .post(url)
            .bearer_auth(self.token.expose())
            .json(&json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await?;
        check_google_response(SinkName::GoogleDrive.as_str(), response).await?;
        Ok(())
    }
}

#[async_trait]
impl ExportWriter for GoogleDriveWriter {
    fn sink(&self) -> SinkName {
        SinkName::GoogleDrive
    }

    async fn probe(&self) -> bool {
        let Ok(folder) = self.folder() else {
            return false;
        };
        let mut url = match self.endpoint(&["drive", "v3", "files", folder]) {
            Ok(url) => url,
            Err(_) => return false,
        };
        url.query_pairs_mut().append_pair("fields", "id");
        match self.client.get(url).bearer_auth(self.token.expose()).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(status = %resp.status(), "[SELECT] Drive probe rejected");
                false
            }
            Err(e) => {
                warn!(error = %e, "[SELECT] Drive probe failed");
                false
            }
        }
    }

    async fn write(&self, results: &[ProcessingResult]) -> Result<WriteResult, WriteError> {
        if results.is_empty() {
            return Err(WriteError::io("nothing to write"));
        }
        let folder = self.folder()?;
        let name = format!("{}.xlsx", artifact_stem(results));
        let bytes = workbook_bytes(results)?;

        let file_id = self.upload(&name, folder, bytes).await?;
        info!(file_id = %file_id, name = %name, "[EXPORT][DRIVE] File uploaded");

        let link = format!("https://drive.google.com/file/d/{file_id}/view");
        let share_link = if self.settings.share_links {
            match self.share(&file_id).await {
                Ok(()) => {
                    info!(file_id = %file_id, "[EXPORT][DRIVE] Public link enabled");
                    Some(link.clone())
                }
                Err(e) => {
                    warn!(file_id = %file_id, kind = %e.kind, "[EXPORT][DRIVE] Sharing failed, returning the file without a link");
                    None
                }
            }
        } else {
            None
        };

        Ok(WriteResult {
            location: link,
            kind: WriteKind::CloudFile,
            share_link,
        })
    }
}
