use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, warn};

use super::document_stem;
use super::excel::dir_is_usable;
use crate::contract::{ExportWriter, SinkName, WriteKind, WriteResult};
use crate::error::WriteError;
use crate::record::ProcessingResult;

/// Writes one pretty-printed `ProcessingResult` JSON file per document.
pub struct LocalJsonWriter {
    dir: PathBuf,
}

impl LocalJsonWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl ExportWriter for LocalJsonWriter {
    fn sink(&self) -> SinkName {
        SinkName::LocalJson
    }

    async fn probe(&self) -> bool {
        let usable = dir_is_usable(&self.dir).await;
        if !usable {
            warn!(dir = %self.dir.display(), "[SELECT] JSON output directory is not writable");
        }
        usable
    }

    async fn write(&self, results: &[ProcessingResult]) -> Result<WriteResult, WriteError> {
        if results.is_empty() {
            return Err(WriteError::io("nothing to write"));
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut written = Vec::with_capacity(results.len());
        for result in results {
            let body = serde_json::to_vec_pretty(result)
                .map_err(|e| WriteError::io(format!("serialize result: {e}")))?;
            let run = result.provenance.run_id.simple().to_string();
            let path = self
                .dir
                .join(format!("{}_{}.json", document_stem(result), &run[..8]));
            tokio::fs::write(&path, body).await?;
            info!(path = %path.display(), "[EXPORT][JSON] Result written");
            written.push(path);
        }

        let location = match written.as_slice() {
            [only] => only.display().to_string(),
            _ => self.dir.display().to_string(),
        };
        Ok(WriteResult {
            location,
            kind: WriteKind::LocalFile,
            share_link: None,
        })
    }
}
