use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use tracing::{info, warn};

use super::artifact_stem;
use super::layout::{batch_rows, Cell, HEADER};
use crate::contract::{ExportWriter, SinkName, WriteKind, WriteResult};
use crate::error::WriteError;
use crate::record::ProcessingResult;

const SHEET_NAME: &str = "Documents";
const MAX_COLUMN_WIDTH: usize = 50;

impl From<XlsxError> for WriteError {
    fn from(e: XlsxError) -> Self {
        WriteError::io(format!("xlsx: {e}"))
    }
}

/// Render the batch as an in-memory `.xlsx` workbook with bold header rows.
pub fn workbook_bytes(results: &[ProcessingResult]) -> Result<Vec<u8>, WriteError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let mut widths = vec![0usize; HEADER.len()];
    for (row_idx, row) in batch_rows(results).iter().enumerate() {
        let row_num = row_idx as u32;
        let is_header = row.first() == Some(&Cell::Text(HEADER[0].to_string()));
        for (col_idx, cell) in row.iter().enumerate() {
            let col = col_idx as u16;
            match cell {
                Cell::Text(text) if is_header => {
                    worksheet.write_string_with_format(row_num, col, text, &bold)?;
                }
                Cell::Text(text) => {
                    worksheet.write_string(row_num, col, text)?;
                }
                Cell::Number(value) => {
                    worksheet.write_number(row_num, col, value.to_f64().unwrap_or_default())?;
                }
                Cell::Empty => {}
            }
            if let Some(w) = widths.get_mut(col_idx) {
                *w = (*w).max(cell.width());
            }
        }
    }
    for (col_idx, width) in widths.iter().enumerate() {
        let width = (width + 2).min(MAX_COLUMN_WIDTH);
        worksheet.set_column_width(col_idx as u16, width as f64)?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Whether `dir` exists as a writable directory, or could be created.
pub(crate) async fn dir_is_usable(dir: &Path) -> bool {
    match tokio::fs::metadata(dir).await {
        Ok(meta) => meta.is_dir() && !meta.permissions().readonly(),
        Err(_) => true,
    }
}

/// Writes `.xlsx` workbooks into a local directory.
pub struct LocalExcelWriter {
    dir: PathBuf,
}

impl LocalExcelWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl ExportWriter for LocalExcelWriter {
    fn sink(&self) -> SinkName {
        SinkName::LocalExcel
    }

    async fn probe(&self) -> bool {
        let usable = dir_is_usable(&self.dir).await;
        if !usable {
            warn!(dir = %self.dir.display(), "[SELECT] Excel output directory is not writable");
        }
        usable
    }

    async fn write(&self, results: &[ProcessingResult]) -> Result<WriteResult, WriteError> {
        if results.is_empty() {
            return Err(WriteError::io("nothing to write"));
        }
        let bytes = workbook_bytes(results)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{}.xlsx", artifact_stem(results)));
        tokio::fs::write(&path, &bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "[EXPORT][EXCEL] Workbook written");
        Ok(WriteResult {
            location: path.display().to_string(),
            kind: WriteKind::LocalFile,
            share_link: None,
        })
    }
}
