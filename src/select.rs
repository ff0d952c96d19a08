//! Sink selection: which writers are usable for this run, in priority order.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::contract::{ExportWriter, SinkName};
use crate::export::{GoogleDriveWriter, GoogleSheetsWriter, LocalExcelWriter, LocalJsonWriter};

/// A sink the configuration knows about, either constructed or explaining why not.
pub enum SinkCandidate {
    Ready {
        name: SinkName,
        writer: Arc<dyn ExportWriter>,
    },
    Missing {
        name: SinkName,
        reason: String,
    },
}

impl SinkCandidate {
    pub fn ready(writer: Arc<dyn ExportWriter>) -> Self {
        SinkCandidate::Ready {
            name: writer.sink(),
            writer,
        }
    }

    pub fn missing(name: SinkName, reason: impl Into<String>) -> Self {
        SinkCandidate::Missing {
            name,
            reason: reason.into(),
        }
    }

    pub fn name(&self) -> SinkName {
        match self {
            SinkCandidate::Ready { name, .. } | SinkCandidate::Missing { name, .. } => *name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    FullCloud,
    Hybrid,
    Local,
    None,
}

impl ProcessingMode {
    pub fn from_sinks<'a>(names: impl IntoIterator<Item = &'a SinkName>) -> Self {
        let (mut cloud, mut local) = (false, false);
        for name in names {
            if name.is_cloud() {
                cloud = true;
            } else {
                local = true;
            }
        }
        match (cloud, local) {
            (true, false) => ProcessingMode::FullCloud,
            (true, true) => ProcessingMode::Hybrid,
            (false, true) => ProcessingMode::Local,
            (false, false) => ProcessingMode::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMode::FullCloud => "full cloud",
            ProcessingMode::Hybrid => "hybrid",
            ProcessingMode::Local => "local",
            ProcessingMode::None => "none",
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct SelectedSink {
    pub name: SinkName,
    pub writer: Arc<dyn ExportWriter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSink {
    pub name: SinkName,
    pub reason: String,
}

/// Outcome of one selection pass.
#[derive(Clone)]
pub struct SinkSelection {
    pub sinks: Vec<SelectedSink>,
    pub skipped: Vec<SkippedSink>,
    pub mode: ProcessingMode,
}

impl SinkSelection {
    pub fn names(&self) -> Vec<SinkName> {
        self.sinks.iter().map(|s| s.name).collect()
    }
}

pub struct SinkSelector {
    candidates: Vec<SinkCandidate>,
    probe_reachability: bool,
}

impl SinkSelector {
    /// Selector over explicit candidates; they are sorted into priority order.
    pub fn new(mut candidates: Vec<SinkCandidate>, probe_reachability: bool) -> Self {
        candidates.sort_by_key(SinkCandidate::name);
        Self {
            candidates,
            probe_reachability,
        }
    }

    /// Construct every sink whose prerequisites the configuration satisfies.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let google = &config.google;
        let mut candidates = Vec::with_capacity(SinkName::PRIORITY.len());

        candidates.push(match (&google.access_token, config.google_sheets_enabled) {
            (_, false) => SinkCandidate::missing(SinkName::GoogleSheets, "disabled"),
            (None, true) => SinkCandidate::missing(SinkName::GoogleSheets, "GOOGLE_ACCESS_TOKEN not set"),
            (Some(_), true) if google.spreadsheet_id.is_none() && google.project_sheets.is_empty() => {
                SinkCandidate::missing(SinkName::GoogleSheets, "no spreadsheet configured")
            }
            (Some(token), true) => {
                SinkCandidate::ready(Arc::new(GoogleSheetsWriter::new(token.clone(), google.clone())))
            }
        });

        candidates.push(match (&google.access_token, config.google_drive_enabled) {
            (_, false) => SinkCandidate::missing(SinkName::GoogleDrive, "disabled"),
            (None, true) => SinkCandidate::missing(SinkName::GoogleDrive, "GOOGLE_ACCESS_TOKEN not set"),
            (Some(_), true) if google.drive_folder_id.is_none() => {
                SinkCandidate::missing(SinkName::GoogleDrive, "no drive folder configured")
            }
            (Some(token), true) => {
                SinkCandidate::ready(Arc::new(GoogleDriveWriter::new(token.clone(), google.clone())))
            }
        });

        if config.local_fallback_enabled {
            candidates.push(SinkCandidate::ready(Arc::new(LocalExcelWriter::new(
                config.local.excel_dir.clone(),
            ))));
            candidates.push(SinkCandidate::ready(Arc::new(LocalJsonWriter::new(
                config.local.json_dir.clone(),
            ))));
        } else {
            candidates.push(SinkCandidate::missing(SinkName::LocalExcel, "local fallback disabled"));
            candidates.push(SinkCandidate::missing(SinkName::LocalJson, "local fallback disabled"));
        }

        Self::new(candidates, config.probe_reachability)
    }

    /// Probe every constructed sink concurrently; never writes anything.
    pub async fn select(&self) -> SinkSelection {
        let mut skipped = Vec::new();
        let mut ready = Vec::new();
        for candidate in &self.candidates {
            match candidate {
                SinkCandidate::Ready { name, writer } => ready.push(SelectedSink {
                    name: *name,
                    writer: Arc::clone(writer),
                }),
                SinkCandidate::Missing { name, reason } => {
                    info!(sink = %name, reason = %reason, "[SELECT] Sink not configured");
                    skipped.push(SkippedSink {
                        name: *name,
                        reason: reason.clone(),
                    });
                }
            }
        }

        let reachable: Vec<bool> = if self.probe_reachability {
            join_all(ready.iter().map(|s| s.writer.probe())).await
        } else {
            vec![true; ready.len()]
        };

        let mut sinks = Vec::with_capacity(ready.len());
        for (sink, ok) in ready.into_iter().zip(reachable) {
            if ok {
                sinks.push(sink);
            } else {
                warn!(sink = %sink.name, "[SELECT] Sink unreachable, skipping");
                skipped.push(SkippedSink {
                    name: sink.name,
                    reason: "unreachable".to_string(),
                });
            }
        }
        skipped.sort_by_key(|s| s.name);

        let mode = ProcessingMode::from_sinks(sinks.iter().map(|s| &s.name));
        info!(
            sinks = ?sinks.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            skipped = skipped.len(),
            mode = %mode,
            "[SELECT] Sink selection complete"
        );
        SinkSelection { sinks, skipped, mode }
    }
}
