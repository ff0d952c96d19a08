//! Coordinating module for the extract → validate → export pipeline.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{error, info, warn};

use crate::backend::check_format;
use crate::config::PipelineConfig;
use crate::contract::{AnalysisBackend, BackendPayload, InboundDocument};
use crate::error::ExtractionError;
use crate::extract::extract_payload;
use crate::record::Provenance;
use crate::report::{DocumentReport, SinkOutcome};
use crate::select::{SinkSelection, SinkSelector};

/// Runs documents through the pipeline. Failures stay scoped to the document
/// they belong to; nothing here aborts a batch.
pub struct Coordinator {
    config: PipelineConfig,
    selector: SinkSelector,
    backend: Option<Arc<dyn AnalysisBackend>>,
}

impl Coordinator {
    pub fn new(config: PipelineConfig, selector: SinkSelector) -> Self {
        Self {
            config,
            selector,
            backend: None,
        }
    }

    /// Coordinator with the sinks the configuration enables.
    pub fn from_config(config: PipelineConfig) -> Self {
        let selector = SinkSelector::from_config(&config);
        Self::new(config, selector)
    }

    pub fn with_backend(mut self, backend: Arc<dyn AnalysisBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn select_sinks(&self) -> SinkSelection {
        self.selector.select().await
    }

    /// Analyze one inbound file with the configured backend and export it.
    pub async fn process_document(&self, document: InboundDocument) -> DocumentReport {
        let selection = self.selector.select().await;
        self.process_selected(document, &selection).await
    }

    /// Process several files concurrently against a single sink selection.
    pub async fn process_batch(&self, documents: Vec<InboundDocument>) -> Vec<DocumentReport> {
        info!(documents = documents.len(), "[PIPELINE] Starting batch");
        let selection = self.selector.select().await;
        join_all(
            documents
                .into_iter()
                .map(|doc| self.process_selected(doc, &selection)),
        )
        .await
    }

    /// Run an already obtained backend payload through extraction and export.
    pub async fn process_payload(
        &self,
        payload: BackendPayload,
        file_name: &str,
        project: Option<String>,
    ) -> DocumentReport {
        let selection = self.selector.select().await;
        self.export_payload(payload, file_name, project, &selection).await
    }

    async fn process_selected(&self, document: InboundDocument, selection: &SinkSelection) -> DocumentReport {
        info!(file = %document.file_name, bytes = document.bytes.len(), "[PIPELINE] Document received");
        match self.analyze(&document).await {
            Ok(payload) => {
                self.export_payload(payload, &document.file_name, document.project.clone(), selection)
                    .await
            }
            Err(e) => {
                error!(file = %document.file_name, error = %e, "[PIPELINE] Extraction failed");
                DocumentReport::extraction_failed(&document.file_name, e.kind)
            }
        }
    }

    async fn analyze(&self, document: &InboundDocument) -> Result<BackendPayload, ExtractionError> {
        check_format(document, &self.config.limits)?;
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| ExtractionError::backend("no analysis backend configured"))?;
        let secs = self.config.backend_timeout_secs();
        tokio::time::timeout(Duration::from_secs(secs), backend.analyze(document))
            .await
            .map_err(|_| ExtractionError::timeout(format!("{} gave no answer within {secs}s", backend.backend())))?
    }

    async fn export_payload(
        &self,
        payload: BackendPayload,
        file_name: &str,
        project: Option<String>,
        selection: &SinkSelection,
    ) -> DocumentReport {
        let record = match extract_payload(&payload, &self.config.extraction) {
            Ok(record) => record,
            Err(e) => {
                error!(file = %file_name, error = %e, "[PIPELINE] Extraction failed");
                return DocumentReport::extraction_failed(file_name, e.kind);
            }
        };

        let backend = payload.backend();
        let provenance = Provenance::new(backend, payload.into_raw(), file_name, project);
        let result = record.validate(provenance, &self.config.validation);
        info!(
            file = %file_name,
            status = %result.validation_status,
            issues = result.issues.len(),
            run_id = %result.provenance.run_id,
            "[PIPELINE] Document validated"
        );

        let batch = std::slice::from_ref(&result);
        let writes = selection.sinks.iter().map(|sink| async move {
            let outcome = sink.writer.write(batch).await;
            match &outcome {
                Ok(written) => {
                    info!(sink = %sink.name, location = %written.location, "[PIPELINE][EXPORT] Sink write succeeded")
                }
                Err(e) => warn!(sink = %sink.name, error = %e, "[PIPELINE][EXPORT] Sink write failed"),
            }
            SinkOutcome {
                sink: sink.name,
                outcome: outcome.map_err(|e| e.kind),
            }
        });
        let outcomes = join_all(writes).await;

        let report = DocumentReport::written(&result, selection.mode, outcomes);
        if report.is_hard_failure() {
            error!(file = %file_name, mode = %selection.mode, "[PIPELINE] No sink accepted the document");
        } else {
            info!(
                file = %file_name,
                written = report.succeeded().count(),
                failed = report.failed().count(),
                "[PIPELINE] Document exported"
            );
        }
        report
    }
}
