use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::backend::build_backend;
use crate::contract::{BackendPayload, InboundDocument};
use crate::error::ExtractionErrorKind;
use crate::load_config::load_config;
use crate::pipeline::Coordinator;
use crate::record::SourceBackend;
use crate::report::DocumentReport;

/// CLI for doc-relay: extract business documents with an AI backend and export them.
#[derive(Parser)]
#[clap(
    name = "doc-relay",
    version,
    about = "Extract invoices and receipts with Gemini or N8N and export them to Google Sheets, Drive, Excel or JSON"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send files to the configured AI backend and export the results
    Process {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Document to process; repeat for a batch
        #[clap(long = "file", required = true)]
        files: Vec<PathBuf>,
        /// Project label used to pick the target spreadsheet
        #[clap(long)]
        project: Option<String>,
    },
    /// Run a saved backend response through extraction and export
    Replay {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// JSON file holding the raw backend response
        #[clap(long)]
        payload: PathBuf,
        /// Backend that produced the payload (gemini or n8n)
        #[clap(long, default_value = "gemini")]
        backend: SourceBackend,
        #[clap(long)]
        project: Option<String>,
    },
    /// Show which sinks are available and the resulting processing mode
    Probe {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

fn print_reports(reports: &[DocumentReport]) -> Result<()> {
    for report in reports {
        print!("{report}");
    }
    let failed = reports.iter().filter(|r| r.is_hard_failure()).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} document(s) failed", reports.len());
    }
    Ok(())
}

/// Async CLI entrypoint, shared by `main` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Process {
            config,
            files,
            project,
        } => {
            let config = load_config(config)?;
            config.trace_loaded();
            let backend = build_backend(&config).map_err(|e| anyhow::anyhow!("{e}"))?;
            let mut documents = Vec::new();
            let mut unreadable = Vec::new();
            for path in &files {
                match InboundDocument::from_path(path, project.clone()) {
                    Ok(document) => documents.push(document),
                    Err(e) => {
                        tracing::error!(file = %path.display(), error = %e, "[PIPELINE] Failed to read document");
                        unreadable.push(DocumentReport::extraction_failed(
                            path.display().to_string(),
                            ExtractionErrorKind::MalformedPayload,
                        ));
                    }
                }
            }

            println!("Processing {} document(s)...", documents.len());
            let coordinator = Coordinator::from_config(config).with_backend(backend);
            let mut reports = coordinator.process_batch(documents).await;
            reports.extend(unreadable);
            print_reports(&reports)
        }
        Commands::Replay {
            config,
            payload,
            backend,
            project,
        } => {
            let config = load_config(config)?;
            config.trace_loaded();
            let raw = std::fs::read_to_string(&payload)
                .with_context(|| format!("Failed to read payload {}", payload.display()))?;
            let raw: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("Payload {} is not valid JSON", payload.display()))?;
            let file_name = payload
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "payload.json".to_string());

            let coordinator = Coordinator::from_config(config);
            let report = coordinator
                .process_payload(BackendPayload::tagged(backend, raw), &file_name, project)
                .await;
            print_reports(std::slice::from_ref(&report))
        }
        Commands::Probe { config } => {
            let config = load_config(config)?;
            config.trace_loaded();
            let coordinator = Coordinator::from_config(config);
            let selection = coordinator.select_sinks().await;
            println!("Processing mode: {}", selection.mode);
            for sink in &selection.sinks {
                println!("  {}: available", sink.name);
            }
            for skipped in &selection.skipped {
                println!("  {}: skipped ({})", skipped.name, skipped.reason);
            }
            Ok(())
        }
    }
}
