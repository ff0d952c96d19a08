use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::config::{
    GeminiSettings, GoogleSettings, InputLimits, LocalSettings, N8nSettings, PipelineConfig, Secret,
};
use crate::extract::ExtractionDefaults;
use crate::record::{SourceBackend, ValidationPolicy};

pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const GOOGLE_ACCESS_TOKEN: &str = "GOOGLE_ACCESS_TOKEN";
pub const N8N_WEBHOOK_URL: &str = "N8N_WEBHOOK_URL";

#[derive(Deserialize, Default)]
#[serde(default)]
struct StaticConfig {
    google_sheets_enabled: Option<bool>,
    google_drive_enabled: Option<bool>,
    local_fallback_enabled: Option<bool>,
    probe_reachability: Option<bool>,
    ai_backend: Option<SourceBackend>,
    validation: ValidationSection,
    extraction: ExtractionSection,
    gemini: GeminiSection,
    n8n: N8nSection,
    google: GoogleSection,
    local: LocalSection,
    limits: LimitsSection,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ValidationSection {
    tolerance: Option<Decimal>,
    warning_ratio: Option<Decimal>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ExtractionSection {
    default_currency: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct GeminiSection {
    model: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct N8nSection {
    webhook_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct GoogleSection {
    spreadsheet_id: Option<String>,
    sheet_name: Option<String>,
    jobs_sheet_name: Option<String>,
    project_sheets: BTreeMap<String, String>,
    drive_folder_id: Option<String>,
    share_links: Option<bool>,
    sheets_base_url: Option<String>,
    drive_base_url: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct LocalSection {
    excel_dir: Option<PathBuf>,
    json_dir: Option<PathBuf>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct LimitsSection {
    max_file_size: Option<u64>,
}

fn env_secret(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => {
            info!("{name} found in env");
            Some(value)
        }
        _ => {
            info!("{name} not set in env");
            None
        }
    }
}

/// Loads a static YAML config file (no secrets) and merges in secrets from the environment.
///
/// Absent secrets are not an error here: the sinks that need them are simply
/// not constructed, and the backend builder reports a missing backend secret.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    let static_conf: StaticConfig = if config_content.trim().is_empty() {
        warn!(config_path = ?path_ref, "Config file is empty, using defaults");
        StaticConfig::default()
    } else {
        match serde_yaml::from_str(&config_content) {
            Ok(conf) => {
                info!(config_path = ?path_ref, "Parsed config YAML successfully");
                conf
            }
            Err(e) => {
                error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
                return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
            }
        }
    };

    let defaults = PipelineConfig::default();

    let validation = ValidationPolicy {
        tolerance: static_conf
            .validation
            .tolerance
            .unwrap_or(defaults.validation.tolerance),
        warning_ratio: static_conf
            .validation
            .warning_ratio
            .unwrap_or(defaults.validation.warning_ratio),
    };
    if validation.tolerance.is_sign_negative() || validation.warning_ratio.is_sign_negative() {
        error!(?validation, "Validation tolerances must not be negative");
        anyhow::bail!("validation.tolerance and validation.warning_ratio must not be negative");
    }

    let extraction = ExtractionDefaults {
        default_currency: static_conf
            .extraction
            .default_currency
            .map(|c| c.trim().to_uppercase())
            .unwrap_or(defaults.extraction.default_currency),
    };

    let gemini = GeminiSettings {
        api_key: env_secret(GEMINI_API_KEY).map(Secret::new),
        model: static_conf.gemini.model.unwrap_or(defaults.gemini.model),
        base_url: static_conf.gemini.base_url.unwrap_or(defaults.gemini.base_url),
        timeout_secs: static_conf
            .gemini
            .timeout_secs
            .unwrap_or(defaults.gemini.timeout_secs),
    };

    let n8n = N8nSettings {
        webhook_url: env_secret(N8N_WEBHOOK_URL).or(static_conf.n8n.webhook_url),
        timeout_secs: static_conf.n8n.timeout_secs.unwrap_or(defaults.n8n.timeout_secs),
    };

    let google_defaults = defaults.google;
    let google = GoogleSettings {
        access_token: env_secret(GOOGLE_ACCESS_TOKEN).map(Secret::new),
        spreadsheet_id: static_conf.google.spreadsheet_id,
        sheet_name: static_conf.google.sheet_name.unwrap_or(google_defaults.sheet_name),
        jobs_sheet_name: static_conf
            .google
            .jobs_sheet_name
            .unwrap_or(google_defaults.jobs_sheet_name),
        project_sheets: static_conf.google.project_sheets,
        drive_folder_id: static_conf.google.drive_folder_id,
        share_links: static_conf.google.share_links.unwrap_or(google_defaults.share_links),
        sheets_base_url: static_conf
            .google
            .sheets_base_url
            .unwrap_or(google_defaults.sheets_base_url),
        drive_base_url: static_conf
            .google
            .drive_base_url
            .unwrap_or(google_defaults.drive_base_url),
    };

    let local = LocalSettings {
        excel_dir: static_conf.local.excel_dir.unwrap_or(defaults.local.excel_dir),
        json_dir: static_conf.local.json_dir.unwrap_or(defaults.local.json_dir),
    };

    let limits = InputLimits {
        max_file_size: static_conf
            .limits
            .max_file_size
            .unwrap_or(defaults.limits.max_file_size),
        ..defaults.limits
    };

    let config = PipelineConfig {
        google_sheets_enabled: static_conf
            .google_sheets_enabled
            .unwrap_or(defaults.google_sheets_enabled),
        google_drive_enabled: static_conf
            .google_drive_enabled
            .unwrap_or(defaults.google_drive_enabled),
        local_fallback_enabled: static_conf
            .local_fallback_enabled
            .unwrap_or(defaults.local_fallback_enabled),
        probe_reachability: static_conf
            .probe_reachability
            .unwrap_or(defaults.probe_reachability),
        ai_backend: static_conf.ai_backend.unwrap_or(defaults.ai_backend),
        validation,
        extraction,
        gemini,
        n8n,
        google,
        local,
        limits,
    };

    info!(
        ai_backend = %config.ai_backend,
        excel_dir = %config.local.excel_dir.display(),
        json_dir = %config.local.json_dir.display(),
        "Config loaded and merged successfully"
    );

    Ok(config)
}
