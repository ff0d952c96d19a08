use std::env;
use std::fs::write;
use std::path::PathBuf;

use rust_decimal::Decimal;
use serial_test::serial;
use tempfile::NamedTempFile;

use doc_relay::load_config::load_config;
use doc_relay::record::SourceBackend;

fn clear_secrets() {
    env::remove_var("GEMINI_API_KEY");
    env::remove_var("GOOGLE_ACCESS_TOKEN");
    env::remove_var("N8N_WEBHOOK_URL");
}

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

/// A static config plus env secrets produces a merged PipelineConfig.
#[tokio::test]
#[serial]
async fn test_load_config_merges_yaml_and_env_secrets() {
    clear_secrets();
    let file = config_file(
        r#"
google_sheets_enabled: true
google_drive_enabled: true
local_fallback_enabled: true
probe_reachability: false
ai_backend: n8n
validation:
  tolerance: "0.05"
  warning_ratio: "0.02"
extraction:
  default_currency: usd
n8n:
  timeout_secs: 120
google:
  spreadsheet_id: sheet-1
  sheet_name: goods
  jobs_sheet_name: works
  project_sheets:
    Warehouse: sheet-2
  drive_folder_id: folder-9
  share_links: true
local:
  excel_dir: ./out/excel
  json_dir: ./out/json
limits:
  max_file_size: 1024
"#,
    );
    env::set_var("GOOGLE_ACCESS_TOKEN", "ya29.test-token");
    env::set_var("N8N_WEBHOOK_URL", "https://n8n.example.com/webhook/docs");

    let config = load_config(file.path()).expect("Config should load");

    assert!(config.google_sheets_enabled);
    assert!(config.google_drive_enabled);
    assert_eq!(config.ai_backend, SourceBackend::N8n);
    assert_eq!(config.validation.tolerance, Decimal::new(5, 2));
    assert_eq!(config.validation.warning_ratio, Decimal::new(2, 2));
    assert_eq!(config.extraction.default_currency, "USD");
    assert_eq!(config.n8n.timeout_secs, 120);
    assert_eq!(config.backend_timeout_secs(), 120);
    assert_eq!(
        config.n8n.webhook_url.as_deref(),
        Some("https://n8n.example.com/webhook/docs")
    );
    assert_eq!(
        config.google.access_token.as_ref().map(|s| s.expose()),
        Some("ya29.test-token")
    );
    assert_eq!(config.google.sheet_name, "goods");
    assert_eq!(config.google.jobs_sheet_name, "works");
    assert!(!config.probe_reachability);
    assert_eq!(config.google.spreadsheet_for(Some("Warehouse")), Some("sheet-2"));
    assert_eq!(config.google.drive_folder_id.as_deref(), Some("folder-9"));
    assert!(config.google.share_links);
    assert_eq!(config.local.excel_dir, PathBuf::from("./out/excel"));
    assert_eq!(config.limits.max_file_size, 1024);
    assert!(config.limits.image_extensions.contains(&".jpg".to_string()));

    clear_secrets();
}

/// Missing secrets are not a load error; they just leave the fields empty.
#[tokio::test]
#[serial]
async fn test_load_config_tolerates_missing_secrets() {
    clear_secrets();
    let file = config_file("ai_backend: gemini\n");

    let config = load_config(file.path()).expect("Config should load without secrets");
    assert!(config.gemini.api_key.is_none());
    assert!(config.google.access_token.is_none());
    assert_eq!(config.gemini.model, "gemini-2.5-flash");
    assert_eq!(config.gemini.timeout_secs, 60);
    assert_eq!(config.extraction.default_currency, "UAH");
    assert!(config.local_fallback_enabled);
    assert!(!config.google_sheets_enabled);
    assert!(config.probe_reachability);
    assert_eq!(config.google.jobs_sheet_name, "jobs");

    let err = doc_relay::backend::build_backend(&config).err().expect("no key, no backend");
    assert!(err.to_string().contains("GEMINI_API_KEY"));
}

/// An empty file yields the defaults.
#[tokio::test]
#[serial]
async fn test_load_config_accepts_an_empty_file() {
    clear_secrets();
    let file = config_file("");
    let config = load_config(file.path()).expect("empty config is allowed");
    assert_eq!(config.ai_backend, SourceBackend::Gemini);
    assert_eq!(config.local.json_dir, PathBuf::from("json_data"));
}

/// If the config file is not valid YAML, load_config errors and says so.
#[tokio::test]
#[serial]
async fn test_load_config_errors_for_invalid_file() {
    let file = config_file("google: [unclosed");
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config YAML"), "{err}");
}

#[tokio::test]
#[serial]
async fn test_load_config_rejects_unknown_backend() {
    let file = config_file("ai_backend: openai\n");
    assert!(load_config(file.path()).is_err());
}

#[tokio::test]
#[serial]
async fn test_load_config_rejects_negative_tolerance() {
    let file = config_file("validation:\n  tolerance: \"-1\"\n");
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("must not be negative"));
}

#[tokio::test]
#[serial]
async fn test_load_config_errors_for_missing_file() {
    let err = load_config("/definitely/not/here.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
