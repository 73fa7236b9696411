// Configuration system integration tests

use declog::config::{load_config, ConfigLoader};
use declog::{EnvelopeFormat, OutputFormat, RecordLayout};
use std::fs;
use std::path::PathBuf;

#[test]
fn test_load_default_config() {
    let config_path = PathBuf::from("config/default.yaml");

    if config_path.exists() {
        let result = load_config(&config_path);
        assert!(result.is_ok(), "Failed to load default config: {:?}", result.err());

        let config = result.unwrap();

        // Verify defaults
        assert_eq!(config.output.format, OutputFormat::Table);
        assert!(config.output.header);
        assert!(!config.output.verbose);
        assert_eq!(config.input.max_files, 3);
        assert_eq!(config.input.layout, RecordLayout::Legacy);
        assert!(config.output.secondary.is_none());
        assert_eq!(config.logging.level, "info");
    }
}

#[test]
fn test_config_with_env_vars() {
    let temp_config = r#"
input:
  path: ${DECLOG_IT_INPUT:-/var/log/decoder.bin}
  layout: packed

output:
  format: ${DECLOG_IT_FORMAT:-csv}
  label: ${DECLOG_IT_LABEL}
  secondary:
    path: /tmp/declog_it.mp
    format: msgpack

filter:
  dedup: true
  start_ts: 1558606530250
  duration_ms: 60000

logging:
  level: debug
  format: json
"#;

    let dir = tempfile::tempdir().unwrap();
    let temp_path = dir.path().join("declog.yaml");
    fs::write(&temp_path, temp_config).expect("Failed to write temp config");

    std::env::set_var("DECLOG_IT_LABEL", "studio-4");
    std::env::remove_var("DECLOG_IT_FORMAT");

    let result = load_config(&temp_path);
    assert!(result.is_ok(), "Failed to load config with env vars: {:?}", result.err());
    let config = result.unwrap();

    assert_eq!(config.input.path.as_deref(), Some("/var/log/decoder.bin"));
    assert_eq!(config.input.layout, RecordLayout::Packed);
    assert_eq!(config.output.format, OutputFormat::Csv);
    assert_eq!(config.output.label.as_deref(), Some("studio-4"));
    assert_eq!(
        config.output.secondary.as_ref().map(|s| s.format),
        Some(EnvelopeFormat::Msgpack)
    );

    let window = config.filter.window();
    assert_eq!(window.start(), Some(1_558_606_530_250));
    assert_eq!(window.end(), Some(1_558_606_590_250));
    assert_eq!(config.logging.format, "json");

    std::env::remove_var("DECLOG_IT_LABEL");
}

#[test]
fn test_missing_file() {
    let result = load_config("/nonexistent/declog.yaml");
    assert!(result.is_err());
}

#[test]
fn test_invalid_yaml() {
    let result = ConfigLoader::from_yaml("output: [unclosed");
    assert!(result.is_err());
}

#[test]
fn test_secondary_format_must_be_envelope() {
    let result = ConfigLoader::from_yaml(
        "output:\n  secondary:\n    path: /tmp/x\n    format: csv\n",
    );
    assert!(result.is_err());
}

#[test]
fn test_label_too_long_rejected() {
    let yaml = format!("output:\n  label: {}\n", "x".repeat(199));
    let err = ConfigLoader::from_yaml(&yaml).unwrap_err();
    assert!(format!("{:#}", err).contains("199 bytes"));
}

#[test]
fn test_empty_document_uses_defaults() {
    let config = ConfigLoader::from_yaml("{}").unwrap();
    assert_eq!(config.output.format, OutputFormat::Table);
    assert!(config.filter.resampler().is_none());
}
