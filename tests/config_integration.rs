//! Integration tests for engine configuration
//!
//! Tests loading from disk, partial sections, and validation reporting

use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use texpatch::config::{load_from_path, load_from_str, ConfigError, EngineConfig, ValidationIssue};
use texpatch::escalation::{RetryPolicy, Tier};
use texpatch::patch::PatchOptions;
use texpatch::tex::ParseOptions;

#[test]
fn test_full_config_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("texpatch.toml");
    fs::write(
        &path,
        r#"
[parser]
max_depth = 8

[escalation]
unified_diff_attempts = 2
search_replace_attempts = 1
server_error_backoff_ms = 10
format_error_backoff_ms = 20
excerpt_chars = 80

[upstream]
model = "local-model"
temperature = 0.0
max_tokens = 2048
timeout_ms = 5000
command = "llm-cli --json"

[patch]
strict_hunk_headers = true
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();

    assert_eq!(ParseOptions::from(&config.parser).max_depth, 8);
    assert_eq!(config.upstream.command.as_deref(), Some("llm-cli --json"));
    assert_eq!(config.upstream.timeout(), Duration::from_secs(5));
    assert!(PatchOptions::from(&config.patch).strict_hunk_headers);

    let policy = RetryPolicy::from(&config.escalation);
    assert_eq!(policy.attempts(Tier::UnifiedDiff), 2);
    assert_eq!(policy.attempts(Tier::SearchReplace), 1);
    assert_eq!(policy.format_error_backoff, Duration::from_millis(20));
}

#[test]
fn test_partial_sections_keep_defaults() {
    let config = load_from_str("[upstream]\nmodel = \"m\"\n").unwrap();
    let defaults = EngineConfig::default();

    assert_eq!(config.upstream.model, "m");
    assert_eq!(config.upstream.max_tokens, defaults.upstream.max_tokens);
    assert_eq!(config.escalation, defaults.escalation);
    assert_eq!(config.parser, defaults.parser);
    assert!(!config.patch.strict_hunk_headers);
}

#[test]
fn test_unknown_keys_are_rejected() {
    let err = load_from_str("[escalation]\nretries = 4\n").unwrap_err();
    assert!(matches!(err, ConfigError::Toml { .. }));
    assert!(err.to_string().contains("retries"), "{err}");
}

#[test]
fn test_validation_lists_each_issue() {
    let err = load_from_str(
        r#"
[escalation]
unified_diff_attempts = 0

[upstream]
temperature = 3.5
command = ""
"#,
    )
    .unwrap_err();

    let ConfigError::Validation { source, .. } = &err else {
        panic!("expected validation error, got {err}");
    };
    assert_eq!(source.issues.len(), 3);
    assert!(source.issues.contains(&ValidationIssue::MissingField {
        field: "upstream.command"
    }));
    let message = err.to_string();
    assert!(message.contains("escalation.unified_diff_attempts"));
    assert!(message.contains("upstream.temperature"));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = load_from_path(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}
