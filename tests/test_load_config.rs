use serial_test::serial;
use std::env;
use std::fs::write;
use std::time::Duration;
use tap_sentry::load_config::{load_config, load_state, TOKEN_ENV};
use tap_sentry_core::config::FailurePolicy;
use tap_sentry_core::synchronise::Stream;
use tempfile::NamedTempFile;

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

/// A minimal config picks up every default and the token from the environment.
#[test]
#[serial]
fn test_load_config_minimal_uses_defaults() {
    env::set_var(TOKEN_ENV, "abc123");
    let file = config_file("organization: acme\n");

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.client.organization, "acme");
    assert_eq!(config.client.base_url, "https://sentry.io/api/0/");
    assert_eq!(config.client.stats_period, "1d");
    assert_eq!(config.client.request_timeout, Some(Duration::from_secs(30)));
    assert_eq!(config.sync.max_concurrency, 4);
    assert_eq!(config.sync.on_fetch_error, FailurePolicy::Skip);
    assert_eq!(config.streams, Stream::ALL.to_vec());
    assert_eq!(config.credential.expose(), "abc123");
}

#[test]
#[serial]
fn test_load_config_full() {
    env::set_var(TOKEN_ENV, "abc123");
    let file = config_file(
        r#"
organization: acme
base_url: https://sentry.example.com/api/0/
stats_period: 14d
max_concurrency: 8
request_timeout_secs: 0
max_pages: 5
on_fetch_error: abort
schemas_dir: ./schemas
streams: [teams, issues, teams]
key_properties:
  events: [id]
"#,
    );

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.client.base_url, "https://sentry.example.com/api/0/");
    assert_eq!(config.client.stats_period, "14d");
    assert_eq!(config.client.request_timeout, None);
    assert_eq!(config.client.max_pages, 5);
    assert_eq!(config.sync.max_concurrency, 8);
    assert_eq!(config.sync.on_fetch_error, FailurePolicy::Abort);
    assert_eq!(config.streams, vec![Stream::Teams, Stream::Issues]);
    assert_eq!(config.key_properties["events"], vec!["id"]);
    assert!(config.schemas_dir.is_some());
}

#[test]
#[serial]
fn test_load_config_rejects_unknown_stream() {
    env::set_var(TOKEN_ENV, "abc123");
    let file = config_file("organization: acme\nstreams: [issues, nonexistent]\n");

    let err = load_config(file.path()).unwrap_err();
    assert!(
        err.to_string().contains("stream not recognized: nonexistent"),
        "got: {err}"
    );
}

#[test]
#[serial]
fn test_load_config_requires_token() {
    env::remove_var(TOKEN_ENV);
    let file = config_file("organization: acme\n");

    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains(TOKEN_ENV), "got: {err}");
}

#[test]
#[serial]
fn test_load_config_errors_for_invalid_file() {
    env::set_var(TOKEN_ENV, "abc123");
    let file = config_file("not-yaml: [:::");

    let err = load_config(file.path()).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[test]
#[serial]
fn test_load_config_errors_for_missing_file() {
    env::set_var(TOKEN_ENV, "abc123");
    let err = load_config("/definitely/not/here.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_load_state_accepts_document_and_message() {
    let document = config_file(r#"{"bookmarks": {"issues": {"latest": "0:100:0"}}}"#);
    let state = load_state(document.path()).unwrap();
    assert_eq!(state.get("issues", "latest"), Some("0:100:0"));

    let message = config_file(
        r#"{"type": "STATE", "value": {"bookmarks": {"teams": {"dateCreated": "2024-01-01T00:00:00.000000Z"}}}}"#,
    );
    let state = load_state(message.path()).unwrap();
    assert_eq!(
        state.get("teams", "dateCreated"),
        Some("2024-01-01T00:00:00.000000Z")
    );

    let empty = config_file("");
    assert!(load_state(empty.path()).unwrap().bookmarks.is_empty());
}
