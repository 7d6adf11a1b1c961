/// `load_config` module: loads the static YAML config, injects the API token
/// from the environment, and maps everything onto the core crate's types.
///
/// This is the only place where untrusted YAML is parsed.
///
/// # Errors
/// All errors use `anyhow::Error` and surface at the CLI boundary: an
/// unreadable file, malformed YAML, an unknown stream name, or a missing
/// `SENTRY_API_TOKEN`.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tap_sentry_core::auth::Credential;
use tap_sentry_core::bookmarks::BookmarkState;
use tap_sentry_core::config::{
    ClientConfig, FailurePolicy, SyncConfig, DEFAULT_BASE_URL, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_MAX_PAGES, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_STATS_PERIOD,
};
use tap_sentry_core::synchronise::Stream;
use tracing::{error, info};

pub const TOKEN_ENV: &str = "SENTRY_API_TOKEN";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    organization: String,
    #[serde(default = "default_base_url")]
    base_url: String,
    #[serde(default = "default_stats_period")]
    stats_period: String,
    #[serde(default = "default_max_concurrency")]
    max_concurrency: usize,
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
    #[serde(default = "default_max_pages")]
    max_pages: usize,
    #[serde(default)]
    on_fetch_error: FailurePolicy,
    #[serde(default)]
    schemas_dir: Option<PathBuf>,
    #[serde(default)]
    streams: Option<Vec<String>>,
    #[serde(default)]
    key_properties: BTreeMap<String, Vec<String>>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_stats_period() -> String {
    DEFAULT_STATS_PERIOD.to_string()
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_max_pages() -> usize {
    DEFAULT_MAX_PAGES
}

/// Fully resolved tap configuration.
#[derive(Debug)]
pub struct TapConfig {
    pub client: ClientConfig,
    pub sync: SyncConfig,
    pub credential: Credential,
    pub schemas_dir: Option<PathBuf>,
    pub streams: Vec<Stream>,
    pub key_properties: BTreeMap<String, Vec<String>>,
}

/// Loads a static YAML config file (no secrets) and injects the API token from the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<TapConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: FileConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let streams = match &raw.streams {
        Some(names) => parse_streams(names)?,
        None => Stream::ALL.to_vec(),
    };
    for name in raw.key_properties.keys() {
        name.parse::<Stream>()
            .with_context(|| format!("Invalid key_properties entry {name:?}"))?;
    }

    let token = match std::env::var(TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => {
            info!("{TOKEN_ENV} found in env");
            token
        }
        Ok(_) => {
            error!("{TOKEN_ENV} is empty");
            anyhow::bail!("{TOKEN_ENV} environment variable is empty");
        }
        Err(e) => {
            error!(error = ?e, "{TOKEN_ENV} environment variable not set");
            anyhow::bail!("{TOKEN_ENV} environment variable not set: {e}");
        }
    };

    let client = ClientConfig {
        base_url: raw.base_url,
        organization: raw.organization,
        stats_period: raw.stats_period,
        request_timeout: match raw.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        },
        max_pages: raw.max_pages.max(1),
    };
    client.trace_loaded();

    let sync = SyncConfig {
        max_concurrency: raw.max_concurrency.max(1),
        on_fetch_error: raw.on_fetch_error,
    };
    info!(
        max_concurrency = sync.max_concurrency,
        on_fetch_error = ?sync.on_fetch_error,
        streams = ?streams,
        "Config loaded and merged successfully"
    );

    Ok(TapConfig {
        client,
        sync,
        credential: Credential::new(token),
        schemas_dir: raw.schemas_dir,
        streams,
        key_properties: raw.key_properties,
    })
}

/// Resolves stream names, rejecting any the tap does not support.
pub fn parse_streams(names: &[String]) -> Result<Vec<Stream>> {
    let mut streams = Vec::with_capacity(names.len());
    for name in names {
        let stream = name.parse::<Stream>()?;
        if !streams.contains(&stream) {
            streams.push(stream);
        }
    }
    Ok(streams)
}

/// Reads bookmarks persisted by an earlier run.
///
/// Accepts either the bare state document or a Singer `STATE` message line.
pub fn load_state<P: AsRef<Path>>(path: P) -> Result<BookmarkState> {
    let path_ref = path.as_ref();
    let content = fs::read_to_string(path_ref)
        .with_context(|| format!("Failed to read state file {path_ref:?}"))?;
    if content.trim().is_empty() {
        return Ok(BookmarkState::default());
    }

    let mut value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse state file {path_ref:?}"))?;
    if value.get("type").and_then(|t| t.as_str()) == Some("STATE") {
        value = value["value"].take();
    }
    let state: BookmarkState = serde_json::from_value(value)
        .with_context(|| format!("Unexpected state shape in {path_ref:?}"))?;
    info!(
        state_path = ?path_ref,
        streams = state.bookmarks.len(),
        "Loaded prior state"
    );
    Ok(state)
}
