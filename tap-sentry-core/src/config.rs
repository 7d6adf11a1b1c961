use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://sentry.io/api/0/";
pub const DEFAULT_STATS_PERIOD: &str = "1d";
pub const DEFAULT_MAX_PAGES: usize = 1000;
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Where and how the transport client talks to the API.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub organization: String,
    pub stats_period: String,
    /// `None` leaves the transport's own default in place.
    pub request_timeout: Option<Duration>,
    pub max_pages: usize,
}

impl ClientConfig {
    pub fn new(organization: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            organization: organization.into(),
            stats_period: DEFAULT_STATS_PERIOD.to_string(),
            request_timeout: Some(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            base_url = %self.base_url,
            organization = %self.organization,
            stats_period = %self.stats_period,
            max_pages = self.max_pages,
            "Loaded client config"
        );
        debug!(?self, "Client config loaded (full debug)");
    }
}

/// What the engine does when a fetch fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the failure and carry on with whatever else can be fetched.
    #[default]
    Skip,
    /// Stop the stream and surface the error.
    Abort,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Upper bound on concurrent per-project fetches.
    pub max_concurrency: usize,
    pub on_fetch_error: FailurePolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            on_fetch_error: FailurePolicy::Skip,
        }
    }
}
