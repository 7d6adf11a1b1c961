//! Error types for the tap-sentry core library.
//!
//! Fetch failures ([`FetchError`]) are recoverable: the sync engine decides,
//! per [`crate::config::FailurePolicy`], whether to skip or abort. Everything
//! in [`SyncError`] reaches the caller.

use thiserror::Error;

/// Failure of a single API round-trip or pagination traversal.
#[derive(Debug, Error)]
pub enum FetchError {
    /// DNS, connect, TLS or timeout failure below the HTTP layer.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-2xx status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The body was not the JSON shape the endpoint promises.
    #[error("undecodable response from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// A URL could not be built from the configured base and resource path.
    #[error("invalid url {url}: {reason}")]
    Url { url: String, reason: String },
}

/// Failure writing Singer messages.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write message: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors surfaced by the sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The requested stream is not one the tap knows how to sync.
    #[error("stream not recognized: {0}")]
    UnsupportedStream(String),

    /// A fetch failed while the abort policy was in effect.
    #[error("fetch failed for stream {stream}: {source}")]
    Fetch {
        stream: String,
        #[source]
        source: FetchError,
    },

    #[error(transparent)]
    Output(#[from] OutputError),
}
