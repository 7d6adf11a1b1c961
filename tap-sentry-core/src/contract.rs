//! # contract: the seams between the sync engine and the outside world
//!
//! This module defines the traits the engine is written against, plus the
//! plain data types that cross them:
//!
//! - [`HttpTransport`]: one authenticated GET, returning a decoded body and its `Link` header.
//! - [`SentryApi`]: the resource-level fetch operations (projects, issues, events, ...).
//! - [`RecordWriter`]: schema announcement and record emission.
//! - [`StateWriter`]: persistence of the full bookmark state.
//!
//! ## Mocking & Testing
//! Every trait is annotated for `mockall`, exported with the `test-export-mocks`
//! feature so the CLI crate and integration tests can build deterministic doubles.

use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use serde_json::{Map, Value};

use crate::bookmarks::BookmarkState;
use crate::error::{FetchError, OutputError};

/// One extracted item: a project, issue, event, user or team.
pub type Record = Map<String, Value>;

/// A single decoded API response.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPage {
    /// The URL that produced this page (after redirects).
    pub url: String,
    /// Decoded JSON body.
    pub body: Value,
    /// Raw `Link` header, when the API sent one.
    pub link: Option<String>,
}

/// Name, schema and key fields of a stream, as declared by the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDescriptor {
    pub name: String,
    pub schema: Value,
    pub key_properties: Vec<String>,
}

impl StreamDescriptor {
    pub fn new(name: impl Into<String>, schema: Value, key_properties: Vec<String>) -> Self {
        Self {
            name: name.into(),
            schema,
            key_properties,
        }
    }
}

/// A bookmark position reached by a completed traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub stream: String,
    pub field: String,
    pub value: String,
}

impl Checkpoint {
    pub fn new(stream: &str, field: &str, value: impl Into<String>) -> Self {
        Self {
            stream: stream.to_string(),
            field: field.to_string(),
            value: value.into(),
        }
    }
}

/// Records of one fetch, plus the position they reach for bookmark-tracked streams.
///
/// The checkpoint is only committed once every record has been written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fetched {
    pub records: Vec<Record>,
    pub checkpoint: Option<Checkpoint>,
}

impl From<Vec<Record>> for Fetched {
    fn from(records: Vec<Record>) -> Self {
        Self {
            records,
            checkpoint: None,
        }
    }
}

/// Issues an authenticated GET against an absolute URL.
///
/// Implementations must map non-2xx statuses to [`FetchError::Status`] and
/// undecodable bodies to [`FetchError::Decode`].
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<RawPage, FetchError>;
}

/// Resource-level read operations against the Sentry API.
///
/// Each call returns an explicit outcome; the caller decides whether a
/// failure is skipped or fatal. Bookmark-tracked fetches report their
/// terminal position in [`Fetched::checkpoint`] instead of storing it.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SentryApi: Send + Sync {
    /// All projects visible to the token.
    async fn fetch_projects(&self) -> Result<Vec<Record>, FetchError>;

    /// Issues of one project within the configured stats period.
    async fn fetch_issues(&self, project_id: &str) -> Result<Fetched, FetchError>;

    /// Events of one project within the configured stats period.
    async fn fetch_events(&self, project_id: &str) -> Result<Fetched, FetchError>;

    /// Teams of the organization.
    async fn fetch_teams(&self) -> Result<Fetched, FetchError>;

    /// Members of the organization.
    async fn fetch_users(&self) -> Result<Vec<Record>, FetchError>;

    /// Billing summary for a calendar month.
    async fn fetch_bill(&self, year: i32, month: u32) -> Result<Value, FetchError>;
}

/// Downstream sink for schema and record messages.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait RecordWriter: Send + Sync {
    fn write_schema(
        &self,
        stream: &str,
        schema: &Value,
        key_properties: &[String],
    ) -> Result<(), OutputError>;

    fn write_record(&self, stream: &str, record: &Record) -> Result<(), OutputError>;
}

/// Durable storage for the complete bookmark state.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait StateWriter: Send + Sync {
    fn write_state(&self, state: &BookmarkState) -> Result<(), OutputError>;
}

impl<T: RecordWriter + ?Sized> RecordWriter for Arc<T> {
    fn write_schema(
        &self,
        stream: &str,
        schema: &Value,
        key_properties: &[String],
    ) -> Result<(), OutputError> {
        (**self).write_schema(stream, schema, key_properties)
    }

    fn write_record(&self, stream: &str, record: &Record) -> Result<(), OutputError> {
        (**self).write_record(stream, record)
    }
}
