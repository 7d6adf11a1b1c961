//! Stream synchronisation: schema announcement, fetch, fan-out and emission.
//!
//! The engine drives one stream at a time. For the project-scoped streams
//! (issues, events) it lists projects first and then fetches each project's
//! resources concurrently, bounded by [`SyncConfig::max_concurrency`].
//! Records are written from the orchestrating task as each project finishes,
//! so emission order across projects is not deterministic.
//!
//! A fetch's bookmark checkpoint is committed to the [`BookmarkStore`] right
//! after its records are written, so a STATE message never covers records
//! that have not been emitted yet.
//!
//! # Error Handling
//! Fetch failures go through [`FailurePolicy`]: under `Skip` they are logged
//! and counted in the [`StreamReport`]; under `Abort` they end the stream with
//! [`SyncError::Fetch`]. Unknown stream names and output failures are always
//! returned to the caller.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::bookmarks::BookmarkStore;
use crate::config::{FailurePolicy, SyncConfig};
use crate::contract::{Fetched, Record, RecordWriter, SentryApi, StreamDescriptor};
use crate::error::{FetchError, SyncError};

/// The streams this tap knows how to sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Issues,
    Events,
    Users,
    Teams,
}

impl Stream {
    pub const ALL: [Stream; 4] = [Stream::Issues, Stream::Events, Stream::Users, Stream::Teams];

    pub fn name(self) -> &'static str {
        match self {
            Stream::Issues => "issues",
            Stream::Events => "events",
            Stream::Users => "users",
            Stream::Teams => "teams",
        }
    }

    pub fn default_key_properties(self) -> Vec<String> {
        let key = match self {
            Stream::Events => "eventID",
            Stream::Issues | Stream::Users | Stream::Teams => "id",
        };
        vec![key.to_string()]
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stream {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stream::ALL
            .into_iter()
            .find(|stream| stream.name() == s)
            .ok_or_else(|| SyncError::UnsupportedStream(s.to_string()))
    }
}

/// Outcome of syncing one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamReport {
    pub stream: String,
    pub records: usize,
    /// Fetches that failed and were skipped.
    pub failed_fetches: usize,
}

impl StreamReport {
    fn new(stream: &str) -> Self {
        Self {
            stream: stream.to_string(),
            records: 0,
            failed_fetches: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub streams: Vec<StreamReport>,
}

#[derive(Debug, Clone, Copy)]
enum ProjectResource {
    Issues,
    Events,
}

pub struct SyncEngine<A, W> {
    api: A,
    writer: W,
    bookmarks: Arc<BookmarkStore>,
    config: SyncConfig,
}

impl<A: SentryApi, W: RecordWriter> SyncEngine<A, W> {
    pub fn new(api: A, writer: W, bookmarks: Arc<BookmarkStore>, config: SyncConfig) -> Self {
        Self {
            api,
            writer,
            bookmarks,
            config,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn bookmarks(&self) -> &BookmarkStore {
        &self.bookmarks
    }

    /// Syncs the stream called `stream`, failing on names the tap does not support.
    pub async fn sync(
        &self,
        stream: &str,
        descriptor: &StreamDescriptor,
    ) -> Result<StreamReport, SyncError> {
        match stream.parse::<Stream>()? {
            Stream::Issues => self.sync_issues(descriptor).await,
            Stream::Events => self.sync_events(descriptor).await,
            Stream::Users => self.sync_users(descriptor).await,
            Stream::Teams => self.sync_teams(descriptor).await,
        }
    }

    /// Syncs every descriptor in order, stopping at the first hard error.
    pub async fn sync_all(&self, descriptors: &[StreamDescriptor]) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        for descriptor in descriptors {
            info!(stream = %descriptor.name, "Starting stream sync");
            let stream_report = self.sync(&descriptor.name, descriptor).await?;
            info!(
                stream = %stream_report.stream,
                records = stream_report.records,
                failed_fetches = stream_report.failed_fetches,
                "Stream sync complete"
            );
            report.streams.push(stream_report);
        }
        Ok(report)
    }

    /// Issues per project.
    pub async fn sync_issues(
        &self,
        descriptor: &StreamDescriptor,
    ) -> Result<StreamReport, SyncError> {
        self.sync_project_scoped(Stream::Issues, ProjectResource::Issues, descriptor)
            .await
    }

    /// Events per project.
    pub async fn sync_events(
        &self,
        descriptor: &StreamDescriptor,
    ) -> Result<StreamReport, SyncError> {
        self.sync_project_scoped(Stream::Events, ProjectResource::Events, descriptor)
            .await
    }

    /// Users in the organization.
    pub async fn sync_users(
        &self,
        descriptor: &StreamDescriptor,
    ) -> Result<StreamReport, SyncError> {
        let name = Stream::Users.name();
        self.announce(name, descriptor)?;
        let mut report = StreamReport::new(name);
        let fetched = self.api.fetch_users().await.map(Fetched::from);
        self.emit(name, None, fetched, &mut report)?;
        Ok(report)
    }

    /// Teams in the organization.
    pub async fn sync_teams(
        &self,
        descriptor: &StreamDescriptor,
    ) -> Result<StreamReport, SyncError> {
        let name = Stream::Teams.name();
        self.announce(name, descriptor)?;
        let mut report = StreamReport::new(name);
        let fetched = self.api.fetch_teams().await;
        self.emit(name, None, fetched, &mut report)?;
        Ok(report)
    }

    async fn sync_project_scoped(
        &self,
        stream: Stream,
        resource: ProjectResource,
        descriptor: &StreamDescriptor,
    ) -> Result<StreamReport, SyncError> {
        let name = stream.name();
        self.announce(name, descriptor)?;
        let mut report = StreamReport::new(name);

        let projects = match self.api.fetch_projects().await {
            Ok(projects) => projects,
            Err(e) => {
                self.on_fetch_error(name, None, e, &mut report)?;
                return Ok(report);
            }
        };

        let project_ids: Vec<String> = projects
            .iter()
            .filter_map(|project| {
                let id = project_id(project);
                if id.is_none() {
                    warn!(stream = name, ?project, "Project without an id, skipping");
                }
                id
            })
            .collect();
        info!(stream = name, projects = project_ids.len(), "Fanning out over projects");

        let mut fetches = futures::stream::iter(project_ids)
            .map(|project_id| async move {
                let fetched = match resource {
                    ProjectResource::Issues => self.api.fetch_issues(&project_id).await,
                    ProjectResource::Events => self.api.fetch_events(&project_id).await,
                };
                (project_id, fetched)
            })
            .buffer_unordered(self.config.max_concurrency.max(1));

        while let Some((project_id, fetched)) = fetches.next().await {
            self.emit(name, Some(&project_id), fetched, &mut report)?;
        }
        Ok(report)
    }

    fn announce(&self, name: &str, descriptor: &StreamDescriptor) -> Result<(), SyncError> {
        self.writer
            .write_schema(name, &descriptor.schema, &descriptor.key_properties)?;
        Ok(())
    }

    fn emit(
        &self,
        name: &str,
        project_id: Option<&str>,
        fetched: Result<Fetched, FetchError>,
        report: &mut StreamReport,
    ) -> Result<(), SyncError> {
        match fetched {
            Ok(Fetched {
                records,
                checkpoint,
            }) => {
                for record in &records {
                    self.writer.write_record(name, record)?;
                }
                report.records += records.len();
                if let Some(checkpoint) = checkpoint {
                    debug!(
                        stream = name,
                        project_id,
                        value = %checkpoint.value,
                        "Committing checkpoint"
                    );
                    self.bookmarks
                        .advance(&checkpoint.stream, &checkpoint.field, &checkpoint.value)?;
                }
                Ok(())
            }
            Err(e) => self.on_fetch_error(name, project_id, e, report),
        }
    }

    fn on_fetch_error(
        &self,
        name: &str,
        project_id: Option<&str>,
        error: FetchError,
        report: &mut StreamReport,
    ) -> Result<(), SyncError> {
        report.failed_fetches += 1;
        match self.config.on_fetch_error {
            FailurePolicy::Skip => {
                warn!(stream = name, project_id, error = %error, "Fetch failed, skipping");
                Ok(())
            }
            FailurePolicy::Abort => {
                error!(stream = name, project_id, error = %error, "Fetch failed, aborting stream");
                Err(SyncError::Fetch {
                    stream: name.to_string(),
                    source: error,
                })
            }
        }
    }
}

/// Project ids arrive as strings from Sentry, but numeric ids are accepted too.
fn project_id(project: &Record) -> Option<String> {
    match project.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
