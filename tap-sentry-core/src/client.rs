//! Transport client for the Sentry REST API.
//!
//! [`ReqwestTransport`] performs single authenticated GETs over one shared
//! `reqwest::Client`. [`SentryClient`] builds resource URLs on top of any
//! [`HttpTransport`], follows `Link` pagination to the end, and reports the
//! bookmark position reached by the streams that carry one.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, LINK};
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::Authenticator;
use crate::config::ClientConfig;
use crate::contract::{Checkpoint, Fetched, HttpTransport, RawPage, Record, SentryApi};
use crate::error::FetchError;
use crate::pagination::next_relation;

pub const ISSUES_BOOKMARK: (&str, &str) = ("issues", "latest");
pub const EVENTS_BOOKMARK: (&str, &str) = ("events", "latest");
pub const TEAMS_BOOKMARK: (&str, &str) = ("teams", "dateCreated");

/// Production [`HttpTransport`]: one connection pool for the whole run.
pub struct ReqwestTransport {
    http: reqwest::Client,
    auth: Authenticator,
}

impl ReqwestTransport {
    pub fn new(auth: Authenticator, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        info!(timeout = ?timeout, "Created HTTP transport");
        Ok(Self { http, auth })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<RawPage, FetchError> {
        debug!(url, "GET");
        let response = self.auth.decorate(self.http.get(url)).send().await?;
        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: final_url,
            });
        }

        let link = response
            .headers()
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;
        let body = serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode {
            url: final_url.clone(),
            reason: e.to_string(),
        })?;

        Ok(RawPage {
            url: final_url,
            body,
            link,
        })
    }
}

/// Result of following a paginated resource to its end.
#[derive(Debug, Default)]
pub struct Traversal {
    pub records: Vec<Record>,
    pub pages: usize,
    /// Cursor of the last `next` relation seen: where a later run would resume.
    pub terminal_cursor: Option<String>,
}

pub struct SentryClient<T> {
    transport: T,
    config: ClientConfig,
    base_url: Url,
}

impl<T: HttpTransport> SentryClient<T> {
    pub fn new(transport: T, config: ClientConfig) -> Result<Self, FetchError> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| FetchError::Url {
            url: base.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            transport,
            config,
            base_url,
        })
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<String, FetchError> {
        let mut url = self.base_url.join(path).map_err(|e| FetchError::Url {
            url: format!("{}{}", self.base_url, path),
            reason: e.to_string(),
        })?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url.into())
    }

    fn org_path(&self, resource: &str) -> String {
        format!("organizations/{}/{}/", self.config.organization, resource)
    }

    /// Fetches `first_url` and every page after it while the API reports more results.
    pub async fn paginate(&self, first_url: String) -> Result<Traversal, FetchError> {
        let mut traversal = Traversal::default();
        let mut url = first_url;
        loop {
            let page = self.transport.get(&url).await?;
            traversal.pages += 1;
            traversal.records.extend(into_records(page.body, &page.url)?);

            let next = page.link.as_deref().and_then(next_relation);
            if let Some(cursor) = next.as_ref().and_then(|n| n.cursor.clone()) {
                traversal.terminal_cursor = Some(cursor);
            }
            match next {
                Some(next) if next.has_more() => {
                    if traversal.pages >= self.config.max_pages {
                        warn!(
                            url = %page.url,
                            pages = traversal.pages,
                            "Page limit reached, stopping pagination"
                        );
                        break;
                    }
                    url = next.url;
                }
                _ => break,
            }
        }
        debug!(
            pages = traversal.pages,
            records = traversal.records.len(),
            "Pagination complete"
        );
        Ok(traversal)
    }

    async fn project_scoped(
        &self,
        resource: &str,
        project_id: &str,
        bookmark: (&str, &str),
    ) -> Result<Fetched, FetchError> {
        let url = self.url(
            &self.org_path(resource),
            &[
                ("project", project_id),
                ("statsPeriod", self.config.stats_period.as_str()),
            ],
        )?;
        let traversal = self.paginate(url).await?;
        info!(
            resource,
            project_id,
            pages = traversal.pages,
            records = traversal.records.len(),
            "Fetched project resources"
        );
        let (stream, field) = bookmark;
        Ok(Fetched {
            checkpoint: traversal
                .terminal_cursor
                .map(|cursor| Checkpoint::new(stream, field, cursor)),
            records: traversal.records,
        })
    }
}

#[async_trait]
impl<T: HttpTransport> SentryApi for SentryClient<T> {
    async fn fetch_projects(&self) -> Result<Vec<Record>, FetchError> {
        let traversal = self.paginate(self.url("projects/", &[])?).await?;
        info!(projects = traversal.records.len(), "Fetched projects");
        Ok(traversal.records)
    }

    async fn fetch_issues(&self, project_id: &str) -> Result<Fetched, FetchError> {
        self.project_scoped("issues", project_id, ISSUES_BOOKMARK)
            .await
    }

    async fn fetch_events(&self, project_id: &str) -> Result<Fetched, FetchError> {
        self.project_scoped("events", project_id, EVENTS_BOOKMARK)
            .await
    }

    async fn fetch_teams(&self) -> Result<Fetched, FetchError> {
        let extracted_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let traversal = self.paginate(self.url(&self.org_path("teams"), &[])?).await?;
        info!(teams = traversal.records.len(), "Fetched teams");
        let (stream, field) = TEAMS_BOOKMARK;
        Ok(Fetched {
            records: traversal.records,
            checkpoint: Some(Checkpoint::new(stream, field, extracted_at)),
        })
    }

    async fn fetch_users(&self) -> Result<Vec<Record>, FetchError> {
        let traversal = self.paginate(self.url(&self.org_path("users"), &[])?).await?;
        info!(users = traversal.records.len(), "Fetched users");
        Ok(traversal.records)
    }

    async fn fetch_bill(&self, year: i32, month: u32) -> Result<Value, FetchError> {
        let url = self.url(&format!("billing/v2/year/{year}/month/{month}"), &[])?;
        let page = self.transport.get(&url).await?;
        Ok(page.body)
    }
}

fn into_records(body: Value, url: &str) -> Result<Vec<Record>, FetchError> {
    let Value::Array(items) = body else {
        return Err(FetchError::Decode {
            url: url.to_string(),
            reason: "expected a JSON array".to_string(),
        });
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(record) => Ok(record),
            other => Err(FetchError::Decode {
                url: url.to_string(),
                reason: format!("expected an object, found {other}"),
            }),
        })
        .collect()
}
