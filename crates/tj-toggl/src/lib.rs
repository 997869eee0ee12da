//! Toggl Track v9 API client.
//!
//! Covers the calls the migration needs: listing time entries in a window,
//! resolving projects and clients, and rewriting an entry's tags.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tj_core::{ClientIdentity, ClientRef, Project, ProjectRef, TimeEntry};

/// Default request timeout for API calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_BASE_URL: &str = "https://api.track.toggl.com/api/v9";

/// Toggl client errors.
#[derive(Debug, Error)]
pub enum TogglError {
    /// The provided API token was invalid.
    #[error("invalid API token: {reason}")]
    InvalidToken { reason: &'static str },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Toggl Track API client.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    api_token: String,
    base_url: String,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("api_token", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client for the public Toggl API.
    pub fn new(api_token: impl Into<String>) -> Result<Self, TogglError> {
        Self::with_base_url(api_token, DEFAULT_BASE_URL)
    }

    /// Creates a client against an explicit API root such as
    /// `https://api.track.toggl.com/api/v9`.
    pub fn with_base_url(
        api_token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, TogglError> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(TogglError::InvalidToken {
                reason: "API token cannot be empty",
            });
        }

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(TogglError::ClientBuild)?;

        Ok(Self {
            http,
            api_token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Lists the current user's time entries started within `[start, end]`.
    pub async fn time_entries(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeEntry>, TogglError> {
        let response = self
            .http
            .get(format!("{}/me/time_entries", self.base_url))
            .basic_auth(&self.api_token, Some("api_token"))
            .query(&[
                ("start_date", start.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("end_date", end.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ])
            .send()
            .await?;

        let entries: Vec<ApiTimeEntry> = read_json(response).await?;
        tracing::debug!(count = entries.len(), "fetched time entries");
        Ok(entries.into_iter().map(TimeEntry::from).collect())
    }

    pub async fn project(&self, project: ProjectRef) -> Result<Project, TogglError> {
        let response = self
            .http
            .get(format!(
                "{}/workspaces/{}/projects/{}",
                self.base_url, project.workspace_id, project.project_id
            ))
            .basic_auth(&self.api_token, Some("api_token"))
            .send()
            .await?;

        let payload: ApiProject = read_json(response).await?;
        Ok(Project {
            name: payload.name,
            client: payload.client_id.map(|client_id| ClientRef {
                workspace_id: project.workspace_id,
                client_id,
            }),
        })
    }

    pub async fn client(&self, client: ClientRef) -> Result<ClientIdentity, TogglError> {
        let response = self
            .http
            .get(format!(
                "{}/workspaces/{}/clients/{}",
                self.base_url, client.workspace_id, client.client_id
            ))
            .basic_auth(&self.api_token, Some("api_token"))
            .send()
            .await?;

        let payload: ApiClient = read_json(response).await?;
        Ok(ClientIdentity { name: payload.name })
    }

    /// Replaces the tag list of an entry with its current tag set.
    pub async fn update_tags(&self, entry: &TimeEntry) -> Result<(), TogglError> {
        let body = TagsUpdate {
            tags: entry.tags.to_vec(),
        };
        let response = self
            .http
            .put(format!(
                "{}/workspaces/{}/time_entries/{}",
                self.base_url, entry.workspace_id, entry.id
            ))
            .basic_auth(&self.api_token, Some("api_token"))
            .json(&body)
            .send()
            .await?;

        let _: serde_json::Value = read_json(response).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiTimeEntry {
    id: u64,
    workspace_id: u64,
    project_id: Option<u64>,
    description: Option<String>,
    start: DateTime<Utc>,
    stop: Option<DateTime<Utc>>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

impl From<ApiTimeEntry> for TimeEntry {
    fn from(entry: ApiTimeEntry) -> Self {
        Self {
            id: entry.id,
            workspace_id: entry.workspace_id,
            description: entry.description.unwrap_or_default(),
            start: entry.start,
            stop: entry.stop,
            project: entry.project_id.map(|project_id| ProjectRef {
                workspace_id: entry.workspace_id,
                project_id,
            }),
            tags: entry.tags.unwrap_or_default().into_iter().collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiProject {
    name: String,
    client_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiClient {
    name: String,
}

#[derive(Debug, Serialize)]
struct TagsUpdate {
    tags: Vec<String>,
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TogglError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(TogglError::Api {
            status: status.as_u16(),
            message: api_message(&body, status),
        });
    }
    serde_json::from_str(&body).map_err(|err| TogglError::InvalidResponse(err.to_string()))
}

/// Toggl reports errors as a bare JSON string or plain text.
fn api_message(body: &str, status: reqwest::StatusCode) -> String {
    let message = serde_json::from_str::<String>(body)
        .unwrap_or_else(|_| body.trim().to_string());
    if message.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        message
    }
}
