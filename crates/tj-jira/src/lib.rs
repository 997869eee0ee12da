//! Jira REST client for adding work-logs to issues.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tj_core::{WorkLogRecord, WorklogConfirmation};

/// Default request timeout for API calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Timestamp layout Jira accepts for `started`.
const STARTED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// Jira client errors.
#[derive(Debug, Error)]
pub enum JiraError {
    /// A connection setting was empty or malformed.
    #[error("invalid {field}: {reason}")]
    InvalidSetting {
        field: &'static str,
        reason: &'static str,
    },
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

/// Client for one Jira host and account.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    host: String,
    username: String,
    password: String,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client using basic auth against `host`
    /// (e.g. `https://acme.atlassian.net`).
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, JiraError> {
        let host = host.into().trim().trim_end_matches('/').to_string();
        if host.is_empty() {
            return Err(JiraError::InvalidSetting {
                field: "host",
                reason: "cannot be empty",
            });
        }
        if !host.starts_with("http://") && !host.starts_with("https://") {
            return Err(JiraError::InvalidSetting {
                field: "host",
                reason: "must start with http:// or https://",
            });
        }
        let username = username.into();
        if username.trim().is_empty() {
            return Err(JiraError::InvalidSetting {
                field: "username",
                reason: "cannot be empty",
            });
        }

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(JiraError::ClientBuild)?;

        Ok(Self {
            http,
            host,
            username,
            password: password.into(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Adds a work-log to `record.issue_key`.
    pub async fn add_worklog(
        &self,
        record: &WorkLogRecord,
    ) -> Result<WorklogConfirmation, JiraError> {
        if record.issue_key.contains(['/', '?', '#']) {
            return Err(JiraError::InvalidSetting {
                field: "issue key",
                reason: "must not contain '/', '?' or '#'",
            });
        }

        let started = record.started.format(STARTED_FORMAT).to_string();
        let request = WorklogRequest {
            comment: &record.comment,
            started: &started,
            time_spent_seconds: record.time_spent_seconds,
        };

        let response = self
            .http
            .post(format!(
                "{}/rest/api/2/issue/{}/worklog",
                self.host, record.issue_key
            ))
            .basic_auth(&self.username, Some(&self.password))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(JiraError::Api {
                status: status.as_u16(),
                message: parse_api_error(&body).unwrap_or_else(|| format!("status {status}: {body}")),
            });
        }

        let payload: WorklogResponse = serde_json::from_str(&body)
            .map_err(|err| JiraError::InvalidResponse(err.to_string()))?;
        tracing::debug!(issue = %record.issue_key, worklog_id = %payload.id, "jira accepted work-log");
        Ok(WorklogConfirmation { id: payload.id })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorklogRequest<'a> {
    comment: &'a str,
    started: &'a str,
    time_spent_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct WorklogResponse {
    id: String,
}

/// Flattens Jira's `{"errorMessages": [...], "errors": {field: message}}`.
fn parse_api_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct ErrorPayload {
        #[serde(default)]
        error_messages: Vec<String>,
        #[serde(default)]
        errors: BTreeMap<String, String>,
    }

    let payload: ErrorPayload = serde_json::from_str(body).ok()?;
    let messages: Vec<String> = payload
        .error_messages
        .into_iter()
        .chain(
            payload
                .errors
                .into_iter()
                .map(|(field, message)| format!("{field}: {message}")),
        )
        .collect();
    if messages.is_empty() {
        None
    } else {
        Some(messages.join("; "))
    }
}
