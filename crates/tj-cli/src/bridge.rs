//! Adapts the async Toggl and Jira clients to the synchronous core traits.

use std::cell::RefCell;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tj_core::{
    ClientConfig, ClientIdentity, ClientRef, Project, ProjectRef, TimeEntry, TimeSource,
    WorkLogRecord, WorklogConfirmation, WorklogSink,
};
use tj_jira::JiraError;
use tj_toggl::TogglError;
use tokio::runtime::Runtime;

/// Toggl-backed [`TimeSource`].
pub struct TogglSource<'rt> {
    client: tj_toggl::Client,
    runtime: &'rt Runtime,
}

impl<'rt> TogglSource<'rt> {
    pub const fn new(client: tj_toggl::Client, runtime: &'rt Runtime) -> Self {
        Self { client, runtime }
    }
}

impl TimeSource for TogglSource<'_> {
    type Error = TogglError;

    fn fetch_entries(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeEntry>, TogglError> {
        self.runtime.block_on(self.client.time_entries(start, end))
    }

    fn resolve_project(&self, project: ProjectRef) -> Result<Project, TogglError> {
        self.runtime.block_on(self.client.project(project))
    }

    fn resolve_client(&self, client: ClientRef) -> Result<ClientIdentity, TogglError> {
        self.runtime.block_on(self.client.client(client))
    }

    fn update_entry(&self, entry: &TimeEntry) -> Result<(), TogglError> {
        self.runtime.block_on(self.client.update_tags(entry))
    }
}

/// Jira-backed [`WorklogSink`] keeping one HTTP client per host and account.
pub struct JiraSink<'rt> {
    runtime: &'rt Runtime,
    clients: RefCell<HashMap<(String, String), tj_jira::Client>>,
}

impl<'rt> JiraSink<'rt> {
    pub fn new(runtime: &'rt Runtime) -> Self {
        Self {
            runtime,
            clients: RefCell::new(HashMap::new()),
        }
    }

    fn client_for(&self, client: &ClientConfig) -> Result<tj_jira::Client, JiraError> {
        let key = (client.host.clone(), client.username.clone());
        if let Some(existing) = self.clients.borrow().get(&key) {
            return Ok(existing.clone());
        }
        let jira = tj_jira::Client::new(&client.host, &client.username, &client.secret)?;
        tracing::debug!(host = %jira.host(), user = %client.username, "created jira client");
        self.clients.borrow_mut().insert(key, jira.clone());
        Ok(jira)
    }
}

impl WorklogSink for JiraSink<'_> {
    type Error = JiraError;

    fn submit(
        &self,
        client: &ClientConfig,
        record: &WorkLogRecord,
    ) -> Result<WorklogConfirmation, JiraError> {
        let jira = self.client_for(client)?;
        self.runtime.block_on(jira.add_worklog(record))
    }
}
