//! Contracts the reconciliation loop needs from the outside world.
//!
//! Both traits are synchronous: the loop processes one entry at a time and
//! waits for each call. Implementations backed by async HTTP clients bridge
//! with a runtime of their own.

use chrono::{DateTime, Utc};

use crate::config::ClientConfig;
use crate::entry::{ClientIdentity, ClientRef, Project, ProjectRef, TimeEntry, WorkLogRecord};

/// Where time entries come from and where their tags are written back.
pub trait TimeSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns every entry started within `[start, end]`.
    fn fetch_entries(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeEntry>, Self::Error>;

    fn resolve_project(&self, project: ProjectRef) -> Result<Project, Self::Error>;

    fn resolve_client(&self, client: ClientRef) -> Result<ClientIdentity, Self::Error>;

    /// Persists the entry's tag set.
    fn update_entry(&self, entry: &TimeEntry) -> Result<(), Self::Error>;
}

/// Receipt for a work-log accepted by the issue tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorklogConfirmation {
    pub id: String,
}

/// Where work-logs are submitted.
pub trait WorklogSink {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Submits one work-log using the credentials and host of `client`.
    fn submit(
        &self,
        client: &ClientConfig,
        record: &WorkLogRecord,
    ) -> Result<WorklogConfirmation, Self::Error>;
}
