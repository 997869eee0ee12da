//! Time entries and the work-logs built from them.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Milliseconds added to an entry's start before it is submitted as a work-log.
///
/// Jira misplaces work-logs that start exactly on the whole second reported by
/// Toggl.
pub const START_OFFSET_MS: i64 = 1;

/// Unique, unordered set of status tags on a time entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    /// Adds a tag. Returns `false` if it was already present.
    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        self.0.insert(tag.into())
    }

    /// Removes a tag. Returns `false` if it was not present.
    pub fn remove(&mut self, tag: &str) -> bool {
        self.0.remove(tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns the tags as a sorted list, the shape external APIs expect.
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.iter().collect();
        write!(f, "[{}]", tags.join(", "))
    }
}

/// Reference to a project inside a workspace of the time-tracking source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProjectRef {
    pub workspace_id: u64,
    pub project_id: u64,
}

/// Reference to a client inside a workspace of the time-tracking source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientRef {
    pub workspace_id: u64,
    pub client_id: u64,
}

/// A recorded span of tracked time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeEntry {
    pub id: u64,
    pub workspace_id: u64,
    /// `ISSUE-KEY free text comment`.
    pub description: String,
    pub start: DateTime<Utc>,
    /// `None` while the timer is still running.
    pub stop: Option<DateTime<Utc>>,
    pub project: Option<ProjectRef>,
    pub tags: TagSet,
}

impl TimeEntry {
    /// Start timestamp as submitted to the issue tracker.
    pub fn adjusted_start(&self) -> DateTime<Utc> {
        self.start + Duration::milliseconds(START_OFFSET_MS)
    }
}

/// A project as resolved from the time-tracking source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub name: String,
    pub client: Option<ClientRef>,
}

/// The client (tenant) owning a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub name: String,
}

impl ClientIdentity {
    /// Key used to look the client up in configuration.
    pub fn config_key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// Issue key and comment split out of an entry description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDescription {
    pub issue_key: String,
    pub comment: String,
}

impl IssueDescription {
    /// Splits on the first whitespace run.
    ///
    /// The comment is the remaining words joined by single spaces and may be
    /// empty. Returns `None` when the description has no words at all.
    pub fn parse(description: &str) -> Option<Self> {
        let mut words = description.split_whitespace();
        let issue_key = words.next()?.to_string();
        let comment = words.collect::<Vec<_>>().join(" ");
        Some(Self { issue_key, comment })
    }
}

/// A work-log ready to be submitted to the issue tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkLogRecord {
    pub issue_key: String,
    pub comment: String,
    pub time_spent_seconds: u64,
    /// Entry start shifted by [`START_OFFSET_MS`].
    pub started: DateTime<Utc>,
}
