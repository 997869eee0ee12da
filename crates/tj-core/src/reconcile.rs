//! The reconciliation loop.
//!
//! Entries are processed one at a time and independently: every problem
//! with a single entry is logged and contained, and only configuration or
//! fetch failures abort the run.
//!
//! Per entry the loop walks
//! `fetched -> filtered -> project resolved -> client resolved -> rounded ->
//! submitted -> tags updated`, stopping early on the first step that says
//! the entry should not go further.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::io::{self, Write};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use thiserror::Error;

use crate::config::{
    ClientConfig, ConfigError, DisabledReason, GlobalConfig, Resolution, RuntimeOverrides, resolve,
};
use crate::eligibility::{Eligibility, eligibility};
use crate::entry::{ClientIdentity, IssueDescription, Project, TimeEntry, WorkLogRecord};
use crate::rounding::{Granularity, humanize_seconds, round_duration};
use crate::services::{TimeSource, WorklogSink};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to fetch time entries: {0}")]
    Fetch(#[source] BoxError),
    #[error("failed to write preview: {0}")]
    Output(#[from] io::Error),
}

/// Problems that only affect a single entry.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("time entry is not assigned to a project")]
    MissingProject,
    #[error("project `{project}` is not assigned to a client")]
    MissingClient { project: String },
    #[error("lookup failed: {0}")]
    Lookup(#[source] BoxError),
    #[error("description is empty, expected `ISSUE-KEY comment`")]
    EmptyDescription,
    #[error("time entry stops at {stop} before it starts at {start}")]
    StopBeforeStart {
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    },
}

/// Whether work-logs are actually submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    /// Print what would be submitted; change nothing.
    #[default]
    Preview,
    /// Submit work-logs and write status tags back.
    Apply,
}

/// Where processing of one entry ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    Ineligible(Eligibility),
    /// The same entry id was already processed earlier in this run.
    Duplicate,
    /// Timer still running.
    Running,
    LookupFailed,
    Invalid,
    Unconfigured { client: String },
    Disabled,
    /// The client section is missing a field with no default.
    Misconfigured,
    Previewed,
    Submitted { tags_saved: bool },
    SubmissionFailed { tags_saved: bool },
}

/// Counts of where each fetched entry ended up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub fetched: usize,
    pub ineligible: usize,
    pub duplicates: usize,
    pub running: usize,
    pub lookup_failed: usize,
    pub invalid: usize,
    pub unconfigured: usize,
    pub disabled: usize,
    pub misconfigured: usize,
    pub previewed: usize,
    pub submitted: usize,
    pub submission_failed: usize,
    pub tag_updates_failed: usize,
    /// Clients seen in this run that have no configuration section.
    pub unconfigured_clients: BTreeSet<String>,
}

impl RunReport {
    fn record(&mut self, outcome: EntryOutcome) {
        match outcome {
            EntryOutcome::Ineligible(_) => self.ineligible += 1,
            EntryOutcome::Duplicate => self.duplicates += 1,
            EntryOutcome::Running => self.running += 1,
            EntryOutcome::LookupFailed => self.lookup_failed += 1,
            EntryOutcome::Invalid => self.invalid += 1,
            EntryOutcome::Unconfigured { client } => {
                self.unconfigured += 1;
                self.unconfigured_clients.insert(client);
            }
            EntryOutcome::Disabled => self.disabled += 1,
            EntryOutcome::Misconfigured => self.misconfigured += 1,
            EntryOutcome::Previewed => self.previewed += 1,
            EntryOutcome::Submitted { tags_saved } => {
                self.submitted += 1;
                if !tags_saved {
                    self.tag_updates_failed += 1;
                }
            }
            EntryOutcome::SubmissionFailed { tags_saved } => {
                self.submission_failed += 1;
                if !tags_saved {
                    self.tag_updates_failed += 1;
                }
            }
        }
    }

    /// Entries that were left alone for a reason other than a failed submission.
    pub const fn skipped(&self) -> usize {
        self.ineligible
            + self.duplicates
            + self.running
            + self.lookup_failed
            + self.invalid
            + self.unconfigured
            + self.disabled
            + self.misconfigured
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fetched, {} submitted, {} failed, {} previewed, {} skipped",
            self.fetched,
            self.submitted,
            self.submission_failed,
            self.previewed,
            self.skipped()
        )?;
        if self.tag_updates_failed > 0 {
            write!(f, ", {} tag updates failed", self.tag_updates_failed)?;
        }
        Ok(())
    }
}

/// Runs the reconciliation for a frozen configuration.
#[derive(Debug, Clone)]
pub struct Reconciler {
    config: GlobalConfig,
    overrides: RuntimeOverrides,
    mode: RunMode,
}

impl Reconciler {
    /// Rejects invalid overrides before any entry is looked at.
    pub fn new(
        config: GlobalConfig,
        overrides: RuntimeOverrides,
        mode: RunMode,
    ) -> Result<Self, ConfigError> {
        overrides.validate()?;
        Ok(Self {
            config,
            overrides,
            mode,
        })
    }

    pub const fn mode(&self) -> RunMode {
        self.mode
    }

    /// The `[now - period, now]` window entries are fetched from.
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let days = self.overrides.effective_period(&self.config);
        (now - Duration::days(i64::from(days)), now)
    }

    /// Fetches the window ending at `now` and processes every entry in it.
    ///
    /// Preview lines are written to `out`.
    pub fn run<S, K, W>(
        &self,
        source: &S,
        sink: &K,
        out: &mut W,
        now: DateTime<Utc>,
    ) -> Result<RunReport, ReconcileError>
    where
        S: TimeSource,
        K: WorklogSink,
        W: Write,
    {
        let (start, end) = self.window(now);
        tracing::info!(%start, %end, mode = ?self.mode, "fetching time entries");
        let entries = source
            .fetch_entries(start, end)
            .map_err(|err| ReconcileError::Fetch(Box::new(err)))?;

        let mut report = RunReport {
            fetched: entries.len(),
            ..RunReport::default()
        };
        let mut seen = HashSet::new();
        for entry in entries {
            let outcome = if seen.insert(entry.id) {
                self.process_entry(entry, source, sink, out)?
            } else {
                tracing::warn!(entry_id = entry.id, "time entry returned twice, ignoring repeat");
                EntryOutcome::Duplicate
            };
            report.record(outcome);
        }

        Ok(report)
    }

    fn process_entry<S, K, W>(
        &self,
        entry: TimeEntry,
        source: &S,
        sink: &K,
        out: &mut W,
    ) -> io::Result<EntryOutcome>
    where
        S: TimeSource,
        K: WorklogSink,
        W: Write,
    {
        let tags = self.config.tags();
        let status = eligibility(&entry, &tags.success, &tags.skip);
        if status != Eligibility::Eligible {
            tracing::debug!(entry_id = entry.id, ?status, "skipping ineligible time entry");
            return Ok(EntryOutcome::Ineligible(status));
        }
        let Some(stop) = entry.stop else {
            tracing::debug!(entry_id = entry.id, "skipping running time entry");
            return Ok(EntryOutcome::Running);
        };

        tracing::info!(entry_id = entry.id, description = %entry.description, "start processing");

        let (project, client) = match lookup_owner(source, &entry) {
            Ok(owner) => owner,
            Err(err) => {
                tracing::error!(
                    entry_id = entry.id,
                    description = %entry.description,
                    error = %err,
                    "cannot resolve project or client, assign the time entry to a project with a client"
                );
                return Ok(EntryOutcome::LookupFailed);
            }
        };
        let client_key = client.config_key();

        let client_config = match resolve(&client_key, &self.config, &self.overrides) {
            Ok(Resolution::Ready(client_config)) => client_config,
            Ok(Resolution::Unconfigured) => {
                tracing::warn!(
                    entry_id = entry.id,
                    client = %client_key,
                    "client is not configured, skipping time entry"
                );
                return Ok(EntryOutcome::Unconfigured { client: client_key });
            }
            Ok(Resolution::Disabled(DisabledReason::NeedsReview)) => {
                tracing::warn!(
                    entry_id = entry.id,
                    client = %client_key,
                    "remove config_check from client.{client_key} once its settings are filled in"
                );
                return Ok(EntryOutcome::Disabled);
            }
            Ok(Resolution::Disabled(DisabledReason::Disabled)) => {
                tracing::warn!(
                    entry_id = entry.id,
                    client = %client_key,
                    "client is disabled, skipping time entry"
                );
                return Ok(EntryOutcome::Disabled);
            }
            Err(err) => {
                tracing::error!(
                    entry_id = entry.id,
                    description = %entry.description,
                    error = %err,
                    "client configuration is incomplete"
                );
                return Ok(EntryOutcome::Misconfigured);
            }
        };

        let (tracked, record) = match prepare(&entry, stop, client_config.granularity) {
            Ok(prepared) => prepared,
            Err(err) => {
                tracing::error!(
                    entry_id = entry.id,
                    description = %entry.description,
                    error = %err,
                    "invalid time entry"
                );
                return Ok(EntryOutcome::Invalid);
            }
        };
        tracing::debug!(
            entry_id = entry.id,
            tracked = %humanize_seconds(tracked),
            rounded = %humanize_seconds(record.time_spent_seconds),
            granularity = %client_config.granularity,
            "rounded tracked time"
        );

        match self.mode {
            RunMode::Preview => {
                write_preview(out, &client_config, &project, tracked, &record)?;
                Ok(EntryOutcome::Previewed)
            }
            RunMode::Apply => Ok(self.submit(entry, &client_config, &record, source, sink)),
        }
    }

    fn submit<S, K>(
        &self,
        mut entry: TimeEntry,
        client: &ClientConfig,
        record: &WorkLogRecord,
        source: &S,
        sink: &K,
    ) -> EntryOutcome
    where
        S: TimeSource,
        K: WorklogSink,
    {
        let tags = self.config.tags();
        let submitted = match sink.submit(client, record) {
            Ok(confirmation) => {
                tracing::info!(
                    entry_id = entry.id,
                    issue = %record.issue_key,
                    worklog_id = %confirmation.id,
                    "work-log added"
                );
                entry.tags.remove(&tags.failed);
                entry.tags.insert(tags.success.as_str());
                true
            }
            Err(err) => {
                tracing::error!(
                    entry_id = entry.id,
                    description = %entry.description,
                    issue = %record.issue_key,
                    client = %client.name,
                    error = %err,
                    "failed to add work-log"
                );
                entry.tags.insert(tags.failed.as_str());
                false
            }
        };

        // The work-log is already recorded; a failed tag update is only logged.
        let tags_saved = match source.update_entry(&entry) {
            Ok(()) => {
                tracing::debug!(entry_id = entry.id, tags = %entry.tags, "time entry tags updated");
                true
            }
            Err(err) => {
                tracing::error!(
                    entry_id = entry.id,
                    description = %entry.description,
                    tags = %entry.tags,
                    error = %err,
                    "failed to update time entry tags"
                );
                false
            }
        };

        tracing::info!(entry_id = entry.id, description = %entry.description, "finish processing");
        if submitted {
            EntryOutcome::Submitted { tags_saved }
        } else {
            EntryOutcome::SubmissionFailed { tags_saved }
        }
    }
}

fn lookup_owner<S: TimeSource>(
    source: &S,
    entry: &TimeEntry,
) -> Result<(Project, ClientIdentity), EntryError> {
    let project_ref = entry.project.ok_or(EntryError::MissingProject)?;
    let project = source
        .resolve_project(project_ref)
        .map_err(|err| EntryError::Lookup(Box::new(err)))?;
    let client_ref = project.client.ok_or_else(|| EntryError::MissingClient {
        project: project.name.clone(),
    })?;
    let client = source
        .resolve_client(client_ref)
        .map_err(|err| EntryError::Lookup(Box::new(err)))?;
    Ok((project, client))
}

/// Rounds the tracked time and builds the work-log for an entry.
///
/// Returns the raw tracked seconds alongside the record.
pub fn prepare(
    entry: &TimeEntry,
    stop: DateTime<Utc>,
    granularity: Granularity,
) -> Result<(u64, WorkLogRecord), EntryError> {
    let tracked = u64::try_from((stop - entry.start).num_seconds()).map_err(|_| {
        EntryError::StopBeforeStart {
            start: entry.start,
            stop,
        }
    })?;
    let time_spent_seconds = round_duration(tracked, granularity);

    let description =
        IssueDescription::parse(&entry.description).ok_or(EntryError::EmptyDescription)?;

    Ok((
        tracked,
        WorkLogRecord {
            issue_key: description.issue_key,
            comment: description.comment,
            time_spent_seconds,
            started: entry.adjusted_start(),
        },
    ))
}

fn write_preview<W: Write>(
    out: &mut W,
    client: &ClientConfig,
    project: &Project,
    tracked: u64,
    record: &WorkLogRecord,
) -> io::Result<()> {
    write!(
        out,
        "{} [{}/{}] {} (tracked {}) from {}",
        record.issue_key,
        client.name,
        project.name.to_lowercase(),
        humanize_seconds(record.time_spent_seconds),
        humanize_seconds(tracked),
        record.started.to_rfc3339_opts(SecondsFormat::Millis, true),
    )?;
    if record.comment.is_empty() {
        writeln!(out)
    } else {
        writeln!(out, ": {}", record.comment)
    }
}
