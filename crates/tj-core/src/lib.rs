//! Core reconciliation logic for migrating Toggl time entries to Jira.
//!
//! This crate contains:
//! - Config resolution: default client, per-client sections and runtime overrides
//! - Rounding: tracked seconds to work-log durations
//! - Eligibility: which entries a run should touch, based on status tags
//! - The reconciliation loop, written against the [`TimeSource`] and
//!   [`WorklogSink`] traits

pub mod config;
pub mod eligibility;
pub mod entry;
pub mod reconcile;
pub mod rounding;
mod services;

pub use config::{
    ClientConfig, ClientField, ClientSection, ConfigError, DisabledReason, GlobalConfig,
    MAX_PERIOD_DAYS, Resolution, RuntimeOverrides, TagNames, resolve, resolve_fields,
};
pub use eligibility::{Eligibility, eligibility, is_eligible};
pub use entry::{
    ClientIdentity, ClientRef, IssueDescription, Project, ProjectRef, START_OFFSET_MS, TagSet,
    TimeEntry, WorkLogRecord,
};
pub use reconcile::{EntryError, EntryOutcome, Reconciler, ReconcileError, RunMode, RunReport};
pub use rounding::{Granularity, InvalidGranularity, humanize_seconds, round_duration};
pub use services::{TimeSource, WorklogConfirmation, WorklogSink};
