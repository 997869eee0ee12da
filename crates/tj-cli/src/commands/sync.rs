//! Sync command: the reconciliation run against Toggl and Jira.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use tj_core::{Reconciler, RunMode, RunReport, RuntimeOverrides};

use crate::bootstrap;
use crate::bridge::{JiraSink, TogglSource};
use crate::config::Config;

/// Arguments for `tj sync`.
#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Submit work-logs and tag entries. Without this only a preview is printed.
    #[arg(long)]
    pub apply: bool,

    /// Look back this many days instead of the configured period.
    #[arg(short, long)]
    pub period: Option<i64>,

    /// Round every client's work-logs to this many minutes.
    #[arg(short = 't', long, visible_alias = "tryb-niepokorny")]
    pub rounding: Option<i64>,
}

/// Runs one reconciliation pass and returns its report.
///
/// `config_path` is where bootstrap edits go: the token placeholder and
/// templates for clients seen in Toggl but missing from the configuration.
pub fn run<W: Write>(
    writer: &mut W,
    args: &SyncArgs,
    config: &Config,
    config_path: &Path,
) -> Result<RunReport> {
    let token = bootstrap::require_toggl_token(config, config_path)?;
    let global = config.global().context("invalid configuration")?;
    let overrides = RuntimeOverrides {
        period_days: args.period,
        rounding_minutes: args.rounding,
    };
    let mode = if args.apply {
        RunMode::Apply
    } else {
        RunMode::Preview
    };
    let reconciler =
        Reconciler::new(global, overrides, mode).context("invalid command-line override")?;

    let runtime = tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;
    let toggl = tj_toggl::Client::with_base_url(token, &config.toggl_api_url)
        .context("failed to create Toggl client")?;
    let source = TogglSource::new(toggl, &runtime);
    let sink = JiraSink::new(&runtime);

    let report = reconciler
        .run(&source, &sink, writer, Utc::now())
        .context("sync aborted")?;

    if !report.unconfigured_clients.is_empty() {
        let names = report.unconfigured_clients.iter().map(String::as_str);
        match bootstrap::append_client_templates(config_path, names) {
            Ok(count) => tracing::warn!(
                count,
                path = %config_path.display(),
                "added disabled sections for new clients, fill them in and set enabled = true"
            ),
            Err(err) => tracing::error!(
                error = %format!("{err:#}"),
                "failed to add sections for new clients"
            ),
        }
    }

    tracing::info!(summary = %report, "sync finished");
    Ok(report)
}
