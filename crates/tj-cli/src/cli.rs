//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::sync::SyncArgs;
use crate::logging::LogFormat;

/// Migrate Toggl time entries to Jira work-logs.
///
/// Each finished time entry whose description starts with an issue key is
/// logged on that issue and tagged in Toggl so later runs skip it.
#[derive(Debug, Parser)]
#[command(name = "tj", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log line format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Where logs go: `stdout` or a file path (appended to).
    #[arg(long, global = true, default_value = "stdout")]
    pub log_output: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Migrate time entries from the lookback window to Jira.
    Sync(SyncArgs),

    /// Write a configuration template.
    Init {
        /// Overwrite an existing configuration file.
        #[arg(long)]
        force: bool,
    },

    /// Show how each configured client resolves.
    Clients,
}
