//! Toggl to Jira migration CLI library.
//!
//! This crate wires the reconciliation core to the Toggl and Jira clients
//! and provides the `tj` command-line interface.

mod bootstrap;
mod bridge;
mod cli;
pub mod commands;
mod config;
pub mod logging;

pub use cli::{Cli, Commands};
pub use config::{Config, resolve_path as config_path};
pub use logging::LogFormat;
