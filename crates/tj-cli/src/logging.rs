//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Destination name that selects standard output.
pub const STDOUT: &str = "stdout";

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Installs the global subscriber.
///
/// `verbose` forces `debug`; otherwise `RUST_LOG` applies with `info` as the
/// fallback. Installing twice is a no-op so tests can call this freely.
pub fn init(verbose: bool, format: LogFormat, output: &str) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if output == STDOUT {
        let _ = match format {
            LogFormat::Text => builder.try_init(),
            LogFormat::Json => builder.json().try_init(),
        };
        return Ok(());
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(output)
        .with_context(|| format!("failed to open log file {output}"))?;
    let writer = Mutex::new(file);
    let _ = match format {
        LogFormat::Text => builder.with_ansi(false).with_writer(writer).try_init(),
        LogFormat::Json => builder.json().with_writer(writer).try_init(),
    };
    Ok(())
}
