//! Clients command for listing how each configured client resolves.

use std::io::Write;

use anyhow::{Context, Result};
use tj_core::{DisabledReason, Resolution, RuntimeOverrides, resolve};

use crate::config::Config;

/// Prints one line per `[client.<name>]` section. Secrets are never shown.
pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let global = config.global().context("invalid configuration")?;
    let overrides = RuntimeOverrides::default();

    let mut any = false;
    for name in global.client_names() {
        any = true;
        let status = match resolve(name, &global, &overrides) {
            Ok(Resolution::Ready(client)) => format!(
                "enabled, {} as {} on behalf of {}, {} rounding",
                client.host, client.username, client.acting_user, client.granularity
            ),
            Ok(Resolution::Disabled(DisabledReason::Disabled)) => "disabled".to_string(),
            Ok(Resolution::Disabled(DisabledReason::NeedsReview)) => {
                "needs review (remove config_check once checked)".to_string()
            }
            Ok(Resolution::Unconfigured) => "not configured".to_string(),
            Err(err) => format!("incomplete, {err}"),
        };
        writeln!(writer, "{name}: {status}")?;
    }
    if !any {
        writeln!(writer, "No clients configured.")?;
    }
    Ok(())
}
