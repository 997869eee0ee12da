//! First-run configuration file handling.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::config::Config;

/// Value the template ships with until the user fills it in.
pub const PLACEHOLDER: &str = "FILL_IT";

const TEMPLATE: &str = r#"# tj configuration
#
# Time entries are migrated when their description starts with a Jira issue
# key, e.g. "PROJ-123 fixed the login form". The rest of the description
# becomes the work-log comment.

# Toggl API token, see https://track.toggl.com/profile
toggl_token = "FILL_IT"

# How many days back to look for time entries.
period = 1

[tags]
success = "logged"
failed = "jira-migration-failed"
skip = "jira-skip"

# Values every client falls back to.
[default_client]
jira_username = "FILL_IT"
jira_password = "FILL_IT"
jira_client_user = "FILL_IT"
jira_host = "https://FILL_IT.atlassian.net"
rounding_minutes = 1

# One section per Toggl client (name matched case-insensitively). Any key
# from [default_client] may be overridden here.
#
# [client.acme]
# jira_host = "https://acme.atlassian.net"
# rounding_minutes = 15
"#;

/// Writes the commented template to `path`.
///
/// Returns `false` when a file already exists and `force` is not set.
pub fn write_template(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, TEMPLATE).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

/// Returns the Toggl token or fails with directions to set it.
///
/// A missing token gets a placeholder line in the file so the user has
/// something to edit.
pub fn require_toggl_token(config: &Config, path: &Path) -> Result<String> {
    match config.toggl_token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() && token != PLACEHOLDER => return Ok(token.to_string()),
        Some(_) => {}
        None => insert_token_placeholder(path)?,
    }
    bail!(
        "toggl_token is not set: fill it in {} (get it from https://track.toggl.com/profile)",
        path.display()
    )
}

fn insert_token_placeholder(path: &Path) -> Result<()> {
    let existing = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            write_template(path, false)?;
            tracing::info!(path = %path.display(), "created configuration template");
            return Ok(());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    if existing
        .lines()
        .any(|line| line.trim_start().starts_with("toggl_token"))
    {
        return Ok(());
    }
    // Top-level keys must precede the first table header.
    let updated = format!("toggl_token = \"{PLACEHOLDER}\"\n{existing}");
    fs::write(path, updated).with_context(|| format!("failed to write {}", path.display()))
}

/// Appends a disabled `[client.<name>]` section per name.
///
/// Returns how many sections were written.
pub fn append_client_templates<'a>(
    path: &Path,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<usize> {
    let sections: Vec<String> = names.into_iter().map(client_template).collect();
    if sections.is_empty() {
        return Ok(0);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    for section in &sections {
        file.write_all(section.as_bytes())
            .with_context(|| format!("failed to append to {}", path.display()))?;
    }
    Ok(sections.len())
}

fn client_template(name: &str) -> String {
    format!(
        "\n[client.{key}]\n\
         # Added by tj for a client seen in Toggl. Unset keys fall back to [default_client].\n\
         # jira_username = \"\"\n\
         # jira_password = \"\"\n\
         # jira_client_user = \"\"\n\
         # jira_host = \"https://{host}.atlassian.net\"\n\
         # rounding_minutes = 15\n\
         enabled = false\n",
        key = toml_key(name),
        host = host_hint(name),
    )
}

/// Bare TOML key when possible, quoted otherwise.
fn toml_key(name: &str) -> String {
    let bare = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if bare {
        return name.to_string();
    }
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for c in name.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            c if c.is_control() => quoted.push_str(&format!("\\u{:04X}", u32::from(c))),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

fn host_hint(name: &str) -> String {
    let hint: String = name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    if hint.is_empty() {
        "example".to_string()
    } else {
        hint
    }
}
