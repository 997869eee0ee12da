//! Init command for writing a configuration template.

use std::io::Write;
use std::path::Path;

use anyhow::Result;

use crate::bootstrap;

/// Writes the template to `path` and reports what happened.
pub fn run<W: Write>(writer: &mut W, path: &Path, force: bool) -> Result<()> {
    if bootstrap::write_template(path, force)? {
        writeln!(writer, "Wrote configuration template to {}", path.display())?;
        writeln!(writer, "Fill in toggl_token and [default_client], then run `tj sync`.")?;
    } else {
        writeln!(
            writer,
            "Configuration already exists at {} (use --force to overwrite)",
            path.display()
        )?;
    }
    Ok(())
}
