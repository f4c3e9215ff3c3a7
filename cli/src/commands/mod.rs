pub mod batch;
pub mod check;
pub mod evaluate;
pub mod seed;
pub mod subject;
pub mod validate;

use anyhow::{bail, Result};

/// Reject an unknown `--format` before doing any work
pub fn check_format(format: &str) -> Result<()> {
    match format {
        "json" | "text" => Ok(()),
        other => bail!("Unsupported format: {} (expected json or text)", other),
    }
}
