//! Extract command

use std::path::Path;

use anyhow::{Context as _, Result};
use quarry_core::io::extract::{self, ExtractOutcome};

use super::Context;

/// Unpack a local archive into `dest`
pub async fn extract(ctx: &Context, archive: &Path, dest: &Path) -> Result<()> {
    anyhow::ensure!(archive.is_file(), "{} is not a file", archive.display());

    let (source, target) = (archive.to_path_buf(), dest.to_path_buf());
    let reporter = ctx.reporter.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        extract::extract(&source, &target, reporter.as_ref())
    })
    .await?
    .with_context(|| format!("Failed to extract {}", archive.display()))?;

    let detail = match outcome {
        ExtractOutcome::Native(count) => format!("{count} entries"),
        ExtractOutcome::Fallback => "via system tar".to_string(),
    };
    ctx.reporter
        .success(&format!("Extracted into {} ({detail})", dest.display()));
    Ok(())
}
