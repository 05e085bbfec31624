//! Repack command

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use quarry_core::io::repack;

use super::Context;

/// Repack a release (by version) or a local archive (by path) into `dest`
/// with `files` added to the library directory
pub async fn repack(ctx: &Context, source: &str, dest: &Path, files: &[PathBuf]) -> Result<()> {
    let local = Path::new(source);

    let written = if local.is_file() {
        let (source, dest) = (local.to_path_buf(), dest.to_path_buf());
        let extras = files.to_vec();
        let library_root = ctx.config.profile.library_root.clone();
        let reporter = ctx.reporter.clone();
        tokio::task::spawn_blocking(move || {
            repack::add_libraries(&source, &dest, &extras, &library_root, reporter.as_ref())
        })
        .await?
        .with_context(|| format!("Failed to repack {}", local.display()))?
    } else {
        let fetcher = ctx.fetcher()?;
        let req = fetcher.request(source);
        fetcher.repack(&req, dest, files).await?
    };

    ctx.reporter
        .success(&format!("Wrote {}", written.display()));
    println!("{}", written.display());
    Ok(())
}
