//! Fetch command

use anyhow::Result;

use super::Context;

/// Download and verify `version` into the cache, printing the archive path
pub async fn fetch(ctx: &Context, version: &str) -> Result<()> {
    let fetcher = ctx.fetcher()?;
    let req = fetcher.request(version);
    let archive = fetcher.download(&req).await?;

    ctx.reporter.success(&format!("{} {} verified", req.name(), req.version()));
    println!("{}", archive.display());
    Ok(())
}
