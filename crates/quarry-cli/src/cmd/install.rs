//! Install command

use anyhow::Result;

use super::Context;

/// Download, verify and extract `version`, printing the install directory
pub async fn install(ctx: &Context, version: &str) -> Result<()> {
    let fetcher = ctx.fetcher()?;
    let req = fetcher.request(version);
    let dir = fetcher.install(&req).await?;

    ctx.reporter
        .success(&format!("{} {} installed", req.name(), req.version()));
    println!("{}", dir.display());
    Ok(())
}
