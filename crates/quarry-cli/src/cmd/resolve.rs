//! Resolve command

use anyhow::Result;
use crossterm::style::Stylize;
use quarry_core::MirrorResolver;
use quarry_schema::Version;

use super::Context;

/// Print ranked mirror candidates for `version`, then the first that responds
pub async fn resolve(ctx: &Context, version: &str, no_probe: bool) -> Result<()> {
    let version = Version::new(version);
    let resolver = MirrorResolver::new(
        ctx.client()?,
        ctx.config.profile.clone(),
        ctx.reporter.clone(),
    );

    let candidates = resolver.resolve(&version).await;
    for candidate in &candidates {
        println!(
            "{} {}",
            format!("{:>2}", candidate.rank).dark_grey(),
            candidate.uri
        );
    }
    if no_probe {
        return Ok(());
    }

    let found = resolver.probe_for(&version, &candidates).await?;
    println!("{} {}", "→".green(), found.uri);
    Ok(())
}
