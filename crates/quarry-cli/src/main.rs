//! quarry - distribution fetcher CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use quarry_cli::cmd;
use quarry_cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let ctx = cmd::Context::from_cli(&cli)?;

    match cli.command {
        Commands::Resolve { version, no_probe } => {
            cmd::resolve::resolve(&ctx, &version, no_probe).await
        }
        Commands::Fetch {
            version,
            url,
            checksum,
        } => cmd::fetch::fetch(&ctx.with_overrides(url, checksum)?, &version).await,
        Commands::Install {
            version,
            url,
            checksum,
        } => cmd::install::install(&ctx.with_overrides(url, checksum)?, &version).await,
        Commands::Extract { archive, dest } => cmd::extract::extract(&ctx, &archive, &dest).await,
        Commands::Repack {
            source,
            dest,
            files,
        } => cmd::repack::repack(&ctx, &source, &dest, &files).await,
        Commands::Paths => {
            cmd::paths::paths(&ctx);
            Ok(())
        }
        Commands::Completions { shell } => {
            cmd::completions::completions(shell);
            Ok(())
        }
    }
}
