//! Subcommand implementations

pub mod completions;
pub mod extract;
pub mod fetch;
pub mod install;
pub mod paths;
pub mod repack;
pub mod resolve;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use quarry_core::{Config, Fetcher};
use quarry_schema::HexDigest;

use crate::Cli;
use crate::ui::ConsoleReporter;

/// Configuration and reporter shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    pub reporter: Arc<ConsoleReporter>,
}

impl Context {
    /// Load layered configuration and apply global command-line overrides.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut config = Config::load().context("Failed to load configuration")?;
        if let Some(dir) = &cli.cache_dir {
            config.cache_dir.clone_from(dir);
        }
        if let Some(dir) = &cli.output_dir {
            config.output_dir.clone_from(dir);
        }

        Ok(Self {
            config,
            reporter: Arc::new(ConsoleReporter::new(cli.quiet)),
        })
    }

    /// Apply per-command download URL and pinned checksum flags.
    pub fn with_overrides(mut self, url: Option<String>, checksum: Option<String>) -> Result<Self> {
        if url.is_some() {
            self.config.download_url = url;
        }
        if let Some(pinned) = checksum {
            let digest = HexDigest::parse_pinned(&pinned)
                .with_context(|| format!("Invalid --checksum '{pinned}'"))?;
            self.config.checksum = Some(digest);
        }
        Ok(self)
    }

    pub fn client(&self) -> Result<reqwest::Client> {
        quarry_core::http::build_client(self.config.profile.probe_timeout())
            .context("Failed to build HTTP client")
    }

    pub fn fetcher(&self) -> Result<Fetcher> {
        Ok(Fetcher::new(
            self.config.clone(),
            self.client()?,
            self.reporter.clone(),
        ))
    }
}
