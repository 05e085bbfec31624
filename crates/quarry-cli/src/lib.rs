//! quarry - distribution fetcher
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Downloads a server distribution from the closest responding mirror,
//! verifies it against the published checksums, and unpacks or repacks it.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.quarry/
//! ├── cache/      # Downloaded archives and checksum sidecars
//! ├── dist/       # Extracted distributions
//! └── quarry.toml # Optional configuration
//! ```

pub mod cmd;
pub mod ui;

pub use quarry_core::paths::*;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "quarry")]
#[command(author, version = env!("QUARRY_VERSION"), about = "quarry - fetch, verify and unpack server distributions")]
pub struct Cli {
    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory holding downloaded archives
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Directory distributions are extracted into
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List ranked mirror candidates and probe them
    Resolve {
        /// Release version (e.g. 8.11.2)
        version: String,
        /// Only print the candidates, do not probe
        #[arg(long)]
        no_probe: bool,
    },
    /// Download and verify a release into the cache
    Fetch {
        /// Release version
        version: String,
        /// Download from this URL instead of resolving a mirror
        #[arg(long)]
        url: Option<String>,
        /// Pinned digest, e.g. sha512:<hex>
        #[arg(long)]
        checksum: Option<String>,
    },
    /// Download, verify and extract a release
    Install {
        /// Release version
        version: String,
        /// Download from this URL instead of resolving a mirror
        #[arg(long)]
        url: Option<String>,
        /// Pinned digest, e.g. sha512:<hex>
        #[arg(long)]
        checksum: Option<String>,
    },
    /// Extract a local archive
    Extract {
        /// Compressed tar archive
        archive: PathBuf,
        /// Destination directory
        dest: PathBuf,
    },
    /// Repack a release or local archive with extra library files
    Repack {
        /// Release version, or path to an existing archive
        source: String,
        /// Archive to write
        dest: PathBuf,
        /// Files to add to the library directory
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show the directories quarry uses
    Paths,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}
