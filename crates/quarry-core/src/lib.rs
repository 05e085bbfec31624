//! Core library for quarry.
//!
//! The distribution pipeline: resolve a mirror, download into the cache,
//! verify the checksum, then either extract the archive or repack it with
//! extra library files.

pub mod checksum;
pub mod config;
pub mod fetch;
pub mod http;
pub mod io;
pub mod lock;
pub mod mirror;
pub mod paths;
pub mod reporter;

pub use checksum::{ChecksumError, ChecksumStore, DigestLookup};
pub use config::{Config, ConfigError, DistributionProfile};
pub use fetch::{FetchError, Fetcher};
pub use mirror::{MirrorError, MirrorResolver};
pub use paths::*;
pub use reporter::{MemoryReporter, NullReporter, Reporter, ReporterEvent};

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("quarry-core/", env!("CARGO_PKG_VERSION"));
