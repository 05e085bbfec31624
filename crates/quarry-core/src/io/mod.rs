//! IO modules - archive streaming over the local filesystem

pub mod extract;
pub mod repack;
pub mod scan;

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to read archive: {0}")]
    Read(#[source] io::Error),

    #[error("Unsafe path in archive: {0}")]
    UnsafePath(String),

    #[error("No directory ending in '{suffix}' found in archive")]
    MissingInjectionTarget { suffix: String },

    #[error("External tar not available: {0}")]
    ToolMissing(String),

    #[error("External tar extraction failed with {status}")]
    FallbackFailed { status: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
