//! Shared types for the quarry distribution pipeline.
//!
//! Everything here is plain data: no network or filesystem side effects
//! beyond the path arithmetic in [`DistributionRequest`].

pub mod checksum;
pub mod entry;
pub mod mirror;
pub mod types;

// Re-exports
pub use checksum::{ChecksumAlgorithm, ChecksumRecord, DigestError, HexDigest};
pub use entry::{ArchiveEntry, EntryKind};
pub use mirror::{MirrorCandidate, MirrorListing};
pub use types::{DistributionName, DistributionRequest, Version};
