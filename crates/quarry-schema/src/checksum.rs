//! Checksum algorithms and validated digests.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Digest mechanism used to verify a cached archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// SHA-512.
    Sha512,
    /// SHA-1.
    Sha1,
}

impl ChecksumAlgorithm {
    /// Emit variants in their preferred usage order, strongest first.
    pub fn preferred_order() -> impl Iterator<Item = ChecksumAlgorithm> {
        [Self::Sha512, Self::Sha1].into_iter()
    }

    /// File extension of the published checksum and of the local sidecar.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Sha512 => "sha512",
            Self::Sha1 => "sha1",
        }
    }

    /// Length of a hex-encoded digest for this algorithm.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Sha512 => 128,
            Self::Sha1 => 40,
        }
    }
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sha512 => write!(f, "SHA-512"),
            Self::Sha1 => write!(f, "SHA-1"),
        }
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha512" => Ok(Self::Sha512),
            "sha1" => Ok(Self::Sha1),
            _ => Err(DigestError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Errors produced while parsing digest text.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DigestError {
    /// The algorithm label is not one we verify with.
    #[error("Unsupported checksum algorithm: {0}")]
    UnknownAlgorithm(String),

    /// The text held no token at all.
    #[error("Empty {0} checksum")]
    Empty(ChecksumAlgorithm),

    /// Wrong length or non-hex characters.
    #[error("Invalid {algorithm} digest: expected {expected} hex characters, got '{value}'")]
    Invalid {
        /// Algorithm the digest was parsed for.
        algorithm: ChecksumAlgorithm,
        /// Expected hex length.
        expected: usize,
        /// Offending token.
        value: String,
    },

    /// A pinned checksum without the `<algorithm>:` prefix.
    #[error("Pinned checksum must look like '<algorithm>:<hex>', got '{0}'")]
    MissingAlgorithm(String),
}

/// A validated, lowercase hex digest tagged with its algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct HexDigest {
    algorithm: ChecksumAlgorithm,
    value: String,
}

impl HexDigest {
    /// Parse the first whitespace-delimited token of `text` as a digest.
    ///
    /// Published checksum files look like `<hex>  <filename>`; only the
    /// leading token is the digest.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::Empty`] for blank input and
    /// [`DigestError::Invalid`] if the token is not a digest of the right length.
    pub fn parse(algorithm: ChecksumAlgorithm, text: &str) -> Result<Self, DigestError> {
        let token = text
            .split_whitespace()
            .next()
            .ok_or(DigestError::Empty(algorithm))?;

        if token.len() != algorithm.hex_len() || !token.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DigestError::Invalid {
                algorithm,
                expected: algorithm.hex_len(),
                value: token.to_string(),
            });
        }

        Ok(Self {
            algorithm,
            value: token.to_ascii_lowercase(),
        })
    }

    /// Parse a pinned checksum of the form `sha512:<hex>` or `sha1:<hex>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is missing or unknown, or the hex is invalid.
    pub fn parse_pinned(text: &str) -> Result<Self, DigestError> {
        let (algo, hex) = text
            .trim()
            .split_once(':')
            .ok_or_else(|| DigestError::MissingAlgorithm(text.to_string()))?;
        Self::parse(algo.parse()?, hex)
    }

    /// Algorithm this digest belongs to.
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Lowercase hex string.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Compare against a freshly computed hex digest, ignoring case.
    pub fn matches(&self, computed: &str) -> bool {
        self.value.eq_ignore_ascii_case(computed)
    }
}

impl std::fmt::Display for HexDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Outcome of a successful verification: which algorithm matched and which
/// sidecar file holds the digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumRecord {
    /// Algorithm that produced the match.
    pub algorithm: ChecksumAlgorithm,
    /// The verified digest.
    pub value: HexDigest,
    /// Sidecar file the digest was read from or written to.
    pub source_path: PathBuf,
}
