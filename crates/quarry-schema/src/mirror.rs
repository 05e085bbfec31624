//! Mirror listing types used to resolve download sources.

use serde::{Deserialize, Serialize};

/// Directory-listing response naming the mirrors that carry a release.
///
/// Only the fields the resolver consumes are modelled; everything else in
/// the JSON body is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorListing {
    /// Mirror the listing service considers closest.
    #[serde(default)]
    pub preferred: Option<String>,

    /// Declared HTTP mirrors, in the service's order.
    #[serde(default)]
    pub http: Vec<String>,

    /// Backup sites; only the second entry is used.
    #[serde(default)]
    pub backup: Vec<String>,

    /// Release path relative to a mirror root (e.g. `lucene/solr/8.11.2`).
    #[serde(default)]
    pub path_info: String,
}

/// A ranked download location for one archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorCandidate {
    /// Mirror root, already normalized to the probing scheme.
    pub base_uri: String,
    /// Release path joined under `base_uri`.
    pub path_info: String,
    /// Position in probe order, 0 is tried first.
    pub rank: usize,
    /// Full archive URI: `base_uri/path_info/<archive-name>`.
    pub uri: String,
}

impl MirrorCandidate {
    /// Join `base_uri`, `path_info` and `file_name` with single slashes.
    pub fn new(base_uri: &str, path_info: &str, file_name: &str, rank: usize) -> Self {
        let base = base_uri.trim_end_matches('/');
        let path = path_info.trim_matches('/');
        let uri = if path.is_empty() {
            format!("{base}/{file_name}")
        } else {
            format!("{base}/{path}/{file_name}")
        };

        Self {
            base_uri: base.to_string(),
            path_info: path.to_string(),
            rank,
            uri,
        }
    }
}

impl std::fmt::Display for MirrorCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {}", self.rank, self.uri)
    }
}
