//! Distribution names, versions, and request path types.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Name of a distribution (e.g. `solr`), normalized to lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistributionName(String);

impl DistributionName {
    /// Create a new distribution name, normalizing the input to lowercase.
    pub fn new(name: &str) -> Self {
        Self(name.to_lowercase())
    }

    /// Return the normalized name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DistributionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for DistributionName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for DistributionName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A released version string (e.g. `8.11.2`), stored as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    /// Create a new version from the given string (surrounding whitespace is trimmed).
    pub fn new(v: &str) -> Self {
        Self(v.trim().to_string())
    }

    /// Return the version string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for Version {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One invocation's worth of "fetch this version into these directories".
///
/// Immutable once constructed; every derived path is computed from the
/// fields, never stored separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionRequest {
    name: DistributionName,
    version: Version,
    output_dir: PathBuf,
    cache_dir: PathBuf,
}

impl DistributionRequest {
    /// Build a request for `name`-`version`.
    pub fn new(
        name: DistributionName,
        version: Version,
        output_dir: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name,
            version,
            output_dir: output_dir.into(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Distribution name.
    pub fn name(&self) -> &DistributionName {
        &self.name
    }

    /// Requested version.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Directory the archive is extracted into.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Directory holding the cached archive and its sidecars.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// `<name>-<version>`, the stem shared by the archive and install directory.
    pub fn stem(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }

    /// Archive file name: `<name>-<version>.tgz`.
    pub fn archive_name(&self) -> String {
        format!("{}.tgz", self.stem())
    }

    /// Cached archive path: `cacheDir/<name>-<version>.tgz`.
    pub fn target(&self) -> PathBuf {
        self.cache_dir.join(self.archive_name())
    }

    /// Installed tree: `outputDir/<name>-<version>`.
    pub fn install_dir(&self) -> PathBuf {
        self.output_dir.join(self.stem())
    }

    /// Path of the server binary that marks an install as complete.
    pub fn server_binary_path(&self, server_binary: &str) -> PathBuf {
        self.install_dir().join("bin").join(server_binary)
    }

    /// Whether `installDir/bin/<server_binary>` exists.
    pub fn is_installed(&self, server_binary: &str) -> bool {
        self.server_binary_path(server_binary).exists()
    }
}
