//! Pipeline configuration.
//!
//! Layers, later wins: built-in defaults, an optional `quarry.toml`, then
//! `QUARRY_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use quarry_schema::{DigestError, DistributionName, DistributionRequest, HexDigest, Version};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid pinned checksum: {0}")]
    Checksum(#[from] DigestError),
}

/// Every distribution-specific constant the pipeline needs.
///
/// Defaults describe Apache Solr. `{version}` in the URL templates is
/// replaced per request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DistributionProfile {
    /// Archive stem; files are `<name>-<version>.tgz`.
    pub name: String,
    /// Binary under `bin/` whose presence marks an install as complete.
    pub server_binary: String,
    /// Path suffix of the directory that receives extra libraries on repack.
    pub library_root: String,
    /// JSON directory-listing endpoint.
    pub mirror_listing_url: String,
    /// Canonical archive host for a release; also the checksum remote base.
    pub archive_url: String,
    /// Preferred mirror plus up to `max_http_mirrors - 1` declared mirrors.
    pub max_http_mirrors: usize,
    /// Connect/read timeout for each mirror probe.
    pub probe_timeout_secs: u64,
    /// Rewrite `http://` mirrors to `https://` before probing.
    pub force_https: bool,
}

impl Default for DistributionProfile {
    fn default() -> Self {
        Self {
            name: "solr".to_string(),
            server_binary: "solr".to_string(),
            library_root: "server/solr-webapp/webapp/WEB-INF/lib".to_string(),
            mirror_listing_url:
                "https://www.apache.org/dyn/closer.lua/lucene/solr/{version}?asjson=true"
                    .to_string(),
            archive_url: "https://archive.apache.org/dist/lucene/solr/{version}".to_string(),
            max_http_mirrors: 3,
            probe_timeout_secs: 2,
            force_https: true,
        }
    }
}

impl DistributionProfile {
    /// Listing URL for `version`.
    pub fn listing_url(&self, version: &Version) -> String {
        substitute(&self.mirror_listing_url, version)
    }

    /// Canonical archive base for `version` (no trailing slash).
    pub fn archive_base(&self, version: &Version) -> String {
        substitute(&self.archive_url, version)
            .trim_end_matches('/')
            .to_string()
    }

    /// `<name>-<version>.tgz`
    pub fn archive_name(&self, version: &Version) -> String {
        format!("{}-{version}.tgz", self.name)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }
}

fn substitute(template: &str, version: &Version) -> String {
    template.replace("{version}", version.as_str())
}

/// Resolved configuration for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub profile: DistributionProfile,
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Skip mirror resolution and download from this URL.
    pub download_url: Option<String>,
    /// Digest that overrides the published checksum for its algorithm.
    pub checksum: Option<HexDigest>,
}

/// On-disk shape of `quarry.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    distribution: Option<DistributionProfile>,
    cache_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    download_url: Option<String>,
    checksum: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile: DistributionProfile::default(),
            cache_dir: crate::cache_path(),
            output_dir: crate::output_path(),
            download_url: None,
            checksum: None,
        }
    }
}

impl Config {
    /// Load defaults, then [`crate::config_path`] if it exists, then the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed, or a pinned checksum is malformed.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let path = crate::config_path();
        if path.exists() {
            config.merge_file(&path)?;
        }
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay the settings in a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn merge_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.merge_toml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Overlay settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML or unknown value types.
    pub fn merge_toml(&mut self, content: &str) -> Result<(), ConfigError> {
        let file: ConfigFile = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;

        if let Some(profile) = file.distribution {
            self.profile = profile;
        }
        if let Some(dir) = file.cache_dir {
            self.cache_dir = dir;
        }
        if let Some(dir) = file.output_dir {
            self.output_dir = dir;
        }
        if file.download_url.is_some() {
            self.download_url = file.download_url;
        }
        if let Some(pinned) = file.checksum {
            self.checksum = Some(HexDigest::parse_pinned(&pinned)?);
        }
        Ok(())
    }

    /// Overlay `QUARRY_*` variables read through `lookup`.
    ///
    /// `QUARRY_HOME` relocates both default directories; the explicit
    /// directory variables win over it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Checksum`] if `QUARRY_CHECKSUM` is malformed.
    pub fn apply_env_with(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(home) = lookup("QUARRY_HOME") {
            let home = PathBuf::from(home);
            self.cache_dir = home.join("cache");
            self.output_dir = home.join("dist");
        }
        if let Some(dir) = lookup("QUARRY_CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("QUARRY_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("QUARRY_MIRROR_LISTING_URL") {
            self.profile.mirror_listing_url = url;
        }
        if let Some(url) = lookup("QUARRY_ARCHIVE_URL") {
            self.profile.archive_url = url;
        }
        if let Some(url) = lookup("QUARRY_DOWNLOAD_URL") {
            self.download_url = Some(url);
        }
        if let Some(pinned) = lookup("QUARRY_CHECKSUM") {
            self.checksum = Some(HexDigest::parse_pinned(&pinned)?);
        }
        Ok(())
    }

    /// Build the request for `version` against this configuration.
    pub fn request(&self, version: &str) -> DistributionRequest {
        DistributionRequest::new(
            DistributionName::new(&self.profile.name),
            Version::new(version),
            &self.output_dir,
            &self.cache_dir,
        )
    }
}
