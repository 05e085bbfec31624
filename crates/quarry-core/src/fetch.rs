//! Distribution fetcher
//!
//! Drives the whole pipeline for one [`DistributionRequest`]: lock the cache
//! entry, find a mirror, download into the cache, verify, and then either
//! extract or repack the archive.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use quarry_schema::{DistributionRequest, MirrorCandidate, Version};
use reqwest::Client;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::checksum::{ChecksumError, ChecksumStore};
use crate::config::Config;
use crate::io::ArchiveError;
use crate::io::extract::{self, ExtractOutcome};
use crate::io::repack;
use crate::lock::CacheLock;
use crate::mirror::{MirrorError, MirrorResolver};
use crate::Reporter;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Mirror(#[from] MirrorError),

    #[error(transparent)]
    Checksum(#[from] ChecksumError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Download from {url} was empty")]
    EmptyDownload { url: String },
}

/// Runs the distribution pipeline against one configuration.
pub struct Fetcher {
    config: Config,
    client: Client,
    resolver: MirrorResolver,
    reporter: Arc<dyn Reporter>,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Fetcher {
    pub fn new(config: Config, client: Client, reporter: Arc<dyn Reporter>) -> Self {
        let resolver = MirrorResolver::new(client.clone(), config.profile.clone(), reporter.clone());
        Self {
            config,
            client,
            resolver,
            reporter,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn resolver(&self) -> &MirrorResolver {
        &self.resolver
    }

    /// Request for `version` under the configured directories.
    pub fn request(&self, version: &str) -> DistributionRequest {
        self.config.request(version)
    }

    /// Checksum store whose remote base is the archive host for `version`.
    pub fn checksums(&self, version: &Version) -> ChecksumStore {
        ChecksumStore::new(
            self.client.clone(),
            self.config.profile.archive_base(version),
            self.reporter.clone(),
        )
    }

    /// Make sure a verified archive for `req` is in the cache.
    ///
    /// A cached archive is re-verified before use and deleted if it no
    /// longer matches. Otherwise a mirror is located (or the configured
    /// download URL probed), the archive streamed into the cache and
    /// verified.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::NoMirrorFound`], any checksum failure, or an
    /// IO/HTTP error from the download.
    pub async fn download(&self, req: &DistributionRequest) -> Result<PathBuf, FetchError> {
        let target = req.target();
        let _lock = self.lock(&target).await?;
        let store = self.checksums(req.version());

        if is_nonempty(&target).await {
            self.reporter.section("Verifying");
            info!(archive = %target.display(), "using cached archive");
            self.verify_or_discard(&store, &target).await?;
            return Ok(target);
        }

        self.reporter.section("Resolving");
        let candidate = match &self.config.download_url {
            Some(url) => {
                let explicit = MirrorCandidate {
                    base_uri: url.clone(),
                    path_info: String::new(),
                    rank: 0,
                    uri: url.clone(),
                };
                self.resolver.probe_for(req.version(), &[explicit]).await?
            }
            None => self.resolver.locate(req.version()).await?,
        };

        self.reporter.section("Downloading");
        self.download_to(&candidate.uri, &target).await?;

        self.reporter.section("Verifying");
        self.verify_or_discard(&store, &target).await?;
        Ok(target)
    }

    /// Download and extract into the output directory.
    ///
    /// Returns the install directory. Nothing is fetched when the server
    /// binary is already present there.
    ///
    /// # Errors
    ///
    /// Returns any [`Self::download`] error or an extraction failure.
    pub async fn install(&self, req: &DistributionRequest) -> Result<PathBuf, FetchError> {
        let install_dir = req.install_dir();
        if req.is_installed(&self.config.profile.server_binary) {
            info!(dir = %install_dir.display(), "already installed");
            self.reporter
                .info(&format!("{} {} is already installed", req.name(), req.version()));
            return Ok(install_dir);
        }

        let archive = self.download(req).await?;

        self.reporter.section("Extracting");
        let dest = req.output_dir().to_path_buf();
        let reporter = self.reporter.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            extract::extract(&archive, &dest, reporter.as_ref())
        })
        .await
        .map_err(std::io::Error::other)??;

        match outcome {
            ExtractOutcome::Native(count) => debug!(entries = count, "extracted natively"),
            ExtractOutcome::Fallback => debug!("extracted with system tar"),
        }

        if !req.is_installed(&self.config.profile.server_binary) {
            warn!(dir = %install_dir.display(), "server binary missing after extraction");
            self.reporter.warning(&format!(
                "{} does not contain bin/{}",
                install_dir.display(),
                self.config.profile.server_binary
            ));
        }
        Ok(install_dir)
    }

    /// Download, then repack the cached archive into `dest` with
    /// `extra_files` added to the library directory.
    ///
    /// # Errors
    ///
    /// Returns any [`Self::download`] error or a repacking failure.
    pub async fn repack(
        &self,
        req: &DistributionRequest,
        dest: &Path,
        extra_files: &[PathBuf],
    ) -> Result<PathBuf, FetchError> {
        let archive = self.download(req).await?;

        self.reporter.section("Repacking");
        let dest = dest.to_path_buf();
        let extras = extra_files.to_vec();
        let library_root = self.config.profile.library_root.clone();
        let reporter = self.reporter.clone();
        let written = tokio::task::spawn_blocking(move || {
            repack::add_libraries(&archive, &dest, &extras, &library_root, reporter.as_ref())
        })
        .await
        .map_err(std::io::Error::other)??;

        Ok(written)
    }

    /// Hold the cache lock for `target`, waiting if another process has it.
    async fn lock(&self, target: &Path) -> Result<CacheLock, FetchError> {
        let path = target.to_path_buf();
        let uncontended = CacheLock::try_acquire(target).map_err(|source| FetchError::Lock {
            path: path.clone(),
            source,
        })?;
        if let Some(lock) = uncontended {
            debug!(lock = %lock.path().display(), "cache lock acquired");
            return Ok(lock);
        }

        self.reporter.info(&format!(
            "Waiting for another download of {} to finish",
            target.display()
        ));
        let lock = tokio::task::spawn_blocking(move || {
            CacheLock::acquire(&path).map_err(|source| FetchError::Lock { path, source })
        })
        .await
        .map_err(std::io::Error::other)??;
        debug!(lock = %lock.path().display(), "cache lock acquired after waiting");
        Ok(lock)
    }

    async fn verify_or_discard(&self, store: &ChecksumStore, target: &Path) -> Result<(), FetchError> {
        let verified = match &self.config.checksum {
            Some(pinned) => store.verify_pinned(target, pinned).await,
            None => store.verify(target).await,
        };
        match verified {
            Ok(record) => {
                debug!(algorithm = %record.algorithm, "archive verified");
                Ok(())
            }
            Err(e @ ChecksumError::Mismatch { .. }) => {
                warn!(archive = %target.display(), "checksum mismatch, removing archive");
                self.reporter.error(&format!("Removing corrupt archive {}", target.display()));
                tokio::fs::remove_file(target).await.ok();
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stream `url` into `target` through a temporary file in the same directory.
    async fn download_to(&self, url: &str, target: &Path) -> Result<(), FetchError> {
        let dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(dir).await?;

        info!(%url, "downloading");
        let response = self.client.get(url).send().await?.error_for_status()?;
        let total = response.content_length();

        let staged = tempfile::NamedTempFile::new_in(dir)?;
        let mut file = tokio::fs::File::from_std(staged.reopen()?);
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        self.reporter.downloading(url, 0, total);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            self.reporter.downloading(url, downloaded, total);
        }
        file.flush().await?;
        drop(file);

        if downloaded == 0 {
            return Err(FetchError::EmptyDownload {
                url: url.to_string(),
            });
        }

        staged.persist(target).map_err(|e| e.error)?;
        debug!(bytes = downloaded, archive = %target.display(), "download complete");
        Ok(())
    }
}

async fn is_nonempty(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}
