//! Checksum lookup, caching and verification.
//!
//! For each algorithm, strongest first, the digest comes from a local
//! sidecar (`<target>.<ext>`) or, failing that, from the remote checksum
//! file, which is then persisted as the sidecar. The first algorithm that
//! yields a digest decides the outcome: a match verifies, a mismatch is
//! fatal and never retried with a weaker algorithm.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use quarry_schema::{ChecksumAlgorithm, ChecksumRecord, DigestError, HexDigest};
use reqwest::{Client, StatusCode};
use sha2::{Digest, Sha512};
use sha1::Sha1;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::Reporter;

#[derive(Error, Debug)]
pub enum ChecksumError {
    #[error("No checksum available for {file} ({})", attempts.join("; "))]
    Unavailable { file: PathBuf, attempts: Vec<String> },

    #[error("{algorithm} mismatch: expected {expected}, got {actual}")]
    Mismatch {
        algorithm: ChecksumAlgorithm,
        expected: String,
        actual: String,
    },

    #[error("Malformed checksum from {source_desc}: {error}")]
    Malformed {
        source_desc: String,
        error: DigestError,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of looking up one algorithm's digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestLookup {
    /// A digest was read from the sidecar or fetched and cached.
    Found(HexDigest),
    /// The remote answered 404: this algorithm is not published.
    Absent,
    /// The remote answered something other than 200/404, or the request
    /// failed. The reason is kept for the final error message.
    Unavailable(String),
}

/// Fetches, caches and checks digests for files in one remote directory.
#[derive(Clone)]
pub struct ChecksumStore {
    client: Client,
    remote_base: String,
    reporter: Arc<dyn Reporter>,
}

impl std::fmt::Debug for ChecksumStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumStore")
            .field("remote_base", &self.remote_base)
            .finish_non_exhaustive()
    }
}

/// Sidecar path for `target`: `<target>.<ext>`.
pub fn sidecar_path(target: &Path, algorithm: ChecksumAlgorithm) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".");
    name.push(algorithm.extension());
    PathBuf::from(name)
}

impl ChecksumStore {
    /// `remote_base` is the directory that holds `<basename>.<ext>` files.
    pub fn new(client: Client, remote_base: impl Into<String>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            client,
            remote_base: remote_base.into().trim_end_matches('/').to_string(),
            reporter,
        }
    }

    /// Remote checksum URL for `target` and `algorithm`.
    pub fn remote_url(&self, target: &Path, algorithm: ChecksumAlgorithm) -> String {
        let basename = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}/{basename}.{}", self.remote_base, algorithm.extension())
    }

    /// Look up the digest of `target` for one algorithm.
    ///
    /// A non-empty sidecar is used as-is. Otherwise the remote file is
    /// fetched; on 200 its first token becomes the sidecar.
    ///
    /// # Errors
    ///
    /// Returns [`ChecksumError::Malformed`] if the sidecar or remote body is
    /// not a digest, or an IO error if the sidecar cannot be read or written.
    pub async fn find_digest(
        &self,
        target: &Path,
        algorithm: ChecksumAlgorithm,
    ) -> Result<DigestLookup, ChecksumError> {
        let sidecar = sidecar_path(target, algorithm);

        if let Some(text) = read_sidecar(&sidecar)? {
            debug!(sidecar = %sidecar.display(), "using cached checksum");
            let digest = HexDigest::parse(algorithm, &text).map_err(|error| {
                ChecksumError::Malformed {
                    source_desc: sidecar.display().to_string(),
                    error,
                }
            })?;
            return Ok(DigestLookup::Found(digest));
        }

        let url = self.remote_url(target, algorithm);
        debug!(%url, "fetching checksum");

        let resp = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(%url, error = %e, "checksum request failed");
                self.reporter
                    .warning(&format!("Could not fetch {algorithm} checksum: {e}"));
                return Ok(DigestLookup::Unavailable(format!("{algorithm}: {e}")));
            }
        };

        match resp.status() {
            StatusCode::OK => {
                let body = resp.text().await?;
                let digest = HexDigest::parse(algorithm, &body).map_err(|error| {
                    ChecksumError::Malformed {
                        source_desc: url.clone(),
                        error,
                    }
                })?;
                write_sidecar(&sidecar, &digest)?;
                Ok(DigestLookup::Found(digest))
            }
            StatusCode::NOT_FOUND => {
                debug!(%url, "checksum not published");
                Ok(DigestLookup::Absent)
            }
            status => {
                warn!(%url, %status, "unexpected checksum response");
                self.reporter.warning(&format!(
                    "Unexpected HTTP {status} fetching {algorithm} checksum; trying next algorithm"
                ));
                Ok(DigestLookup::Unavailable(format!("{algorithm}: HTTP {status}")))
            }
        }
    }

    /// Verify `target` against the strongest available digest.
    ///
    /// # Errors
    ///
    /// Returns [`ChecksumError::Mismatch`] on the first digest that does not
    /// match, and [`ChecksumError::Unavailable`] if no algorithm yielded one.
    pub async fn verify(&self, target: &Path) -> Result<ChecksumRecord, ChecksumError> {
        let mut attempts = Vec::new();

        for algorithm in ChecksumAlgorithm::preferred_order() {
            let expected = match self.find_digest(target, algorithm).await? {
                DigestLookup::Found(digest) => digest,
                DigestLookup::Absent => {
                    attempts.push(format!("{algorithm}: not published"));
                    continue;
                }
                DigestLookup::Unavailable(reason) => {
                    attempts.push(reason);
                    continue;
                }
            };

            return self.check(target, expected).await;
        }

        Err(ChecksumError::Unavailable {
            file: target.to_path_buf(),
            attempts,
        })
    }

    /// Verify `target` against a pinned digest only.
    ///
    /// The pin replaces the sidecar for its algorithm and no remote
    /// checksum is consulted, whatever other algorithms are published.
    ///
    /// # Errors
    ///
    /// Returns [`ChecksumError::Mismatch`] if the file does not match the pin.
    pub async fn verify_pinned(
        &self,
        target: &Path,
        pinned: &HexDigest,
    ) -> Result<ChecksumRecord, ChecksumError> {
        self.pin(target, pinned)?;
        self.check(target, pinned.clone()).await
    }

    async fn check(&self, target: &Path, expected: HexDigest) -> Result<ChecksumRecord, ChecksumError> {
        let algorithm = expected.algorithm();
        let path = target.to_path_buf();
        let actual = tokio::task::spawn_blocking(move || compute_digest(&path, algorithm))
            .await
            .map_err(std::io::Error::other)??;

        if !expected.matches(&actual) {
            return Err(ChecksumError::Mismatch {
                algorithm,
                expected: expected.to_string(),
                actual,
            });
        }

        info!(file = %target.display(), %algorithm, "checksum verified");
        self.reporter.verified(target, algorithm);
        Ok(ChecksumRecord {
            algorithm,
            value: expected,
            source_path: sidecar_path(target, algorithm),
        })
    }

    /// Record a known-good digest as the sidecar for `target`, replacing
    /// whatever was cached for that algorithm.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the sidecar cannot be written.
    pub fn pin(&self, target: &Path, digest: &HexDigest) -> Result<PathBuf, ChecksumError> {
        let sidecar = sidecar_path(target, digest.algorithm());
        write_sidecar(&sidecar, digest)?;
        Ok(sidecar)
    }
}

fn read_sidecar(path: &Path) -> std::io::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => Ok(Some(text)),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn write_sidecar(path: &Path, digest: &HexDigest) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    writeln!(tmp, "{digest}")?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Hex digest of the file at `path`.
///
/// # Errors
///
/// Returns an IO error if the file cannot be read.
pub fn compute_digest(path: &Path, algorithm: ChecksumAlgorithm) -> std::io::Result<String> {
    let reader = BufReader::new(File::open(path)?);
    match algorithm {
        ChecksumAlgorithm::Sha512 => hash_reader::<Sha512>(reader),
        ChecksumAlgorithm::Sha1 => hash_reader::<Sha1>(reader),
    }
}

fn hash_reader<D: Digest>(mut reader: impl Read) -> std::io::Result<String> {
    let mut hasher = D::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let count = reader.read(&mut buffer)?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryReporter, NullReporter};
    use mockito::Server;
    use tempfile::tempdir;

    fn digests(data: &[u8]) -> (String, String) {
        let sha512 = hex::encode(Sha512::digest(data));
        let sha1 = hex::encode(Sha1::digest(data));
        (sha512, sha1)
    }

    fn store(base: &str) -> ChecksumStore {
        ChecksumStore::new(Client::new(), base, Arc::new(NullReporter))
    }

    fn write_target(dir: &Path) -> (PathBuf, &'static [u8]) {
        let data: &'static [u8] = b"solr archive bytes";
        let target = dir.join("solr-8.0.0.tgz");
        std::fs::write(&target, data).unwrap();
        (target, data)
    }

    #[test]
    fn sidecar_appends_extension() {
        assert_eq!(
            sidecar_path(Path::new("/c/solr-8.0.0.tgz"), ChecksumAlgorithm::Sha512),
            PathBuf::from("/c/solr-8.0.0.tgz.sha512")
        );
    }

    #[test]
    fn compute_digest_matches_known_value() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();
        assert_eq!(
            compute_digest(&path, ChecksumAlgorithm::Sha1).unwrap(),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }

    #[tokio::test]
    async fn sha512_match_never_requests_sha1() {
        let dir = tempdir().unwrap();
        let (target, data) = write_target(dir.path());
        let (sha512, _) = digests(data);

        let mut server = Server::new_async().await;
        let m512 = server
            .mock("GET", "/solr-8.0.0.tgz.sha512")
            .with_status(200)
            .with_body(format!("{sha512}  solr-8.0.0.tgz\n"))
            .expect(1)
            .create_async()
            .await;
        let m1 = server
            .mock("GET", "/solr-8.0.0.tgz.sha1")
            .expect(0)
            .create_async()
            .await;

        let record = store(&server.url()).verify(&target).await.unwrap();
        assert_eq!(record.algorithm, ChecksumAlgorithm::Sha512);
        assert_eq!(record.value.as_str(), sha512);

        m512.assert_async().await;
        m1.assert_async().await;

        // the sidecar now holds the digest
        let cached = std::fs::read_to_string(&record.source_path).unwrap();
        assert_eq!(cached.trim(), sha512);
    }

    #[tokio::test]
    async fn sha512_mismatch_is_fatal_even_with_good_sha1() {
        let dir = tempdir().unwrap();
        let (target, data) = write_target(dir.path());
        let (_, sha1) = digests(data);
        let wrong = "0".repeat(128);

        let mut server = Server::new_async().await;
        let _m512 = server
            .mock("GET", "/solr-8.0.0.tgz.sha512")
            .with_status(200)
            .with_body(wrong.clone())
            .create_async()
            .await;
        let m1 = server
            .mock("GET", "/solr-8.0.0.tgz.sha1")
            .with_status(200)
            .with_body(sha1)
            .expect(0)
            .create_async()
            .await;

        let err = store(&server.url()).verify(&target).await.unwrap_err();
        match err {
            ChecksumError::Mismatch {
                algorithm,
                expected,
                ..
            } => {
                assert_eq!(algorithm, ChecksumAlgorithm::Sha512);
                assert_eq!(expected, wrong);
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
        m1.assert_async().await;
    }

    #[tokio::test]
    async fn missing_sha512_falls_back_to_sha1() {
        let dir = tempdir().unwrap();
        let (target, data) = write_target(dir.path());
        let (_, sha1) = digests(data);

        let mut server = Server::new_async().await;
        let _m512 = server
            .mock("GET", "/solr-8.0.0.tgz.sha512")
            .with_status(404)
            .create_async()
            .await;
        let _m1 = server
            .mock("GET", "/solr-8.0.0.tgz.sha1")
            .with_status(200)
            .with_body(format!("{sha1} *solr-8.0.0.tgz"))
            .create_async()
            .await;

        let record = store(&server.url()).verify(&target).await.unwrap();
        assert_eq!(record.algorithm, ChecksumAlgorithm::Sha1);
        assert!(!sidecar_path(&target, ChecksumAlgorithm::Sha512).exists());
    }

    #[tokio::test]
    async fn nothing_published_is_unavailable() {
        let dir = tempdir().unwrap();
        let (target, _) = write_target(dir.path());

        let mut server = Server::new_async().await;
        let _all = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let err = store(&server.url()).verify(&target).await.unwrap_err();
        match err {
            ChecksumError::Unavailable { attempts, .. } => assert_eq!(attempts.len(), 2),
            other => panic!("expected unavailable, got {other:?}"),
        }
    }

    // A 5xx is neither "absent" nor a digest. It is reported as a warning
    // and the next algorithm is tried; it is not retried.
    #[tokio::test]
    async fn server_error_on_checksum_is_reported_and_next_algorithm_tried() {
        let dir = tempdir().unwrap();
        let (target, data) = write_target(dir.path());
        let (_, sha1) = digests(data);

        let mut server = Server::new_async().await;
        let m512 = server
            .mock("GET", "/solr-8.0.0.tgz.sha512")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;
        let _m1 = server
            .mock("GET", "/solr-8.0.0.tgz.sha1")
            .with_status(200)
            .with_body(sha1)
            .create_async()
            .await;

        let reporter = Arc::new(MemoryReporter::new());
        let store = ChecksumStore::new(Client::new(), server.url(), reporter.clone());

        let record = store.verify(&target).await.unwrap();
        assert_eq!(record.algorithm, ChecksumAlgorithm::Sha1);
        m512.assert_async().await;

        let warnings = reporter.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("503"));
    }

    #[tokio::test]
    async fn sidecar_is_used_without_network() {
        let dir = tempdir().unwrap();
        let (target, data) = write_target(dir.path());
        let (sha512, _) = digests(data);
        std::fs::write(sidecar_path(&target, ChecksumAlgorithm::Sha512), &sha512).unwrap();

        // nothing listens here; any request would fail
        let record = store("http://127.0.0.1:9").verify(&target).await.unwrap();
        assert_eq!(record.algorithm, ChecksumAlgorithm::Sha512);
    }

    #[tokio::test]
    async fn empty_sidecar_is_refetched() {
        let dir = tempdir().unwrap();
        let (target, data) = write_target(dir.path());
        let (sha512, _) = digests(data);
        std::fs::write(sidecar_path(&target, ChecksumAlgorithm::Sha512), "").unwrap();

        let mut server = Server::new_async().await;
        let m512 = server
            .mock("GET", "/solr-8.0.0.tgz.sha512")
            .with_status(200)
            .with_body(sha512)
            .expect(1)
            .create_async()
            .await;

        let lookup = store(&server.url())
            .find_digest(&target, ChecksumAlgorithm::Sha512)
            .await
            .unwrap();
        assert!(matches!(lookup, DigestLookup::Found(_)));
        m512.assert_async().await;
    }

    #[tokio::test]
    async fn malformed_remote_digest_is_not_cached() {
        let dir = tempdir().unwrap();
        let (target, _) = write_target(dir.path());

        let mut server = Server::new_async().await;
        let _m512 = server
            .mock("GET", "/solr-8.0.0.tgz.sha512")
            .with_status(200)
            .with_body("<html>not a checksum</html>")
            .create_async()
            .await;

        let err = store(&server.url())
            .find_digest(&target, ChecksumAlgorithm::Sha512)
            .await
            .unwrap_err();
        assert!(matches!(err, ChecksumError::Malformed { .. }));
        assert!(!sidecar_path(&target, ChecksumAlgorithm::Sha512).exists());
    }

    #[test]
    fn pin_overwrites_sidecar() {
        let dir = tempdir().unwrap();
        let (target, data) = write_target(dir.path());
        let (sha512, _) = digests(data);
        std::fs::write(sidecar_path(&target, ChecksumAlgorithm::Sha512), "stale").unwrap();

        let digest = HexDigest::parse(ChecksumAlgorithm::Sha512, &sha512).unwrap();
        let sidecar = store("http://127.0.0.1:9").pin(&target, &digest).unwrap();
        assert_eq!(std::fs::read_to_string(sidecar).unwrap().trim(), sha512);
    }

    #[tokio::test]
    async fn pinned_digest_wins_over_published_stronger_one() {
        let dir = tempdir().unwrap();
        let (target, data) = write_target(dir.path());
        let (sha512, _) = digests(data);

        let mut server = Server::new_async().await;
        let m512 = server
            .mock("GET", "/solr-8.0.0.tgz.sha512")
            .with_status(200)
            .with_body(sha512)
            .expect(0)
            .create_async()
            .await;

        let wrong = HexDigest::parse(ChecksumAlgorithm::Sha1, &"0".repeat(40)).unwrap();
        let err = store(&server.url())
            .verify_pinned(&target, &wrong)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChecksumError::Mismatch {
                algorithm: ChecksumAlgorithm::Sha1,
                ..
            }
        ));
        m512.assert_async().await;
    }

    #[tokio::test]
    async fn matching_pin_verifies_offline() {
        let dir = tempdir().unwrap();
        let (target, data) = write_target(dir.path());
        let (_, sha1) = digests(data);

        let pinned = HexDigest::parse(ChecksumAlgorithm::Sha1, &sha1).unwrap();
        let record = store("http://127.0.0.1:9")
            .verify_pinned(&target, &pinned)
            .await
            .unwrap();
        assert_eq!(record.algorithm, ChecksumAlgorithm::Sha1);
        assert!(sidecar_path(&target, ChecksumAlgorithm::Sha1).exists());
    }
}
