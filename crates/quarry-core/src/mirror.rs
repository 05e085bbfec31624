//! Mirror resolution.
//!
//! A release is listed on several mirrors of varying reliability. The
//! resolver ranks them (preferred, declared HTTP mirrors, a backup site,
//! then the canonical archive host) and probes them in rank order, taking
//! the first that answers.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesOrdered;
use quarry_schema::{MirrorCandidate, MirrorListing, Version};
use reqwest::{Client, Url};
use thiserror::Error;
use tracing::{debug, warn};

use crate::Reporter;
use crate::config::DistributionProfile;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error(
        "No mirror found{} ({tried} candidates tried)",
        version.as_ref().map(|v| format!(" for version {v}")).unwrap_or_default()
    )]
    NoMirrorFound {
        version: Option<String>,
        tried: usize,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed mirror listing: {0}")]
    Listing(#[from] serde_json::Error),
}

/// Ranks and probes download locations for a release.
#[derive(Clone)]
pub struct MirrorResolver {
    client: Client,
    profile: DistributionProfile,
    reporter: Arc<dyn Reporter>,
}

impl std::fmt::Debug for MirrorResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorResolver")
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

impl MirrorResolver {
    pub fn new(client: Client, profile: DistributionProfile, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            client,
            profile,
            reporter,
        }
    }

    /// Fetch the directory listing for `version`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, or a
    /// body that is not a listing.
    pub async fn fetch_listing(&self, version: &Version) -> Result<MirrorListing, MirrorError> {
        let url = self.profile.listing_url(version);
        debug!(%url, "fetching mirror listing");

        let body = self
            .client
            .get(&url)
            .timeout(self.profile.probe_timeout())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(serde_json::from_str(&body)?)
    }

    /// Rank candidates for `version`.
    ///
    /// Order: `preferred`, up to `max_http_mirrors - 1` entries of `http`,
    /// the second `backup` entry, then the canonical archive host. Mirror
    /// URIs that normalize to the same archive URI keep only their first
    /// occurrence. The archive host is always present, so the list is never
    /// empty even without a listing.
    pub fn candidates(
        &self,
        listing: Option<&MirrorListing>,
        version: &Version,
    ) -> Vec<MirrorCandidate> {
        let file_name = self.profile.archive_name(version);
        let mut bases: Vec<(String, String)> = Vec::new();

        if let Some(listing) = listing {
            let http_limit = self.profile.max_http_mirrors.saturating_sub(1);
            let mirrors = listing
                .preferred
                .iter()
                .chain(listing.http.iter().take(http_limit))
                .chain(listing.backup.get(1));

            for base in mirrors {
                match self.normalize(base) {
                    Some(base) => bases.push((base, listing.path_info.clone())),
                    None => debug!(%base, "skipping unparseable mirror"),
                }
            }
        }

        // The archive host keeps every release forever.
        bases.push((self.profile.archive_base(version), String::new()));

        let mut seen = HashSet::new();
        let mut ranked = Vec::new();
        for (base, path_info) in bases {
            let candidate = MirrorCandidate::new(&base, &path_info, &file_name, ranked.len());
            if seen.insert(candidate.uri.clone()) {
                ranked.push(candidate);
            }
        }
        ranked
    }

    /// Ranked candidates for `version`, falling back to the archive host
    /// alone when the listing cannot be fetched.
    pub async fn resolve(&self, version: &Version) -> Vec<MirrorCandidate> {
        let listing = match self.fetch_listing(version).await {
            Ok(listing) => Some(listing),
            Err(e) => {
                warn!(error = %e, "mirror listing unavailable");
                self.reporter.warning(&format!(
                    "Mirror listing unavailable ({e}); using the archive host only"
                ));
                None
            }
        };
        self.candidates(listing.as_ref(), version)
    }

    /// Return the first candidate, in rank order, whose existence probe succeeds.
    ///
    /// Probes are issued concurrently but consumed in rank order: a success
    /// at rank `k` is returned as soon as every rank before it has failed,
    /// and the remaining probes are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::NoMirrorFound`] when every probe fails.
    pub async fn probe_for(
        &self,
        version: &Version,
        candidates: &[MirrorCandidate],
    ) -> Result<MirrorCandidate, MirrorError> {
        self.first_reachable(Some(version), candidates).await
    }

    /// [`Self::probe_for`] when the candidates are not tied to a known release.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::NoMirrorFound`] without a version when every
    /// probe fails.
    pub async fn probe(
        &self,
        candidates: &[MirrorCandidate],
    ) -> Result<MirrorCandidate, MirrorError> {
        self.first_reachable(None, candidates).await
    }

    async fn first_reachable(
        &self,
        version: Option<&Version>,
        candidates: &[MirrorCandidate],
    ) -> Result<MirrorCandidate, MirrorError> {
        let mut probes: FuturesOrdered<_> =
            candidates.iter().map(|c| self.probe_one(c)).collect();

        while let Some((candidate, ok)) = probes.next().await {
            if ok {
                self.reporter.resolved(&candidate.uri);
                return Ok(candidate.clone());
            }
        }

        Err(MirrorError::NoMirrorFound {
            version: version.map(ToString::to_string),
            tried: candidates.len(),
        })
    }

    /// Resolve and probe in one step.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::NoMirrorFound`] when no candidate responds.
    pub async fn locate(&self, version: &Version) -> Result<MirrorCandidate, MirrorError> {
        let candidates = self.resolve(version).await;
        self.probe_for(version, &candidates).await
    }

    async fn probe_one<'a>(&self, candidate: &'a MirrorCandidate) -> (&'a MirrorCandidate, bool) {
        self.reporter.probing(&candidate.uri, candidate.rank);

        let result = self
            .client
            .head(&candidate.uri)
            .timeout(self.profile.probe_timeout())
            .send()
            .await;

        let ok = match result {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                debug!(uri = %candidate.uri, status = %resp.status(), "probe rejected");
                false
            }
            Err(e) => {
                debug!(uri = %candidate.uri, error = %e, "probe failed");
                false
            }
        };
        (candidate, ok)
    }

    fn normalize(&self, base: &str) -> Option<String> {
        let mut url = Url::parse(base.trim()).ok()?;
        if self.profile.force_https && url.scheme() == "http" {
            url.set_scheme("https").ok()?;
        }
        Some(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use mockito::Server;
    use std::time::Duration;

    fn profile(archive_url: &str) -> DistributionProfile {
        DistributionProfile {
            archive_url: archive_url.to_string(),
            force_https: false,
            ..DistributionProfile::default()
        }
    }

    fn resolver(profile: DistributionProfile) -> MirrorResolver {
        let client = crate::http::build_client(Duration::from_secs(1)).unwrap();
        MirrorResolver::new(client, profile, Arc::new(NullReporter))
    }

    fn candidate(base: &str, rank: usize) -> MirrorCandidate {
        MirrorCandidate::new(base, "solr/8.0.0", "solr-8.0.0.tgz", rank)
    }

    #[test]
    fn ranking_order_and_https_rewrite() {
        let resolver = resolver(DistributionProfile::default());
        let listing = MirrorListing {
            preferred: Some("http://pref.example/apache/".to_string()),
            http: vec![
                "http://one.example/".to_string(),
                "http://two.example/".to_string(),
                "http://three.example/".to_string(),
            ],
            backup: vec![
                "https://backup0.example/".to_string(),
                "https://backup1.example/".to_string(),
            ],
            path_info: "lucene/solr/8.11.2".to_string(),
        };

        let uris: Vec<String> = resolver
            .candidates(Some(&listing), &Version::new("8.11.2"))
            .into_iter()
            .map(|c| c.uri)
            .collect();

        assert_eq!(
            uris,
            vec![
                "https://pref.example/apache/lucene/solr/8.11.2/solr-8.11.2.tgz",
                "https://one.example/lucene/solr/8.11.2/solr-8.11.2.tgz",
                "https://two.example/lucene/solr/8.11.2/solr-8.11.2.tgz",
                "https://backup1.example/lucene/solr/8.11.2/solr-8.11.2.tgz",
                "https://archive.apache.org/dist/lucene/solr/8.11.2/solr-8.11.2.tgz",
            ]
        );
    }

    #[test]
    fn duplicates_keep_first_rank() {
        let resolver = resolver(DistributionProfile::default());
        let listing = MirrorListing {
            preferred: Some("http://dup.example/".to_string()),
            http: vec!["https://dup.example/".to_string()],
            backup: vec![],
            path_info: "p".to_string(),
        };

        let ranked = resolver.candidates(Some(&listing), &Version::new("1.0"));
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].rank, 0);
        assert_eq!(ranked[1].rank, 1);
        assert!(ranked[1].uri.starts_with("https://archive.apache.org/"));
    }

    #[test]
    fn no_listing_still_yields_archive_host() {
        let resolver = resolver(DistributionProfile::default());
        let ranked = resolver.candidates(None, &Version::new("9.0.0"));
        assert_eq!(ranked.len(), 1);
        assert_eq!(
            ranked[0].uri,
            "https://archive.apache.org/dist/lucene/solr/9.0.0/solr-9.0.0.tgz"
        );
    }

    #[tokio::test]
    async fn first_success_in_rank_order_wins() {
        let mut server = Server::new_async().await;
        let base = server.url();

        let _a = server
            .mock("HEAD", "/a/solr/8.0.0/solr-8.0.0.tgz")
            .with_status(404)
            .create_async()
            .await;
        let _b = server
            .mock("HEAD", "/b/solr/8.0.0/solr-8.0.0.tgz")
            .with_status(200)
            .create_async()
            .await;
        let _c = server
            .mock("HEAD", "/c/solr/8.0.0/solr-8.0.0.tgz")
            .with_status(200)
            .create_async()
            .await;

        let candidates = vec![
            candidate(&format!("{base}/a"), 0),
            candidate(&format!("{base}/b"), 1),
            candidate(&format!("{base}/c"), 2),
        ];

        let resolver = resolver(profile(&base));
        let found = resolver.probe(&candidates).await.unwrap();
        assert_eq!(found.rank, 1);
        assert!(found.uri.contains("/b/"));
    }

    #[tokio::test]
    async fn network_errors_are_skipped() {
        let mut server = Server::new_async().await;
        let base = server.url();
        let _ok = server
            .mock("HEAD", "/ok/solr/8.0.0/solr-8.0.0.tgz")
            .with_status(200)
            .create_async()
            .await;

        let candidates = vec![
            // nothing listens on port 9
            candidate("http://127.0.0.1:9/dead", 0),
            candidate(&format!("{base}/ok"), 1),
        ];

        let found = resolver(profile(&base)).probe(&candidates).await.unwrap();
        assert_eq!(found.rank, 1);
    }

    #[tokio::test]
    async fn all_failures_is_no_mirror_found() {
        let mut server = Server::new_async().await;
        let base = server.url();
        let _gone = server
            .mock("HEAD", mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let candidates = vec![
            candidate(&format!("{base}/a"), 0),
            candidate("http://127.0.0.1:9/dead", 1),
        ];

        let err = resolver(profile(&base))
            .probe_for(&Version::new("8.0.0"), &candidates)
            .await
            .unwrap_err();
        assert!(matches!(err, MirrorError::NoMirrorFound { tried: 2, .. }));
        assert_eq!(
            err.to_string(),
            "No mirror found for version 8.0.0 (2 candidates tried)"
        );
    }

    #[tokio::test]
    async fn unversioned_failure_names_no_version() {
        let candidates = vec![candidate("http://127.0.0.1:9/dead", 0)];

        let err = resolver(profile("http://127.0.0.1:9"))
            .probe(&candidates)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MirrorError::NoMirrorFound { version: None, tried: 1 }
        ));
        assert_eq!(err.to_string(), "No mirror found (1 candidates tried)");
    }

    #[tokio::test]
    async fn locate_uses_listing() {
        let mut server = Server::new_async().await;
        let base = server.url();

        let listing = format!(
            r#"{{"preferred": "{base}/pref/", "http": [], "backup": [], "path_info": "solr/8.0.0"}}"#
        );
        let _listing = server
            .mock("GET", "/listing/8.0.0.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(listing)
            .create_async()
            .await;
        let _head = server
            .mock("HEAD", "/pref/solr/8.0.0/solr-8.0.0.tgz")
            .with_status(200)
            .create_async()
            .await;

        let mut profile = profile(&format!("{base}/dist/{{version}}"));
        profile.mirror_listing_url = format!("{base}/listing/{{version}}.json");

        let found = resolver(profile)
            .locate(&Version::new("8.0.0"))
            .await
            .unwrap();
        assert_eq!(found.rank, 0);
        assert_eq!(found.uri, format!("{base}/pref/solr/8.0.0/solr-8.0.0.tgz"));
    }

    #[tokio::test]
    async fn broken_listing_falls_back_to_archive_host() {
        let mut server = Server::new_async().await;
        let base = server.url();
        let _listing = server
            .mock("GET", "/listing/8.0.0.json")
            .with_status(500)
            .create_async()
            .await;

        let mut profile = profile(&format!("{base}/dist/{{version}}"));
        profile.mirror_listing_url = format!("{base}/listing/{{version}}.json");

        let reporter = Arc::new(crate::MemoryReporter::new());
        let client = crate::http::build_client(Duration::from_secs(1)).unwrap();
        let resolver = MirrorResolver::new(client, profile, reporter.clone());

        let ranked = resolver.resolve(&Version::new("8.0.0")).await;
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].uri, format!("{base}/dist/8.0.0/solr-8.0.0.tgz"));
        assert_eq!(reporter.warnings().len(), 1);
    }
}
