//! End-to-end pipeline runs against a local mock mirror.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use mockito::{Server, ServerGuard};
use quarry_core::{Config, DistributionProfile, Fetcher, MemoryReporter, ReporterEvent};
use quarry_schema::ChecksumAlgorithm;
use sha1::Sha1;
use sha2::Digest;

const LIB: &str = "server/solr-webapp/webapp/WEB-INF/lib";

fn distribution() -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    let lib_dir = format!("solr-8.0.0/{LIB}/");
    for dir in ["solr-8.0.0/bin/", lib_dir.as_str()] {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        builder.append_data(&mut header, dir, io::empty()).unwrap();
    }

    let script = b"#!/bin/sh\necho solr\n";
    let mut header = tar::Header::new_gnu();
    header.set_size(script.len() as u64);
    header.set_mode(0o755);
    builder
        .append_data(&mut header, "solr-8.0.0/bin/solr", &script[..])
        .unwrap();

    builder.into_inner().unwrap().finish().unwrap()
}

fn config(base: &str, root: &Path) -> Config {
    Config {
        profile: DistributionProfile {
            mirror_listing_url: format!("{base}/listing/{{version}}.json"),
            archive_url: format!("{base}/dist/solr/{{version}}"),
            force_https: false,
            ..DistributionProfile::default()
        },
        cache_dir: root.join("cache"),
        output_dir: root.join("dist"),
        download_url: None,
        checksum: None,
    }
}

/// Listing with a dead preferred mirror and a working declared one.
/// SHA-512 is unpublished and SHA-1 is served, so verification falls through.
async fn mirror(server: &mut ServerGuard, archive: &[u8]) -> Vec<mockito::Mock> {
    let base = server.url();
    let listing = format!(
        r#"{{"preferred": "{base}/down/", "http": ["{base}/up/"], "backup": [], "path_info": "solr/8.0.0"}}"#
    );

    vec![
        server
            .mock("GET", "/listing/8.0.0.json")
            .with_header("content-type", "application/json")
            .with_body(listing)
            .create_async()
            .await,
        server
            .mock("HEAD", "/down/solr/8.0.0/solr-8.0.0.tgz")
            .with_status(503)
            .create_async()
            .await,
        server
            .mock("HEAD", "/up/solr/8.0.0/solr-8.0.0.tgz")
            .with_status(200)
            .create_async()
            .await,
        server
            .mock("GET", "/up/solr/8.0.0/solr-8.0.0.tgz")
            .with_body(archive)
            .expect(1)
            .create_async()
            .await,
        server
            .mock("GET", "/dist/solr/8.0.0/solr-8.0.0.tgz.sha512")
            .with_status(404)
            .create_async()
            .await,
        server
            .mock("GET", "/dist/solr/8.0.0/solr-8.0.0.tgz.sha1")
            .with_body(format!("{}  solr-8.0.0.tgz\n", hex::encode(Sha1::digest(archive))))
            .create_async()
            .await,
    ]
}

fn fetcher(config: Config, reporter: Arc<MemoryReporter>) -> Fetcher {
    let client = quarry_core::http::build_client(Duration::from_secs(1)).unwrap();
    Fetcher::new(config, client, reporter)
}

#[tokio::test]
async fn install_resolves_downloads_verifies_and_extracts() {
    let mut server = Server::new_async().await;
    let archive = distribution();
    let mocks = mirror(&mut server, &archive).await;
    let root = tempfile::tempdir().unwrap();

    let reporter = Arc::new(MemoryReporter::new());
    let fetcher = fetcher(config(&server.url(), root.path()), reporter.clone());
    let req = fetcher.request("8.0.0");

    let installed = fetcher.install(&req).await.unwrap();
    assert_eq!(installed, root.path().join("dist/solr-8.0.0"));
    assert!(req.is_installed("solr"));
    assert_eq!(
        fs::read(installed.join("bin/solr")).unwrap(),
        b"#!/bin/sh\necho solr\n"
    );

    // the SHA-1 sidecar was cached, the unpublished SHA-512 was not
    assert!(root.path().join("cache/solr-8.0.0.tgz.sha1").exists());
    assert!(!root.path().join("cache/solr-8.0.0.tgz.sha512").exists());

    let events = reporter.events();
    assert!(events.contains(&ReporterEvent::Resolved(format!(
        "{}/up/solr/8.0.0/solr-8.0.0.tgz",
        server.url()
    ))));
    assert!(events.contains(&ReporterEvent::Verified(ChecksumAlgorithm::Sha1)));
    assert!(events.contains(&ReporterEvent::Extracting));

    // second run downloads nothing
    let again = fetcher.download(&req).await.unwrap();
    assert_eq!(again, req.target());
    mocks[3].assert_async().await;
}

#[tokio::test]
async fn repack_adds_library_to_downloaded_archive() {
    let mut server = Server::new_async().await;
    let archive = distribution();
    let _mocks = mirror(&mut server, &archive).await;
    let root = tempfile::tempdir().unwrap();

    let jar = root.path().join("analysis-extras.jar");
    fs::write(&jar, b"PK\x03\x04").unwrap();
    let dest = root.path().join("solr-custom.tgz");

    let reporter = Arc::new(MemoryReporter::new());
    let fetcher = fetcher(config(&server.url(), root.path()), reporter);
    let req = fetcher.request("8.0.0");
    fetcher.repack(&req, &dest, &[jar]).await.unwrap();

    let names: Vec<String> = tar::Archive::new(GzDecoder::new(File::open(&dest).unwrap()))
        .entries()
        .unwrap()
        .map(|e| {
            let entry = e.unwrap();
            let name = entry.path().unwrap().to_string_lossy().into_owned();
            name.trim_end_matches('/').to_string()
        })
        .collect();

    assert_eq!(
        names,
        vec![
            "solr-8.0.0/bin".to_string(),
            format!("solr-8.0.0/{LIB}"),
            "solr-8.0.0/bin/solr".to_string(),
            format!("solr-8.0.0/{LIB}/analysis-extras.jar"),
        ]
    );
}

#[tokio::test]
async fn unreachable_mirrors_fail_with_no_mirror_found() {
    let mut server = Server::new_async().await;
    let _listing = server
        .mock("GET", "/listing/8.0.0.json")
        .with_status(500)
        .create_async()
        .await;
    let _head = server
        .mock("HEAD", mockito::Matcher::Any)
        .with_status(404)
        .create_async()
        .await;
    let root = tempfile::tempdir().unwrap();

    let reporter = Arc::new(MemoryReporter::new());
    let fetcher = fetcher(config(&server.url(), root.path()), reporter.clone());
    let req = fetcher.request("8.0.0");

    let err = fetcher.install(&req).await.unwrap_err();
    assert!(matches!(
        err,
        quarry_core::FetchError::Mirror(quarry_core::MirrorError::NoMirrorFound { tried: 1, .. })
    ));
    assert_eq!(reporter.warnings().len(), 1);
    assert!(!req.install_dir().exists());
}
