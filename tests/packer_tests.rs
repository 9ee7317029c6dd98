//! Tests for singlefile-pack packer module

use singlefile_pack::{
    BundleError, BundleResult, Deployer, Fetch, OnEmptyBundle, PackConfig, PackSource, Packer,
    ProjectType, QuotePolicy,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Write};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Records submitted documents and answers with a fixed result
struct MockDeployer {
    result: Result<Vec<String>, String>,
    submitted: RefCell<Vec<String>>,
}

impl MockDeployer {
    fn ok(links: &[&str]) -> Self {
        Self {
            result: Ok(links.iter().map(|l| l.to_string()).collect()),
            submitted: RefCell::new(Vec::new()),
        }
    }

    fn failing(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
            submitted: RefCell::new(Vec::new()),
        }
    }
}

impl Deployer for MockDeployer {
    fn deploy(&self, html: &str) -> Result<Vec<String>, String> {
        self.submitted.borrow_mut().push(html.to_string());
        self.result.clone()
    }
}

#[derive(Default)]
struct MockFetch {
    responses: HashMap<String, Vec<u8>>,
}

impl Fetch for MockFetch {
    fn fetch(&self, url: &str, _timeout: Duration) -> BundleResult<Vec<u8>> {
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| BundleError::Fetch(format!("{}: 404", url)))
    }
}

fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn react_project() -> Vec<u8> {
    zip_archive(&[
        ("app-main/package.json", r#"{"dependencies":{"react":"18"}}"#),
        (
            "app-main/index.html",
            r#"<html><head><title>App</title><link rel="stylesheet" href="/style.css"></head><body><div id="root"></div><script src="./main.js"></script></body></html>"#,
        ),
        ("app-main/style.css", "#root{padding:1rem}"),
        ("app-main/main.js", "render();"),
        ("app-main/extra.js", "analytics();"),
    ])
}

#[test]
fn test_pack_archive() {
    let packer = Packer::new(PackConfig::default());
    let output = packer.pack(PackSource::Archive(react_project())).unwrap();

    assert_eq!(output.source, "archive");
    assert_eq!(output.project_type, ProjectType::React);
    assert_eq!(output.asset_count, 5);
    assert_eq!(output.entry.as_deref(), Some("app-main/index.html"));
    assert_eq!(output.inlined, 2);
    assert_eq!(output.appended, 1);
    assert!(!output.placeholder);
    assert_eq!(output.size, output.html.len());
    assert_eq!(output.content_hash.len(), 16);
    assert!(output.html.contains("#root{padding:1rem}"));
    assert!(output.html.contains("render();"));
    assert!(output.html.contains("analytics();"));
    assert!(output.html.contains("<title>App</title>"));
    assert!(output.metrics.total.is_some());
    assert!(output.links.is_empty());
}

#[test]
fn test_pack_is_deterministic() {
    let packer = Packer::new(PackConfig::default());
    let first = packer.pack(PackSource::Archive(react_project())).unwrap();
    let second = packer.pack(PackSource::Archive(react_project())).unwrap();
    assert_eq!(first.html, second.html);
    assert_eq!(first.content_hash, second.content_hash);
}

#[test]
fn test_pack_and_deploy() {
    let packer = Packer::new(PackConfig::default());
    let deployer = MockDeployer::ok(&["https://arweave.example/tx1"]);

    let output = packer
        .pack_and_deploy(PackSource::Archive(react_project()), &deployer)
        .unwrap();

    assert_eq!(output.links, vec!["https://arweave.example/tx1".to_string()]);
    let metrics = &output.metrics;
    assert!(metrics.acquire.unwrap() <= metrics.extract.unwrap());
    assert!(metrics.extract.unwrap() <= metrics.synthesize.unwrap());
    assert!(metrics.deploy.unwrap() <= metrics.total.unwrap());
    assert_eq!(deployer.submitted.borrow().as_slice(), &[output.html.clone()]);
}

#[test]
fn test_oversized_document_is_never_submitted() {
    let big = format!("<p>{}</p>", "x".repeat(4096));
    let packer = Packer::new(PackConfig::default().with_max_size_kb(1));
    let deployer = MockDeployer::ok(&["unused"]);

    let result = packer.pack_and_deploy(
        PackSource::SingleFile {
            name: "big.html".to_string(),
            content: big,
        },
        &deployer,
    );

    match result {
        Err(BundleError::SizeExceeded { size, limit }) => {
            assert_eq!(limit, 1024);
            assert!(size > limit);
        }
        other => panic!("unexpected: {:?}", other.map(|o| o.size)),
    }
    assert!(deployer.submitted.borrow().is_empty());
}

#[test]
fn test_deploy_failure_is_reported() {
    let packer = Packer::new(PackConfig::default());
    let deployer = MockDeployer::failing("insufficient balance");

    let mut output = packer.pack(PackSource::Archive(react_project())).unwrap();
    match packer.deploy(&mut output, &deployer) {
        Err(BundleError::Deploy(reason)) => assert_eq!(reason, "insufficient balance"),
        other => panic!("unexpected: {:?}", other),
    }
    assert!(output.links.is_empty());
}

#[test]
fn test_empty_archive_policies() {
    let only_images = zip_archive(&[("img/a.png", "PNG")]);

    let strict = Packer::new(PackConfig::default());
    assert!(matches!(
        strict.pack(PackSource::Archive(only_images.clone())),
        Err(BundleError::EmptyBundle)
    ));

    let lenient = Packer::new(PackConfig::default().with_on_empty(OnEmptyBundle::Placeholder));
    let output = lenient.pack(PackSource::Archive(only_images)).unwrap();
    assert!(output.placeholder);
    assert!(output.html.contains("No files were bundled."));
}

#[test]
fn test_pack_github_through_fetcher() {
    let mut fetcher = MockFetch::default();
    fetcher.responses.insert(
        "https://github.com/octo/site/archive/refs/heads/main.zip".to_string(),
        react_project(),
    );

    let packer = Packer::new(PackConfig::default()).with_fetcher(Arc::new(fetcher));
    let output = packer
        .pack(PackSource::GitHub("https://github.com/octo/site".to_string()))
        .unwrap();
    assert_eq!(output.source, "github");
    assert_eq!(output.project_type, ProjectType::React);

    let invalid = packer.pack(PackSource::GitHub("not a repo".to_string()));
    assert!(matches!(invalid, Err(BundleError::InvalidRepository(_))));
}

#[test]
fn test_pack_url_through_fetcher() {
    let mut fetcher = MockFetch::default();
    fetcher.responses.insert(
        "https://example.com/".to_string(),
        b"<html><head><link rel=stylesheet href=a.css></head><body>live</body></html>".to_vec(),
    );
    fetcher
        .responses
        .insert("https://example.com/a.css".to_string(), b"p{color:teal}".to_vec());

    let packer = Packer::new(PackConfig::default()).with_fetcher(Arc::new(fetcher));
    let output = packer.pack(PackSource::Url("example.com".to_string())).unwrap();

    assert_eq!(output.entry.as_deref(), Some("index.html"));
    assert!(output.html.contains("p{color:teal}"));
    assert!(output.html.contains("live"));
    assert!(!output.html.contains("<link"));
}

#[test]
fn test_pack_mhtml_upload() {
    let mhtml = concat!(
        "MIME-Version: 1.0\n",
        "Content-Type: multipart/related; boundary=\"b1\"\n",
        "\n",
        "--b1\n",
        "Content-Type: text/html\n",
        "Content-Transfer-Encoding: quoted-printable\n",
        "\n",
        "<html><head></head><body class=3D\"page\">saved</body></html>\n",
        "--b1\n",
        "Content-Type: text/css\n",
        "\n",
        ".page{color:navy}\n",
        "--b1--\n"
    );

    let packer = Packer::new(PackConfig::default());
    let output = packer
        .pack(PackSource::SingleFile {
            name: "saved.mhtml".to_string(),
            content: mhtml.to_string(),
        })
        .unwrap();

    assert_eq!(output.source, "single-file");
    assert!(output.html.contains("<body class='page'>saved</body>"));
    assert!(output.html.contains(".page{color:navy}"));
    assert!(!output.html.contains('"'));
}

#[test]
fn test_single_file_quote_policy() {
    let source = || PackSource::SingleFile {
        name: "index.html".to_string(),
        content: "<a href=\"#top\">top</a>".to_string(),
    };

    let never = Packer::new(PackConfig::default().with_quotes(QuotePolicy::Never));
    assert_eq!(never.pack(source()).unwrap().html, "<a href=\"#top\">top</a>");

    let raw = Packer::new(PackConfig::default().with_optimize(false));
    assert_eq!(raw.pack(source()).unwrap().html, "<a href=\"#top\">top</a>");

    let default = Packer::new(PackConfig::default());
    assert_eq!(default.pack(source()).unwrap().html, "<a href='#top'>top</a>");
}

#[test]
fn test_pack_directory() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("index.html"),
        "<html><body><script src=\"app.js\"></script></body></html>",
    )
    .unwrap();
    fs::write(temp.path().join("app.js"), "boot();").unwrap();
    fs::create_dir(temp.path().join(".cache")).unwrap();
    fs::write(temp.path().join(".cache/stale.js"), "stale();").unwrap();

    let packer = Packer::new(PackConfig::default());
    let output = packer
        .pack(PackSource::Directory(temp.path().to_path_buf()))
        .unwrap();

    assert_eq!(output.asset_count, 2);
    assert!(output.html.contains("boot();"));
    assert!(!output.html.contains("stale();"));
}

#[test]
fn test_publish_requires_endpoint() {
    let packer = Packer::new(PackConfig::default());
    let result = packer.publish(PackSource::SingleFile {
        name: "a.html".to_string(),
        content: "<p>a</p>".to_string(),
    });
    assert!(matches!(result, Err(BundleError::Config(_))));
}
