//! Tests for singlefile-pack bundle module

use singlefile_pack::{BundleBuilder, BundleError};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_bundle_builder() {
    let temp = TempDir::new().unwrap();

    fs::write(temp.path().join("index.html"), "<html></html>").unwrap();
    fs::write(temp.path().join("style.css"), "body { }").unwrap();
    fs::create_dir(temp.path().join("js")).unwrap();
    fs::write(temp.path().join("js/app.js"), "console.log('hi')").unwrap();
    fs::write(temp.path().join("logo.png"), [0x89, b'P', b'N', b'G']).unwrap();

    let bundle = BundleBuilder::new(temp.path()).build().unwrap();

    assert_eq!(bundle.len(), 3);
    assert!(bundle.contains("js/app.js"));
    assert!(!bundle.contains("logo.png"));
    assert_eq!(bundle.total_size(), 13 + 8 + 17);
}

#[test]
fn test_bundle_order_is_sorted() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("b.css"), "b{}").unwrap();
    fs::write(temp.path().join("a.css"), "a{}").unwrap();

    let bundle = BundleBuilder::new(temp.path()).build().unwrap();
    assert_eq!(bundle.paths().collect::<Vec<_>>(), vec!["a.css", "b.css"]);
}

#[test]
fn test_bundle_single_file() {
    let temp = TempDir::new().unwrap();
    let html_path = temp.path().join("page.html");
    fs::write(&html_path, "<html>test</html>").unwrap();

    let bundle = BundleBuilder::new(&html_path).build().unwrap();

    assert_eq!(bundle.len(), 1);
    assert_eq!(bundle.assets()[0].0, "page.html");
}

#[test]
fn test_bundle_excludes() {
    let temp = TempDir::new().unwrap();

    fs::write(temp.path().join("index.html"), "<html></html>").unwrap();
    fs::write(temp.path().join("app.js.map"), "sourcemap").unwrap();
    fs::write(temp.path().join(".DS_Store"), "").unwrap();
    fs::create_dir_all(temp.path().join("node_modules/lib")).unwrap();
    fs::write(temp.path().join("node_modules/lib/index.js"), "lib()").unwrap();
    fs::create_dir(temp.path().join("vendor")).unwrap();
    fs::write(temp.path().join("vendor/v.js"), "v()").unwrap();

    let bundle = BundleBuilder::new(temp.path())
        .exclude(&["vendor"])
        .build()
        .unwrap();

    assert_eq!(bundle.len(), 1);
    assert_eq!(bundle.assets()[0].0, "index.html");
}

#[test]
fn test_non_utf8_file_is_skipped() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("index.html"), "<p>ok</p>").unwrap();
    fs::write(temp.path().join("latin1.txt"), [0x63, 0x61, 0x66, 0xe9]).unwrap();

    let bundle = BundleBuilder::new(temp.path()).build().unwrap();
    assert_eq!(bundle.len(), 1);
    assert_eq!(bundle.skipped().len(), 1);
    assert_eq!(bundle.skipped()[0].path, "latin1.txt");
}

#[test]
fn test_missing_directory() {
    let temp = TempDir::new().unwrap();
    let result = BundleBuilder::new(temp.path().join("nope")).build();
    assert!(matches!(result, Err(BundleError::InvalidInput(_))));
}
