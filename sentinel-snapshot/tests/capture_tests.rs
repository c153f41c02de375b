//! Snapshot capture against real directory trees.

use std::fs;
use std::path::Path;

use rstest::rstest;
use sentinel_core::{StateStore, WriteMode};
use sentinel_snapshot::{capture, capture_into, diff, ScanOptions, NO_EXTENSION};
use tempfile::TempDir;

fn touch(root: &Path, rel: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("mkdir");
    }
    fs::write(path, "x").expect("write");
}

fn sample_tree() -> TempDir {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path();
    touch(root, "README.md");
    touch(root, "Cargo.toml");
    touch(root, "src/main.rs");
    touch(root, "src/lib.rs");
    touch(root, "src/ui/view.tsx");
    touch(root, "Makefile");
    touch(root, ".gitignore");
    tmp
}

#[test]
fn capture_is_deterministic() {
    let tmp = sample_tree();
    let a = capture(tmp.path(), &ScanOptions::default()).expect("capture a");
    let b = capture(tmp.path(), &ScanOptions::default()).expect("capture b");
    assert_eq!(a.files, b.files);
    assert_eq!(a.directories, b.directories);
    assert_eq!(a.file_type_histogram, b.file_type_histogram);
}

#[test]
fn capture_records_files_dirs_and_histogram() {
    let tmp = sample_tree();
    let snap = capture(tmp.path(), &ScanOptions::default()).expect("capture");
    assert!(snap.files.contains("src/ui/view.tsx"));
    assert!(snap.files.contains(".gitignore"));
    assert_eq!(
        snap.directories.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["src", "src/ui"]
    );
    assert_eq!(snap.file_type_histogram.get(".rs"), Some(&2));
    assert_eq!(snap.file_type_histogram.get(NO_EXTENSION), Some(&2));
    assert_eq!(snap.key_files_present.get("Cargo.toml"), Some(&true));
    assert_eq!(snap.key_files_present.get("package.json"), Some(&false));
}

#[rstest]
#[case(".git/config")]
#[case(".sentinel/state.json")]
#[case("node_modules/pkg/index.js")]
#[case("target/debug/app")]
#[case("pkg.egg-info/PKG-INFO")]
#[case("__pycache__/mod.pyc")]
#[case("src/cache.pyc")]
#[case(".DS_Store")]
fn excluded_paths_never_appear(#[case] rel: &str) {
    let tmp = sample_tree();
    touch(tmp.path(), rel);
    let snap = capture(tmp.path(), &ScanOptions::default()).expect("capture");
    assert!(!snap.files.contains(rel), "{rel} should be excluded");
    let top = rel.split('/').next().unwrap_or(rel);
    if rel.contains('/') && top != "src" {
        assert!(!snap.directories.contains(top), "{top} should be excluded");
    }
}

#[test]
fn extra_excludes_from_config() {
    let tmp = sample_tree();
    touch(tmp.path(), "vendor/lib.c");
    let opts = ScanOptions { extra_excludes: vec!["vendor".into()] };
    let snap = capture(tmp.path(), &opts).expect("capture");
    assert!(!snap.files.contains("vendor/lib.c"));
    assert!(!snap.directories.contains("vendor"));
}

#[test]
fn unreadable_root_is_an_error() {
    let tmp = TempDir::new().expect("tempdir");
    let missing = tmp.path().join("nope");
    assert!(capture(&missing, &ScanOptions::default()).is_err());
}

#[test]
fn capture_into_respects_write_mode() {
    let tmp = sample_tree();
    let store = StateStore::at(tmp.path());
    store.ensure_dir().expect("ensure_dir");

    let first = capture_into(&store, &ScanOptions::default(), WriteMode::CreateNew).expect("first");
    touch(tmp.path(), "src/new.rs");
    assert!(capture_into(&store, &ScanOptions::default(), WriteMode::CreateNew).is_err());

    let second = capture_into(&store, &ScanOptions::default(), WriteMode::Overwrite).expect("overwrite");
    let drift = diff(&first, &second);
    assert_eq!(drift.added_files.iter().collect::<Vec<_>>(), vec!["src/new.rs"]);
}
