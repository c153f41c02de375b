//! State-directory persistence: parse errors, baseline write modes, and
//! on-disk shapes other repositories depend on.

use assert_fs::prelude::*;
use chrono::Utc;
use predicates::prelude::predicate;
use rstest::rstest;
use sentinel_core::{
    store::{self, StateStore, WriteMode},
    BaselineSnapshot, Deviation, DeviationId, ErrorCategory, Severity, StateError, StepId,
};
use std::collections::{BTreeMap, BTreeSet};

fn init_store(tmp: &assert_fs::TempDir) -> StateStore {
    let store = StateStore::at(tmp.path());
    store.ensure_dir().expect("ensure_dir");
    store
}

fn snapshot(files: &[&str]) -> BaselineSnapshot {
    BaselineSnapshot {
        timestamp: Utc::now(),
        files: files.iter().map(|s| s.to_string()).collect(),
        directories: BTreeSet::new(),
        file_type_histogram: BTreeMap::new(),
        key_files_present: BTreeMap::new(),
    }
}

// ---------------------------------------------------------------------------
// 1. Parse errors surface as integrity errors
// ---------------------------------------------------------------------------

#[rstest]
#[case(store::DEVIATIONS_FILE, b": : corrupt : yaml : !!!\n  - [unclosed")]
#[case(store::STEP_FILE, b"- a list, not a step\n")]
#[case(store::REPO_FILE, b"repo_name: [1, 2\n")]
fn corrupt_yaml_reports_path(#[case] name: &str, #[case] content: &[u8]) {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let store = init_store(&tmp);
    tmp.child(".sentinel").child(name).write_binary(content).expect("write");

    let err = match name {
        store::DEVIATIONS_FILE => store.load_deviations().unwrap_err(),
        store::STEP_FILE => store.load_step().unwrap_err(),
        _ => store.load_repo_config().unwrap_err(),
    };
    assert!(matches!(err, StateError::Parse { .. }), "got: {err}");
    assert_eq!(err.category(), ErrorCategory::Integrity);
    assert!(err.to_string().contains(name), "message must name the file: {err}");
}

#[test]
fn duplicate_ids_on_disk_are_refused() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let store = init_store(&tmp);
    tmp.child(".sentinel/deviations.yaml")
        .write_str(
            "- id: x\n  description: a\n  severity: high\n\
             - id: x\n  description: b\n  severity: low\n",
        )
        .expect("write");
    let err = store.load_deviations().unwrap_err();
    assert!(matches!(err, StateError::Corrupt { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Baseline write modes
// ---------------------------------------------------------------------------

#[test]
fn baseline_create_new_never_overwrites() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let store = init_store(&tmp);
    store.save_baseline(&snapshot(&["a.rs"]), WriteMode::CreateNew).expect("first");

    let err = store.save_baseline(&snapshot(&["b.rs"]), WriteMode::CreateNew).unwrap_err();
    assert!(matches!(err, StateError::BaselineExists { .. }));
    let kept = store.load_baseline().unwrap().expect("baseline");
    assert!(kept.files.contains("a.rs"));
}

#[test]
fn baseline_overwrite_is_explicit() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let store = init_store(&tmp);
    store.save_baseline(&snapshot(&["a.rs"]), WriteMode::CreateNew).expect("first");
    store.save_baseline(&snapshot(&["b.rs"]), WriteMode::Overwrite).expect("overwrite");
    let kept = store.load_baseline().unwrap().expect("baseline");
    assert_eq!(kept.files.iter().collect::<Vec<_>>(), vec!["b.rs"]);
    tmp.child(".sentinel/baseline_snapshot.json.tmp").assert(predicate::path::missing());
}

// ---------------------------------------------------------------------------
// 3. On-disk shapes
// ---------------------------------------------------------------------------

#[test]
fn deviations_file_is_an_ordered_list() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let store = init_store(&tmp);
    let mut reg = store.load_deviations().expect("empty");
    reg.record(Deviation::new("zeta", "last", Severity::Low)).unwrap();
    reg.record(Deviation::new("alpha", "first", Severity::High)).unwrap();
    reg.resolve(&[DeviationId::from("zeta")].into(), &StepId::from("s1"));
    store.save_deviations(&reg).expect("save");

    let file = tmp.child(".sentinel/deviations.yaml");
    file.assert(predicate::str::starts_with("- id: alpha"));
    file.assert(predicate::str::contains("status: resolved"));
    file.assert(predicate::str::contains("resolved_by_step: s1"));

    let back = store.load_deviations().expect("reload");
    assert_eq!(back, reg);
}

#[test]
fn empty_registry_serializes_as_empty_list() {
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    let store = init_store(&tmp);
    store.save_deviations(&Default::default()).expect("save");
    tmp.child(".sentinel/deviations.yaml").assert("[]\n");
}
