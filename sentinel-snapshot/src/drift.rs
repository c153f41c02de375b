//! Pure comparison of two snapshots.

use std::collections::{BTreeMap, BTreeSet};

use sentinel_core::BaselineSnapshot;
use serde::Serialize;

/// Structural drift between an older and a newer snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    pub added_files: BTreeSet<String>,
    pub removed_files: BTreeSet<String>,
    pub added_directories: BTreeSet<String>,
    pub removed_directories: BTreeSet<String>,
    /// Extension → `new - old` count. Only non-zero deltas are kept.
    pub type_deltas: BTreeMap<String, i64>,
}

impl DriftReport {
    pub fn is_empty(&self) -> bool {
        self.added_files.is_empty()
            && self.removed_files.is_empty()
            && self.added_directories.is_empty()
            && self.removed_directories.is_empty()
            && self.type_deltas.is_empty()
    }
}

/// Computes the drift from `old` to `new`. Timestamps are ignored.
pub fn diff(old: &BaselineSnapshot, new: &BaselineSnapshot) -> DriftReport {
    let mut type_deltas = BTreeMap::new();
    let keys: BTreeSet<&String> = old
        .file_type_histogram
        .keys()
        .chain(new.file_type_histogram.keys())
        .collect();
    for key in keys {
        let before = old.file_type_histogram.get(key).copied().unwrap_or(0) as i64;
        let after = new.file_type_histogram.get(key).copied().unwrap_or(0) as i64;
        if after != before {
            type_deltas.insert(key.clone(), after - before);
        }
    }

    DriftReport {
        added_files: new.files.difference(&old.files).cloned().collect(),
        removed_files: old.files.difference(&new.files).cloned().collect(),
        added_directories: new.directories.difference(&old.directories).cloned().collect(),
        removed_directories: old.directories.difference(&new.directories).cloned().collect(),
        type_deltas,
    }
}
