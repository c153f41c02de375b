//! Structural snapshots of a repository tree.
//!
//! [`capture`] walks a repository and returns a [`BaselineSnapshot`]: the
//! sorted file and directory sets plus an extension histogram. [`diff`]
//! compares two snapshots without touching the filesystem.
//!
//! The walk is deterministic. Entries are visited in file-name order and
//! every collection in the result is ordered, so two captures of an
//! unchanged tree differ only in `timestamp`.

mod drift;

pub use drift::{diff, DriftReport};

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::Utc;
use sentinel_core::{BaselineSnapshot, StateError, StateStore, WriteMode};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Directory names never descended into, in addition to every hidden
/// directory (which covers `.git` and the state directory).
pub const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "__pycache__",
    "venv",
    "dist",
    "build",
    "coverage",
    "target",
];

/// File names and suffixes dropped from the snapshot.
pub const EXCLUDED_FILES: &[&str] = &[".DS_Store", "Thumbs.db"];
pub const EXCLUDED_SUFFIXES: &[&str] = &[".pyc", ".pyo", ".so", ".dylib"];

/// Manifest files whose presence is recorded in `key_files_present`.
pub const KEY_FILES: &[&str] = &[
    "README.md",
    "README",
    "Cargo.toml",
    "package.json",
    "tsconfig.json",
    "pyproject.toml",
    "requirements.txt",
    "setup.py",
    "go.mod",
    "Makefile",
    "Dockerfile",
    "docker-compose.yml",
    ".gitignore",
];

/// Histogram key for files without an extension.
pub const NO_EXTENSION: &str = "(no extension)";

/// Knobs for a capture.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Extra directory names to skip (from `config.yaml`).
    pub extra_excludes: Vec<String>,
}

/// Errors from snapshot capture.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("cannot read repository root {path}: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed while walking {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error(transparent)]
    State(#[from] StateError),
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Scans `root` into a snapshot. Does not persist anything.
pub fn capture(root: &Path, options: &ScanOptions) -> Result<BaselineSnapshot, SnapshotError> {
    std::fs::read_dir(root).map_err(|source| SnapshotError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;

    let mut files = BTreeSet::new();
    let mut directories = BTreeSet::new();
    let mut histogram: BTreeMap<String, usize> = BTreeMap::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_excluded_dir(e, options));

    for entry in walker {
        let entry = entry.map_err(|source| SnapshotError::Walk {
            path: source.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
            source,
        })?;
        if entry.depth() == 0 {
            continue;
        }
        let Some(rel) = relative(root, entry.path()) else {
            continue;
        };
        if entry.file_type().is_dir() {
            directories.insert(rel);
        } else if entry.file_type().is_file() {
            let name = entry.file_name().to_string_lossy();
            if is_excluded_file(&name) {
                continue;
            }
            *histogram.entry(extension_key(entry.path())).or_default() += 1;
            files.insert(rel);
        }
    }

    let key_files_present = KEY_FILES
        .iter()
        .map(|k| (k.to_string(), root.join(k).is_file()))
        .collect();

    tracing::debug!(
        root = %root.display(),
        files = files.len(),
        directories = directories.len(),
        "snapshot captured"
    );

    Ok(BaselineSnapshot {
        timestamp: Utc::now(),
        files,
        directories,
        file_type_histogram: histogram,
        key_files_present,
    })
}

/// Captures the store's repository and persists the result as the baseline.
///
/// `mode` decides whether an existing baseline is an error
/// ([`WriteMode::CreateNew`]) or replaced ([`WriteMode::Overwrite`]).
pub fn capture_into(
    store: &StateStore,
    options: &ScanOptions,
    mode: WriteMode,
) -> Result<BaselineSnapshot, SnapshotError> {
    let snapshot = capture(store.root(), options)?;
    store.save_baseline(&snapshot, mode)?;
    tracing::info!(files = snapshot.files.len(), ?mode, "baseline written");
    Ok(snapshot)
}

/// Histogram key: lowercased extension with a leading dot.
pub fn extension_key(path: &Path) -> String {
    match path.extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy().to_lowercase()),
        None => NO_EXTENSION.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn is_excluded_dir(entry: &DirEntry, options: &ScanOptions) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.')
        || name.ends_with(".egg-info")
        || EXCLUDED_DIRS.contains(&name.as_ref())
        || options.extra_excludes.iter().any(|x| x == name.as_ref())
}

fn is_excluded_file(name: &str) -> bool {
    EXCLUDED_FILES.contains(&name) || EXCLUDED_SUFFIXES.iter().any(|s| name.ends_with(s))
}

fn relative(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect();
    Some(parts.join("/"))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
