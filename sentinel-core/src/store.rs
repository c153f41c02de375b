//! File-backed state directory.
//!
//! # Storage layout
//!
//! ```text
//! <repo>/
//!   .sentinel/
//!     architecture.md          (human-written target architecture)
//!     repo.yaml                (identity, must_not, depends_on)
//!     config.yaml              (optional tuning)
//!     state.json               (append-only audit state)
//!     step.yaml                (current step; absent when none pending)
//!     verdict.json             (last verify verdict)
//!     deviations.yaml          (deviation registry)
//!     baseline_snapshot.json   (structural fingerprint)
//!     implementation_plan.yaml (optional plan overlay)
//!     external_state.json      (derived, regenerated per sync)
//!     steps/<id>.yaml          (accepted-step archive)
//!     .lock                    (held while a mutating command runs)
//! ```
//!
//! Every write is serialize → `<name>.tmp` sibling → `rename`, so a reader
//! sees either the old file or the new one, never a torn write.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::SentinelConfig;
use crate::deviations::DeviationRegistry;
use crate::error::{io_err, StateError};
use crate::types::{
    AuditState, BaselineSnapshot, Deviation, ExternalState, RepoConfig, Step, StepId,
    VerifyVerdict,
};

pub const STATE_DIR: &str = ".sentinel";
pub const ARCHITECTURE_FILE: &str = "architecture.md";
pub const REPO_FILE: &str = "repo.yaml";
pub const CONFIG_FILE: &str = "config.yaml";
pub const STATE_FILE: &str = "state.json";
pub const STEP_FILE: &str = "step.yaml";
pub const VERDICT_FILE: &str = "verdict.json";
pub const DEVIATIONS_FILE: &str = "deviations.yaml";
pub const BASELINE_FILE: &str = "baseline_snapshot.json";
pub const PLAN_FILE: &str = "implementation_plan.yaml";
pub const EXTERNAL_FILE: &str = "external_state.json";
pub const BRIEF_FILE: &str = "brief.txt";
pub const CHECKLIST_FILE: &str = "verify.md";
pub const OUTPUT_FILE: &str = "output.txt";
pub const REPAIR_FILE: &str = "repair.md";
pub const STEPS_DIR: &str = "steps";
pub const LOCK_FILE: &str = ".lock";

/// How a write treats an existing target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Fail with [`StateError::BaselineExists`] if the file is already there.
    CreateNew,
    /// Replace the file. Callers use this only on an explicit user request.
    Overwrite,
}

// ---------------------------------------------------------------------------
// 1. Store handle
// ---------------------------------------------------------------------------

/// Handle on one repository's `.sentinel/` directory.
///
/// Cheap to construct; holds no open files. Mutating workflows pair it with
/// a [`StateLock`].
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
    dir: PathBuf,
}

impl StateStore {
    /// Store for the repository at `root`. Does not touch the filesystem.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let dir = root.join(STATE_DIR);
        Self { root, dir }
    }

    /// Like [`at`](Self::at), but fails with [`StateError::NotInitialized`]
    /// if the state directory is missing.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StateError> {
        let store = Self::at(root);
        if !store.is_initialized() {
            return Err(StateError::NotInitialized { path: store.dir.clone() });
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<repo>/.sentinel/<name>`, pure.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn is_initialized(&self) -> bool {
        self.dir.is_dir()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    pub fn ensure_dir(&self) -> Result<(), StateError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))
    }

    // -----------------------------------------------------------------------
    // 2. Generic I/O
    // -----------------------------------------------------------------------

    /// Reads `<name>` as YAML. `Ok(None)` when the file does not exist.
    pub fn read_yaml<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StateError> {
        let path = self.path(name);
        let Some(contents) = read_opt(&path)? else {
            return Ok(None);
        };
        serde_yaml::from_str(&contents)
            .map(Some)
            .map_err(|source| StateError::Parse { path, source })
    }

    pub fn write_yaml<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StateError> {
        let yaml = serde_yaml::to_string(value)?;
        self.write_text(name, &yaml)
    }

    /// Reads `<name>` as JSON. `Ok(None)` when the file does not exist.
    pub fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StateError> {
        let path = self.path(name);
        let Some(contents) = read_opt(&path)? else {
            return Ok(None);
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| StateError::ParseJson { path, source })
    }

    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StateError> {
        let mut json = serde_json::to_string_pretty(value)?;
        json.push('\n');
        self.write_text(name, &json)
    }

    pub fn read_text(&self, name: &str) -> Result<Option<String>, StateError> {
        read_opt(&self.path(name))
    }

    /// Atomically replaces `<name>` with `content`.
    pub fn write_text(&self, name: &str, content: &str) -> Result<(), StateError> {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        atomic_write(&path, content.as_bytes())
    }

    /// Removes `<name>`; `Ok(false)` if it was already absent.
    pub fn remove(&self, name: &str) -> Result<bool, StateError> {
        let path = self.path(name);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(path, e)),
        }
    }

    // -----------------------------------------------------------------------
    // 3. Typed accessors
    // -----------------------------------------------------------------------

    /// Repository name: `repo.yaml` `repo_name`, else the root directory name.
    pub fn repo_name(&self) -> Result<String, StateError> {
        if let Some(cfg) = self.load_repo_config()? {
            if !cfg.repo_name.trim().is_empty() {
                return Ok(cfg.repo_name);
            }
        }
        Ok(dir_name(&self.root))
    }

    pub fn load_repo_config(&self) -> Result<Option<RepoConfig>, StateError> {
        self.read_yaml(REPO_FILE)
    }

    pub fn save_repo_config(&self, cfg: &RepoConfig) -> Result<(), StateError> {
        self.write_yaml(REPO_FILE, cfg)
    }

    /// `config.yaml`, or defaults when absent.
    pub fn load_config(&self) -> Result<SentinelConfig, StateError> {
        Ok(self.read_yaml(CONFIG_FILE)?.unwrap_or_default())
    }

    /// `state.json`, or a fresh empty state when none has been written yet.
    pub fn load_state(&self) -> Result<AuditState, StateError> {
        match self.read_json::<AuditState>(STATE_FILE)? {
            Some(state) => Ok(state),
            None => Ok(AuditState::new(self.repo_name()?)),
        }
    }

    pub fn save_state(&self, state: &AuditState) -> Result<(), StateError> {
        self.write_json(STATE_FILE, state)
    }

    pub fn load_step(&self) -> Result<Option<Step>, StateError> {
        self.read_yaml(STEP_FILE)
    }

    pub fn save_step(&self, step: &Step) -> Result<(), StateError> {
        self.write_yaml(STEP_FILE, step)
    }

    pub fn clear_step(&self) -> Result<bool, StateError> {
        self.remove(STEP_FILE)
    }

    /// Where an accepted step is archived. Distinct ids never share a path.
    pub fn archive_path(&self, id: &StepId) -> PathBuf {
        self.path(&archive_name(id))
    }

    /// Copies an accepted step into `steps/<id>.yaml`. Never overwrites.
    pub fn archive_step(&self, step: &Step) -> Result<PathBuf, StateError> {
        let name = archive_name(&step.id);
        let path = self.path(&name);
        if path.exists() {
            return Err(StateError::Corrupt {
                path,
                reason: format!("step '{}' is already archived", step.id),
            });
        }
        self.write_yaml(&name, step)?;
        Ok(path)
    }

    pub fn load_archived_step(&self, id: &StepId) -> Result<Option<Step>, StateError> {
        self.read_yaml(&archive_name(id))
    }

    pub fn load_verdict(&self) -> Result<Option<VerifyVerdict>, StateError> {
        self.read_json(VERDICT_FILE)
    }

    pub fn save_verdict(&self, verdict: &VerifyVerdict) -> Result<(), StateError> {
        self.write_json(VERDICT_FILE, verdict)
    }

    /// `deviations.yaml`, validated. Missing file → empty registry.
    pub fn load_deviations(&self) -> Result<DeviationRegistry, StateError> {
        let path = self.path(DEVIATIONS_FILE);
        let entries: Vec<Deviation> = self.read_yaml(DEVIATIONS_FILE)?.unwrap_or_default();
        DeviationRegistry::from_entries(entries)
            .map_err(|reason| StateError::Corrupt { path, reason })
    }

    pub fn save_deviations(&self, registry: &DeviationRegistry) -> Result<(), StateError> {
        self.write_yaml(DEVIATIONS_FILE, registry)
    }

    pub fn has_deviations(&self) -> bool {
        self.exists(DEVIATIONS_FILE)
    }

    pub fn load_baseline(&self) -> Result<Option<BaselineSnapshot>, StateError> {
        self.read_json(BASELINE_FILE)
    }

    /// Persists the baseline. With [`WriteMode::CreateNew`] an existing
    /// baseline is an error, never a silent overwrite.
    pub fn save_baseline(
        &self,
        snapshot: &BaselineSnapshot,
        mode: WriteMode,
    ) -> Result<(), StateError> {
        let path = self.path(BASELINE_FILE);
        if mode == WriteMode::CreateNew && path.exists() {
            return Err(StateError::BaselineExists { path });
        }
        self.write_json(BASELINE_FILE, snapshot)
    }

    pub fn load_external(&self) -> Result<Option<ExternalState>, StateError> {
        self.read_json(EXTERNAL_FILE)
    }

    pub fn save_external(&self, external: &ExternalState) -> Result<(), StateError> {
        self.write_json(EXTERNAL_FILE, external)
    }

    // -----------------------------------------------------------------------
    // 4. Lock
    // -----------------------------------------------------------------------

    /// Takes the exclusive state lock, failing fast if another invocation
    /// holds it.
    pub fn lock(&self) -> Result<StateLock, StateError> {
        self.ensure_dir()?;
        let path = self.path(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = std::fs::read_to_string(&path)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|_| "unknown holder".to_string());
                return Err(StateError::StateLocked { path, holder });
            }
            Err(e) => return Err(io_err(path, e)),
        };
        let stamp = format!("pid {} since {}\n", std::process::id(), Utc::now().to_rfc3339());
        file.write_all(stamp.as_bytes()).map_err(|e| io_err(&path, e))?;
        tracing::debug!(path = %path.display(), "state lock acquired");
        Ok(StateLock { path })
    }
}

/// Guard for `.sentinel/.lock`. The file is removed on drop.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
}

impl StateLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release state lock");
        }
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn read_opt(path: &Path) -> Result<Option<String>, StateError> {
    match std::fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err(path, e)),
    }
}

/// serialize → `.tmp` sibling → rename. The `.tmp` lives in the same
/// directory as the target so the rename never crosses filesystems.
pub(crate) fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StateError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{file_name}.tmp"));
    std::fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))
}

/// Last path component as a repository name.
pub fn dir_name(root: &Path) -> String {
    root.canonicalize()
        .ok()
        .as_deref()
        .unwrap_or(root)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "repo".to_string())
}

/// `steps/<id>.yaml` with every byte outside `[A-Za-z0-9._-]` written as
/// `%XX`, so the mapping is reversible.
fn archive_name(id: &StepId) -> String {
    let mut name = String::with_capacity(id.0.len() + STEPS_DIR.len() + 6);
    name.push_str(STEPS_DIR);
    name.push('/');
    for b in id.0.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.') {
            name.push(char::from(b));
        } else {
            name.push_str(&format!("%{b:02X}"));
        }
    }
    name.push_str(".yaml");
    name
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
