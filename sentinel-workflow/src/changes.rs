//! VCS change provider seam.

use std::collections::BTreeSet;

use sentinel_core::store::STATE_DIR;
use sentinel_gate::normalize_path;

use crate::error::WorkflowResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeScope {
    /// Working tree against `HEAD`, plus untracked files.
    #[default]
    Uncommitted,
    /// Index against `HEAD`.
    Staged,
}

pub trait ChangeProvider {
    fn modified_files(&self, scope: ChangeScope) -> WorkflowResult<BTreeSet<String>>;

    /// Unified diff text for the same scope.
    fn diff_text(&self, scope: ChangeScope) -> WorkflowResult<String>;

    fn observe(&self, scope: ChangeScope) -> WorkflowResult<Observation> {
        Ok(Observation::new(self.modified_files(scope)?, self.diff_text(scope)?))
    }
}

/// What verify checks a step against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    /// Normalized paths, never including the state directory.
    pub modified_files: BTreeSet<String>,
    pub diff_text: String,
}

impl Observation {
    pub fn new<I, S>(modified: I, diff_text: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let modified_files = modified
            .into_iter()
            .map(|p| normalize_path(p.as_ref()))
            .filter(|p| !p.is_empty() && !is_state_path(p))
            .collect();
        Self { modified_files, diff_text: diff_text.into() }
    }
}

/// `true` for the state directory and anything below it.
pub fn is_state_path(path: &str) -> bool {
    path == STATE_DIR || path.starts_with(&format!("{STATE_DIR}/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_drops_state_dir() {
        let obs = Observation::new(["./src/a.rs", ".sentinel/state.json", ".sentinelx"], "");
        assert_eq!(
            obs.modified_files.into_iter().collect::<Vec<_>>(),
            vec![".sentinelx".to_string(), "src/a.rs".to_string()]
        );
    }
}
