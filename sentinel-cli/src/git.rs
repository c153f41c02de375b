//! `git`-backed [`ChangeProvider`].
//!
//! Paths are printed relative to the repository root (`--relative`), so a
//! root nested inside a larger work tree still lines up with allowlists.
//! Rename detection is off (`--no-renames`): a moved file reports both its
//! old and its new path.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use sentinel_workflow::{ChangeProvider, ChangeScope, WorkflowError, WorkflowResult};

/// Hash of the empty tree; the diff base before the first commit.
const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// Lines of an untracked file included in diff text.
const MAX_UNTRACKED_LINES: usize = 2000;

pub struct GitChanges {
    root: PathBuf,
    base: String,
}

impl GitChanges {
    /// Fails with `NotARepository` outside a git work tree.
    pub fn open(root: &Path) -> WorkflowResult<Self> {
        let inside = git_output(root, &["rev-parse", "--is-inside-work-tree"])
            .map(|out| out.trim() == "true")
            .unwrap_or(false);
        if !inside {
            return Err(WorkflowError::NotARepository { path: root.to_path_buf() });
        }
        let base = if git_output(root, &["rev-parse", "--verify", "--quiet", "HEAD"]).is_ok() {
            "HEAD".to_string()
        } else {
            tracing::debug!("no commits yet; diffing against the empty tree");
            EMPTY_TREE.to_string()
        };
        Ok(Self { root: root.to_path_buf(), base })
    }

    fn git(&self, args: &[&str]) -> WorkflowResult<String> {
        git_output(&self.root, args)
    }

    fn untracked(&self) -> WorkflowResult<Vec<String>> {
        Ok(lines(&self.git(&["ls-files", "--others", "--exclude-standard"])?))
    }
}

impl ChangeProvider for GitChanges {
    fn modified_files(&self, scope: ChangeScope) -> WorkflowResult<BTreeSet<String>> {
        let mut files: BTreeSet<String> = match scope {
            ChangeScope::Uncommitted => {
                lines(&self.git(&["diff", &self.base, "--name-only", "--relative", "--no-renames"])?).into_iter().collect()
            }
            ChangeScope::Staged => {
                lines(&self.git(&["diff", "--cached", "--name-only", "--relative", "--no-renames"])?).into_iter().collect()
            }
        };
        if scope == ChangeScope::Uncommitted {
            files.extend(self.untracked()?);
        }
        tracing::debug!(count = files.len(), ?scope, "modified files collected");
        Ok(files)
    }

    fn diff_text(&self, scope: ChangeScope) -> WorkflowResult<String> {
        match scope {
            ChangeScope::Staged => self.git(&["diff", "--cached", "--relative", "--no-renames"]),
            ChangeScope::Uncommitted => {
                let mut text = self.git(&["diff", &self.base, "--relative", "--no-renames"])?;
                // Untracked files have no diff; present them as fully added.
                for rel in self.untracked()? {
                    let Ok(content) = std::fs::read_to_string(self.root.join(&rel)) else {
                        continue;
                    };
                    text.push_str(&format!("+++ b/{rel}\n"));
                    for line in content.lines().take(MAX_UNTRACKED_LINES) {
                        text.push('+');
                        text.push_str(line);
                        text.push('\n');
                    }
                }
                Ok(text)
            }
        }
    }
}

fn git_output(root: &Path, args: &[&str]) -> WorkflowResult<String> {
    let out = Command::new("git")
        .arg("-C")
        .arg(root)
        .args(["-c", "core.quotepath=off"])
        .args(args)
        .output()
        .map_err(|e| WorkflowError::Vcs(format!("cannot run git: {e}")))?;
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(WorkflowError::Vcs(format!("git {} failed: {}", args.join(" "), stderr.trim())));
    }
    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}

fn lines(text: &str) -> Vec<String> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect()
}
