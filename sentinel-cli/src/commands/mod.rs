pub mod init;
pub mod plan;
pub mod snapshot;
pub mod step;
pub mod sync;
pub mod test;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use sentinel_core::StateStore;

/// How a command finished when it did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// A FAIL verdict or failing test; exit code 1.
    Failed,
}

/// The repository a command operates on.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(repo: Option<PathBuf>) -> Result<Self> {
        let root = match repo {
            Some(path) => path,
            None => std::env::current_dir().context("cannot determine current directory")?,
        };
        let root = root
            .canonicalize()
            .with_context(|| format!("cannot resolve repository path '{}'", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store for an initialized repository.
    pub fn store(&self) -> Result<StateStore> {
        Ok(StateStore::open(&self.root)?)
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("failed to serialize output")?);
    Ok(())
}
