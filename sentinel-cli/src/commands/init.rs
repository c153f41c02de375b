//! `sentinel init [--name <repo>] [--role <text>]`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use sentinel_core::store::STATE_DIR;
use sentinel_workflow::{init_repo, InitOptions};

use super::{Outcome, Workspace};

/// Scaffold the state directory. Existing files are left untouched.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Repository name recorded in repo.yaml (default: directory name).
    #[arg(long)]
    pub name: Option<String>,

    /// One-line description of the repository's role.
    #[arg(long)]
    pub role: Option<String>,
}

impl InitArgs {
    pub fn run(self, ws: &Workspace) -> Result<Outcome> {
        let options = InitOptions { repo_name: self.name, repo_role: self.role };
        let report = init_repo(ws.root(), &options)
            .with_context(|| format!("failed to initialize '{}'", ws.root().display()))?;

        println!("{} Initialized {}/", "✓".green(), ws.root().join(STATE_DIR).display());
        for file in &report.created {
            println!("  ✎  {file}");
        }
        for file in &report.existing {
            println!("  ·  {file} (kept)");
        }
        if !report.created.is_empty() {
            println!("Next: describe the target in architecture.md, then run `sentinel propose`.");
        }
        Ok(Outcome::Success)
    }
}
