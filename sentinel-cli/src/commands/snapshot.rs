//! `sentinel snapshot` and `sentinel diff-baseline`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use sentinel_core::WriteMode;
use sentinel_snapshot::{capture, capture_into, diff, ScanOptions};
use sentinel_workflow::{StepController, WorkflowError};

use super::{print_json, Outcome, Workspace};
use crate::reviewer::LocalReviewer;

/// Replace the baseline with a fresh capture.
#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// Also re-run deviation detection against the new baseline.
    #[arg(long)]
    pub detect: bool,

    #[arg(long)]
    pub json: bool,
}

impl SnapshotArgs {
    pub fn run(self, ws: &Workspace) -> Result<Outcome> {
        let store = ws.store()?;
        let snapshot = {
            let _lock = store.lock()?;
            let options = ScanOptions { extra_excludes: store.load_config()?.snapshot.exclude };
            capture_into(&store, &options, WriteMode::Overwrite).context("snapshot failed")?
        };
        let detection = if self.detect {
            let reviewer = LocalReviewer::default();
            Some(StepController::new(store, &reviewer).redetect().context("deviation detection failed")?)
        } else {
            None
        };

        if self.json {
            print_json(&snapshot)?;
            return Ok(Outcome::Success);
        }
        println!(
            "{} Baseline captured: {} files, {} directories",
            "✓".green(),
            snapshot.files.len(),
            snapshot.directories.len()
        );
        if let Some(d) = detection {
            println!(
                "  deviations: {} added, {} reopened, {} updated",
                d.added.len(),
                d.reopened.len(),
                d.updated.len()
            );
        }
        Ok(Outcome::Success)
    }
}

/// Show structural drift since the baseline. Read-only.
#[derive(Args, Debug)]
pub struct DiffBaselineArgs {
    #[arg(long)]
    pub json: bool,
}

impl DiffBaselineArgs {
    pub fn run(self, ws: &Workspace) -> Result<Outcome> {
        let store = ws.store()?;
        let baseline = store.load_baseline()?.ok_or(WorkflowError::BaselineMissing)?;
        let options = ScanOptions { extra_excludes: store.load_config()?.snapshot.exclude };
        let current = capture(store.root(), &options).context("failed to scan working tree")?;
        let report = diff(&baseline, &current);

        if self.json {
            print_json(&report)?;
            return Ok(Outcome::Success);
        }
        if report.is_empty() {
            println!("No structural drift since {}.", baseline.timestamp.format("%Y-%m-%d %H:%M UTC"));
            return Ok(Outcome::Success);
        }
        for d in &report.added_directories {
            println!("{} {d}/", "+".green());
        }
        for d in &report.removed_directories {
            println!("{} {d}/", "-".red());
        }
        for f in &report.added_files {
            println!("{} {f}", "+".green());
        }
        for f in &report.removed_files {
            println!("{} {f}", "-".red());
        }
        for (ext, delta) in &report.type_deltas {
            println!("  {ext}: {delta:+}");
        }
        Ok(Outcome::Success)
    }
}
