//! `sentinel test [--step <id>]`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use sentinel_core::StepId;
use sentinel_workflow::{run_feature_tests, TestOutcome};

use super::{print_json, Outcome, Workspace};
use crate::reviewer::LocalReviewer;

/// Re-check the features of completed plan steps against current files.
#[derive(Args, Debug)]
pub struct TestArgs {
    /// Test only this step.
    #[arg(long)]
    pub step: Option<String>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "step")]
    step: String,
    #[tabled(rename = "outcome")]
    outcome: String,
    #[tabled(rename = "files")]
    files: usize,
    #[tabled(rename = "detail")]
    detail: String,
}

impl TestArgs {
    pub fn run(self, ws: &Workspace) -> Result<Outcome> {
        let store = ws.store()?;
        let only = self.step.map(StepId::from);
        let report = run_feature_tests(&store, &LocalReviewer::default(), only.as_ref())
            .context("feature tests could not run")?;

        if self.json {
            print_json(&report)?;
        } else if report.results.is_empty() {
            println!("No completed plan steps to test.");
        } else {
            let rows: Vec<Row> = report
                .results
                .iter()
                .map(|r| Row {
                    step: r.step_id.to_string(),
                    outcome: match r.outcome {
                        TestOutcome::Passed => "passed".green().to_string(),
                        TestOutcome::Failed => "failed".red().to_string(),
                        TestOutcome::Inconclusive => "inconclusive".yellow().to_string(),
                        TestOutcome::Skipped => "skipped".dimmed().to_string(),
                    },
                    files: r.files_read,
                    detail: r.reason.clone().unwrap_or_else(|| format!("{} feature(s)", r.features.len())),
                })
                .collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
            println!(
                "{} passed, {} failed, {} inconclusive, {} skipped",
                report.count(TestOutcome::Passed),
                report.count(TestOutcome::Failed),
                report.count(TestOutcome::Inconclusive),
                report.count(TestOutcome::Skipped)
            );
        }
        Ok(if report.all_passed() { Outcome::Success } else { Outcome::Failed })
    }
}
