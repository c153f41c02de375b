//! `sentinel sync-external --from <path>...`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use sentinel_workflow::{blockers_for, sync};

use super::{print_json, Outcome, Workspace};

/// Rebuild external_state.json from dependency repositories.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Root of a dependency repository (repeatable).
    #[arg(long = "from", value_name = "PATH", required = true)]
    pub from: Vec<PathBuf>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "repo")]
    repo: String,
    #[tabled(rename = "role")]
    role: String,
    #[tabled(rename = "open HIGH")]
    high: usize,
    #[tabled(rename = "done steps")]
    done: usize,
}

impl SyncArgs {
    pub fn run(self, ws: &Workspace) -> Result<Outcome> {
        let store = ws.store()?;
        let _lock = store.lock()?;
        let external = sync(&store, &self.from).context("sync-external failed; nothing was written")?;

        if self.json {
            print_json(&external)?;
            return Ok(Outcome::Success);
        }

        let rows: Vec<Row> = external
            .repos
            .iter()
            .map(|(name, r)| Row {
                repo: name.clone(),
                role: r.role.clone(),
                high: r.high_severity_open_deviations.len(),
                done: r.done_steps,
            })
            .collect();
        println!("{} Synced {} dependency repo(s)", "✓".green(), rows.len());
        println!("{}", Table::new(rows).with(Style::rounded()));

        for cycle in &external.cycles {
            println!("{} dependency cycle: {}", "warning:".yellow(), cycle.join(" -> "));
        }
        let blockers = blockers_for(&external);
        if blockers.is_empty() {
            println!("No blockers.");
        } else {
            println!("{} blocker(s); the next propose will be blocked:", blockers.len().to_string().red());
            for b in &blockers {
                println!("  {}/{}: {}", b.repo, b.deviation.id, b.deviation.description);
            }
        }
        Ok(Outcome::Success)
    }
}
