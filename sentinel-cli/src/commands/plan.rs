//! `sentinel plan init|status|show`

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use sentinel_workflow::{Plan, PlanStatus, WorkflowError};

use super::{print_json, Outcome, Workspace};

#[derive(Subcommand, Debug)]
pub enum PlanCommand {
    /// Build a plan from the open deviations (one phase per severity).
    Init {
        /// Replace an existing plan.
        #[arg(long)]
        force: bool,
    },

    /// Show overall and per-phase progress.
    Status {
        #[arg(long)]
        json: bool,
    },

    /// List every plan step.
    Show {
        #[arg(long)]
        json: bool,
    },
}

pub fn run(cmd: PlanCommand, ws: &Workspace) -> Result<Outcome> {
    match cmd {
        PlanCommand::Init { force } => init(ws, force),
        PlanCommand::Status { json } => status(ws, json),
        PlanCommand::Show { json } => show(ws, json),
    }
}

fn init(ws: &Workspace, force: bool) -> Result<Outcome> {
    let store = ws.store()?;
    let _lock = store.lock()?;
    if !force && Plan::load(&store)?.is_some() {
        return Err(WorkflowError::PlanExists.into());
    }
    let plan = Plan::from_deviations(&store.load_deviations()?, store.repo_name()?);
    plan.save(&store).context("failed to write implementation plan")?;

    if plan.total_steps() == 0 {
        println!("No open deviations; wrote an empty plan.");
    } else {
        println!(
            "{} Plan written: {} phase(s), {} step(s)",
            "✓".green(),
            plan.phases.len(),
            plan.total_steps()
        );
    }
    Ok(Outcome::Success)
}

fn load(ws: &Workspace) -> Result<Plan> {
    let store = ws.store()?;
    Ok(Plan::load(&store)?.ok_or(WorkflowError::PlanNotFound)?)
}

#[derive(Serialize, Tabled)]
struct PhaseRow {
    #[tabled(rename = "phase")]
    id: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "done")]
    done: String,
}

#[derive(Serialize)]
struct StatusJson {
    progress: f64,
    completed: usize,
    total: usize,
    next: Option<String>,
    phases: Vec<PhaseRow>,
}

fn status(ws: &Workspace, json: bool) -> Result<Outcome> {
    let plan = load(ws)?;
    let phases: Vec<PhaseRow> = plan
        .phases
        .iter()
        .map(|p| PhaseRow {
            id: p.id.clone(),
            name: p.name.clone(),
            status: p.status().to_string(),
            done: format!("{}/{}", p.completed_steps(), p.steps.len()),
        })
        .collect();
    let next = plan.next_incomplete().map(|s| s.step_id.to_string());

    if json {
        print_json(&StatusJson {
            progress: plan.progress(),
            completed: plan.completed_steps(),
            total: plan.total_steps(),
            next,
            phases,
        })?;
        return Ok(Outcome::Success);
    }

    println!(
        "Plan progress: {} ({}/{} steps)",
        format!("{:.0}%", plan.progress()).bold(),
        plan.completed_steps(),
        plan.total_steps()
    );
    if !phases.is_empty() {
        println!("{}", Table::new(phases).with(Style::rounded()));
    }
    match next {
        Some(id) => println!("Next step: {}", id.cyan()),
        None => println!("{}", "All plan steps completed.".green()),
    }
    Ok(Outcome::Success)
}

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "phase")]
    phase: String,
    #[tabled(rename = "step")]
    step: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "files")]
    files: usize,
    #[tabled(rename = "fixes")]
    fixes: String,
}

fn show(ws: &Workspace, json: bool) -> Result<Outcome> {
    let plan = load(ws)?;
    if json {
        print_json(&plan)?;
        return Ok(Outcome::Success);
    }
    let rows: Vec<StepRow> = plan
        .steps()
        .map(|(phase, s)| StepRow {
            phase: phase.id.clone(),
            step: s.step_id.to_string(),
            status: match s.status {
                PlanStatus::Completed => s.status.to_string().green().to_string(),
                PlanStatus::InProgress => s.status.to_string().yellow().to_string(),
                PlanStatus::NotStarted => s.status.to_string(),
            },
            files: s.allowed_files.len(),
            fixes: s.fixes_deviation_ids.iter().map(|d| d.0.as_str()).collect::<Vec<_>>().join(", "),
        })
        .collect();
    if rows.is_empty() {
        println!("The plan has no steps.");
    } else {
        println!("{}", Table::new(rows).with(Style::rounded()));
    }
    Ok(Outcome::Success)
}
