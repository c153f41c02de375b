//! Step lifecycle commands: `propose`, `compile`, `verify`, `accept`, `abandon`.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use serde::Serialize;

use sentinel_core::{Step, StepId, StepKind, VerifyVerdict};
use sentinel_workflow::{
    ChangeProvider, ChangeScope, FeatureStatus, ProposeRequest, ProposeSource, StepController,
    StepDraft, VerifyOutcome, WorkflowError,
};

use super::{print_json, Outcome, Workspace};
use crate::git::GitChanges;
use crate::reviewer::LocalReviewer;

// ---------------------------------------------------------------------------
// propose
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Implementation,
    Verification,
}

impl From<KindArg> for StepKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Implementation => StepKind::Implementation,
            KindArg::Verification => StepKind::Verification,
        }
    }
}

/// Propose the next step.
///
/// Structural rules come first: the first step of a repository is always a
/// baseline verification, and open HIGH deviations in synced dependencies
/// produce a blocked step. Otherwise the next plan step is used, or a step
/// described with `--goal`.
#[derive(Args, Debug)]
pub struct ProposeArgs {
    /// Only take the next step from the implementation plan.
    #[arg(long, conflicts_with_all = ["no_plan", "goal"])]
    pub from_plan: bool,

    /// Ignore the implementation plan.
    #[arg(long)]
    pub no_plan: bool,

    /// Abandon a pending step instead of refusing.
    #[arg(long)]
    pub force: bool,

    /// Step goal; describes the step by hand.
    #[arg(long)]
    pub goal: Option<String>,

    /// Step id (default: derived from the goal).
    #[arg(long, requires = "goal")]
    pub id: Option<String>,

    /// Step kind (default: implementation).
    #[arg(long, value_enum, requires = "goal")]
    pub kind: Option<KindArg>,

    /// Allowed file or wildcard (repeatable).
    #[arg(long = "allow", value_name = "PATH", requires = "goal")]
    pub allow: Vec<String>,

    /// Forbidden pattern for this step (repeatable).
    #[arg(long = "forbid", value_name = "TEXT", requires = "goal")]
    pub forbid: Vec<String>,

    /// Feature the step must deliver (repeatable).
    #[arg(long = "feature", value_name = "TEXT", requires = "goal")]
    pub feature: Vec<String>,

    /// Deviation id this step fixes (repeatable).
    #[arg(long = "fixes", value_name = "ID", requires = "goal")]
    pub fixes: Vec<String>,

    #[arg(long)]
    pub json: bool,
}

impl ProposeArgs {
    pub fn run(self, ws: &Workspace) -> Result<Outcome> {
        let store = ws.store()?;
        let source = if self.from_plan {
            ProposeSource::Plan
        } else if self.no_plan || self.goal.is_some() {
            ProposeSource::Reviewer
        } else {
            ProposeSource::Auto
        };
        let draft = self.goal.as_ref().map(|goal| StepDraft {
            id: self.id.clone().unwrap_or_else(|| slug(goal)),
            kind: self.kind.map(StepKind::from).unwrap_or_default(),
            goal: goal.clone(),
            allowed_files: self.allow.clone(),
            forbidden_patterns: self.forbid.clone(),
            features: self.feature.clone(),
            fixes_deviation_ids: self.fixes.clone(),
        });

        let reviewer = LocalReviewer::with_draft(draft);
        let ctl = StepController::new(store, &reviewer);
        let step = ctl
            .propose(ProposeRequest { source, force: self.force })
            .context("propose failed")?;

        if self.json {
            print_json(&step)?;
        } else {
            print_step(&step);
            println!("Next: sentinel compile");
        }
        Ok(Outcome::Success)
    }
}

fn print_step(step: &Step) {
    println!("{} {} ({})", "Step".bold(), step.id.to_string().cyan(), step.kind);
    println!("  goal: {}", step.goal);
    if let Some(by) = &step.blocked_by {
        println!("  {} by {}/{}", "blocked".red().bold(), by.repo, by.deviation_id);
    }
    if !step.allowed_files.is_empty() {
        println!("  allowed:");
        for f in &step.allowed_files {
            println!("    {f}");
        }
    }
    for p in &step.forbidden_patterns {
        println!("  forbidden: {p}");
    }
    for f in &step.features {
        println!("  feature: {f}");
    }
    for d in &step.fixes_deviation_ids {
        println!("  fixes: {d}");
    }
}

/// Lowercase alphanumeric words joined by `-`, at most 48 characters.
fn slug(text: &str) -> String {
    let mut out = String::new();
    for word in text.split(|c: char| !c.is_ascii_alphanumeric()).filter(|w| !w.is_empty()) {
        if out.len() + word.len() + 1 > 48 {
            break;
        }
        if !out.is_empty() {
            out.push('-');
        }
        out.push_str(&word.to_ascii_lowercase());
    }
    if out.is_empty() {
        "step".to_string()
    } else {
        out
    }
}

// ---------------------------------------------------------------------------
// compile
// ---------------------------------------------------------------------------

pub fn compile(ws: &Workspace) -> Result<Outcome> {
    let store = ws.store()?;
    let reviewer = LocalReviewer::default();
    let ctl = StepController::new(store.clone(), &reviewer);
    let (step, artifact) = ctl.compile().context("compile failed")?;

    println!("{} Compiled step {}", "✓".green(), step.id.to_string().cyan());
    for (name, _) in artifact.files() {
        println!("  ✎  {}", store.path(name).display());
    }
    Ok(Outcome::Success)
}

// ---------------------------------------------------------------------------
// verify
// ---------------------------------------------------------------------------

/// Check changes against the current step's allowlist and constraints.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Check staged changes instead of the whole working tree.
    #[arg(long)]
    pub staged: bool,

    /// Also run the semantic feature review.
    #[arg(long)]
    pub check_logic: bool,

    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct VerifyJson<'a> {
    verdict: &'a VerifyVerdict,
    baseline_captured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    deviations_added: Option<usize>,
}

impl VerifyArgs {
    pub fn run(self, ws: &Workspace) -> Result<Outcome> {
        let store = ws.store()?;
        let scope = if self.staged { ChangeScope::Staged } else { ChangeScope::Uncommitted };
        let observation = GitChanges::open(ws.root())?
            .observe(scope)
            .context("failed to read changes from git")?;

        let reviewer = LocalReviewer::default();
        let ctl = StepController::new(store, &reviewer);
        let outcome = ctl.verify(&observation, self.check_logic).context("verify failed")?;

        if self.json {
            print_json(&VerifyJson {
                verdict: &outcome.verdict,
                baseline_captured: outcome.baseline_captured,
                deviations_added: outcome.detection.as_ref().map(|d| d.added.len()),
            })?;
        } else {
            print_verdict(&outcome);
        }
        Ok(if outcome.verdict.passed() { Outcome::Success } else { Outcome::Failed })
    }
}

fn print_verdict(outcome: &VerifyOutcome) {
    let v = &outcome.verdict;
    let banner = if v.passed() { " PASS ".on_green().black().bold() } else { " FAIL ".on_red().white().bold() };
    println!("{banner} {} ({} file(s) changed)", v.step_id, v.modified_files.len());
    if v.forced_baseline {
        println!("  first verification: verdict forced to PASS");
    }
    if outcome.baseline_captured {
        println!("  baseline snapshot captured");
    }
    if let Some(d) = &outcome.detection {
        println!(
            "  deviations: {} added, {} reopened, {} updated",
            d.added.len(),
            d.reopened.len(),
            d.updated.len()
        );
    }
    for violation in v.hard_violations() {
        println!("  {} {violation}", "✗".red());
    }
    for violation in v.soft_violations() {
        println!("  {} {violation}", "!".yellow());
    }
    for fv in &outcome.feature_verdicts {
        let mark = match fv.status {
            FeatureStatus::Met => "✓".green(),
            FeatureStatus::NotMet => "✗".red(),
            FeatureStatus::Unclear => "?".yellow(),
        };
        println!("  {mark} {}", fv.feature);
    }
    for warning in &v.warnings {
        println!("  {} {warning}", "warning:".yellow());
    }
    if v.passed() {
        println!("Next: sentinel accept");
    } else {
        println!("See .sentinel/repair.md, fix, then verify again.");
    }
}

// ---------------------------------------------------------------------------
// accept
// ---------------------------------------------------------------------------

/// Record the verified step. Requires a PASS verdict for this exact step.
#[derive(Args, Debug)]
pub struct AcceptArgs {
    /// Step id (default: the current step).
    pub step_id: Option<String>,
}

impl AcceptArgs {
    pub fn run(self, ws: &Workspace) -> Result<Outcome> {
        let store = ws.store()?;
        let step_id = match self.step_id {
            Some(id) => StepId::from(id),
            None => store.load_step()?.map(|s| s.id).ok_or(WorkflowError::NoPendingStep)?,
        };

        let reviewer = LocalReviewer::default();
        let ctl = StepController::new(store, &reviewer);
        let result = ctl
            .accept(&step_id)
            .with_context(|| format!("cannot accept '{step_id}'"))?;

        println!(
            "{} Accepted {} ({} step(s) done)",
            "✓".green(),
            result.step_id.to_string().cyan(),
            result.done_count
        );
        for id in &result.resolved {
            println!("  resolved deviation {id}");
        }
        for id in &result.noops {
            println!("  {} {id} was not open; left unchanged", "note:".yellow());
        }
        if result.invariants_added > 0 {
            println!("  {} invariant(s) recorded", result.invariants_added);
        }
        if result.plan_updated {
            println!("  plan step marked completed");
        }
        Ok(Outcome::Success)
    }
}

// ---------------------------------------------------------------------------
// abandon
// ---------------------------------------------------------------------------

pub fn abandon(ws: &Workspace) -> Result<Outcome> {
    let reviewer = LocalReviewer::default();
    let ctl = StepController::new(ws.store()?, &reviewer);
    let step = ctl.abandon().context("abandon failed")?;
    println!("Abandoned {} ({})", step.id.to_string().cyan(), step.state);
    Ok(Outcome::Success)
}

#[cfg(test)]
mod tests {
    use super::slug;

    #[test]
    fn slug_keeps_words() {
        assert_eq!(slug("Add rate limiting to /login!"), "add-rate-limiting-to-login");
        assert_eq!(slug("???"), "step");
    }
}
