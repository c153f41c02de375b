//! Step lifecycle controller.
//!
//! ```text
//! NONE ─propose─▶ PROPOSED ─compile─▶ COMPILED ─verify─▶ VERIFIED_PASS ─accept─▶ ACCEPTED
//!                                        ▲                  │
//!                                        └──────compile─── VERIFIED_FAIL
//! ```
//!
//! Every mutating operation holds the state lock for its whole
//! read-decide-write sequence, and re-reads state after taking it.
//!
//! Structural rules live here and nowhere else:
//! - the first proposal for a repository is always a verification step
//! - dependency blockers pre-empt every other source of step content
//! - the first verify of a verification step passes and captures the baseline
//! - accept requires a PASS verdict for exactly this step, unchanged since

use std::collections::BTreeSet;

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};

use sentinel_core::store::{ARCHITECTURE_FILE, REPAIR_FILE};
use sentinel_core::{
    AuditState, BlockedBy, DetectionOutcome, DeviationId, DeviationRegistry, DoneStep, Gate,
    RepoConfig, SentinelConfig, StateError, StateStore, Step, StepId, StepKind, StepSource, StepState,
    VerifyStatus, VerifyVerdict, Violation, WriteMode,
};
use sentinel_gate::{normalize_path, Allowlist, PatternGate, PatternHit};
use sentinel_renderer::{CompiledArtifact, RepairContext, Renderer, StepContext};
use sentinel_snapshot::ScanOptions;

use crate::changes::{is_state_path, Observation};
use crate::error::{WorkflowError, WorkflowResult};
use crate::external::{blockers_for, Blocker};
use crate::plan::{MarkOutcome, Plan};
use crate::reviewer::{FeatureStatus, FeatureVerdict, ProposeContext, SemanticReviewer, StepDraft};

/// Id of the synthesized first step.
pub const BASELINE_STEP_ID: &str = "baseline-verification";

/// Template overrides, relative to the state directory.
const TEMPLATE_DIR: &str = "templates";

// ---------------------------------------------------------------------------
// Requests and results
// ---------------------------------------------------------------------------

/// Where `propose` looks for step content once the structural rules pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProposeSource {
    /// Next plan step if a plan has one, else the reviewer.
    #[default]
    Auto,
    /// Plan only.
    Plan,
    /// Reviewer only, even if a plan exists.
    Reviewer,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProposeRequest {
    pub source: ProposeSource,
    /// Abandon a pending step instead of refusing.
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub verdict: VerifyVerdict,
    pub pattern_hits: Vec<PatternHit>,
    pub feature_verdicts: Vec<FeatureVerdict>,
    /// Present on the first-run verify only.
    pub detection: Option<DetectionOutcome>,
    pub baseline_captured: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptResult {
    pub step_id: StepId,
    pub resolved: BTreeSet<DeviationId>,
    pub noops: BTreeSet<DeviationId>,
    pub invariants_added: usize,
    pub plan_updated: bool,
    pub done_count: usize,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct StepController<'r> {
    store: StateStore,
    reviewer: &'r dyn SemanticReviewer,
}

impl<'r> StepController<'r> {
    pub fn new(store: StateStore, reviewer: &'r dyn SemanticReviewer) -> Self {
        Self { store, reviewer }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    // -----------------------------------------------------------------------
    // 1. Propose
    // -----------------------------------------------------------------------

    pub fn propose(&self, req: ProposeRequest) -> WorkflowResult<Step> {
        let _lock = self.store.lock()?;
        let state = self.store.load_state()?;

        if let Some(pending) = self.store.load_step()? {
            if pending.is_pending() {
                if pending.kind == StepKind::Blocked {
                    tracing::info!(step = %pending.id, "replacing pending blocked step");
                } else if req.force {
                    tracing::warn!(step = %pending.id, state = %pending.state, "abandoning pending step");
                } else {
                    return Err(WorkflowError::StepAlreadyPending {
                        id: pending.id,
                        state: pending.state,
                    });
                }
                self.discard(&pending)?;
            }
        }

        let mut plan_step = None;
        let step = if state.done_steps.is_empty() {
            first_run_step()
        } else if let Some(step) = self.blocked_step()? {
            step
        } else {
            match self.plan_candidate(req.source, &state)? {
                Some(step) => {
                    plan_step = Some(step.id.clone());
                    step
                }
                None => self.reviewer_step(&state)?,
            }
        };

        if state.is_done(&step.id) {
            return Err(WorkflowError::DuplicateStepId { id: step.id });
        }

        self.store.save_step(&step)?;
        if let Some(id) = plan_step {
            if let Some(mut plan) = Plan::load(&self.store)? {
                if plan.mark_in_progress(&id) {
                    plan.save(&self.store)?;
                }
            }
        }
        tracing::info!(step = %step.id, kind = %step.kind, source = ?step.source, "step proposed");
        Ok(step)
    }

    fn blocked_step(&self) -> WorkflowResult<Option<Step>> {
        let Some(external) = self.store.load_external()? else {
            return Ok(None);
        };
        let blockers = blockers_for(&external);
        Ok(blocked_step_for(&blockers))
    }

    fn plan_candidate(&self, source: ProposeSource, state: &AuditState) -> WorkflowResult<Option<Step>> {
        if source == ProposeSource::Reviewer {
            return Ok(None);
        }
        let plan = match Plan::load(&self.store)? {
            Some(mut plan) => {
                if skip_done_entries(&mut plan, state) {
                    plan.save(&self.store)?;
                }
                Some(plan)
            }
            None => None,
        };
        match (source, plan) {
            (ProposeSource::Plan, None) => Err(WorkflowError::PlanNotFound),
            (ProposeSource::Plan, Some(plan)) => match plan.next_incomplete() {
                Some(planned) => Ok(Some(planned.to_step())),
                None => Err(WorkflowError::PlanComplete),
            },
            (_, plan) => Ok(plan.and_then(|p| p.next_incomplete().map(|s| s.to_step()))),
        }
    }

    fn reviewer_step(&self, state: &AuditState) -> WorkflowResult<Step> {
        let repo_name = self.store.repo_name()?;
        let repo = self.store.load_repo_config()?;
        let architecture = self.architecture_text()?;
        let registry = self.store.load_deviations()?;
        let ctx = ProposeContext {
            repo_name: &repo_name,
            repo: repo.as_ref(),
            architecture: &architecture,
            state,
            open_deviations: registry.iter().filter(|d| d.is_open()).collect(),
        };
        let draft = self.reviewer.propose_step(&ctx)?.ok_or_else(|| WorkflowError::NoDraft {
            reason: "the reviewer proposed nothing; add a plan or describe the step with --goal"
                .to_string(),
        })?;
        step_from_draft(draft, &registry)
    }

    // -----------------------------------------------------------------------
    // 2. Compile
    // -----------------------------------------------------------------------

    /// Renders the current step's artifacts into the state directory and
    /// marks the step COMPILED.
    pub fn compile(&self) -> WorkflowResult<(Step, CompiledArtifact)> {
        let _lock = self.store.lock()?;
        let mut step = self.current_step()?;
        if !matches!(
            step.state,
            StepState::Proposed | StepState::Compiled | StepState::VerifiedFail
        ) {
            return Err(WorkflowError::InvalidTransition {
                id: step.id,
                state: step.state,
                action: "compile",
            });
        }

        let artifact = self.renderer()?.compile(&self.step_context(&step)?)?;
        for (name, content) in artifact.files() {
            self.store.write_text(name, content)?;
        }
        step.state = StepState::Compiled;
        self.store.save_step(&step)?;
        tracing::info!(step = %step.id, "step compiled");
        Ok((step, artifact))
    }

    // -----------------------------------------------------------------------
    // 3. Verify
    // -----------------------------------------------------------------------

    /// Checks the current step against observed changes.
    ///
    /// A FAIL verdict is a normal return value. Errors mean the check could
    /// not run at all.
    pub fn verify(&self, observation: &Observation, check_logic: bool) -> WorkflowResult<VerifyOutcome> {
        let _lock = self.store.lock()?;
        let mut step = self.current_step()?;
        if !matches!(
            step.state,
            StepState::Compiled | StepState::VerifiedPass | StepState::VerifiedFail
        ) {
            return Err(WorkflowError::InvalidTransition {
                id: step.id,
                state: step.state,
                action: "verify",
            });
        }
        let mut state = self.store.load_state()?;
        let config = self.store.load_config()?;
        let repo = self.store.load_repo_config()?.unwrap_or_default();
        let first_run = state.never_verified() && step.kind == StepKind::Verification;

        let modified: BTreeSet<String> = observation
            .modified_files
            .iter()
            .map(|p| normalize_path(p))
            .filter(|p| !p.is_empty() && !is_state_path(p))
            .collect();

        let mut violations = Vec::new();
        let mut warnings = Vec::new();

        // Hard gate.
        let gate = Allowlist::new(&step.allowed_files)?.check(&modified);
        for path in &gate.unauthorized {
            violations.push(Violation::new(Gate::Allowlist, format!("{path} is not in the allowlist")));
        }

        // Soft gate: patterns.
        let forbidden = merged_forbidden(&repo, &step);
        let pattern_hits =
            PatternGate::with_categories(config.patterns.clone()).scan(&forbidden, &observation.diff_text);
        for hit in &pattern_hits {
            violations.push(Violation::new(
                Gate::Pattern,
                format!("'{}' added ({}): {}", hit.needle, hit.forbidden, hit.line),
            ));
        }

        // Soft gate: semantic review.
        let mut feature_verdicts = Vec::new();
        if check_logic && !step.features.is_empty() {
            match self.reviewer.check_features(&step, &observation.diff_text) {
                Ok(verdicts) => feature_verdicts = verdicts,
                Err(e) => {
                    tracing::warn!(error = %e, "semantic review failed");
                    warnings.push(format!("semantic review unavailable: {e}"));
                }
            }
            for v in feature_verdicts.iter().filter(|v| v.status == FeatureStatus::NotMet) {
                let note = if v.note.is_empty() { String::new() } else { format!(": {}", v.note) };
                violations.push(Violation::new(Gate::Semantic, format!("feature not met: {}{note}", v.feature)));
            }
        }

        let status = if first_run || violations.is_empty() { VerifyStatus::Pass } else { VerifyStatus::Fail };
        if first_run && !violations.is_empty() {
            tracing::info!(count = violations.len(), "first verification run: gate findings recorded, verdict forced to PASS");
        }

        let mut detection = None;
        let mut baseline_captured = false;
        if first_run {
            baseline_captured = self.capture_baseline(&config)?;
            detection = Some(self.detection_pass()?);
        } else if let Some(baseline) = self.store.load_baseline()? {
            for dir in new_directories(&modified, &baseline.directories) {
                warnings.push(format!("new directory not in baseline: {dir}"));
            }
        }

        let now = Utc::now();
        let verdict = VerifyVerdict {
            step_id: step.id.clone(),
            status,
            modified_files: modified,
            violations,
            warnings,
            forced_baseline: first_run,
            step_digest: step_digest(&step)?,
            timestamp: now,
        };

        state.record_verify(status, &step.id, now);
        self.store.save_state(&state)?;
        step.state = match status {
            VerifyStatus::Pass => StepState::VerifiedPass,
            VerifyStatus::Fail => StepState::VerifiedFail,
        };
        self.store.save_step(&step)?;
        self.store.save_verdict(&verdict)?;

        if status == VerifyStatus::Fail {
            let ctx = RepairContext::new(self.step_context(&step)?, &verdict);
            let text = self.renderer()?.repair(&ctx)?;
            self.store.write_text(REPAIR_FILE, &text)?;
        } else {
            self.store.remove(REPAIR_FILE)?;
        }

        tracing::info!(step = %step.id, %status, violations = verdict.violations.len(), "step verified");
        Ok(VerifyOutcome { verdict, pattern_hits, feature_verdicts, detection, baseline_captured })
    }

    /// Writes the baseline unless one exists. Returns whether it wrote.
    fn capture_baseline(&self, config: &SentinelConfig) -> WorkflowResult<bool> {
        if self.store.load_baseline()?.is_some() {
            tracing::info!("baseline already present; keeping it");
            return Ok(false);
        }
        let options = ScanOptions { extra_excludes: config.snapshot.exclude.clone() };
        sentinel_snapshot::capture_into(&self.store, &options, WriteMode::CreateNew)?;
        Ok(true)
    }

    /// Runs the reviewer's detection over the current baseline and writes
    /// `deviations.yaml`, even when nothing was found.
    fn detection_pass(&self) -> WorkflowResult<DetectionOutcome> {
        let mut registry = self.store.load_deviations()?;
        let detected = match self.store.load_baseline()? {
            Some(snapshot) => {
                let architecture = self.architecture_text()?;
                self.reviewer.detect_deviations(&architecture, &snapshot)?
            }
            None => Vec::new(),
        };
        let outcome = registry.detection_pass(detected)?;
        self.store.save_deviations(&registry)?;
        tracing::info!(
            added = outcome.added.len(),
            reopened = outcome.reopened.len(),
            "deviation detection pass"
        );
        Ok(outcome)
    }

    /// Explicit re-detection, outside the first-run path.
    pub fn redetect(&self) -> WorkflowResult<DetectionOutcome> {
        let _lock = self.store.lock()?;
        self.detection_pass()
    }

    // -----------------------------------------------------------------------
    // 4. Accept
    // -----------------------------------------------------------------------

    pub fn accept(&self, step_id: &StepId) -> WorkflowResult<AcceptResult> {
        let _lock = self.store.lock()?;
        // Re-read everything under the lock; nothing from before counts.
        let mut state = self.store.load_state()?;
        let blocked = |reason: String| WorkflowError::AcceptBlocked { reason };

        match (&state.last_verify_status, &state.last_verify_step) {
            (Some(VerifyStatus::Pass), Some(last)) if last == step_id => {}
            (Some(VerifyStatus::Pass), Some(last)) => {
                return Err(blocked(format!("last PASS verdict is for step '{last}', not '{step_id}'")))
            }
            (Some(VerifyStatus::Fail), _) => {
                return Err(blocked(format!("last verify of '{step_id}' did not pass; fix and re-run verify")))
            }
            _ => return Err(blocked("no passing verify on record; run `sentinel verify`".to_string())),
        }
        if state.is_done(step_id) {
            return Err(blocked(format!("step '{step_id}' is already accepted")));
        }
        let step = match self.store.load_step()? {
            Some(step) if &step.id == step_id => step,
            Some(step) => return Err(blocked(format!("current step is '{}', not '{step_id}'", step.id))),
            None => return Err(blocked(format!("step '{step_id}' no longer exists"))),
        };
        if step.kind == StepKind::Blocked {
            return Err(blocked("blocked steps cannot be accepted; resolve the dependency and re-sync".to_string()));
        }
        if step.state != StepState::VerifiedPass {
            return Err(blocked(format!("step is {}, expected VERIFIED_PASS", step.state)));
        }
        let verdict = match self.store.load_verdict()? {
            Some(v) if &v.step_id == step_id && v.passed() => v,
            _ => return Err(blocked("no matching PASS verdict on disk".to_string())),
        };
        if verdict.step_digest != step_digest(&step)? {
            return Err(blocked("step changed after it was verified; compile and verify again".to_string()));
        }
        // Checked before any write.
        let archive = self.store.archive_path(step_id);
        if archive.exists() {
            return Err(StateError::Corrupt {
                path: archive,
                reason: format!("step '{step_id}' is already archived but not in history"),
            }
            .into());
        }

        let mut registry = self.store.load_deviations()?;
        let resolution = registry.resolve(&step.fixes_deviation_ids, step_id);
        for id in &resolution.noops {
            tracing::warn!(deviation = %id, "listed as fixed but was not open");
        }

        state.append_done(DoneStep {
            step_id: step_id.clone(),
            summary: step.goal.clone(),
            timestamp: Utc::now(),
        });
        let mut invariants_added = 0;
        if step.kind == StepKind::Verification {
            for feature in &step.features {
                if state.add_invariant(feature.clone()) {
                    invariants_added += 1;
                }
            }
        }

        // History is written last: until state.json records the step, a
        // failed accept can be retried.
        if !resolution.resolved.is_empty() {
            self.store.save_deviations(&registry)?;
        }

        let mut plan_updated = false;
        if let Some(mut plan) = Plan::load(&self.store)? {
            if plan.mark_completed(step_id, verdict.modified_files.iter().cloned()) == MarkOutcome::Completed {
                plan.save(&self.store)?;
                plan_updated = true;
            }
        }

        let mut archived = step.clone();
        archived.state = StepState::Accepted;
        self.store.archive_step(&archived)?;
        self.store.save_state(&state)?;
        self.store.clear_step()?;

        tracing::info!(step = %step_id, resolved = resolution.resolved.len(), "step accepted");
        Ok(AcceptResult {
            step_id: step_id.clone(),
            resolved: resolution.resolved,
            noops: resolution.noops,
            invariants_added,
            plan_updated,
            done_count: state.done_steps.len(),
        })
    }

    // -----------------------------------------------------------------------
    // 5. Abandon
    // -----------------------------------------------------------------------

    /// Drops the pending step. History is untouched.
    pub fn abandon(&self) -> WorkflowResult<Step> {
        let _lock = self.store.lock()?;
        let step = self.current_step()?;
        self.discard(&step)?;
        tracing::warn!(step = %step.id, state = %step.state, "step abandoned");
        Ok(step)
    }

    fn discard(&self, step: &Step) -> WorkflowResult<()> {
        if step.source == StepSource::Plan {
            if let Some(mut plan) = Plan::load(&self.store)? {
                if plan.reset(&step.id) {
                    plan.save(&self.store)?;
                }
            }
        }
        self.store.clear_step()?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn current_step(&self) -> WorkflowResult<Step> {
        match self.store.load_step()? {
            Some(step) if step.is_pending() => Ok(step),
            _ => Err(WorkflowError::NoPendingStep),
        }
    }

    fn architecture_text(&self) -> WorkflowResult<String> {
        let config = self.store.load_config()?;
        let name = if config.reviewer.architecture_file.is_empty() {
            ARCHITECTURE_FILE.to_string()
        } else {
            config.reviewer.architecture_file
        };
        Ok(self.store.read_text(&name)?.unwrap_or_default())
    }

    fn renderer(&self) -> WorkflowResult<Renderer> {
        Ok(Renderer::with_overrides(&self.store.path(TEMPLATE_DIR))?)
    }

    fn step_context(&self, step: &Step) -> WorkflowResult<StepContext> {
        let mut ctx = StepContext::new(step, self.store.repo_name()?)
            .with_deviations(&self.store.load_deviations()?)
            .with_invariants(&self.store.load_state()?.invariants);
        if let Some(repo) = self.store.load_repo_config()? {
            ctx = ctx.with_repo(&repo);
        }
        Ok(ctx)
    }
}

// ---------------------------------------------------------------------------
// Step synthesis
// ---------------------------------------------------------------------------

fn first_run_step() -> Step {
    let mut step = Step::new(
        BASELINE_STEP_ID,
        StepKind::Verification,
        "Document the repository as it is: capture the baseline snapshot and record known deviations. Change no files.",
    );
    step.source = StepSource::FirstRun;
    step
}

/// A blocked step naming the first blocker and listing all of them.
pub fn blocked_step_for(blockers: &[Blocker]) -> Option<Step> {
    let first = blockers.first()?;
    let listed = blockers
        .iter()
        .map(|b| format!("{}/{}", b.repo, b.deviation.id))
        .collect::<Vec<_>>()
        .join(", ");
    let mut step = Step::new(
        format!("blocked-{}-{}", first.repo, first.deviation.id),
        StepKind::Blocked,
        format!(
            "Blocked by {} open HIGH deviation(s) in dependencies: {listed}",
            blockers.len()
        ),
    );
    step.blocked_by = Some(BlockedBy {
        repo: first.repo.clone(),
        deviation_id: first.deviation.id.clone(),
    });
    step.source = StepSource::Blocker;
    Some(step)
}

/// Validates reviewer output. Deviation ids that are not OPEN in the live
/// registry are dropped.
pub fn step_from_draft(draft: StepDraft, registry: &DeviationRegistry) -> WorkflowResult<Step> {
    let id = draft.id.trim();
    if id.is_empty() {
        return Err(WorkflowError::InvalidDraft { reason: "empty step id".to_string() });
    }
    if id.contains(char::is_whitespace) || id.contains('/') {
        return Err(WorkflowError::InvalidDraft {
            reason: format!("step id '{id}' must not contain whitespace or '/'"),
        });
    }
    if draft.goal.trim().is_empty() {
        return Err(WorkflowError::InvalidDraft { reason: "empty goal".to_string() });
    }
    if draft.kind == StepKind::Blocked {
        return Err(WorkflowError::InvalidDraft {
            reason: "blocked steps are only synthesized from dependency state".to_string(),
        });
    }

    let open = registry.open_ids();
    let mut fixes = BTreeSet::new();
    for raw in draft.fixes_deviation_ids {
        let id = DeviationId::from(raw.trim());
        if open.contains(&id) {
            fixes.insert(id);
        } else {
            tracing::warn!(deviation = %id, "dropping fix claim for a deviation that is not open");
        }
    }

    let mut step = Step::new(id, draft.kind, draft.goal.trim());
    step.allowed_files = draft
        .allowed_files
        .iter()
        .map(|p| normalize_path(p))
        .filter(|p| !p.is_empty() && !is_state_path(p))
        .collect();
    step.forbidden_patterns = draft.forbidden_patterns.into_iter().collect();
    step.features = draft.features;
    step.fixes_deviation_ids = fixes;
    step.source = StepSource::Reviewer;
    Ok(step)
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

/// Marks leading plan entries whose ids are already in history as completed.
fn skip_done_entries(plan: &mut Plan, state: &AuditState) -> bool {
    let mut changed = false;
    while let Some(id) = plan
        .next_incomplete()
        .map(|s| s.step_id.clone())
        .filter(|id| state.is_done(id))
    {
        if plan.mark_completed(&id, Vec::<String>::new()) != MarkOutcome::Completed {
            // A repeated id whose first entry is already completed.
            break;
        }
        tracing::warn!(step = %id, "plan entry was already accepted; marking it completed");
        changed = true;
    }
    changed
}

/// Repo-level `must_not` followed by the step's own patterns, deduplicated.
fn merged_forbidden(repo: &RepoConfig, step: &Step) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for p in repo.must_not.iter().chain(step.forbidden_patterns.iter()) {
        if !out.contains(p) {
            out.push(p.clone());
        }
    }
    out
}

/// Ancestor directories of `modified` absent from the baseline.
fn new_directories(modified: &BTreeSet<String>, known: &BTreeSet<String>) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for path in modified {
        let mut dir = path.as_str();
        while let Some((parent, _)) = dir.rsplit_once('/') {
            if !known.contains(parent) {
                out.insert(parent.to_string());
            }
            dir = parent;
        }
    }
    out
}

#[derive(Serialize)]
struct DigestView<'a> {
    id: &'a StepId,
    kind: StepKind,
    goal: &'a str,
    allowed_files: &'a BTreeSet<String>,
    forbidden_patterns: &'a BTreeSet<String>,
    features: &'a [String],
    fixes_deviation_ids: &'a BTreeSet<DeviationId>,
    blocked_by: &'a Option<BlockedBy>,
}

/// SHA-256 over the step's content fields (not its lifecycle state).
pub fn step_digest(step: &Step) -> WorkflowResult<String> {
    let view = DigestView {
        id: &step.id,
        kind: step.kind,
        goal: &step.goal,
        allowed_files: &step.allowed_files,
        forbidden_patterns: &step.forbidden_patterns,
        features: &step.features,
        fixes_deviation_ids: &step.fixes_deviation_ids,
        blocked_by: &step.blocked_by,
    };
    let bytes = serde_json::to_vec(&view).map_err(StateError::from)?;
    let mut h = Sha256::new();
    h.update(&bytes);
    Ok(hex::encode(h.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::{Deviation, Severity};

    #[test]
    fn digest_ignores_lifecycle_state() {
        let mut step = Step::new("s1", StepKind::Implementation, "goal");
        let before = step_digest(&step).unwrap();
        step.state = StepState::VerifiedPass;
        assert_eq!(step_digest(&step).unwrap(), before);
        step.allowed_files.insert("a.rs".into());
        assert_ne!(step_digest(&step).unwrap(), before);
    }

    #[test]
    fn new_directories_lists_every_unknown_ancestor() {
        let modified: BTreeSet<String> = ["src/new/deep/a.rs".to_string(), "top.rs".to_string()].into();
        let known: BTreeSet<String> = ["src".to_string()].into();
        let dirs: Vec<_> = new_directories(&modified, &known).into_iter().collect();
        assert_eq!(dirs, vec!["src/new".to_string(), "src/new/deep".to_string()]);
    }

    #[test]
    fn draft_drops_unknown_and_resolved_fix_ids() {
        let mut reg = DeviationRegistry::new();
        reg.record(Deviation::new("open-one", "d", Severity::High)).unwrap();
        reg.record(Deviation::new("done-one", "d", Severity::Low)).unwrap();
        reg.resolve(&[DeviationId::from("done-one")].into(), &StepId::from("s0"));
        let draft = StepDraft {
            id: "s1".into(),
            goal: "fix".into(),
            allowed_files: vec!["./src/a.rs".into(), ".sentinel/state.json".into()],
            fixes_deviation_ids: vec!["open-one".into(), "done-one".into(), "ghost".into()],
            ..Default::default()
        };
        let step = step_from_draft(draft, &reg).unwrap();
        assert_eq!(step.fixes_deviation_ids, [DeviationId::from("open-one")].into());
        assert_eq!(step.allowed_files, ["src/a.rs".to_string()].into());
    }

    #[test]
    fn draft_may_not_be_blocked_kind() {
        let draft = StepDraft { id: "s1".into(), goal: "g".into(), kind: StepKind::Blocked, ..Default::default() };
        let err = step_from_draft(draft, &DeviationRegistry::new()).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidDraft { .. }));
    }

    #[test]
    fn merged_forbidden_dedups() {
        let repo = RepoConfig { must_not: vec!["No UI".into()], ..Default::default() };
        let mut step = Step::new("s", StepKind::Implementation, "g");
        step.forbidden_patterns.insert("No UI".into());
        step.forbidden_patterns.insert("No SQL".into());
        assert_eq!(merged_forbidden(&repo, &step), vec!["No UI".to_string(), "No SQL".to_string()]);
    }
}
