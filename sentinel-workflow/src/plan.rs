//! Implementation plan overlay (`implementation_plan.yaml`).
//!
//! A plan is an ordered list of phases, each an ordered list of step specs.
//! Progress is always recomputed from step statuses; nothing is cached.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sentinel_core::store::PLAN_FILE;
use sentinel_core::{DeviationId, DeviationRegistry, Severity, StateStore, Step, StepId, StepKind, StepSource};

use crate::changes::is_state_path;
use crate::error::WorkflowResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStatus::NotStarted => write!(f, "NOT_STARTED"),
            PlanStatus::InProgress => write!(f, "IN_PROGRESS"),
            PlanStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub repo_name: String,
    /// How the plan was produced (`deviations`, `manual`, ...).
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub step_id: StepId,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "scope")]
    pub goal: String,
    #[serde(default, alias = "files_to_modify")]
    pub allowed_files: Vec<String>,
    #[serde(default)]
    pub forbidden_patterns: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub fixes_deviation_ids: Vec<DeviationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<String>,
    #[serde(default)]
    pub status: PlanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub files_changed: Vec<String>,
}

impl PlanStep {
    pub fn is_completed(&self) -> bool {
        self.status == PlanStatus::Completed
    }

    /// The workflow step this entry describes.
    pub fn to_step(&self) -> Step {
        let goal = if self.goal.trim().is_empty() { self.name.clone() } else { self.goal.clone() };
        let mut step = Step::new(self.step_id.clone(), StepKind::Implementation, goal);
        step.allowed_files = self.allowed_files.iter().cloned().collect();
        step.forbidden_patterns = self.forbidden_patterns.iter().cloned().collect();
        step.features = self.features.clone();
        step.fixes_deviation_ids = self.fixes_deviation_ids.iter().cloned().collect();
        step.source = StepSource::Plan;
        step
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

impl Phase {
    pub fn completed_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.is_completed()).count()
    }

    pub fn status(&self) -> PlanStatus {
        if !self.steps.is_empty() && self.steps.iter().all(PlanStep::is_completed) {
            PlanStatus::Completed
        } else if self.steps.iter().any(|s| s.status != PlanStatus::NotStarted) {
            PlanStatus::InProgress
        } else {
            PlanStatus::NotStarted
        }
    }
}

/// Result of [`Plan::mark_completed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Completed,
    AlreadyCompleted,
    NotInPlan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub metadata: PlanMetadata,
    #[serde(default)]
    pub phases: Vec<Phase>,
}

// ---------------------------------------------------------------------------
// Queries and updates
// ---------------------------------------------------------------------------

impl Plan {
    pub fn new(repo_name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            metadata: PlanMetadata {
                created: Utc::now(),
                repo_name: repo_name.into(),
                source: source.into(),
            },
            phases: Vec::new(),
        }
    }

    pub fn load(store: &StateStore) -> WorkflowResult<Option<Plan>> {
        let plan: Option<Plan> = store.read_yaml(PLAN_FILE)?;
        if let Some(plan) = &plan {
            for id in plan.duplicate_ids() {
                tracing::warn!(step = %id, "plan lists this step id more than once; the first entry wins");
            }
        }
        Ok(plan)
    }

    pub fn save(&self, store: &StateStore) -> WorkflowResult<()> {
        Ok(store.write_yaml(PLAN_FILE, self)?)
    }

    /// Every step in phase order, then step order.
    pub fn steps(&self) -> impl Iterator<Item = (&Phase, &PlanStep)> {
        self.phases.iter().flat_map(|p| p.steps.iter().map(move |s| (p, s)))
    }

    pub fn total_steps(&self) -> usize {
        self.phases.iter().map(|p| p.steps.len()).sum()
    }

    pub fn completed_steps(&self) -> usize {
        self.phases.iter().map(Phase::completed_steps).sum()
    }

    /// Completed / total as a percentage. An empty plan is 0%.
    pub fn progress(&self) -> f64 {
        let total = self.total_steps();
        if total == 0 {
            return 0.0;
        }
        self.completed_steps() as f64 * 100.0 / total as f64
    }

    /// First step, in phase then step order, that is not completed.
    pub fn next_incomplete(&self) -> Option<&PlanStep> {
        self.steps().map(|(_, s)| s).find(|s| !s.is_completed())
    }

    pub fn find(&self, id: &StepId) -> Option<(&Phase, &PlanStep)> {
        self.steps().find(|(_, s)| &s.step_id == id)
    }

    fn find_mut(&mut self, id: &StepId) -> Option<&mut PlanStep> {
        self.phases
            .iter_mut()
            .flat_map(|p| p.steps.iter_mut())
            .find(|s| &s.step_id == id)
    }

    /// Moves a NOT_STARTED step to IN_PROGRESS. Returns whether it changed.
    pub fn mark_in_progress(&mut self, id: &StepId) -> bool {
        match self.find_mut(id) {
            Some(s) if s.status == PlanStatus::NotStarted => {
                s.status = PlanStatus::InProgress;
                true
            }
            _ => false,
        }
    }

    /// Moves an IN_PROGRESS step back to NOT_STARTED (abandoned step).
    pub fn reset(&mut self, id: &StepId) -> bool {
        match self.find_mut(id) {
            Some(s) if s.status == PlanStatus::InProgress => {
                s.status = PlanStatus::NotStarted;
                true
            }
            _ => false,
        }
    }

    /// Records completion. Idempotent: a completed step keeps its original
    /// `completed_at` and `files_changed`.
    pub fn mark_completed<I, S>(&mut self, id: &StepId, files_changed: I) -> MarkOutcome
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let Some(step) = self.find_mut(id) else {
            return MarkOutcome::NotInPlan;
        };
        if step.is_completed() {
            return MarkOutcome::AlreadyCompleted;
        }
        step.status = PlanStatus::Completed;
        step.completed_at = Some(Utc::now());
        step.files_changed = files_changed
            .into_iter()
            .map(Into::into)
            .filter(|f: &String| !is_state_path(f))
            .collect();
        MarkOutcome::Completed
    }

    /// One phase per severity with open deviations (HIGH first), one step
    /// per deviation, ordered by id within a phase.
    pub fn from_deviations(registry: &DeviationRegistry, repo_name: impl Into<String>) -> Self {
        let mut plan = Plan::new(repo_name, "deviations");
        for severity in Severity::ALL {
            let open = registry.open_by_severity(severity);
            if open.is_empty() {
                continue;
            }
            let key = severity.to_string().to_lowercase();
            let steps = open
                .into_iter()
                .map(|d| PlanStep {
                    step_id: StepId::from(format!("fix-{}", d.id)),
                    name: format!("Fix {}", d.id),
                    goal: d.description.clone(),
                    allowed_files: d.affected_files.iter().cloned().collect(),
                    forbidden_patterns: Vec::new(),
                    features: vec![format!("Deviation {} no longer applies", d.id)],
                    fixes_deviation_ids: vec![d.id.clone()],
                    estimated_hours: None,
                    risk: Some(key.clone()),
                    status: PlanStatus::NotStarted,
                    completed_at: None,
                    files_changed: Vec::new(),
                })
                .collect();
            plan.phases.push(Phase {
                id: format!("phase-{key}"),
                name: format!("Resolve {severity} deviations"),
                goal: format!("Close every open {severity} deviation"),
                steps,
            });
        }
        plan
    }

    /// Step ids that occur more than once.
    pub fn duplicate_ids(&self) -> BTreeSet<StepId> {
        let mut seen = BTreeSet::new();
        self.steps()
            .filter(|(_, s)| !seen.insert(s.step_id.clone()))
            .map(|(_, s)| s.step_id.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
