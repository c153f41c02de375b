//! Semantic reviewer seam.
//!
//! A reviewer is an untrusted oracle (an LLM, a human, a script). Its output
//! is plain data that the controller validates before use, and nothing it
//! returns can satisfy the allowlist gate.

use serde::{Deserialize, Serialize};

use sentinel_core::{AuditState, BaselineSnapshot, Deviation, RepoConfig, Step, StepKind};

use crate::error::WorkflowResult;

/// What the reviewer sees when asked for the next step.
#[derive(Debug, Clone)]
pub struct ProposeContext<'a> {
    pub repo_name: &'a str,
    pub repo: Option<&'a RepoConfig>,
    pub architecture: &'a str,
    pub state: &'a AuditState,
    pub open_deviations: Vec<&'a Deviation>,
}

/// Unvalidated step content proposed by a reviewer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepDraft {
    pub id: String,
    pub kind: StepKind,
    pub goal: String,
    pub allowed_files: Vec<String>,
    pub forbidden_patterns: Vec<String>,
    pub features: Vec<String>,
    pub fixes_deviation_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    Met,
    NotMet,
    Unclear,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureVerdict {
    pub feature: String,
    pub status: FeatureStatus,
    #[serde(default)]
    pub note: String,
}

pub trait SemanticReviewer {
    /// Next step content, or `None` when the reviewer has nothing to offer.
    fn propose_step(&self, ctx: &ProposeContext<'_>) -> WorkflowResult<Option<StepDraft>>;

    /// One verdict per feature of `step`, judged against `diff`.
    fn check_features(&self, step: &Step, diff: &str) -> WorkflowResult<Vec<FeatureVerdict>>;

    /// Deviations between the architecture document and the snapshot.
    fn detect_deviations(
        &self,
        architecture: &str,
        snapshot: &BaselineSnapshot,
    ) -> WorkflowResult<Vec<Deviation>>;
}

/// Reviewer that never offers anything. The state machine must work with it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReviewer;

impl SemanticReviewer for NullReviewer {
    fn propose_step(&self, _ctx: &ProposeContext<'_>) -> WorkflowResult<Option<StepDraft>> {
        Ok(None)
    }

    fn check_features(&self, step: &Step, _diff: &str) -> WorkflowResult<Vec<FeatureVerdict>> {
        Ok(step
            .features
            .iter()
            .map(|f| FeatureVerdict {
                feature: f.clone(),
                status: FeatureStatus::Unclear,
                note: String::new(),
            })
            .collect())
    }

    fn detect_deviations(
        &self,
        _architecture: &str,
        _snapshot: &BaselineSnapshot,
    ) -> WorkflowResult<Vec<Deviation>> {
        Ok(vec![])
    }
}
