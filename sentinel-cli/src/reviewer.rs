//! Offline reviewer used by the CLI.

use sentinel_core::{BaselineSnapshot, Deviation, Step};
use sentinel_workflow::architecture::parse_known_deviations;
use sentinel_workflow::{
    FeatureStatus, FeatureVerdict, ProposeContext, SemanticReviewer, StepDraft, WorkflowResult,
};

/// Drafts come from command-line flags, deviations from the
/// `## Known Deviations` section of `architecture.md`. Features are never
/// judged, so they come back `unclear`.
#[derive(Debug, Clone, Default)]
pub struct LocalReviewer {
    draft: Option<StepDraft>,
}

impl LocalReviewer {
    pub fn with_draft(draft: Option<StepDraft>) -> Self {
        Self { draft }
    }
}

impl SemanticReviewer for LocalReviewer {
    fn propose_step(&self, ctx: &ProposeContext<'_>) -> WorkflowResult<Option<StepDraft>> {
        if self.draft.is_none() {
            tracing::debug!(
                repo = ctx.repo_name,
                open = ctx.open_deviations.len(),
                "no draft given on the command line"
            );
        }
        Ok(self.draft.clone())
    }

    fn check_features(&self, step: &Step, _diff: &str) -> WorkflowResult<Vec<FeatureVerdict>> {
        Ok(step
            .features
            .iter()
            .map(|f| FeatureVerdict {
                feature: f.clone(),
                status: FeatureStatus::Unclear,
                note: "no semantic reviewer configured".to_string(),
            })
            .collect())
    }

    fn detect_deviations(
        &self,
        architecture: &str,
        _snapshot: &BaselineSnapshot,
    ) -> WorkflowResult<Vec<Deviation>> {
        Ok(parse_known_deviations(architecture))
    }
}
