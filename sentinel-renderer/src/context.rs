//! Template context: the serializable payload handed to Tera.

use chrono::{DateTime, Utc};
use serde::Serialize;

use sentinel_core::{DeviationRegistry, RepoConfig, Step, VerifyVerdict};

use crate::error::RenderError;

/// Rendering payload for the compile artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct StepContext {
    pub repo: RepoCtx,
    pub step: StepCtx,
    /// Repo-level `must_not` followed by the step's own forbidden patterns.
    pub forbidden: Vec<String>,
    /// Registry entries named in `fixes_deviation_ids`.
    pub deviations: Vec<DeviationCtx>,
    pub invariants: Vec<String>,
    pub meta: MetaCtx,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepoCtx {
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepCtx {
    pub id: String,
    pub kind: String,
    pub goal: String,
    pub allowed_files: Vec<String>,
    pub features: Vec<String>,
    pub fixes_deviation_ids: Vec<String>,
    pub blocked_by: Option<BlockedCtx>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockedCtx {
    pub repo: String,
    pub deviation_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviationCtx {
    pub id: String,
    pub severity: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetaCtx {
    pub sentinel_version: String,
    pub rendered_at: DateTime<Utc>,
}

impl StepContext {
    pub fn new(step: &Step, repo_name: impl Into<String>) -> Self {
        Self {
            repo: RepoCtx { name: repo_name.into(), role: String::new() },
            step: StepCtx {
                id: step.id.0.clone(),
                kind: step.kind.to_string(),
                goal: step.goal.clone(),
                allowed_files: step.allowed_files.iter().cloned().collect(),
                features: step.features.clone(),
                fixes_deviation_ids: step.fixes_deviation_ids.iter().map(|d| d.0.clone()).collect(),
                blocked_by: step.blocked_by.as_ref().map(|b| BlockedCtx {
                    repo: b.repo.clone(),
                    deviation_id: b.deviation_id.0.clone(),
                }),
            },
            forbidden: step.forbidden_patterns.iter().cloned().collect(),
            deviations: Vec::new(),
            invariants: Vec::new(),
            meta: MetaCtx {
                sentinel_version: env!("CARGO_PKG_VERSION").to_string(),
                rendered_at: Utc::now(),
            },
        }
    }

    /// Adds the repository role and its `must_not` list.
    pub fn with_repo(mut self, repo: &RepoConfig) -> Self {
        self.repo.role = repo.repo_role.clone();
        let mut forbidden = repo.must_not.clone();
        for p in self.forbidden.drain(..) {
            if !forbidden.contains(&p) {
                forbidden.push(p);
            }
        }
        self.forbidden = forbidden;
        self
    }

    /// Resolves the step's deviation ids against the registry. Unknown ids
    /// are skipped.
    pub fn with_deviations(mut self, registry: &DeviationRegistry) -> Self {
        self.deviations = self
            .step
            .fixes_deviation_ids
            .iter()
            .filter_map(|id| registry.get(&id.as_str().into()))
            .map(|d| DeviationCtx {
                id: d.id.0.clone(),
                severity: d.severity.to_string(),
                description: d.description.clone(),
            })
            .collect();
        self
    }

    pub fn with_invariants(mut self, invariants: &[String]) -> Self {
        self.invariants = invariants.to_vec();
        self
    }

    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}

/// Rendering payload for `repair.md`.
#[derive(Debug, Clone, Serialize)]
pub struct RepairContext {
    #[serde(flatten)]
    pub base: StepContext,
    pub verdict: VerdictCtx,
    pub hard: Vec<String>,
    pub soft: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerdictCtx {
    pub status: String,
    pub timestamp: String,
    pub warnings: Vec<String>,
}

impl RepairContext {
    pub fn new(base: StepContext, verdict: &VerifyVerdict) -> Self {
        Self {
            base,
            verdict: VerdictCtx {
                status: verdict.status.to_string(),
                timestamp: verdict.timestamp.to_rfc3339(),
                warnings: verdict.warnings.clone(),
            },
            hard: verdict.hard_violations().map(|v| v.message.clone()).collect(),
            soft: verdict.soft_violations().map(|v| v.to_string()).collect(),
        }
    }

    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::{Deviation, Severity, StepKind};

    fn step() -> Step {
        let mut s = Step::new("s1", StepKind::Implementation, "Move UI out of API");
        s.allowed_files.insert("api/routes.js".into());
        s.forbidden_patterns.insert("No UI".into());
        s.fixes_deviation_ids.insert("ui-in-api".into());
        s.fixes_deviation_ids.insert("unknown".into());
        s
    }

    #[test]
    fn repo_must_not_comes_first_without_duplicates() {
        let repo = RepoConfig {
            repo_name: "api".into(),
            repo_role: "backend".into(),
            must_not: vec!["No UI".into(), "No database".into()],
            depends_on: vec![],
        };
        let ctx = StepContext::new(&step(), "api").with_repo(&repo);
        assert_eq!(ctx.forbidden, vec!["No UI".to_string(), "No database".to_string()]);
        assert_eq!(ctx.repo.role, "backend");
    }

    #[test]
    fn unknown_deviation_ids_are_skipped() {
        let mut reg = DeviationRegistry::new();
        reg.record(Deviation::new("ui-in-api", "UI code lives in the API", Severity::High))
            .unwrap();
        let ctx = StepContext::new(&step(), "api").with_deviations(&reg);
        assert_eq!(ctx.deviations.len(), 1);
        assert_eq!(ctx.deviations[0].severity, "HIGH");
    }

    #[test]
    fn to_tera_context_succeeds() {
        let ctx = StepContext::new(&step(), "api");
        assert!(ctx.to_tera_context().is_ok());
    }
}
