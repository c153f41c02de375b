//! Error types for sentinel-workflow.

use std::path::PathBuf;

use thiserror::Error;

use sentinel_core::{ErrorCategory, StateError, StepId, StepState};
use sentinel_gate::GateError;
use sentinel_renderer::RenderError;
use sentinel_snapshot::SnapshotError;

/// All errors that can arise from workflow operations.
///
/// A failing gate is not an error: verify returns a FAIL verdict. Errors are
/// reserved for calls that a structural rule refuses, for a broken
/// environment, and for state that cannot be trusted.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("allowlist error: {0}")]
    Gate(#[from] GateError),

    /// The working directory is not inside a VCS work tree.
    #[error("{path} is not a git repository")]
    NotARepository { path: PathBuf },

    /// The VCS provider failed in a way that is not "not a repository".
    #[error("change provider failed: {0}")]
    Vcs(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("step '{id}' is still pending ({state}); accept or abandon it, or propose with --force")]
    StepAlreadyPending { id: StepId, state: StepState },

    #[error("no step is pending; run `sentinel propose` first")]
    NoPendingStep,

    #[error("cannot {action} step '{id}' while it is {state}")]
    InvalidTransition {
        id: StepId,
        state: StepState,
        action: &'static str,
    },

    #[error("accept blocked: {reason}")]
    AcceptBlocked { reason: String },

    #[error("step '{id}' not found")]
    StepNotFound { id: StepId },

    #[error("step '{id}' is not completed yet")]
    StepNotCompleted { id: StepId },

    #[error("no implementation plan found; run `sentinel plan init` first")]
    PlanNotFound,

    #[error("an implementation plan already exists; use --force to replace it")]
    PlanExists,

    #[error("every plan step is completed")]
    PlanComplete,

    #[error("no baseline snapshot yet; run `sentinel verify` on the first step or `sentinel snapshot`")]
    BaselineMissing,

    #[error("dependency repository at {path} has no state directory")]
    ExternalRepoNotFound { path: PathBuf },

    #[error("step id '{id}' is already in the done history")]
    DuplicateStepId { id: StepId },

    #[error("reviewer draft rejected: {reason}")]
    InvalidDraft { reason: String },

    #[error("no step content available: {reason}")]
    NoDraft { reason: String },

    /// The semantic reviewer failed outright. Never affects hard gates.
    #[error("reviewer error: {0}")]
    Reviewer(String),
}

impl WorkflowError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            WorkflowError::State(e) => e.category(),
            WorkflowError::Snapshot(SnapshotError::State(e)) => e.category(),
            WorkflowError::NotARepository { .. }
            | WorkflowError::Config(_)
            | WorkflowError::Gate(_) => ErrorCategory::Config,
            WorkflowError::StepAlreadyPending { .. }
            | WorkflowError::NoPendingStep
            | WorkflowError::InvalidTransition { .. }
            | WorkflowError::AcceptBlocked { .. }
            | WorkflowError::StepNotFound { .. }
            | WorkflowError::StepNotCompleted { .. }
            | WorkflowError::PlanNotFound
            | WorkflowError::PlanExists
            | WorkflowError::PlanComplete
            | WorkflowError::BaselineMissing
            | WorkflowError::ExternalRepoNotFound { .. }
            | WorkflowError::DuplicateStepId { .. }
            | WorkflowError::InvalidDraft { .. }
            | WorkflowError::NoDraft { .. } => ErrorCategory::Precondition,
            WorkflowError::Snapshot(_)
            | WorkflowError::Render(_)
            | WorkflowError::Vcs(_)
            | WorkflowError::Reviewer(_) => ErrorCategory::Runtime,
        }
    }

    /// Process exit code for this error. `1` is reserved for a FAIL verdict.
    pub fn exit_code(&self) -> i32 {
        exit_code_for(self.category())
    }
}

pub fn exit_code_for(category: ErrorCategory) -> i32 {
    match category {
        ErrorCategory::Config => 2,
        ErrorCategory::Precondition => 3,
        ErrorCategory::Integrity => 4,
        ErrorCategory::Runtime => 5,
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
