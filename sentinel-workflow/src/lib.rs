//! Sentinel workflow: the step state machine and everything it coordinates.
//!
//! - [`controller`]: propose → compile → verify → accept, plus abandon
//! - [`plan`]: the implementation plan overlay
//! - [`external`]: dependency sync and blockers
//! - [`tester`]: feature tests for completed plan steps
//! - [`reviewer`] and [`changes`]: the two collaborator seams
//! - [`init`]: state directory scaffolding
//!
//! The controller never shells out. VCS access and semantic review come in
//! through [`ChangeProvider`] and [`SemanticReviewer`].

pub mod architecture;
pub mod changes;
pub mod controller;
pub mod error;
pub mod external;
pub mod init;
pub mod plan;
pub mod reviewer;
pub mod tester;

pub use changes::{is_state_path, ChangeProvider, ChangeScope, Observation};
pub use controller::{
    step_digest, AcceptResult, ProposeRequest, ProposeSource, StepController, VerifyOutcome,
    BASELINE_STEP_ID,
};
pub use error::{exit_code_for, WorkflowError, WorkflowResult};
pub use external::{blockers_for, find_cycles, sync, Blocker};
pub use init::{init_repo, InitOptions, InitReport};
pub use plan::{MarkOutcome, Phase, Plan, PlanStatus, PlanStep};
pub use reviewer::{
    FeatureStatus, FeatureVerdict, NullReviewer, ProposeContext, SemanticReviewer, StepDraft,
};
pub use tester::{run_feature_tests, StepTestResult, TestOutcome, TestReport};
