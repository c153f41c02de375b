//! Sentinel core library: domain types, state-directory persistence, the
//! deviation registry, and the error taxonomy.
//!
//! - [`types`]: steps, verdicts, deviations, audit state, external state
//! - [`store`]: [`StateStore`] atomic file I/O and the [`StateLock`]
//! - [`deviations`]: [`DeviationRegistry`]
//! - [`config`]: `config.yaml`
//! - [`error`]: [`StateError`], [`ErrorCategory`]

pub mod config;
pub mod deviations;
pub mod error;
pub mod store;
pub mod types;

pub use config::SentinelConfig;
pub use deviations::{DetectionOutcome, DeviationRegistry, RecordOutcome, ResolveOutcome};
pub use error::{ErrorCategory, StateError};
pub use store::{StateLock, StateStore, WriteMode};
pub use types::{
    AuditState, BaselineSnapshot, BlockedBy, Dependency, Deviation, DeviationId, DeviationStatus,
    DoneStep, ExternalRepo, ExternalState, Gate, RepoConfig, Severity, Step, StepId, StepKind,
    StepSource, StepState, VerifyStatus, VerifyVerdict, Violation,
};
