//! Domain types for the sentinel state directory.
//!
//! Every type here is persisted either as YAML (human-edited files) or JSON
//! (machine state). Path-like fields that describe repository contents are
//! repo-relative `String`s with `/` separators, exactly as git reports them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identifier of a step, unique within one repository's history.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StepId(pub String);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for StepId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StepId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Stable identifier of a deviation record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviationId(pub String);

impl fmt::Display for DeviationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for DeviationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviationId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// What a step is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Documents the current state of the repository; changes nothing.
    Verification,
    #[default]
    Implementation,
    /// Placeholder emitted while a dependency has open high-severity deviations.
    Blocked,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Verification => write!(f, "verification"),
            StepKind::Implementation => write!(f, "implementation"),
            StepKind::Blocked => write!(f, "blocked"),
        }
    }
}

/// Lifecycle position of the current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    #[default]
    Proposed,
    Compiled,
    VerifiedPass,
    VerifiedFail,
    Accepted,
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepState::Proposed => write!(f, "PROPOSED"),
            StepState::Compiled => write!(f, "COMPILED"),
            StepState::VerifiedPass => write!(f, "VERIFIED_PASS"),
            StepState::VerifiedFail => write!(f, "VERIFIED_FAIL"),
            StepState::Accepted => write!(f, "ACCEPTED"),
        }
    }
}

/// Where the content of a step came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepSource {
    FirstRun,
    Blocker,
    Plan,
    #[default]
    Reviewer,
}

/// Outcome of a verify call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerifyStatus {
    Pass,
    Fail,
}

impl fmt::Display for VerifyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyStatus::Pass => write!(f, "PASS"),
            VerifyStatus::Fail => write!(f, "FAIL"),
        }
    }
}

/// The gate that produced a violation.
///
/// Only [`Gate::Allowlist`] is hard. Pattern and semantic findings come from
/// best-effort checks and are reported under their own tag so they are never
/// mistaken for an allowlist breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gate {
    Allowlist,
    Pattern,
    Semantic,
}

impl Gate {
    pub fn is_hard(self) -> bool {
        matches!(self, Gate::Allowlist)
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gate::Allowlist => write!(f, "allowlist"),
            Gate::Pattern => write!(f, "pattern"),
            Gate::Semantic => write!(f, "semantic"),
        }
    }
}

/// Deviation severity. Ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::High, Severity::Medium, Severity::Low];
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::High => write!(f, "HIGH"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::Low => write!(f, "LOW"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Severity::High),
            "medium" | "med" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviationStatus {
    #[default]
    Open,
    Resolved,
}

impl fmt::Display for DeviationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviationStatus::Open => write!(f, "OPEN"),
            DeviationStatus::Resolved => write!(f, "RESOLVED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// Reference from a blocked step to the dependency deviation that blocks it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedBy {
    pub repo: String,
    pub deviation_id: DeviationId,
}

/// One gated unit of work (`step.yaml`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub kind: StepKind,
    pub goal: String,
    #[serde(default)]
    pub allowed_files: BTreeSet<String>,
    #[serde(default)]
    pub forbidden_patterns: BTreeSet<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub fixes_deviation_ids: BTreeSet<DeviationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<BlockedBy>,
    #[serde(default)]
    pub state: StepState,
    #[serde(default)]
    pub source: StepSource,
    pub created_at: DateTime<Utc>,
}

impl Step {
    /// A fresh `Proposed` step with no constraints.
    pub fn new(id: impl Into<StepId>, kind: StepKind, goal: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            goal: goal.into(),
            allowed_files: BTreeSet::new(),
            forbidden_patterns: BTreeSet::new(),
            features: Vec::new(),
            fixes_deviation_ids: BTreeSet::new(),
            blocked_by: None,
            state: StepState::Proposed,
            source: StepSource::default(),
            created_at: Utc::now(),
        }
    }

    /// `true` while the step still occupies the "current step" slot.
    pub fn is_pending(&self) -> bool {
        self.state != StepState::Accepted
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub gate: Gate,
    pub message: String,
}

impl Violation {
    pub fn new(gate: Gate, message: impl Into<String>) -> Self {
        Self { gate, message: message.into() }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.gate, self.message)
    }
}

/// Result of checking the current step against observed changes (`verdict.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyVerdict {
    pub step_id: StepId,
    pub status: VerifyStatus,
    pub modified_files: BTreeSet<String>,
    #[serde(default)]
    pub violations: Vec<Violation>,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Set when the first-run rule overrode the gate outcome.
    #[serde(default)]
    pub forced_baseline: bool,
    /// Content digest of the step at verify time.
    #[serde(default)]
    pub step_digest: String,
    pub timestamp: DateTime<Utc>,
}

impl VerifyVerdict {
    pub fn passed(&self) -> bool {
        self.status == VerifyStatus::Pass
    }

    pub fn hard_violations(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.gate.is_hard())
    }

    pub fn soft_violations(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| !v.gate.is_hard())
    }
}

// ---------------------------------------------------------------------------
// Deviation
// ---------------------------------------------------------------------------

/// A recorded gap between the target architecture and the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deviation {
    pub id: DeviationId,
    pub description: String,
    pub severity: Severity,
    #[serde(default)]
    pub affected_files: BTreeSet<String>,
    #[serde(default)]
    pub status: DeviationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by_step: Option<StepId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub reopened_count: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl Deviation {
    /// An `Open` deviation detected now.
    pub fn new(
        id: impl Into<DeviationId>,
        description: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            severity,
            affected_files: BTreeSet::new(),
            status: DeviationStatus::Open,
            resolved_by_step: None,
            detected_at: Some(Utc::now()),
            reopened_count: 0,
        }
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.affected_files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_open(&self) -> bool {
        self.status == DeviationStatus::Open
    }
}

// ---------------------------------------------------------------------------
// Baseline
// ---------------------------------------------------------------------------

/// Structural fingerprint of a repository tree (`baseline_snapshot.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineSnapshot {
    pub timestamp: DateTime<Utc>,
    pub files: BTreeSet<String>,
    pub directories: BTreeSet<String>,
    pub file_type_histogram: BTreeMap<String, usize>,
    #[serde(default)]
    pub key_files_present: BTreeMap<String, bool>,
}

// ---------------------------------------------------------------------------
// Audit state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoneStep {
    pub step_id: StepId,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only audit record for one repository (`state.json`).
///
/// `done_steps` only ever grows. The `last_verify_*` scalars are the only
/// fields rewritten in place, once per verify call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AuditState {
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub done_steps: Vec<DoneStep>,
    #[serde(default)]
    pub invariants: Vec<String>,
    #[serde(default)]
    pub last_verify_status: Option<VerifyStatus>,
    #[serde(default)]
    pub last_verify_step: Option<StepId>,
    #[serde(default)]
    pub last_verify_timestamp: Option<DateTime<Utc>>,
}

impl AuditState {
    pub fn new(repo: impl Into<String>) -> Self {
        Self { repo: repo.into(), ..Self::default() }
    }

    pub fn is_done(&self, id: &StepId) -> bool {
        self.done_steps.iter().any(|d| &d.step_id == id)
    }

    /// `true` until the first verify call has been recorded.
    pub fn never_verified(&self) -> bool {
        self.last_verify_status.is_none()
    }

    pub fn record_verify(&mut self, status: VerifyStatus, step: &StepId, at: DateTime<Utc>) {
        self.last_verify_status = Some(status);
        self.last_verify_step = Some(step.clone());
        self.last_verify_timestamp = Some(at);
    }

    pub fn append_done(&mut self, entry: DoneStep) {
        self.done_steps.push(entry);
    }

    /// Adds an invariant unless an identical line is already recorded.
    pub fn add_invariant(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if self.invariants.iter().any(|i| *i == text) {
            return false;
        }
        self.invariants.push(text);
        true
    }
}

// ---------------------------------------------------------------------------
// Repository identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub repo: String,
    #[serde(default)]
    pub via: String,
}

/// Human-written repository identity and constraints (`repo.yaml`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RepoConfig {
    pub repo_name: String,
    #[serde(default)]
    pub repo_role: String,
    /// Forbidden patterns applied to every step in this repository.
    #[serde(default)]
    pub must_not: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<Dependency>,
}

// ---------------------------------------------------------------------------
// External state
// ---------------------------------------------------------------------------

/// Read-only projection of one dependency repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRepo {
    pub path: PathBuf,
    pub last_synced: DateTime<Utc>,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub high_severity_open_deviations: Vec<Deviation>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub done_steps: usize,
}

/// Derived cross-repository view (`external_state.json`). Regenerated on every sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalState {
    pub synced_at: DateTime<Utc>,
    #[serde(default)]
    pub repos: BTreeMap<String, ExternalRepo>,
    #[serde(default)]
    pub cycles: Vec<Vec<String>>,
}
