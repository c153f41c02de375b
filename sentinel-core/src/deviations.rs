//! Deviation registry: id → record, persisted as `deviations.yaml`.
//!
//! On disk the registry is a plain list ordered by id. In memory it keeps the
//! same ordering, so every query is stable without re-sorting.
//!
//! Rules enforced here:
//! - a RESOLVED record always carries `resolved_by_step`
//! - [`DeviationRegistry::record`] never reopens a resolved record; only
//!   [`DeviationRegistry::detection_pass`] does
//! - resolving twice is a no-op (first writer wins)

use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::types::{Deviation, DeviationId, DeviationStatus, Severity, StepId};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What [`DeviationRegistry::record`] did with an incoming record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Inserted,
    /// Same id and description; severity or affected files changed.
    Updated,
    Unchanged,
    /// The id is resolved; the incoming record was ignored.
    AlreadyResolved,
}

/// Result of [`DeviationRegistry::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOutcome {
    /// Ids that were OPEN and are now RESOLVED.
    pub resolved: BTreeSet<DeviationId>,
    /// Ids that were unknown or already resolved.
    pub noops: BTreeSet<DeviationId>,
}

/// Result of [`DeviationRegistry::detection_pass`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionOutcome {
    pub added: Vec<DeviationId>,
    pub reopened: Vec<DeviationId>,
    pub updated: Vec<DeviationId>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviationRegistry {
    entries: Vec<Deviation>,
}

impl DeviationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from loaded records, rejecting duplicate ids and
    /// resolved records without a resolving step.
    pub fn from_entries(mut entries: Vec<Deviation>) -> Result<Self, String> {
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        for pair in entries.windows(2) {
            if pair[0].id == pair[1].id {
                return Err(format!("deviation id '{}' appears more than once", pair[0].id));
            }
        }
        if let Some(bad) = entries
            .iter()
            .find(|d| d.status == DeviationStatus::Resolved && d.resolved_by_step.is_none())
        {
            return Err(format!("deviation '{}' is resolved but names no resolving step", bad.id));
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Deviation> {
        self.entries.iter()
    }

    pub fn get(&self, id: &DeviationId) -> Option<&Deviation> {
        self.position(id).ok().map(|i| &self.entries[i])
    }

    pub fn open_ids(&self) -> BTreeSet<DeviationId> {
        self.entries
            .iter()
            .filter(|d| d.is_open())
            .map(|d| d.id.clone())
            .collect()
    }

    /// Open deviations of the given severity, ordered by id.
    pub fn open_by_severity(&self, severity: Severity) -> Vec<&Deviation> {
        self.entries
            .iter()
            .filter(|d| d.is_open() && d.severity == severity)
            .collect()
    }

    /// Inserts or updates a record by id.
    ///
    /// Errors with [`StateError::DuplicateIdConflict`] when an OPEN record
    /// with the same id has a different description.
    pub fn record(&mut self, incoming: Deviation) -> Result<RecordOutcome, StateError> {
        match self.position(&incoming.id) {
            Err(at) => {
                let mut incoming = incoming;
                incoming.status = DeviationStatus::Open;
                incoming.resolved_by_step = None;
                if incoming.detected_at.is_none() {
                    incoming.detected_at = Some(Utc::now());
                }
                self.entries.insert(at, incoming);
                Ok(RecordOutcome::Inserted)
            }
            Ok(i) => {
                let existing = &mut self.entries[i];
                if !existing.is_open() {
                    return Ok(RecordOutcome::AlreadyResolved);
                }
                if existing.description != incoming.description {
                    return Err(StateError::DuplicateIdConflict {
                        id: incoming.id,
                        existing: existing.description.clone(),
                        incoming: incoming.description,
                    });
                }
                if existing.severity == incoming.severity
                    && existing.affected_files == incoming.affected_files
                {
                    return Ok(RecordOutcome::Unchanged);
                }
                existing.severity = incoming.severity;
                existing.affected_files = incoming.affected_files;
                Ok(RecordOutcome::Updated)
            }
        }
    }

    /// Marks the given OPEN deviations as resolved by `by_step`.
    ///
    /// Unknown and already-resolved ids are left alone and reported as no-ops.
    pub fn resolve(&mut self, ids: &BTreeSet<DeviationId>, by_step: &StepId) -> ResolveOutcome {
        let mut outcome = ResolveOutcome::default();
        for id in ids {
            match self.position(id) {
                Ok(i) if self.entries[i].is_open() => {
                    let d = &mut self.entries[i];
                    d.status = DeviationStatus::Resolved;
                    d.resolved_by_step = Some(by_step.clone());
                    outcome.resolved.insert(id.clone());
                }
                _ => {
                    outcome.noops.insert(id.clone());
                }
            }
        }
        outcome
    }

    /// Applies a fresh detection run.
    ///
    /// Unlike [`record`](Self::record), a detected id that is currently
    /// RESOLVED is reopened. This is the only path that reopens.
    pub fn detection_pass(
        &mut self,
        detected: Vec<Deviation>,
    ) -> Result<DetectionOutcome, StateError> {
        let mut outcome = DetectionOutcome::default();
        for incoming in detected {
            if let Ok(i) = self.position(&incoming.id) {
                let existing = &mut self.entries[i];
                if !existing.is_open() {
                    existing.status = DeviationStatus::Open;
                    existing.resolved_by_step = None;
                    existing.reopened_count += 1;
                    existing.description = incoming.description;
                    existing.severity = incoming.severity;
                    existing.affected_files = incoming.affected_files;
                    existing.detected_at = Some(Utc::now());
                    outcome.reopened.push(existing.id.clone());
                    continue;
                }
            }
            let id = incoming.id.clone();
            match self.record(incoming)? {
                RecordOutcome::Inserted => outcome.added.push(id),
                RecordOutcome::Updated => outcome.updated.push(id),
                RecordOutcome::Unchanged | RecordOutcome::AlreadyResolved => {}
            }
        }
        Ok(outcome)
    }

    fn position(&self, id: &DeviationId) -> Result<usize, usize> {
        self.entries.binary_search_by(|d| d.id.cmp(id))
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> BTreeSet<DeviationId> {
        list.iter().map(|s| DeviationId::from(*s)).collect()
    }

    fn registry() -> DeviationRegistry {
        let mut reg = DeviationRegistry::new();
        reg.record(Deviation::new("b-missing-tests", "no tests", Severity::Medium)).unwrap();
        reg.record(Deviation::new("a-ui-in-api", "UI code in API", Severity::High)).unwrap();
        reg
    }

    #[test]
    fn entries_stay_sorted_by_id() {
        let reg = registry();
        let order: Vec<_> = reg.iter().map(|d| d.id.0.as_str()).collect();
        assert_eq!(order, vec!["a-ui-in-api", "b-missing-tests"]);
    }

    #[test]
    fn conflicting_description_is_rejected() {
        let mut reg = registry();
        let err = reg
            .record(Deviation::new("a-ui-in-api", "something else", Severity::High))
            .unwrap_err();
        assert!(matches!(err, StateError::DuplicateIdConflict { .. }));
    }

    #[test]
    fn same_description_updates_severity() {
        let mut reg = registry();
        let out = reg.record(Deviation::new("a-ui-in-api", "UI code in API", Severity::Low)).unwrap();
        assert_eq!(out, RecordOutcome::Updated);
        assert_eq!(reg.get(&"a-ui-in-api".into()).unwrap().severity, Severity::Low);
    }

    #[test]
    fn first_resolver_wins() {
        let mut reg = registry();
        let first = reg.resolve(&ids(&["a-ui-in-api"]), &StepId::from("s1"));
        assert_eq!(first.resolved, ids(&["a-ui-in-api"]));

        let second = reg.resolve(&ids(&["a-ui-in-api"]), &StepId::from("s2"));
        assert!(second.resolved.is_empty());
        assert_eq!(second.noops, ids(&["a-ui-in-api"]));

        let d = reg.get(&"a-ui-in-api".into()).unwrap();
        assert_eq!(d.status, DeviationStatus::Resolved);
        assert_eq!(d.resolved_by_step, Some(StepId::from("s1")));
    }

    #[test]
    fn unknown_ids_are_reported_as_noops() {
        let mut reg = registry();
        let out = reg.resolve(&ids(&["nope", "b-missing-tests"]), &StepId::from("s1"));
        assert_eq!(out.resolved, ids(&["b-missing-tests"]));
        assert_eq!(out.noops, ids(&["nope"]));
    }

    #[test]
    fn record_does_not_reopen_resolved() {
        let mut reg = registry();
        reg.resolve(&ids(&["a-ui-in-api"]), &StepId::from("s1"));
        let out = reg
            .record(Deviation::new("a-ui-in-api", "UI code in API", Severity::High))
            .unwrap();
        assert_eq!(out, RecordOutcome::AlreadyResolved);
        assert!(!reg.get(&"a-ui-in-api".into()).unwrap().is_open());
    }

    #[test]
    fn detection_pass_reopens_resolved() {
        let mut reg = registry();
        reg.resolve(&ids(&["a-ui-in-api"]), &StepId::from("s1"));
        let out = reg
            .detection_pass(vec![
                Deviation::new("a-ui-in-api", "UI code in API", Severity::High),
                Deviation::new("c-new", "new finding", Severity::Low),
            ])
            .unwrap();
        assert_eq!(out.reopened, vec![DeviationId::from("a-ui-in-api")]);
        assert_eq!(out.added, vec![DeviationId::from("c-new")]);
        let d = reg.get(&"a-ui-in-api".into()).unwrap();
        assert!(d.is_open());
        assert_eq!(d.resolved_by_step, None);
        assert_eq!(d.reopened_count, 1);
    }

    #[test]
    fn open_by_severity_filters_resolved() {
        let mut reg = registry();
        assert_eq!(reg.open_by_severity(Severity::High).len(), 1);
        reg.resolve(&ids(&["a-ui-in-api"]), &StepId::from("s1"));
        assert!(reg.open_by_severity(Severity::High).is_empty());
    }

    #[test]
    fn from_entries_rejects_duplicates() {
        let d = Deviation::new("x", "desc", Severity::Low);
        assert!(DeviationRegistry::from_entries(vec![d.clone(), d]).is_err());
    }

    #[test]
    fn from_entries_rejects_resolved_without_step() {
        let mut d = Deviation::new("x", "desc", Severity::Low);
        d.status = DeviationStatus::Resolved;
        assert!(DeviationRegistry::from_entries(vec![d]).is_err());
    }
}
