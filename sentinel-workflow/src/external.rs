//! Cross-repository synchronization.
//!
//! [`sync`] reads each dependency's state directory (read-only, no lock) and
//! regenerates `external_state.json` from scratch. [`blockers_for`] turns
//! that projection into the blockers `propose` must honour.
//!
//! A sync is all-or-nothing: if any root is missing or unreadable, nothing
//! is written, because a partial projection would silently drop blockers.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::Utc;

use sentinel_core::{Deviation, ExternalRepo, ExternalState, Severity, StateStore};

use crate::error::{WorkflowError, WorkflowResult};

/// An open HIGH deviation in a dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocker {
    pub repo: String,
    pub deviation: Deviation,
}

/// Rebuilds `external_state.json` for `store` from `dependency_roots`.
pub fn sync(store: &StateStore, dependency_roots: &[PathBuf]) -> WorkflowResult<ExternalState> {
    let now = Utc::now();
    let mut repos: BTreeMap<String, ExternalRepo> = BTreeMap::new();

    for root in dependency_roots {
        let (name, projection) = read_dependency(root)?;
        if repos.contains_key(&name) {
            return Err(WorkflowError::Config(format!(
                "two dependency roots are both named '{name}'"
            )));
        }
        tracing::info!(
            repo = %name,
            blockers = projection.high_severity_open_deviations.len(),
            "dependency synced"
        );
        repos.insert(name, projection);
    }

    let local_name = store.repo_name()?;
    let local_deps: Vec<String> = store
        .load_repo_config()?
        .map(|c| c.depends_on.into_iter().map(|d| d.repo).collect())
        .unwrap_or_default();

    let mut graph: BTreeMap<String, Vec<String>> = repos
        .iter()
        .map(|(name, r)| (name.clone(), r.depends_on.clone()))
        .collect();
    graph.insert(local_name.clone(), local_deps);

    let cycles = find_cycles(&graph, &local_name);
    for cycle in &cycles {
        tracing::warn!(cycle = %cycle.join(" -> "), "dependency cycle detected");
    }

    let external = ExternalState { synced_at: now, repos, cycles };
    store.save_external(&external)?;
    Ok(external)
}

fn read_dependency(root: &Path) -> WorkflowResult<(String, ExternalRepo)> {
    let dep = StateStore::at(root);
    if !dep.is_initialized() {
        return Err(WorkflowError::ExternalRepoNotFound { path: root.to_path_buf() });
    }
    let name = dep.repo_name()?;
    let config = dep.load_repo_config()?.unwrap_or_default();
    let registry = dep.load_deviations()?;
    let done_steps = dep.load_state()?.done_steps.len();

    let projection = ExternalRepo {
        path: root.canonicalize().unwrap_or_else(|_| root.to_path_buf()),
        last_synced: Utc::now(),
        role: config.repo_role,
        high_severity_open_deviations: registry
            .open_by_severity(Severity::High)
            .into_iter()
            .cloned()
            .collect(),
        depends_on: config.depends_on.into_iter().map(|d| d.repo).collect(),
        done_steps,
    };
    Ok((name, projection))
}

/// Every dependency with at least one HIGH/OPEN deviation, ordered by repo
/// then deviation id.
pub fn blockers_for(external: &ExternalState) -> Vec<Blocker> {
    let mut blockers: Vec<Blocker> = external
        .repos
        .iter()
        .flat_map(|(repo, r)| {
            r.high_severity_open_deviations
                .iter()
                .filter(|d| d.is_open() && d.severity == Severity::High)
                .map(move |d| Blocker { repo: repo.clone(), deviation: d.clone() })
        })
        .collect();
    blockers.sort_by(|a, b| a.repo.cmp(&b.repo).then_with(|| a.deviation.id.cmp(&b.deviation.id)));
    blockers
}

/// Elementary cycles reachable from `start`, each rotated to begin at its
/// smallest name. Repositories absent from `graph` have no outgoing edges.
pub fn find_cycles(graph: &BTreeMap<String, Vec<String>>, start: &str) -> Vec<Vec<String>> {
    let mut found: BTreeSet<Vec<String>> = BTreeSet::new();
    let mut path: Vec<String> = Vec::new();
    walk(graph, start, &mut path, &mut found);
    found.into_iter().collect()
}

fn walk(
    graph: &BTreeMap<String, Vec<String>>,
    node: &str,
    path: &mut Vec<String>,
    found: &mut BTreeSet<Vec<String>>,
) {
    if let Some(at) = path.iter().position(|n| n == node) {
        found.insert(rotate_to_min(&path[at..]));
        return;
    }
    path.push(node.to_string());
    for next in graph.get(node).into_iter().flatten() {
        walk(graph, next, path, found);
    }
    path.pop();
}

fn rotate_to_min(cycle: &[String]) -> Vec<String> {
    let min = cycle
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    cycle[min..].iter().chain(cycle[..min].iter()).cloned().collect()
}
