//! `init`: scaffold the state directory.
//!
//! Idempotent. Files that already exist are reported and left untouched.

use std::path::Path;

use sentinel_core::store::{ARCHITECTURE_FILE, CONFIG_FILE, REPO_FILE, STATE_FILE};
use sentinel_core::{store, AuditState, RepoConfig, SentinelConfig, StateStore};

use crate::architecture;
use crate::error::WorkflowResult;

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Defaults to the root directory name.
    pub repo_name: Option<String>,
    pub repo_role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    pub created: Vec<&'static str>,
    pub existing: Vec<&'static str>,
}

pub fn init_repo(root: &Path, options: &InitOptions) -> WorkflowResult<InitReport> {
    let store = StateStore::at(root);
    store.ensure_dir()?;
    let name = options
        .repo_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| store::dir_name(root));

    let mut report = InitReport::default();
    let mut scaffold = |file: &'static str, write: &dyn Fn() -> WorkflowResult<()>| -> WorkflowResult<()> {
        if store.exists(file) {
            report.existing.push(file);
        } else {
            write()?;
            report.created.push(file);
        }
        Ok(())
    };

    scaffold(ARCHITECTURE_FILE, &|| Ok(store.write_text(ARCHITECTURE_FILE, &architecture::template(&name))?))?;
    scaffold(REPO_FILE, &|| {
        let cfg = RepoConfig {
            repo_name: name.clone(),
            repo_role: options.repo_role.clone().unwrap_or_default(),
            ..Default::default()
        };
        Ok(store.save_repo_config(&cfg)?)
    })?;
    scaffold(CONFIG_FILE, &|| Ok(store.write_yaml(CONFIG_FILE, &SentinelConfig::default())?))?;
    scaffold(STATE_FILE, &|| Ok(store.save_state(&AuditState::new(name.clone()))?))?;

    tracing::info!(repo = %name, created = report.created.len(), "state directory initialized");
    Ok(report)
}
