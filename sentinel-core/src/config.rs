//! `.sentinel/config.yaml`: optional tuning knobs.
//!
//! Every section is `#[serde(default)]`, so a missing file, an empty file
//! and a file with only some keys all load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SentinelConfig {
    pub snapshot: SnapshotSettings,
    /// Keyword category → needles for the pattern gate. Empty means the
    /// built-in categories.
    pub patterns: BTreeMap<String, Vec<String>>,
    pub reviewer: ReviewerSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SnapshotSettings {
    /// Extra directory names skipped by the snapshot walk.
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewerSettings {
    /// Architecture document, relative to the state directory.
    pub architecture_file: String,
}

impl Default for ReviewerSettings {
    fn default() -> Self {
        Self { architecture_file: "architecture.md".to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg: SentinelConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg, SentinelConfig::default());
        assert_eq!(cfg.reviewer.architecture_file, "architecture.md");
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let cfg: SentinelConfig =
            serde_yaml::from_str("snapshot:\n  exclude: [vendor]\n").unwrap();
        assert_eq!(cfg.snapshot.exclude, vec!["vendor".to_string()]);
        assert!(cfg.patterns.is_empty());
    }
}
