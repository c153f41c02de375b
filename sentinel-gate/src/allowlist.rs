//! Allowlist gate.
//!
//! # Matching rules
//!
//! Paths on both sides are normalized first: `\` becomes `/`, a leading
//! `./` is dropped, repeated `/` collapse, a trailing `/` is trimmed. Case is
//! preserved because git reports case-sensitive paths.
//!
//! An allowlist entry is an exact path unless it contains one of `*`, `?`,
//! `[`. Wildcard entries are compiled with `globset` using a literal
//! separator: `*` stays within one path segment and `**` crosses segments.
//! An empty allowlist permits nothing.

use std::collections::BTreeSet;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("invalid wildcard in allowlist entry {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Result of the hard gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateResult {
    pub pass: bool,
    /// Normalized modified paths matched by no allowlist entry.
    pub unauthorized: BTreeSet<String>,
}

/// Compiled allowlist.
#[derive(Debug, Clone)]
pub struct Allowlist {
    exact: BTreeSet<String>,
    wildcards: Vec<String>,
    globs: GlobSet,
}

impl Allowlist {
    pub fn new<I, S>(entries: I) -> Result<Self, GateError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut exact = BTreeSet::new();
        let mut wildcards = Vec::new();
        let mut builder = GlobSetBuilder::new();
        for entry in entries {
            let entry = normalize_path(entry.as_ref());
            if entry.is_empty() {
                continue;
            }
            if is_wildcard(&entry) {
                let glob = GlobBuilder::new(&entry)
                    .literal_separator(true)
                    .build()
                    .map_err(|source| GateError::InvalidPattern {
                        pattern: entry.clone(),
                        source,
                    })?;
                builder.add(glob);
                wildcards.push(entry);
            } else {
                exact.insert(entry);
            }
        }
        let globs = builder.build().map_err(|source| GateError::InvalidPattern {
            pattern: wildcards.join(", "),
            source,
        })?;
        Ok(Self { exact, wildcards, globs })
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.wildcards.is_empty()
    }

    /// `true` iff the (normalized) path is allowed.
    pub fn permits(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.exact.contains(&path) || (!self.wildcards.is_empty() && self.globs.is_match(&path))
    }

    pub fn check<I, S>(&self, modified: I) -> GateResult
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unauthorized: BTreeSet<String> = modified
            .into_iter()
            .map(|p| normalize_path(p.as_ref()))
            .filter(|p| !p.is_empty() && !self.permits(p))
            .collect();
        for path in &unauthorized {
            tracing::debug!(%path, "not in allowlist");
        }
        GateResult { pass: unauthorized.is_empty(), unauthorized }
    }
}

/// `modified ⊆ allowed` after normalization.
pub fn check<M, A>(modified: M, allowed: A) -> Result<GateResult, GateError>
where
    M: IntoIterator,
    M::Item: AsRef<str>,
    A: IntoIterator,
    A::Item: AsRef<str>,
{
    Ok(Allowlist::new(allowed)?.check(modified))
}

/// Whether an allowlist entry uses wildcard matching.
pub fn is_wildcard(entry: &str) -> bool {
    entry.contains(|c: char| matches!(c, '*' | '?' | '['))
}

/// Canonical repo-relative form of a path as git prints it.
pub fn normalize_path(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let mut rest = unified.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.split('/')
        .filter(|seg| !seg.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_examples() {
        assert_eq!(normalize_path("./src//main.rs"), "src/main.rs");
        assert_eq!(normalize_path("src\\lib.rs"), "src/lib.rs");
        assert_eq!(normalize_path("docs/"), "docs");
        assert_eq!(normalize_path("Src/Main.rs"), "Src/Main.rs");
    }

    #[test]
    fn wildcard_detection() {
        assert!(is_wildcard("src/*.rs"));
        assert!(is_wildcard("file?.txt"));
        assert!(is_wildcard("[ab].rs"));
        assert!(!is_wildcard("src/main.rs"));
    }

    #[test]
    fn invalid_wildcard_is_an_error() {
        assert!(Allowlist::new(["src/[.rs"]).is_err());
    }
}
