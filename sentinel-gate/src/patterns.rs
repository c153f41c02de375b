//! Pattern gate: forbidden-pattern search over added diff lines.
//!
//! This gate is soft. It only sees text, it is trivially bypassed by
//! spelling, and its hits are reported with their own tag.
//!
//! A forbidden item selects needles in one of two ways:
//! - `literal:<text>` searches for `<text>` itself
//! - otherwise every keyword category whose name appears in the item
//!   contributes its needles (`"No UI code"` selects `ui`)
//!
//! Matching is case-insensitive. Items that select nothing are ignored.

use std::collections::BTreeMap;

use serde::Serialize;

const LITERAL_PREFIX: &str = "literal:";

/// One forbidden needle found in an added line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternHit {
    /// The forbidden item as written in `repo.yaml` or the step.
    pub forbidden: String,
    pub needle: String,
    /// The offending added line, trimmed.
    pub line: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternGate {
    categories: BTreeMap<String, Vec<String>>,
}

impl Default for PatternGate {
    fn default() -> Self {
        Self { categories: default_categories() }
    }
}

impl PatternGate {
    /// Gate with custom categories; an empty map means the built-ins.
    pub fn with_categories(categories: BTreeMap<String, Vec<String>>) -> Self {
        if categories.is_empty() {
            return Self::default();
        }
        let categories = categories
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Self { categories }
    }

    /// Needles selected by one forbidden item.
    pub fn needles_for(&self, forbidden: &str) -> Vec<String> {
        if let Some(lit) = forbidden.strip_prefix(LITERAL_PREFIX) {
            let lit = lit.trim();
            return if lit.is_empty() { vec![] } else { vec![lit.to_string()] };
        }
        let lower = forbidden.to_lowercase();
        self.categories
            .iter()
            .filter(|(keyword, _)| contains_word(&lower, keyword))
            .flat_map(|(_, needles)| needles.iter().cloned())
            .collect()
    }

    /// Scans the added lines of `diff_text`. At most one hit per
    /// (forbidden item, needle) pair, the first line that matched.
    pub fn scan<I, S>(&self, forbidden: I, diff_text: &str) -> Vec<PatternHit>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines: Vec<(&str, String)> = added_lines(diff_text)
            .map(|l| (l, l.to_lowercase()))
            .collect();
        let mut hits = Vec::new();
        for item in forbidden {
            let item = item.as_ref();
            for needle in self.needles_for(item) {
                let lowered = needle.to_lowercase();
                if let Some((line, _)) = lines.iter().find(|(_, low)| low.contains(&lowered)) {
                    hits.push(PatternHit {
                        forbidden: item.to_string(),
                        needle,
                        line: line.trim().to_string(),
                    });
                }
            }
        }
        hits
    }
}

/// Lines added by a unified diff, without the leading `+`.
pub fn added_lines(diff_text: &str) -> impl Iterator<Item = &str> {
    diff_text
        .lines()
        .filter(|l| l.starts_with('+') && !l.starts_with("+++"))
        .map(|l| &l[1..])
}

fn default_categories() -> BTreeMap<String, Vec<String>> {
    let table: [(&str, &[&str]); 3] = [
        ("ui", &["<div", "<button", "useState", "className=", "render("]),
        ("http", &["app.get(", "app.post(", "@Get(", "@Post(", "router.get", "express()"]),
        ("database", &["CREATE TABLE", "SELECT * FROM", "INSERT INTO", ".query(", "prisma."]),
    ];
    table
        .iter()
        .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
        .collect()
}

/// `keyword` occurs in `text` bounded by non-alphanumerics, so `ui` does
/// not fire on "build".
fn contains_word(text: &str, keyword: &str) -> bool {
    text.match_indices(keyword).any(|(at, _)| {
        let before = text[..at].chars().next_back();
        let after = text[at + keyword.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_selects_category() {
        let gate = PatternGate::default();
        assert!(gate.needles_for("No UI code").contains(&"<div".to_string()));
        assert!(gate.needles_for("no direct database access").contains(&"INSERT INTO".to_string()));
        assert!(gate.needles_for("build scripts").is_empty());
    }

    #[test]
    fn literal_prefix() {
        let gate = PatternGate::default();
        assert_eq!(gate.needles_for("literal: unsafe {"), vec!["unsafe {".to_string()]);
        assert!(gate.needles_for("literal:").is_empty());
    }

    #[test]
    fn added_lines_skip_headers() {
        let diff = "+++ b/x.rs\n+let a = 1;\n-let b = 2;\n context\n";
        assert_eq!(added_lines(diff).collect::<Vec<_>>(), vec!["let a = 1;"]);
    }
}
