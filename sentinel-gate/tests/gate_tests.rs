//! Allowlist and pattern gate behaviour.

use std::collections::BTreeSet;

use rstest::rstest;
use sentinel_gate::{check, Allowlist, PatternGate};

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// 1. Exact matching
// ---------------------------------------------------------------------------

#[rstest]
#[case(&["a.py"], &["a.py", "b.txt"], true, &[])]
#[case(&["a.py", "c.py"], &["a.py", "b.txt"], false, &["c.py"])]
#[case(&[], &["a.py"], true, &[])]
#[case(&["a.py"], &[], false, &["a.py"])]
#[case(&["./src//lib.rs"], &["src/lib.rs"], true, &[])]
#[case(&["src\\lib.rs"], &["src/lib.rs"], true, &[])]
#[case(&["Src/lib.rs"], &["src/lib.rs"], false, &["Src/lib.rs"])]
#[case(&["src/lib.rs"], &["src"], false, &["src/lib.rs"])]
fn exact_subset(
    #[case] modified: &[&str],
    #[case] allowed: &[&str],
    #[case] pass: bool,
    #[case] unauthorized: &[&str],
) {
    let result = check(modified.iter(), allowed.iter()).expect("valid allowlist");
    assert_eq!(result.pass, pass);
    assert_eq!(result.unauthorized, set(unauthorized));
}

#[test]
fn pass_iff_subset_over_small_universe() {
    let universe = ["a", "b", "c"];
    for m in 0u8..8 {
        for a in 0u8..8 {
            let pick = |mask: u8| -> BTreeSet<String> {
                universe
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| mask & (1 << i) != 0)
                    .map(|(_, s)| s.to_string())
                    .collect()
            };
            let (modified, allowed) = (pick(m), pick(a));
            let result = check(&modified, &allowed).expect("valid");
            assert_eq!(result.pass, modified.is_subset(&allowed), "m={modified:?} a={allowed:?}");
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Wildcards (opt-in, tested apart from exact entries)
// ---------------------------------------------------------------------------

#[rstest]
#[case("src/*.rs", "src/lib.rs", true)]
#[case("src/*.rs", "src/nested/lib.rs", false)]
#[case("src/**/*.rs", "src/nested/deep/lib.rs", true)]
#[case("docs/?.md", "docs/a.md", true)]
#[case("docs/?.md", "docs/ab.md", false)]
#[case("tests/[ab].rs", "tests/b.rs", true)]
#[case("tests/[ab].rs", "tests/c.rs", false)]
fn wildcard_entries(#[case] entry: &str, #[case] path: &str, #[case] permitted: bool) {
    let allow = Allowlist::new([entry]).expect("valid glob");
    assert_eq!(allow.permits(path), permitted, "{entry} vs {path}");
}

#[test]
fn entries_without_markers_never_glob() {
    let allow = Allowlist::new(["src"]).expect("valid");
    assert!(!allow.permits("src/lib.rs"));
    assert!(allow.permits("src"));
}

// ---------------------------------------------------------------------------
// 3. Pattern gate
// ---------------------------------------------------------------------------

const DIFF: &str = "\
diff --git a/api/routes.js b/api/routes.js
--- a/api/routes.js
+++ b/api/routes.js
@@ -1,2 +1,3 @@
 const x = 1;
-const old = db.query('SELECT 1');
+app.get('/users', handler);
+  return <DIV className=\"x\"></DIV>;
";

#[test]
fn pattern_gate_finds_added_lines_only() {
    let gate = PatternGate::default();
    let hits = gate.scan(["No HTTP handlers", "No database queries"], DIFF);
    assert_eq!(hits.len(), 1, "removed .query( must not match: {hits:?}");
    assert_eq!(hits[0].needle, "app.get(");
    assert_eq!(hits[0].forbidden, "No HTTP handlers");
}

#[test]
fn pattern_gate_is_case_insensitive() {
    let gate = PatternGate::default();
    let hits = gate.scan(["no UI components"], DIFF);
    let needles: Vec<_> = hits.iter().map(|h| h.needle.as_str()).collect();
    assert_eq!(needles, vec!["<div", "className="]);
}

#[test]
fn custom_categories_replace_defaults() {
    let gate = PatternGate::with_categories(
        [("logging".to_string(), vec!["println!".to_string()])].into(),
    );
    let hits = gate.scan(["no ad-hoc logging", "no UI"], "+println!(\"hi\");\n+<div>\n");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].needle, "println!");
}
