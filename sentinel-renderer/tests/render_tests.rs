use chrono::Utc;
use sentinel_core::{
    BlockedBy, Deviation, DeviationRegistry, Gate, RepoConfig, Severity, Step, StepKind,
    VerifyStatus, VerifyVerdict, Violation,
};
use sentinel_renderer::{ArtifactKind, RepairContext, Renderer, StepContext};
use tempfile::TempDir;

fn step() -> Step {
    let mut s = Step::new("add-login", StepKind::Implementation, "Add the login endpoint");
    s.allowed_files.insert("api/login.rs".into());
    s.allowed_files.insert("api/mod.rs".into());
    s.features = vec!["POST /login returns a token".into(), "bad password is 401".into()];
    s.fixes_deviation_ids.insert("no-auth".into());
    s
}

fn repo() -> RepoConfig {
    RepoConfig {
        repo_name: "api".into(),
        repo_role: "HTTP backend".into(),
        must_not: vec!["No UI code".into()],
        depends_on: vec![],
    }
}

fn ctx() -> StepContext {
    let mut reg = DeviationRegistry::new();
    reg.record(Deviation::new("no-auth", "Endpoints are unauthenticated", Severity::High))
        .expect("record");
    StepContext::new(&step(), "api")
        .with_repo(&repo())
        .with_deviations(&reg)
        .with_invariants(&["Tests pass".to_string()])
}

#[test]
fn brief_lists_goal_files_features_and_deviations() {
    let out = Renderer::new().expect("renderer").compile(&ctx()).expect("compile");
    assert!(out.brief.contains("Repository: api (HTTP backend)"));
    assert!(out.brief.contains("Add the login endpoint"));
    assert!(out.brief.contains("  - api/login.rs"));
    assert!(out.brief.contains("  - No UI code"));
    assert!(out.brief.contains("1. POST /login returns a token"));
    assert!(out.brief.contains("no-auth [HIGH]"));
    assert!(out.brief.contains("Tests pass"));
    assert!(!out.brief.contains("BLOCKED"));
}

#[test]
fn checklist_has_a_box_per_file_and_feature() {
    let out = Renderer::new().expect("renderer").compile(&ctx()).expect("compile");
    assert_eq!(out.checklist.matches("- [ ]").count(), 2 + 2 + 1 + 1);
    assert!(out.checklist.starts_with("# Verification checklist: add-login"));
}

#[test]
fn empty_allowlist_is_spelled_out() {
    let s = Step::new("baseline", StepKind::Verification, "Document the repository");
    let out = Renderer::new().expect("renderer").compile(&StepContext::new(&s, "api")).expect("compile");
    assert!(out.brief.contains("must not modify any file"));
    assert!(out.checklist.contains("the diff is empty"));
}

#[test]
fn blocked_step_explains_the_blocker() {
    let mut s = Step::new("blocked-1", StepKind::Blocked, "Wait for core");
    s.blocked_by = Some(BlockedBy { repo: "core".into(), deviation_id: "leak".into() });
    let out = Renderer::new().expect("renderer").compile(&StepContext::new(&s, "api")).expect("compile");
    assert!(out.brief.contains("BLOCKED"));
    assert!(out.brief.contains("deviation leak"));
}

#[test]
fn repair_separates_hard_and_soft() {
    let verdict = VerifyVerdict {
        step_id: "add-login".into(),
        status: VerifyStatus::Fail,
        modified_files: ["web/app.tsx".to_string()].into(),
        violations: vec![
            Violation::new(Gate::Allowlist, "web/app.tsx is not in the allowlist"),
            Violation::new(Gate::Pattern, "'<div' added (No UI code)"),
        ],
        warnings: vec![],
        forced_baseline: false,
        step_digest: String::new(),
        timestamp: Utc::now(),
    };
    let text = Renderer::new()
        .expect("renderer")
        .repair(&RepairContext::new(ctx(), &verdict))
        .expect("repair");
    assert!(text.contains("## Allowlist violations (hard)\n- web/app.tsx is not in the allowlist"));
    assert!(text.contains("- [pattern] '<div' added (No UI code)"));
}

#[test]
fn override_dir_replaces_embedded_template() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("brief.txt.tera"), "custom {{ step.id }}").expect("write");
    let renderer = Renderer::with_overrides(dir.path()).expect("renderer");
    let out = renderer.compile(&ctx()).expect("compile");
    assert_eq!(out.brief, "custom add-login");
    assert!(out.checklist.starts_with("# Verification checklist"));
    assert_eq!(ArtifactKind::Brief.file_name(), "brief.txt");
}
