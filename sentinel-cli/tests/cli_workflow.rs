use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn sentinel(repo: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sentinel"));
    cmd.arg("--repo").arg(repo).env_remove("SENTINEL_LOG").env_remove("SENTINEL_REPO");
    // Keep git from discovering an enclosing repository.
    if let Some(parent) = repo.parent() {
        cmd.env("GIT_CEILING_DIRECTORIES", parent);
    }
    cmd
}

fn git_available() -> bool {
    Command::new("git").arg("--version").output().map(|o| o.status.success()).unwrap_or(false)
}

fn git(repo: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(args)
        .output()
        .expect("run git")
        .status;
    assert!(status.success(), "git {args:?} failed");
}

/// A committed repository with one source file and an initialized state dir.
fn git_repo(name: &str) -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/lib.rs"), "pub fn f() {}\n").unwrap();
    git(dir.path(), &["init", "-q"]);
    git(dir.path(), &["add", "."]);
    git(dir.path(), &["commit", "-q", "-m", "init"]);
    sentinel(dir.path()).args(["init", "--name", name]).assert().success();
    // The state directory is tool-private; keep it out of git like a user would.
    fs::write(dir.path().join(".gitignore"), ".sentinel/\n").unwrap();
    git(dir.path(), &["add", ".gitignore"]);
    git(dir.path(), &["commit", "-q", "-m", "ignore state"]);
    dir
}

fn first_run(repo: &Path) {
    sentinel(repo).arg("propose").assert().success().stdout(contains("baseline-verification"));
    sentinel(repo).arg("compile").assert().success();
    sentinel(repo).arg("verify").assert().success().stdout(contains("PASS"));
    sentinel(repo).arg("accept").assert().success();
}

#[test]
fn version_flag() {
    Command::new(assert_cmd::cargo::cargo_bin!("sentinel"))
        .arg("--version")
        .assert()
        .success()
        .stdout(contains("sentinel"));
}

#[test]
fn uninitialized_repository_exits_with_config_code() {
    let dir = TempDir::new().unwrap();
    sentinel(dir.path()).arg("propose").assert().code(2).stderr(contains("sentinel init"));
}

#[test]
fn verify_outside_git_is_a_config_error() {
    if !git_available() {
        return;
    }
    let dir = TempDir::new().unwrap();
    sentinel(dir.path()).arg("init").assert().success();
    sentinel(dir.path()).arg("verify").assert().code(2).stderr(contains("not a git repository"));
}

#[test]
fn full_step_cycle_with_failed_then_passing_verify() {
    if !git_available() {
        return;
    }
    let repo = git_repo("api");
    let root = repo.path();
    first_run(root);

    sentinel(root)
        .args(["propose", "--id", "add-util", "--goal", "Add a util module", "--allow", "src/util.rs", "--allow", "src/lib.rs"])
        .assert()
        .success()
        .stdout(contains("add-util"));
    sentinel(root).arg("compile").assert().success().stdout(contains("brief.txt"));

    fs::write(root.join("src/util.rs"), "pub fn util() {}\n").unwrap();
    fs::write(root.join("README.md"), "# api\n").unwrap();
    sentinel(root).arg("verify").assert().code(1).stdout(contains("FAIL")).stdout(contains("README.md"));
    assert!(root.join(".sentinel/repair.md").is_file());
    sentinel(root).arg("accept").assert().code(3).stderr(contains("accept blocked"));

    fs::remove_file(root.join("README.md")).unwrap();
    sentinel(root).arg("verify").assert().success().stdout(contains("PASS"));
    sentinel(root).arg("accept").assert().success().stdout(contains("2 step(s) done"));

    let state = fs::read_to_string(root.join(".sentinel/state.json")).unwrap();
    assert!(state.contains("add-util"));
}

#[test]
fn renamed_file_reports_its_old_path_to_the_allowlist() {
    if !git_available() {
        return;
    }
    let repo = git_repo("api");
    let root = repo.path();
    first_run(root);

    sentinel(root)
        .args(["propose", "--id", "add-moved", "--goal", "Move the library", "--allow", "src/moved.rs"])
        .assert()
        .success();
    sentinel(root).arg("compile").assert().success();
    git(root, &["mv", "src/lib.rs", "src/moved.rs"]);

    sentinel(root).arg("verify").assert().code(1).stdout(contains("FAIL")).stdout(contains("src/lib.rs"));
    sentinel(root)
        .args(["verify", "--staged"])
        .assert()
        .code(1)
        .stdout(contains("src/lib.rs"));
    sentinel(root).arg("accept").assert().code(3);
}

#[test]
fn known_deviations_feed_the_plan() {
    if !git_available() {
        return;
    }
    let repo = git_repo("api");
    let root = repo.path();
    let arch = "# api\n\n## Known Deviations\n- [high] ui-in-api: UI code in the API (files: src/lib.rs)\n";
    fs::write(root.join(".sentinel/architecture.md"), arch).unwrap();
    first_run(root);

    sentinel(root).args(["plan", "init"]).assert().success().stdout(contains("1 step(s)"));
    sentinel(root).args(["plan", "init"]).assert().code(3);
    sentinel(root).args(["plan", "status"]).assert().success().stdout(contains("0%"));

    sentinel(root).args(["propose", "--from-plan"]).assert().success().stdout(contains("fix-ui-in-api"));
    sentinel(root).arg("compile").assert().success();
    fs::write(root.join("src/lib.rs"), "pub fn f() -> u8 { 1 }\n").unwrap();
    sentinel(root).arg("verify").assert().success();
    sentinel(root).arg("accept").assert().success().stdout(contains("resolved deviation ui-in-api"));

    sentinel(root).args(["plan", "status"]).assert().success().stdout(contains("100%"));
    let devs = fs::read_to_string(root.join(".sentinel/deviations.yaml")).unwrap();
    assert!(devs.contains("status: resolved"));
}

#[test]
fn pending_step_blocks_a_second_propose() {
    if !git_available() {
        return;
    }
    let repo = git_repo("api");
    let root = repo.path();
    sentinel(root).arg("propose").assert().success();
    sentinel(root).arg("propose").assert().code(3).stderr(contains("still pending"));
    sentinel(root).args(["propose", "--force"]).assert().success();
    sentinel(root).arg("abandon").assert().success();
    sentinel(root).arg("abandon").assert().code(3);
}

#[test]
fn snapshot_and_diff_baseline() {
    if !git_available() {
        return;
    }
    let repo = git_repo("api");
    let root = repo.path();
    sentinel(root).arg("diff-baseline").assert().code(3);
    sentinel(root).arg("snapshot").assert().success().stdout(contains("Baseline captured"));

    fs::create_dir_all(root.join("docs")).unwrap();
    fs::write(root.join("docs/guide.md"), "hi\n").unwrap();
    sentinel(root)
        .arg("diff-baseline")
        .assert()
        .success()
        .stdout(contains("docs/guide.md"))
        .stdout(contains(".md: +1"));
}

#[test]
fn dependency_blocker_produces_blocked_step() {
    if !git_available() {
        return;
    }
    let dep = git_repo("core");
    fs::write(
        dep.path().join(".sentinel/architecture.md"),
        "## Known Deviations\n- [high] leaky-core: internals exported\n",
    )
    .unwrap();
    first_run(dep.path());

    let repo = git_repo("api");
    let root = repo.path();
    first_run(root);

    sentinel(root)
        .args(["sync-external", "--from"])
        .arg(dep.path())
        .assert()
        .success()
        .stdout(contains("leaky-core"));
    sentinel(root).arg("propose").assert().success().stdout(contains("blocked"));
}
