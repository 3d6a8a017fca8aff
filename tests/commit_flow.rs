use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::cargo;
use predicates::prelude::*;
use tempfile::TempDir;

/// A throwaway repository plus a fake home directory, so nothing leaks in
/// from the developer's own config or style guide.
struct Sandbox {
    _tmp: TempDir,
    repo: PathBuf,
    home: PathBuf,
}

impl Sandbox {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let repo = tmp.path().join("repo");
        let home = tmp.path().join("home");
        fs::create_dir_all(&repo).unwrap();
        fs::create_dir_all(&home).unwrap();

        let sandbox = Sandbox { _tmp: tmp, repo, home };
        sandbox.git(&["init", "-q"]);
        sandbox.git(&["config", "user.name", "Test User"]);
        sandbox.git(&["config", "user.email", "test@example.com"]);
        sandbox.git(&["config", "commit.gpgsign", "false"]);
        sandbox
    }

    fn git(&self, args: &[&str]) -> String {
        let out = Command::new("git")
            .args(args)
            .current_dir(&self.repo)
            .env("HOME", &self.home)
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .output()
            .unwrap();
        assert!(
            out.status.success(),
            "git {args:?}: {}",
            String::from_utf8_lossy(&out.stderr)
        );
        String::from_utf8(out.stdout).unwrap()
    }

    fn stage(&self, file: &str, contents: &str) {
        fs::write(self.repo.join(file), contents).unwrap();
        self.git(&["add", file]);
    }

    fn commit(&self, file: &str, contents: &str, message: &str) {
        self.stage(file, contents);
        self.git(&["commit", "-q", "-m", message]);
    }

    fn commit_count(&self) -> usize {
        self.git(&["rev-list", "--count", "HEAD"]).trim().parse().unwrap()
    }

    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = cargo::cargo_bin_cmd!();
        cmd.current_dir(&self.repo)
            .env("HOME", &self.home)
            .env("XDG_CONFIG_HOME", self.home.join(".config"))
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env_remove("OPENAI_API_KEY")
            .env_remove("COMMITSMITH_MODEL")
            .env_remove("COMMITSMITH_PROVIDER")
            .env_remove("COMMITSMITH_BASE_URL");
        cmd
    }

    fn repo(&self) -> &Path {
        &self.repo
    }
}

#[test]
fn nothing_staged_is_an_error() {
    let sb = Sandbox::new();
    sb.commit("README.md", "hello\n", "Initial commit");

    sb.cmd()
        .arg("--no-model")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("err:"))
        .stderr(predicate::str::contains("no staged changes"));
}

#[test]
fn first_commit_dry_run_has_no_history() {
    let sb = Sandbox::new();
    sb.stage("main.rs", "fn main() {}\n");

    sb.cmd()
        .args(["--no-model", "--dry"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Prompt: 2 messages [system, user]"))
        .stdout(predicate::str::contains("Run the following command to commit:"))
        .stdout(predicate::str::contains("git commit -m"));
}

#[test]
fn history_and_style_guide_precede_the_diff() {
    let sb = Sandbox::new();
    sb.commit("README.md", "hello\n", "Initial commit");
    sb.stage("README.md", "hello world\n");

    sb.cmd()
        .args(["--no-model", "-d"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Prompt: 4 messages [system, system, system, user]"));
}

#[test]
fn context_adds_a_system_message() {
    let sb = Sandbox::new();
    sb.stage("main.rs", "fn main() {}\n");

    sb.cmd()
        .args(["--no-model", "-d", "-c", "Closes #7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Prompt: 3 messages [system, system, user]"));
}

#[test]
fn commits_the_generated_message() {
    let sb = Sandbox::new();
    sb.stage("main.rs", "fn main() {}\n");

    sb.cmd().arg("--no-model").assert().success();

    assert_eq!(sb.commit_count(), 1);
    let subject = sb.git(&["log", "-1", "--format=%s"]);
    assert_eq!(subject.trim(), "Dummy commit message (LLM disabled)");
}

#[test]
fn existing_ref_is_never_committed() {
    let sb = Sandbox::new();
    sb.commit("README.md", "hello\n", "Initial commit");
    sb.commit("README.md", "hello again\n", "Update greeting");

    sb.cmd()
        .args(["--no-model", "HEAD"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Prompt: 4 messages"));

    assert_eq!(sb.commit_count(), 2);
}

#[test]
fn amend_replaces_the_head_message() {
    let sb = Sandbox::new();
    sb.commit("README.md", "hello\n", "Initial commit");
    sb.commit("README.md", "hello again\n", "Update greeting");
    sb.stage("README.md", "hello once more\n");

    sb.cmd()
        .args(["--no-model", "--amend"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Prompt: 4 messages [system, system, system, user]"));

    assert_eq!(sb.commit_count(), 2);
    let subject = sb.git(&["log", "-1", "--format=%s"]);
    assert_eq!(subject.trim(), "Dummy commit message (LLM disabled)");
    let first = sb.git(&["log", "-1", "--format=%s", "HEAD^"]);
    assert_eq!(first.trim(), "Initial commit");
}

#[test]
fn amend_of_the_first_commit_diffs_against_the_empty_tree() {
    let sb = Sandbox::new();
    sb.commit("README.md", "hello\n", "Initial commit");
    sb.stage("main.rs", "fn main() {}\n");

    // Only commit is the one being amended, so there is no history message.
    sb.cmd()
        .args(["--no-model", "--amend", "-d"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Prompt: 3 messages [system, system, user]"))
        .stdout(predicate::str::contains("--amend"));

    assert_eq!(sb.commit_count(), 1);
}

#[test]
fn root_commit_ref_is_described() {
    let sb = Sandbox::new();
    sb.commit("README.md", "hello\n", "Initial commit");

    sb.cmd()
        .args(["--no-model", "HEAD"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Prompt: 3 messages [system, system, user]"));

    assert_eq!(sb.commit_count(), 1);
    let subject = sb.git(&["log", "-1", "--format=%s"]);
    assert_eq!(subject.trim(), "Initial commit");
}

#[test]
fn ref_and_amend_conflict() {
    let sb = Sandbox::new();
    sb.commit("README.md", "hello\n", "Initial commit");

    sb.cmd()
        .args(["--no-model", "--amend", "HEAD"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot use both [ref] and --amend"));
}

#[test]
fn budget_below_floor_is_rejected() {
    let sb = Sandbox::new();
    sb.stage("main.rs", "fn main() {}\n");

    sb.cmd()
        .args(["--no-model", "--max-tokens", "4000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 5000"));
}

#[test]
fn repo_style_guide_is_used() {
    let sb = Sandbox::new();
    sb.commit("README.md", "hello\n", "Initial commit");
    fs::write(
        sb.repo().join("COMMITS.md"),
        "Prefix every subject with the module name.\n",
    )
    .unwrap();
    sb.stage("README.md", "hello world\n");

    sb.cmd()
        .args(["--no-model", "-d", "-vv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Prompt: 4 messages"));
}

#[test]
fn lint_checks_a_given_message() {
    let sb = Sandbox::new();
    sb.commit("README.md", "hello\n", "Initial commit");

    sb.cmd()
        .args(["lint", "fixed stuff.", "--no-model"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Prompt: 3 messages [system, system, user]"));
}

#[test]
fn lint_without_commits_fails() {
    let sb = Sandbox::new();

    sb.cmd()
        .args(["--no-model", "lint"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no commits to lint"));
}

#[test]
fn missing_api_key_is_reported() {
    let sb = Sandbox::new();
    sb.stage("main.rs", "fn main() {}\n");

    sb.cmd()
        .args(["--provider", "openai"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("$OPENAI_API_KEY is not set"));
}

#[cfg(target_os = "linux")]
#[test]
fn save_key_writes_the_config_dir() {
    let sb = Sandbox::new();

    sb.cmd()
        .args(["--save-key", "--openai-key", "sk-test-key"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved OpenAI API key to"));

    let key_file = sb.home.join(".config").join("commitsmith").join("openai.key");
    let saved = fs::read_to_string(key_file).unwrap();
    assert_eq!(saved, "sk-test-key");
}
