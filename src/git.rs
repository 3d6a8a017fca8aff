use std::io;
use std::path::{Path, PathBuf};
use std::process::Command as GitCommand;
use thiserror::Error;

/// Separates records in `git log` output; cannot appear in a commit message
/// because git strips NUL bytes from messages.
const RECORD_SEPARATOR: char = '\0';

/// Errors from invoking the git CLI.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("failed to run git {args}")]
    Spawn {
        args: String,
        #[source]
        source: io::Error,
    },

    #[error("git {args} exited with status {status}: {stderr}")]
    Failed {
        args: String,
        status: String,
        stderr: String,
    },
}

/// A commit read from history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub hash: String,
    pub message: String,
}

/// What the prompt builder needs from version control.
pub trait Vcs {
    /// Directory the collaborator was pointed at.
    fn workdir(&self) -> &Path;

    /// Top-level directory of the working tree.
    fn repo_root(&self) -> Result<PathBuf, VcsError>;

    /// Unified diff for the staged changes (`target` is `None`), for the
    /// commit `target` itself, or for `target` amended with staged changes.
    fn diff(&self, target: Option<&str>, amend: bool) -> Result<String, VcsError>;

    /// Hash of HEAD, or `None` in a repository with no commits yet.
    fn head_commit(&self) -> Result<Option<String>, VcsError>;

    /// Up to `limit` commits reachable from `before`, newest first.
    fn recent_commits(&self, before: &str, limit: usize) -> Result<Vec<CommitRecord>, VcsError>;

    fn resolve_ref(&self, reference: &str) -> Result<String, VcsError>;
}

/// `Vcs` backed by the `git` executable, run against one working directory.
pub struct GitCli {
    dir: PathBuf,
}

impl GitCli {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        GitCli { dir: dir.into() }
    }

    /// Run a git command in the working directory and capture stdout.
    fn output(&self, args: &[&str]) -> Result<String, VcsError> {
        let output = GitCommand::new("git")
            .arg("-C")
            .arg(&self.dir)
            .args(args)
            .output()
            .map_err(|source| VcsError::Spawn {
                args: args.join(" "),
                source,
            })?;

        if !output.status.success() {
            return Err(VcsError::Failed {
                args: args.join(" "),
                status: output
                    .status
                    .code()
                    .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(decode_output(&output.stdout))
    }

    /// Resolve `rev` if it exists. `--verify --quiet` exits 1 for a
    /// revision that does not resolve, such as HEAD in an empty repository.
    fn verify(&self, rev: &str) -> Result<Option<String>, VcsError> {
        match self.output(&["rev-parse", "--verify", "--quiet", rev]) {
            Ok(hash) => Ok(Some(hash.trim().to_string())),
            Err(VcsError::Failed { status, .. }) if status == "1" => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// What `hash` is diffed against: its first parent, or the empty tree
    /// when it is a root commit.
    fn diff_base(&self, hash: &str) -> Result<String, VcsError> {
        if let Some(parent) = self.verify(&format!("{hash}^"))? {
            return Ok(parent);
        }
        log::debug!("{hash} is a root commit, diffing against the empty tree");
        let tree = self.output(&["hash-object", "-t", "tree", "/dev/null"])?;
        Ok(tree.trim().to_string())
    }
}

/// Git output is text for every command we run, but diffs may carry bytes
/// from non-UTF-8 files. Those become U+FFFD before tokenization.
fn decode_output(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Arguments for `git diff`. `target` is the commit hash paired with the
/// revision it is compared against: its parent, or the empty tree for a
/// root commit.
fn diff_args(target: Option<(&str, &str)>, amend: bool) -> Vec<String> {
    let mut args = vec!["diff".to_string()];
    match target {
        None => args.push("--cached".into()),
        Some((_, base)) if amend => {
            args.push("--cached".into());
            args.push(base.to_string());
        }
        Some((hash, base)) => {
            args.push(base.to_string());
            args.push(hash.to_string());
        }
    }
    args
}

fn parse_log(output: &str) -> Vec<CommitRecord> {
    output
        .split(RECORD_SEPARATOR)
        .filter_map(|record| {
            let record = record.trim_start_matches('\n');
            let (hash, message) = record.split_once('\n')?;
            let hash = hash.trim();
            if hash.is_empty() {
                return None;
            }
            Some(CommitRecord {
                hash: hash.to_string(),
                message: message.to_string(),
            })
        })
        .collect()
}

impl Vcs for GitCli {
    fn workdir(&self) -> &Path {
        &self.dir
    }

    fn repo_root(&self) -> Result<PathBuf, VcsError> {
        let root = self.output(&["rev-parse", "--show-toplevel"])?;
        Ok(PathBuf::from(root.trim()))
    }

    fn diff(&self, target: Option<&str>, amend: bool) -> Result<String, VcsError> {
        let base = target.map(|hash| self.diff_base(hash)).transpose()?;
        let args = diff_args(target.zip(base.as_deref()), amend);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.output(&args)
    }

    fn head_commit(&self) -> Result<Option<String>, VcsError> {
        self.verify("HEAD")
    }

    fn recent_commits(&self, before: &str, limit: usize) -> Result<Vec<CommitRecord>, VcsError> {
        let max_count = format!("--max-count={limit}");
        let output = self.output(&[
            "log",
            "--date-order",
            &max_count,
            "--format=%H%n%B%x00",
            before,
        ])?;
        Ok(parse_log(&output))
    }

    fn resolve_ref(&self, reference: &str) -> Result<String, VcsError> {
        let rev = format!("{reference}^{{commit}}");
        let hash = self.output(&["rev-parse", "--verify", &rev])?;
        Ok(hash.trim().to_string())
    }
}

/// Arguments for `git commit` with the generated message.
pub fn commit_args(message: &str, amend: bool) -> Vec<String> {
    let mut args = vec!["commit".to_string(), "-m".to_string(), message.to_string()];
    if amend {
        args.push("--amend".into());
    }
    args
}

/// Render a command line that can be pasted into a POSIX shell.
pub fn format_shell_command(program: &str, args: &[String]) -> String {
    let mut out = program.to_string();
    for arg in args {
        out.push(' ');
        out.push_str(&shell_quote(arg));
    }
    out
}

fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+,".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Run `git commit` interactively, handing the terminal to git.
pub fn run_commit(dir: &Path, message: &str, amend: bool) -> anyhow::Result<()> {
    let status = GitCommand::new("git")
        .arg("-C")
        .arg(dir)
        .args(commit_args(message, amend))
        .status()
        .map_err(|e| anyhow::anyhow!("failed to run git commit: {e}"))?;

    if !status.success() {
        anyhow::bail!("git commit exited with status {:?}", status.code());
    }
    Ok(())
}
