//! Git backend for the changelog engine.
//!
//! Shells out to `git` for all operations so the user's configuration,
//! hooks and credentials apply unchanged.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::vcs::{Tag, VcsClient};

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git subcommand that failed (e.g., "log").
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,

    /// A `git log` line did not have the expected `<timestamp>|<refs>` shape.
    #[error("unexpected tag listing line: {0:?}")]
    MalformedTagLine(String),
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Pretty format for the single-pass tag listing.
const TAG_LOG_FORMAT: &str = "--pretty=format:%ct|%D";

/// [`VcsClient`] backed by the system `git` binary.
#[derive(Debug, Clone)]
pub struct SystemGit {
    workdir: Utf8PathBuf,
}

impl SystemGit {
    /// Create a client that runs git in `workdir`.
    pub fn new(workdir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Create a client for `workdir`, failing if it is not inside a repository.
    #[instrument]
    pub fn open(workdir: &Utf8Path) -> GitResult<Self> {
        let client = Self::new(workdir);
        if client.is_inside_repo()? {
            Ok(client)
        } else {
            Err(GitError::NotARepo)
        }
    }

    /// Directory git commands run in.
    pub fn workdir(&self) -> &Utf8Path {
        &self.workdir
    }

    /// Check if the working directory is inside a git repository.
    pub fn is_inside_repo(&self) -> GitResult<bool> {
        match self.git(&["rev-parse", "--is-inside-work-tree"]) {
            Ok(output) => Ok(output.trim() == "true"),
            Err(GitError::Command { .. } | GitError::NotARepo) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Whether `rev` resolves to a commit.
    fn commit_exists(&self, rev: &str) -> GitResult<bool> {
        let spec = format!("{rev}^{{commit}}");
        match self.git(&["rev-parse", "--verify", "--quiet", &spec]) {
            Ok(_) => Ok(true),
            Err(GitError::Command { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn git(&self, args: &[&str]) -> GitResult<String> {
        git(&self.workdir, args)
    }
}

impl VcsClient for SystemGit {
    #[instrument(skip(self), fields(workdir = %self.workdir))]
    fn list_tags(&self) -> GitResult<Vec<Tag>> {
        let output = match self.git(&[
            "log",
            "--date-order",
            "--tags",
            "--simplify-by-decoration",
            // %D otherwise follows the user's log.decorate setting
            "--decorate=short",
            TAG_LOG_FORMAT,
        ]) {
            Ok(output) => output,
            Err(GitError::Command { stderr, .. }) if is_empty_history(&stderr) => {
                debug!("repository has no commits");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let tags = parse_tag_log(&output)?;
        debug!(count = tags.len(), "listed tags");
        Ok(tags)
    }

    #[instrument(skip(self), fields(workdir = %self.workdir))]
    fn root_commit(&self) -> GitResult<Option<String>> {
        match self.git(&["rev-list", "--max-parents=0", "HEAD"]) {
            // rev-list prints newest first; the last root is the oldest one
            Ok(output) => Ok(output
                .lines()
                .map(str::trim)
                .rfind(|line| !line.is_empty())
                .map(ToString::to_string)),
            Err(GitError::Command { stderr, .. }) if is_empty_history(&stderr) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self), fields(workdir = %self.workdir))]
    fn create_tag(&self, name: &str, target: &str) -> GitResult<()> {
        self.git(&["tag", name, target])?;
        Ok(())
    }

    #[instrument(skip(self), fields(workdir = %self.workdir))]
    fn diff_added_files(
        &self,
        from: Option<&str>,
        to: &str,
        dir: &Utf8Path,
    ) -> GitResult<Vec<Utf8PathBuf>> {
        let from = match from {
            Some(rev) if self.commit_exists(rev)? => Some(rev),
            Some(rev) => {
                debug!(%rev, "diff base does not resolve, listing every file");
                None
            }
            None => None,
        };

        let output = match from {
            Some(from) => self.git(&[
                "-c",
                "core.quotepath=off",
                "diff",
                "--name-only",
                "--no-renames",
                "--diff-filter=A",
                "--relative",
                from,
                to,
                "--",
                dir.as_str(),
            ])?,
            None => self.git(&[
                "-c",
                "core.quotepath=off",
                "ls-tree",
                "-r",
                "--name-only",
                to,
                "--",
                dir.as_str(),
            ])?,
        };

        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Utf8PathBuf::from)
            .collect())
    }

    fn read_file(&self, rev: &str, path: &Utf8Path) -> GitResult<String> {
        // `./` makes the path relative to the working directory, not the repo root
        self.git(&["show", &format!("{rev}:./{path}")])
    }
}

/// Parse `git log --simplify-by-decoration --pretty=format:%ct|%D` output.
///
/// Input is newest first; the result is oldest first. Decorations that are
/// not tags (branches, `HEAD`) are ignored and repeated names are dropped.
/// Full ref names (`tag: refs/tags/v1.0.0`) are shortened.
pub fn parse_tag_log(output: &str) -> GitResult<Vec<Tag>> {
    let mut commits = Vec::new();

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let (timestamp, refs) = line
            .split_once('|')
            .ok_or_else(|| GitError::MalformedTagLine(line.to_string()))?;
        let timestamp: i64 = timestamp
            .trim()
            .parse()
            .map_err(|_| GitError::MalformedTagLine(line.to_string()))?;

        let names: Vec<&str> = refs
            .split(", ")
            .filter_map(|decoration| decoration.trim().strip_prefix("tag: "))
            .map(|name| name.strip_prefix("refs/tags/").unwrap_or(name))
            .collect();
        if !names.is_empty() {
            commits.push((timestamp, names));
        }
    }

    let mut tags: Vec<Tag> = Vec::new();
    for (timestamp, names) in commits.into_iter().rev() {
        for name in names {
            if tags.iter().all(|t| t.name != name) {
                tags.push(Tag::new(name, timestamp));
            }
        }
    }
    Ok(tags)
}

/// Whether git's stderr says the history is empty (no commits yet).
fn is_empty_history(stderr: &str) -> bool {
    stderr.contains("does not have any commits")
        || stderr.contains("unknown revision")
        || stderr.contains("bad default revision")
}

/// Run a git command in `cwd` and return its stdout.
fn git(cwd: &Utf8Path, args: &[&str]) -> GitResult<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(cwd.as_std_path())
        .args(args)
        .output()?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if stderr.contains("not a git repository") {
            return Err(GitError::NotARepo);
        }

        Err(GitError::Command {
            command: subcommand(args).to_string(),
            stderr,
        })
    }
}

/// The git subcommand in `args`, skipping leading `-c key=value` pairs.
fn subcommand<'a>(args: &[&'a str]) -> &'a str {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if *arg == "-c" {
            iter.next();
            continue;
        }
        return arg;
    }
    ""
}
