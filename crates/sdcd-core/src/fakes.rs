//! In-memory [`VcsClient`] for testing (no `git` binary required).
//!
//! [`MemoryRepo`] models a linear history: each commit is a full snapshot of
//! the tree, tags point at commits, and commit ids are `c0`, `c1`, ...

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};

use crate::git::{GitError, GitResult};
use crate::vcs::{Tag, VcsClient};

#[derive(Debug, Clone)]
struct Commit {
    timestamp: i64,
    tree: BTreeMap<Utf8PathBuf, String>,
}

#[derive(Debug, Default)]
struct State {
    commits: Vec<Commit>,
    tags: Vec<(String, usize)>,
    prefix_matching: bool,
}

/// Linear in-memory repository.
#[derive(Debug, Default)]
pub struct MemoryRepo {
    state: Mutex<State>,
}

impl MemoryRepo {
    /// Create a repository with no commits.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Commit `files` (path, content) on top of the current tree.
    ///
    /// Returns the index of the new commit.
    pub fn commit(&self, timestamp: i64, files: &[(&str, &str)]) -> usize {
        let mut state = self.state();
        let mut tree = state
            .commits
            .last()
            .map(|c| c.tree.clone())
            .unwrap_or_default();
        for (path, content) in files {
            tree.insert(Utf8PathBuf::from(*path), (*content).to_string());
        }
        state.commits.push(Commit { timestamp, tree });
        state.commits.len() - 1
    }

    /// Commit the removal of `paths` from the current tree.
    pub fn remove(&self, timestamp: i64, paths: &[&str]) -> usize {
        let mut state = self.state();
        let mut tree = state
            .commits
            .last()
            .map(|c| c.tree.clone())
            .unwrap_or_default();
        for path in paths {
            tree.remove(Utf8Path::new(path));
        }
        state.commits.push(Commit { timestamp, tree });
        state.commits.len() - 1
    }

    /// Point tag `name` at commit `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not an existing commit.
    pub fn tag(&self, name: &str, index: usize) {
        let mut state = self.state();
        assert!(index < state.commits.len(), "no commit {index}");
        state.tags.push((name.to_string(), index));
    }

    /// Match the diff directory by plain string prefix, like a sloppy backend.
    pub fn set_prefix_matching(&self, enabled: bool) {
        self.state().prefix_matching = enabled;
    }
}

impl State {
    fn resolve(&self, rev: &str) -> Option<usize> {
        if rev == "HEAD" {
            return self.commits.len().checked_sub(1);
        }
        if let Some((_, index)) = self.tags.iter().find(|(name, _)| name == rev) {
            return Some(*index);
        }
        rev.strip_prefix('c')
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|n| *n < self.commits.len())
    }

    fn tree(&self, rev: &str, command: &str) -> GitResult<&BTreeMap<Utf8PathBuf, String>> {
        self.resolve(rev)
            .map(|index| &self.commits[index].tree)
            .ok_or_else(|| GitError::Command {
                command: command.to_string(),
                stderr: format!("fatal: bad revision '{rev}'"),
            })
    }
}

impl VcsClient for MemoryRepo {
    fn list_tags(&self) -> GitResult<Vec<Tag>> {
        let state = self.state();
        let mut tags = state.tags.clone();
        tags.sort_by_key(|(_, index)| *index);
        Ok(tags
            .into_iter()
            .map(|(name, index)| Tag::new(name, state.commits[index].timestamp))
            .collect())
    }

    fn root_commit(&self) -> GitResult<Option<String>> {
        let state = self.state();
        Ok((!state.commits.is_empty()).then(|| "c0".to_string()))
    }

    fn create_tag(&self, name: &str, target: &str) -> GitResult<()> {
        let mut state = self.state();
        if state.tags.iter().any(|(existing, _)| existing == name) {
            return Err(GitError::Command {
                command: "tag".into(),
                stderr: format!("fatal: tag '{name}' already exists"),
            });
        }
        let index = state.resolve(target).ok_or_else(|| GitError::Command {
            command: "tag".into(),
            stderr: format!("fatal: Failed to resolve '{target}' as a valid ref."),
        })?;
        state.tags.push((name.to_string(), index));
        Ok(())
    }

    fn diff_added_files(
        &self,
        from: Option<&str>,
        to: &str,
        dir: &Utf8Path,
    ) -> GitResult<Vec<Utf8PathBuf>> {
        let state = self.state();
        let to_tree = state.tree(to, "diff")?;
        let from_tree = from.and_then(|rev| state.tree(rev, "diff").ok());

        Ok(to_tree
            .keys()
            .filter(|path| {
                if state.prefix_matching {
                    path.as_str().starts_with(dir.as_str())
                } else {
                    path.starts_with(dir)
                }
            })
            .filter(|path| from_tree.is_none_or(|tree| !tree.contains_key(*path)))
            .cloned()
            .collect())
    }

    fn read_file(&self, rev: &str, path: &Utf8Path) -> GitResult<String> {
        let state = self.state();
        state
            .tree(rev, "show")?
            .get(path)
            .cloned()
            .ok_or_else(|| GitError::Command {
                command: "show".into(),
                stderr: format!("fatal: path '{path}' does not exist in '{rev}'"),
            })
    }
}
