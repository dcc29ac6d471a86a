//! Version control seam for the changelog engine.
//!
//! The engine never shells out directly. Everything it needs from history
//! goes through [`VcsClient`], implemented by [`crate::git::SystemGit`] for
//! real repositories and by [`crate::fakes::MemoryRepo`] in tests.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::git::GitResult;

/// Name of the synthetic tag marking the repository's root commit.
pub const BASELINE_TAG: &str = "first_commit";

/// A tag together with the timestamp of the commit it decorates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    /// Short tag name (e.g. `v0.1.0`).
    pub name: String,
    /// Commit timestamp in seconds since the Unix epoch.
    pub timestamp: i64,
}

impl Tag {
    /// Create a tag record.
    pub fn new(name: impl Into<String>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            timestamp,
        }
    }

    /// Whether this is the synthetic baseline tag.
    pub fn is_baseline(&self) -> bool {
        self.name == BASELINE_TAG
    }

    /// The commit time as a UTC datetime, if the timestamp is in range.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }

    /// Calendar date (`YYYY-MM-DD`, UTC) used in release headings.
    pub fn date(&self) -> String {
        self.datetime()
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }
}

/// Narrow interface over the version control system.
///
/// Revisions are passed as strings the backend understands (tag names,
/// commit ids). Paths are relative to the client's working directory.
pub trait VcsClient {
    /// Every tag with its commit timestamp, oldest first.
    ///
    /// A repository without commits yields an empty list.
    fn list_tags(&self) -> GitResult<Vec<Tag>>;

    /// Id of the repository's root commit, or `None` without commits.
    fn root_commit(&self) -> GitResult<Option<String>>;

    /// Create a lightweight tag `name` pointing at `target`.
    fn create_tag(&self, name: &str, target: &str) -> GitResult<()>;

    /// Files added between `from` and `to` below `dir`, in diff order.
    ///
    /// When `from` is `None` or does not resolve, every file present under
    /// `dir` at `to` counts as added.
    fn diff_added_files(
        &self,
        from: Option<&str>,
        to: &str,
        dir: &Utf8Path,
    ) -> GitResult<Vec<Utf8PathBuf>>;

    /// Contents of `path` as of revision `rev`.
    fn read_file(&self, rev: &str, path: &Utf8Path) -> GitResult<String>;
}

/// Create the [`BASELINE_TAG`] at the root commit unless it already exists.
///
/// Returns `true` when a tag was created. A repository without commits is
/// left untouched.
#[instrument(skip(vcs))]
pub fn ensure_baseline_tag<V: VcsClient + ?Sized>(vcs: &V) -> GitResult<bool> {
    if vcs.list_tags()?.iter().any(Tag::is_baseline) {
        debug!("baseline tag already present");
        return Ok(false);
    }

    let Some(root) = vcs.root_commit()? else {
        debug!("repository has no commits, skipping baseline tag");
        return Ok(false);
    };

    vcs.create_tag(BASELINE_TAG, &root)?;
    info!(tag = BASELINE_TAG, commit = %root, "created baseline tag");
    Ok(true)
}
