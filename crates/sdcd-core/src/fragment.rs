//! Changelog fragments: naming, classification and discovery.
//!
//! A fragment is a small file under the fragment directory named
//! `<identifier>.<category>[.<ext>]`, for example `42.feature.md`.

use std::fmt;
use std::str::FromStr;

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::git::GitResult;
use crate::vcs::VcsClient;

/// Default fragment directory, relative to the project root.
pub const DEFAULT_FRAGMENT_DIR: &str = "changelog.d";

/// Optional markup emitted before the releases.
pub const HEADER_FILE: &str = "HEADER.md";

/// Optional markup emitted after the releases.
pub const FOOTER_FILE: &str = "FOOTER.md";

/// File names inside the fragment directory that are never fragments.
pub const RESERVED_FILES: &[&str] = &[HEADER_FILE, FOOTER_FILE, "README.md"];

/// Kind of change a fragment documents.
///
/// Variant order is the order sections are rendered in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// New functionality.
    Feature,
    /// Bug fixes.
    Bugfix,
    /// Documentation changes.
    Doc,
    /// Removals and deprecations.
    Removal,
    /// Anything else worth mentioning.
    Misc,
}

impl Category {
    /// All categories in rendering order.
    pub const ALL: &[Self] = &[
        Self::Feature,
        Self::Bugfix,
        Self::Doc,
        Self::Removal,
        Self::Misc,
    ];

    /// Token used in fragment file names.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Bugfix => "bugfix",
            Self::Doc => "doc",
            Self::Removal => "removal",
            Self::Misc => "misc",
        }
    }

    /// Section title used in the rendered changelog.
    pub const fn title(self) -> &'static str {
        match self {
            Self::Feature => "Features",
            Self::Bugfix => "Bugfixes",
            Self::Doc => "Improved Documentation",
            Self::Removal => "Removed",
            Self::Misc => "Misc Changes",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ClassificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| ClassificationError::UnknownCategory(s.to_string()))
    }
}

/// Why a file in the fragment directory is not a usable fragment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    /// One of [`RESERVED_FILES`].
    #[error("{0} is reserved and not a fragment")]
    Reserved(String),

    /// Not of the form `<identifier>.<category>[.<ext>]`.
    #[error("malformed fragment file name {0:?}")]
    Malformed(String),

    /// Category segment is not one of the known categories.
    #[error("invalid change type {0:?}")]
    UnknownCategory(String),
}

/// A single changelog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    /// Free-form id, usually an issue or pull request number.
    pub identifier: String,
    /// What kind of change this is.
    pub category: Category,
    /// File text with trailing whitespace removed.
    pub content: String,
}

impl Fragment {
    /// Build a fragment, stripping trailing whitespace from `content`.
    pub fn new(identifier: impl Into<String>, category: Category, content: &str) -> Self {
        Self {
            identifier: identifier.into(),
            category,
            content: content.trim_end().to_string(),
        }
    }
}

/// Whether `file_name` is reserved boundary markup or documentation.
pub fn is_reserved(file_name: &str) -> bool {
    RESERVED_FILES.contains(&file_name)
}

/// Split a fragment file name into its identifier and category.
///
/// Segments after the category are treated as the extension and ignored,
/// so `12.bugfix.md` and `12.bugfix.rst.txt` both classify as bugfix `12`.
pub fn classify(file_name: &str) -> Result<(String, Category), ClassificationError> {
    if is_reserved(file_name) {
        return Err(ClassificationError::Reserved(file_name.to_string()));
    }

    let mut segments = file_name.split('.');
    let identifier = segments.next().unwrap_or_default();
    let Some(category) = segments.next() else {
        return Err(ClassificationError::Malformed(file_name.to_string()));
    };
    if identifier.is_empty() {
        return Err(ClassificationError::Malformed(file_name.to_string()));
    }

    Ok((identifier.to_string(), category.parse()?))
}

/// Lexically clean a fragment directory: `./changelog.d/` and
/// `changelog.d/./` both become `changelog.d`; `.` stays `.`.
///
/// Backends report paths without `.` components, so comparisons against
/// them need the cleaned form.
pub fn normalize_dir(dir: &Utf8Path) -> Utf8PathBuf {
    let cleaned: Utf8PathBuf = dir
        .components()
        .filter(|c| !matches!(c, Utf8Component::CurDir))
        .collect();
    if cleaned.as_str().is_empty() {
        Utf8PathBuf::from(".")
    } else {
        cleaned
    }
}

/// Fragment files newly added under `fragment_dir` between two revisions.
///
/// `from = None` (or an unresolvable `from`) treats every fragment present at
/// `to` as new. Paths the backend reports outside `fragment_dir` are dropped.
#[instrument(skip(vcs), fields(%fragment_dir))]
pub fn changed_fragments<V: VcsClient + ?Sized>(
    vcs: &V,
    from: Option<&str>,
    to: &str,
    fragment_dir: &Utf8Path,
) -> GitResult<Vec<Utf8PathBuf>> {
    let fragment_dir = normalize_dir(fragment_dir);
    let whole_tree = fragment_dir == ".";
    let changed: Vec<Utf8PathBuf> = vcs
        .diff_added_files(from, to, &fragment_dir)?
        .into_iter()
        .filter(|path| whole_tree || (path.starts_with(&fragment_dir) && *path != fragment_dir))
        .collect();
    debug!(count = changed.len(), "fragments added");
    Ok(changed)
}
