//! Changelog generation: settings, orchestration and output.
//!
//! [`generate`] ties the pieces together: aggregate releases from history,
//! read the optional header and footer, and render Markdown. Writing the
//! result is left to the caller via [`write_changelog`].

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::{ChangelogConfig, Config};
use crate::detect;
use crate::fragment::{self, DEFAULT_FRAGMENT_DIR, FOOTER_FILE, HEADER_FILE};
use crate::git::GitError;
use crate::release::{self, AggregateOptions, Changelog, DEFAULT_VERSION_PREFIX};
use crate::render::{ReleaseSelection, Renderer};
use crate::vcs::VcsClient;

/// Default pipeline artifacts directory.
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// Output location below the artifacts directory.
pub const DEFAULT_REPORT_PATH: &str = "reports/changelog/changelog.md";

/// Errors from changelog generation.
#[derive(Error, Debug)]
pub enum ChangelogError {
    /// A version control operation failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// `HEADER.md` or `FOOTER.md` exists but could not be read.
    #[error("failed to read {path}: {source}")]
    ReadBoundary {
        /// File that failed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// An absolute fragment directory lies outside the project root.
    #[error("fragment directory {dir} is not inside {root}")]
    FragmentDirOutsideRoot {
        /// Configured fragment directory.
        dir: Utf8PathBuf,
        /// Project root it was resolved against.
        root: Utf8PathBuf,
    },

    /// The output file or its parent directories could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// File that failed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// Result alias for changelog operations.
pub type ChangelogResult<T> = Result<T, ChangelogError>;

/// Fully resolved settings for one generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangelogSettings {
    /// Fragment directory, relative to the project root.
    pub fragment_dir: Utf8PathBuf,
    /// Release names to render.
    #[serde(serialize_with = "serialize_selection")]
    pub releases: ReleaseSelection,
    /// Only version tags become releases.
    pub only_version_tags: bool,
    /// Skip pre-release tags.
    pub only_stable_releases: bool,
    /// Prefix identifying version tags.
    pub version_prefix: String,
    /// Where the document is written, relative paths against the project root.
    pub output: Utf8PathBuf,
    /// Name prefixed to release headings.
    pub package_name: Option<String>,
}

impl Default for ChangelogSettings {
    fn default() -> Self {
        Self {
            fragment_dir: Utf8PathBuf::from(DEFAULT_FRAGMENT_DIR),
            releases: ReleaseSelection::All,
            only_version_tags: true,
            only_stable_releases: false,
            version_prefix: DEFAULT_VERSION_PREFIX.to_string(),
            output: Utf8PathBuf::from(DEFAULT_ARTIFACTS_DIR).join(DEFAULT_REPORT_PATH),
            package_name: None,
        }
    }
}

impl ChangelogSettings {
    /// Resolve settings from configuration, falling back to defaults.
    ///
    /// The package name is detected from `project_root` manifests when the
    /// configuration does not set one.
    pub fn resolve(config: &Config, project_root: &Utf8Path) -> Self {
        let section = config.changelog.clone().unwrap_or_default();
        let defaults = Self::default();
        let ChangelogConfig {
            dir,
            releases,
            only_version_tags,
            only_stable_releases,
            version_prefix,
            filename,
            artifacts_dir,
            package_name,
        } = section;

        let output = filename.unwrap_or_else(|| {
            artifacts_dir
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_ARTIFACTS_DIR))
                .join(DEFAULT_REPORT_PATH)
        });

        Self {
            fragment_dir: dir.map_or(defaults.fragment_dir, |dir| fragment::normalize_dir(&dir)),
            releases: releases
                .and_then(|value| value.parse().ok())
                .unwrap_or_default(),
            only_version_tags: only_version_tags.unwrap_or(defaults.only_version_tags),
            only_stable_releases: only_stable_releases.unwrap_or(defaults.only_stable_releases),
            version_prefix: version_prefix.unwrap_or(defaults.version_prefix),
            output,
            package_name: package_name
                .filter(|name| !name.trim().is_empty())
                .or_else(|| detect::package_name(project_root)),
        }
    }

    /// Options for the release aggregator.
    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            fragment_dir: self.fragment_dir.clone(),
            only_version_tags: self.only_version_tags,
            only_stable_releases: self.only_stable_releases,
            version_prefix: self.version_prefix.clone(),
        }
    }

    /// Fragment directory relative to `project_root`, without `.` components.
    ///
    /// Absolute directories must lie below `project_root`.
    pub fn relative_fragment_dir(&self, project_root: &Utf8Path) -> ChangelogResult<Utf8PathBuf> {
        let dir = if self.fragment_dir.is_absolute() {
            self.fragment_dir.strip_prefix(project_root).map_err(|_| {
                ChangelogError::FragmentDirOutsideRoot {
                    dir: self.fragment_dir.clone(),
                    root: project_root.to_path_buf(),
                }
            })?
        } else {
            &self.fragment_dir
        };
        Ok(fragment::normalize_dir(dir))
    }

    /// Output path, resolved against `project_root` when relative.
    pub fn output_path(&self, project_root: &Utf8Path) -> Utf8PathBuf {
        if self.output.is_absolute() {
            self.output.clone()
        } else {
            project_root.join(&self.output)
        }
    }
}

fn serialize_selection<S: serde::Serializer>(
    selection: &ReleaseSelection,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match selection {
        ReleaseSelection::All => serializer.serialize_str("all"),
        ReleaseSelection::Only(names) => serializer.collect_seq(names),
    }
}

/// Result of [`generate`].
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedChangelog {
    /// Rendered Markdown document.
    pub markdown: String,
    /// Aggregated releases, oldest first.
    pub changelog: Changelog,
    /// Where the document is meant to be written.
    pub output: Utf8PathBuf,
}

/// Aggregate, then render the changelog for the repository behind `vcs`.
///
/// `HEADER.md` and `FOOTER.md` are read from the fragment directory in the
/// working tree below `project_root`.
#[instrument(skip(settings, vcs), fields(fragment_dir = %settings.fragment_dir))]
pub fn generate<V: VcsClient + ?Sized>(
    project_root: &Utf8Path,
    settings: &ChangelogSettings,
    vcs: &V,
) -> ChangelogResult<GeneratedChangelog> {
    let relative_dir = settings.relative_fragment_dir(project_root)?;
    let options = AggregateOptions {
        fragment_dir: relative_dir.clone(),
        ..settings.aggregate_options()
    };
    let changelog = release::aggregate(vcs, &options)?;

    let fragment_dir = project_root.join(&relative_dir);
    let header = read_boundary_file(&fragment_dir.join(HEADER_FILE))?;
    let footer = read_boundary_file(&fragment_dir.join(FOOTER_FILE))?;

    let markdown = Renderer::new(settings.package_name.clone()).render(
        &changelog,
        &settings.releases,
        header.as_deref(),
        footer.as_deref(),
    );

    Ok(GeneratedChangelog {
        markdown,
        changelog,
        output: settings.output_path(project_root),
    })
}

/// Read an optional header or footer file. A missing file is `None`.
pub fn read_boundary_file(path: &Utf8Path) -> ChangelogResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => {
            debug!(%path, "read boundary file");
            Ok(Some(text))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ChangelogError::ReadBoundary {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Write `content` to `path`, creating parent directories and overwriting.
#[instrument(skip(content), fields(bytes = content.len()))]
pub fn write_changelog(path: &Utf8Path, content: &str) -> ChangelogResult<()> {
    let write_err = |source| ChangelogError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, content).map_err(write_err)?;
    info!(%path, "changelog written");
    Ok(())
}
