//! Core library for sdcd.
//!
//! Generates a Markdown changelog from small fragment files committed under
//! a fragment directory, attributing each fragment to the first tag that
//! contains it.
//!
//! # Modules
//!
//! - [`changelog`] - Settings, orchestration and output
//! - [`config`] - Configuration loading and management
//! - [`detect`] - Package name and tool detection
//! - [`error`] - Configuration error types
//! - [`fragment`] - Fragment naming and classification
//! - [`git`] - `git` command backend
//! - [`release`] - Attribution of fragments to releases
//! - [`render`] - Markdown rendering
//! - [`vcs`] - Version control seam and baseline tag
//!
//! # Quick Start
//!
//! ```no_run
//! use camino::Utf8Path;
//! use sdcd_core::{ChangelogSettings, ConfigLoader, SystemGit, generate};
//!
//! let root = Utf8Path::new(".");
//! let config = ConfigLoader::new()
//!     .with_project_search(root)
//!     .load()
//!     .expect("Failed to load configuration");
//! let settings = ChangelogSettings::resolve(&config, root);
//! let git = SystemGit::open(root).expect("not a git repository");
//!
//! let generated = generate(root, &settings, &git).expect("changelog generation failed");
//! print!("{}", generated.markdown);
//! ```
#![deny(unsafe_code)]

pub mod changelog;

pub mod config;

pub mod detect;

pub mod error;

#[cfg(any(test, feature = "fakes"))]
pub mod fakes;

pub mod fragment;

pub mod git;

pub mod release;

pub mod render;

pub mod vcs;

pub use changelog::{
    ChangelogError, ChangelogResult, ChangelogSettings, GeneratedChangelog, generate,
    write_changelog,
};

pub use config::{ChangelogConfig, Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

pub use fragment::{Category, Fragment};

pub use git::{GitError, SystemGit};

pub use release::{AggregateOptions, Changelog, Release};

pub use render::{ReleaseSelection, Renderer};

pub use vcs::{BASELINE_TAG, Tag, VcsClient};

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
