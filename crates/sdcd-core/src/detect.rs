//! Project and tool detection.
//!
//! Finds the package name shown in release headings by reading the usual
//! manifest files, and checks that the tools the engine shells out to are
//! installed.
//!
//! # Example
//!
//! ```no_run
//! use camino::Utf8Path;
//! use sdcd_core::detect;
//!
//! match detect::package_name(Utf8Path::new(".")) {
//!     Some(name) => println!("Package: {name}"),
//!     None => println!("No manifest found"),
//! }
//! ```

use std::collections::BTreeMap;
use std::process::Command;

use camino::Utf8Path;
use figment::Figment;
use figment::providers::{Format, Toml};
use serde::Deserialize;
use tracing::{debug, instrument};

/// Minimum git version: `log --pretty=format:%D` and `diff --no-renames`.
pub const MIN_GIT_VERSION: semver::Version = semver::Version::new(2, 6, 0);

#[derive(Debug, Default, Deserialize)]
struct NamedTable {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PyProject {
    #[serde(default)]
    project: NamedTable,
    #[serde(default)]
    tool: BTreeMap<String, NamedTable>,
}

#[derive(Debug, Default, Deserialize)]
struct CargoManifest {
    #[serde(default)]
    package: NamedTable,
}

/// Detect the package name from manifests in `project_root`.
///
/// Checked in order: `setup.cfg` `[metadata] name`, `pyproject.toml`
/// (`[project]` then `[tool.poetry]`), `Cargo.toml` `[package]` and
/// `package.json`. Unreadable or malformed manifests are skipped.
#[instrument(fields(root = %project_root))]
pub fn package_name(project_root: &Utf8Path) -> Option<String> {
    let detected = setup_cfg_name(project_root)
        .or_else(|| pyproject_name(project_root))
        .or_else(|| cargo_name(project_root))
        .or_else(|| package_json_name(project_root))
        .filter(|name| !name.trim().is_empty());
    debug!(name = ?detected, "package name detection");
    detected
}

fn setup_cfg_name(root: &Utf8Path) -> Option<String> {
    let text = std::fs::read_to_string(root.join("setup.cfg")).ok()?;
    parse_setup_cfg_name(&text)
}

/// `name` from the `[metadata]` section of an INI-style `setup.cfg`.
fn parse_setup_cfg_name(text: &str) -> Option<String> {
    let mut in_metadata = false;
    for line in text.lines().map(str::trim) {
        if line.starts_with('[') && line.ends_with(']') {
            in_metadata = &line[1..line.len() - 1] == "metadata";
            continue;
        }
        if !in_metadata {
            continue;
        }
        if let Some((key, value)) = line.split_once(['=', ':'])
            && key.trim() == "name"
        {
            let value = value.trim();
            // `attr:` and `file:` directives are resolved by setuptools, not literal names
            if value.starts_with("attr:") || value.starts_with("file:") {
                return None;
            }
            return Some(value.to_string());
        }
    }
    None
}

fn pyproject_name(root: &Utf8Path) -> Option<String> {
    let manifest: PyProject = read_toml(root, "pyproject.toml")?;
    manifest.project.name.or_else(|| {
        manifest
            .tool
            .get("poetry")
            .and_then(|poetry| poetry.name.clone())
    })
}

fn cargo_name(root: &Utf8Path) -> Option<String> {
    let manifest: CargoManifest = read_toml(root, "Cargo.toml")?;
    manifest.package.name
}

fn package_json_name(root: &Utf8Path) -> Option<String> {
    let text = std::fs::read_to_string(root.join("package.json")).ok()?;
    let manifest: NamedTable = serde_json::from_str(&text).ok()?;
    manifest.name
}

fn read_toml<T: for<'de> Deserialize<'de>>(root: &Utf8Path, file: &str) -> Option<T> {
    let path = root.join(file);
    if !path.is_file() {
        return None;
    }
    Figment::from(Toml::file_exact(path.as_str()))
        .extract()
        .map_err(|e| debug!(%path, error = %e, "ignoring unreadable manifest"))
        .ok()
}

/// Check whether a binary is available on `PATH`.
pub fn has_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Result of a tool version check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolVersionCheck {
    /// Tool meets the minimum version.
    Ok(semver::Version),
    /// Tool is too old.
    TooOld {
        /// The version that was found.
        found: semver::Version,
        /// The minimum required version.
        minimum: semver::Version,
    },
    /// Could not determine the version (binary missing, parse failure, etc.).
    Unknown(String),
}

/// Check the installed version of a CLI tool.
///
/// Runs `<binary> --version` and compares the first version-looking token
/// of its output (`git version 2.43.0`) against `minimum`.
pub fn check_tool_version(binary: &str, minimum: &semver::Version) -> ToolVersionCheck {
    let output = match Command::new(binary).arg("--version").output() {
        Ok(o) if o.status.success() => o,
        Ok(o) => {
            return ToolVersionCheck::Unknown(format!(
                "`{binary} --version` exited with {}",
                o.status,
            ));
        }
        Err(e) => {
            return ToolVersionCheck::Unknown(format!(
                "failed to run `{binary} --version`: {e}",
            ));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let Some(version) = parse_version_from_output(&stdout) else {
        return ToolVersionCheck::Unknown(format!(
            "could not parse version from `{binary} --version` output: {}",
            stdout.trim(),
        ));
    };

    if version >= *minimum {
        ToolVersionCheck::Ok(version)
    } else {
        ToolVersionCheck::TooOld {
            found: version,
            minimum: minimum.clone(),
        }
    }
}

/// Extract a version from tool output.
///
/// Tokens that are not strict semver (`2.43.0.windows.1`) are cut down to
/// their leading `major.minor.patch`.
pub fn parse_version_from_output(output: &str) -> Option<semver::Version> {
    output.split_whitespace().find_map(|token| {
        semver::Version::parse(token)
            .ok()
            .or_else(|| leading_triple(token))
    })
}

fn leading_triple(token: &str) -> Option<semver::Version> {
    let mut parts = token.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next()?.parse().ok()?;
    Some(semver::Version::new(major, minor, patch))
}
