//! Configuration loading and discovery.
//!
//! Configuration is layered from:
//! 1. Built-in defaults
//! 2. User config from the XDG config directory
//! 3. Project config, found by walking up from the working directory
//! 4. Explicit files passed on the command line
//! 5. Pipeline environment variables (`CHANGELOG_*`, `SD_ARTIFACTS_DIR`)
//!
//! # Supported formats
//!
//! - TOML (`.toml`)
//! - YAML (`.yaml`, `.yml`)
//! - JSON (`.json`)
//!
//! # Config file locations (in order of precedence, highest first):
//! - `.sdcd.<ext>` in current directory or any parent
//! - `sdcd.<ext>` in current directory or any parent
//! - `~/.config/sdcd/config.<ext>` (user config)
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use sdcd_core::config::ConfigLoader;
//!
//! let cwd = std::env::current_dir().unwrap();
//! let cwd = Utf8PathBuf::try_from(cwd).expect("current directory is not valid UTF-8");
//! let config = ConfigLoader::new()
//!     .with_project_search(&cwd)
//!     .load()
//!     .unwrap();
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Environment variable overriding the fragment directory.
pub const ENV_CHANGELOG_DIR: &str = "CHANGELOG_DIR";
/// Environment variable selecting releases (`all` or a comma list).
pub const ENV_CHANGELOG_RELEASES: &str = "CHANGELOG_RELEASES";
/// Environment variable toggling the version-tag filter.
pub const ENV_ONLY_VERSION_TAGS: &str = "CHANGELOG_ONLY_VERSION_TAGS";
/// Environment variable toggling the stable-release filter.
pub const ENV_ONLY_STABLE_RELEASES: &str = "CHANGELOG_ONLY_STABLE_RELEASES";
/// Environment variable overriding the output file.
pub const ENV_CHANGELOG_FILENAME: &str = "CHANGELOG_FILENAME";
/// Pipeline artifacts directory.
pub const ENV_ARTIFACTS_DIR: &str = "SD_ARTIFACTS_DIR";

/// Every pipeline environment variable that overrides configuration.
pub const PIPELINE_ENV_VARS: &[&str] = &[
    ENV_CHANGELOG_DIR,
    ENV_CHANGELOG_RELEASES,
    ENV_ONLY_VERSION_TAGS,
    ENV_ONLY_STABLE_RELEASES,
    ENV_CHANGELOG_FILENAME,
    ENV_ARTIFACTS_DIR,
];

/// The configuration for sdcd.
///
/// Deserialized from config files found during discovery (TOML, YAML, or JSON).
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// Changelog generation settings.
    pub changelog: Option<ChangelogConfig>,
}

impl Config {
    /// Apply pipeline environment overrides using `lookup` to read variables.
    ///
    /// Unset or empty variables leave the configured value alone. Booleans
    /// follow [`parse_env_bool`].
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let changelog = self.changelog.get_or_insert_with(ChangelogConfig::default);

        if let Some(dir) = get(ENV_CHANGELOG_DIR) {
            changelog.dir = Some(dir.into());
        }
        if let Some(releases) = get(ENV_CHANGELOG_RELEASES) {
            changelog.releases = Some(releases);
        }
        if let Some(value) = get(ENV_ONLY_VERSION_TAGS) {
            changelog.only_version_tags = Some(parse_env_bool(&value));
        }
        if let Some(value) = get(ENV_ONLY_STABLE_RELEASES) {
            changelog.only_stable_releases = Some(parse_env_bool(&value));
        }
        if let Some(filename) = get(ENV_CHANGELOG_FILENAME) {
            changelog.filename = Some(filename.into());
        }
        if let Some(artifacts) = get(ENV_ARTIFACTS_DIR) {
            changelog.artifacts_dir = Some(artifacts.into());
        }

        if self.changelog.as_ref() == Some(&ChangelogConfig::default()) {
            self.changelog = None;
        }
    }
}

/// `[changelog]` section. Unset fields fall back to built-in defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ChangelogConfig {
    /// Fragment directory, relative to the project root (default `changelog.d`).
    pub dir: Option<Utf8PathBuf>,
    /// Releases to render: `all` or a comma-separated list of tags.
    pub releases: Option<String>,
    /// Only tags starting with the version prefix are releases (default `true`).
    pub only_version_tags: Option<bool>,
    /// Skip pre-release tags (default `false`).
    pub only_stable_releases: Option<bool>,
    /// Prefix marking version tags (default `v`).
    pub version_prefix: Option<String>,
    /// Output file. Defaults to `<artifacts_dir>/reports/changelog/changelog.md`.
    pub filename: Option<Utf8PathBuf>,
    /// Pipeline artifacts directory (default `artifacts`).
    pub artifacts_dir: Option<Utf8PathBuf>,
    /// Package name shown in release headings; detected when unset.
    pub package_name: Option<String>,
}

/// Parse a boolean environment value: `true`, `on` and `1` are true
/// (case-insensitive), everything else is false.
pub fn parse_env_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "on" | "1"
    )
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Supported configuration file extensions (in order of preference).
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for XDG directory lookup and config file names.
pub const APP_NAME: &str = "sdcd";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Starting directory for project config search.
    project_search_root: Option<Utf8PathBuf>,
    /// Whether to include user config from XDG directory.
    include_user_config: bool,
    /// Stop searching when we hit a directory containing this file/dir.
    boundary_marker: Option<String>,
    /// Explicit config files to load (for testing or programmatic use).
    explicit_files: Vec<Utf8PathBuf>,
    /// Whether pipeline environment variables override file values.
    env_overrides: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default settings.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
            env_overrides: true,
        }
    }

    /// Set the starting directory for project config search.
    ///
    /// The loader will walk up from this directory looking for config files.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set whether to include user config from `~/.config/sdcd/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Set a boundary marker to stop directory traversal.
    ///
    /// When walking up directories, stop if we find a directory containing
    /// this file or directory name. Default is `.git`.
    pub fn with_boundary_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.boundary_marker = Some(marker.into());
        self
    }

    /// Disable boundary marker (search all the way to filesystem root).
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Add an explicit config file to load.
    ///
    /// Files are loaded in order, with later files taking precedence.
    /// Explicit files are loaded after discovered files.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Set whether pipeline environment variables are applied after loading.
    pub const fn with_env_overrides(mut self, enabled: bool) -> Self {
        self.env_overrides = enabled;
        self
    }

    /// Load configuration, merging all discovered sources.
    ///
    /// Precedence (highest to lowest):
    /// 1. Pipeline environment variables (unless disabled)
    /// 2. Explicit files (in order added via `with_file`)
    /// 3. Project config (closest to search root)
    /// 4. User config (`~/.config/sdcd/config.<ext>`)
    /// 5. Default values
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        tracing::debug!("loading configuration");
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Start with user config (lowest precedence of file sources)
        if self.include_user_config
            && let Some(user_config) = self.find_user_config()
        {
            figment = Self::merge_file(figment, &user_config);
        }

        // Add project config
        if let Some(ref root) = self.project_search_root
            && let Some(project_config) = self.find_project_config(root)
        {
            figment = Self::merge_file(figment, &project_config);
        }

        // Add explicit files (highest precedence)
        for file in &self.explicit_files {
            figment = Self::merge_file(figment, file);
        }

        let mut config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        if self.env_overrides {
            config.apply_env_overrides(|key| std::env::var(key).ok());
        }
        tracing::info!(
            log_level = config.log_level.as_str(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Load configuration, returning an error if no config file is found.
    pub fn load_or_error(self) -> ConfigResult<Config> {
        let has_user = self.include_user_config && self.find_user_config().is_some();
        let has_project = self
            .project_search_root
            .as_ref()
            .and_then(|root| self.find_project_config(root))
            .is_some();
        let has_explicit = !self.explicit_files.is_empty();

        if !has_user && !has_project && !has_explicit {
            return Err(ConfigError::NotFound);
        }

        self.load()
    }

    /// Find project config by walking up from the given directory.
    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            // Check for boundary marker
            if let Some(ref marker) = self.boundary_marker {
                let marker_path = dir.join(marker);
                if marker_path.exists() && dir != start {
                    // Found boundary in a parent dir, stop searching
                    break;
                }
            }

            // Check for config files in this directory (try each extension)
            for ext in CONFIG_EXTENSIONS {
                // Try dotfile first (.sdcd.toml)
                let dotfile = dir.join(format!(".{APP_NAME}.{ext}"));
                if dotfile.is_file() {
                    return Some(dotfile);
                }

                // Then try regular name (sdcd.toml)
                let regular = dir.join(format!("{APP_NAME}.{ext}"));
                if regular.is_file() {
                    return Some(regular);
                }
            }

            current = dir.parent().map(Utf8Path::to_path_buf);
        }

        None
    }

    /// Find user config in XDG config directory.
    fn find_user_config(&self) -> Option<Utf8PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("", "", APP_NAME)?;
        let config_dir = proj_dirs.config_dir();

        // Try each supported extension
        for ext in CONFIG_EXTENSIONS {
            let config_path = config_dir.join(format!("config.{ext}"));
            if config_path.is_file() {
                return Utf8PathBuf::from_path_buf(config_path).ok();
            }
        }

        None
    }

    /// Merge a config file into the figment, detecting format from extension.
    fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
        match path.extension() {
            Some("toml") => figment.merge(Toml::file_exact(path.as_str())),
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
            Some("json") => figment.merge(Json::file_exact(path.as_str())),
            _ => figment.merge(Toml::file_exact(path.as_str())),
        }
    }
}

/// Find the project config file path without loading it.
///
/// Useful for commands that need to know where config is located.
pub fn find_project_config<P: AsRef<Utf8Path>>(start: P) -> Option<Utf8PathBuf> {
    ConfigLoader::new()
        .with_project_search(start.as_ref())
        .without_boundary_marker()
        .find_project_config(start.as_ref())
}

/// Get the project directories for XDG-compliant path resolution.
///
/// Returns `None` if the home directory cannot be determined.
fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the user config directory path.
///
/// Returns `~/.config/sdcd/` on Linux, `~/Library/Application Support/sdcd/`
/// on macOS, and equivalent on other platforms.
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.config_dir().to_path_buf()).ok()
}

/// Get the user cache directory path.
///
/// Returns `~/.cache/sdcd/` on Linux, `~/Library/Caches/sdcd/`
/// on macOS, and equivalent on other platforms.
pub fn user_cache_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.cache_dir().to_path_buf()).ok()
}

/// Get the user data directory path.
///
/// Returns `~/.local/share/sdcd/` on Linux, `~/Library/Application Support/sdcd/`
/// on macOS, and equivalent on other platforms.
pub fn user_data_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.data_dir().to_path_buf()).ok()
}

/// Get the local data directory path (machine-specific, not synced).
///
/// Returns `~/.local/share/sdcd/` on Linux, `~/Library/Application Support/sdcd/`
/// on macOS, and equivalent on other platforms.
pub fn user_data_local_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = project_dirs()?;
    Utf8PathBuf::from_path_buf(proj_dirs.data_local_dir().to_path_buf()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn loader() -> ConfigLoader {
        ConfigLoader::new()
            .with_user_config(false)
            .with_env_overrides(false)
    }

    fn write_config(tmp: &TempDir, name: &str, contents: &str) -> Utf8PathBuf {
        let path = tmp.path().join(name);
        fs::write(&path, contents).unwrap();
        Utf8PathBuf::try_from(path).unwrap()
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.log_dir.is_none());
        assert!(config.changelog.is_none());
    }

    #[test]
    fn test_loader_builds_with_defaults() {
        let config = loader().without_boundary_marker().load().unwrap();
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_single_file_overrides_default() {
        let tmp = TempDir::new().unwrap();
        let config_path = write_config(
            &tmp,
            "config.toml",
            r#"log_level = "debug"
log_dir = "/tmp/sdcd"
"#,
        );

        let config = loader().with_file(&config_path).load().unwrap();

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(
            config.log_dir.as_ref().map(|dir| dir.as_str()),
            Some("/tmp/sdcd")
        );
    }

    #[test]
    fn test_later_file_overrides_earlier() {
        let tmp = TempDir::new().unwrap();
        let base = write_config(&tmp, "base.toml", r#"log_level = "warn""#);
        let override_config = write_config(&tmp, "override.toml", r#"log_level = "error""#);

        let config = loader()
            .with_file(&base)
            .with_file(&override_config)
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Error);
    }

    #[test]
    fn test_project_config_discovery() {
        let tmp = TempDir::new().unwrap();
        let project_dir = tmp.path().join("project");
        let sub_dir = project_dir.join("src").join("deep");
        fs::create_dir_all(&sub_dir).unwrap();
        fs::write(project_dir.join(".sdcd.toml"), r#"log_level = "debug""#).unwrap();

        let sub_dir = Utf8PathBuf::try_from(sub_dir).unwrap();
        let config = loader()
            .without_boundary_marker()
            .with_project_search(&sub_dir)
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_boundary_marker_stops_search() {
        let tmp = TempDir::new().unwrap();
        let parent = tmp.path().join("parent");
        let child = parent.join("child");
        let work = child.join("work");
        fs::create_dir_all(&work).unwrap();

        // Beyond the .git boundary, must not be found
        fs::write(parent.join(".sdcd.toml"), r#"log_level = "warn""#).unwrap();
        fs::create_dir(child.join(".git")).unwrap();

        let work = Utf8PathBuf::try_from(work).unwrap();
        let config = loader()
            .with_boundary_marker(".git")
            .with_project_search(&work)
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_explicit_file_overrides_project_config() {
        let tmp = TempDir::new().unwrap();
        write_config(&tmp, ".sdcd.toml", r#"log_level = "warn""#);
        let override_config = write_config(&tmp, "override.toml", r#"log_level = "error""#);
        let tmp_path = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();

        let config = loader()
            .without_boundary_marker()
            .with_project_search(&tmp_path)
            .with_file(&override_config)
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Error);
    }

    #[test]
    fn test_load_or_error_fails_when_no_config() {
        let result = loader().without_boundary_marker().load_or_error();
        assert!(matches!(result, Err(ConfigError::NotFound)));
    }

    #[test]
    fn test_load_or_error_succeeds_with_explicit_file() {
        let tmp = TempDir::new().unwrap();
        let config_path = write_config(&tmp, "config.toml", r#"log_level = "debug""#);

        let config = loader().with_file(&config_path).load_or_error().unwrap();
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_user_config_dir() {
        if let Some(path) = user_config_dir() {
            assert!(path.as_str().contains("sdcd"));
        }
    }

    #[test]
    fn test_changelog_section_toml() {
        let tmp = TempDir::new().unwrap();
        let config_path = write_config(
            &tmp,
            "config.toml",
            r#"
[changelog]
dir = "news"
releases = "v1.0.0, v1.1.0"
only_version_tags = false
only_stable_releases = true
version_prefix = "release-"
package_name = "mypkg"
"#,
        );

        let config = loader().with_file(&config_path).load().unwrap();
        let changelog = config.changelog.unwrap();
        assert_eq!(changelog.dir.as_deref(), Some(Utf8Path::new("news")));
        assert_eq!(changelog.releases.as_deref(), Some("v1.0.0, v1.1.0"));
        assert_eq!(changelog.only_version_tags, Some(false));
        assert_eq!(changelog.only_stable_releases, Some(true));
        assert_eq!(changelog.version_prefix.as_deref(), Some("release-"));
        assert_eq!(changelog.package_name.as_deref(), Some("mypkg"));
        assert!(changelog.filename.is_none());
    }

    #[test]
    fn test_changelog_section_yaml() {
        let tmp = TempDir::new().unwrap();
        let config_path = write_config(
            &tmp,
            "config.yaml",
            "changelog:\n  dir: fragments\n  artifacts_dir: out\n",
        );

        let config = loader().with_file(&config_path).load().unwrap();
        let changelog = config.changelog.unwrap();
        assert_eq!(changelog.dir.as_deref(), Some(Utf8Path::new("fragments")));
        assert_eq!(changelog.artifacts_dir.as_deref(), Some(Utf8Path::new("out")));
    }

    #[test]
    fn test_invalid_changelog_value_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let config_path = write_config(
            &tmp,
            "config.toml",
            "[changelog]\nonly_version_tags = \"sometimes\"\n",
        );

        let result = loader().with_file(&config_path).load();
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }

    #[test]
    fn test_env_overrides_replace_file_values() {
        let mut config = Config {
            changelog: Some(ChangelogConfig {
                dir: Some("from-file".into()),
                only_version_tags: Some(true),
                ..ChangelogConfig::default()
            }),
            ..Config::default()
        };

        config.apply_env_overrides(env(&[
            (ENV_CHANGELOG_DIR, "from-env"),
            (ENV_ONLY_VERSION_TAGS, "off"),
            (ENV_ONLY_STABLE_RELEASES, "ON"),
            (ENV_CHANGELOG_RELEASES, "v0.1.0"),
            (ENV_ARTIFACTS_DIR, "/sd/artifacts"),
            (ENV_CHANGELOG_FILENAME, "CHANGES.md"),
        ]));

        let changelog = config.changelog.unwrap();
        assert_eq!(changelog.dir.as_deref(), Some(Utf8Path::new("from-env")));
        assert_eq!(changelog.only_version_tags, Some(false));
        assert_eq!(changelog.only_stable_releases, Some(true));
        assert_eq!(changelog.releases.as_deref(), Some("v0.1.0"));
        assert_eq!(
            changelog.artifacts_dir.as_deref(),
            Some(Utf8Path::new("/sd/artifacts"))
        );
        assert_eq!(changelog.filename.as_deref(), Some(Utf8Path::new("CHANGES.md")));
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = Config::default();
        config.apply_env_overrides(env(&[(ENV_CHANGELOG_DIR, ""), (ENV_ONLY_VERSION_TAGS, " ")]));
        assert!(config.changelog.is_none());
    }

    #[test]
    fn test_parse_env_bool() {
        for truthy in ["true", "TRUE", "on", "On", "1", " true "] {
            assert!(parse_env_bool(truthy), "{truthy}");
        }
        for falsy in ["false", "off", "0", "yes", ""] {
            assert!(!parse_env_bool(falsy), "{falsy}");
        }
    }

    #[test]
    fn test_config_ignores_unknown_sections() {
        let tmp = TempDir::new().unwrap();
        let config_path = write_config(
            &tmp,
            "config.toml",
            r#"
log_level = "warn"

[release]
draft = true
"#,
        );

        let config = loader().with_file(&config_path).load().unwrap();
        assert_eq!(config.log_level, LogLevel::Warn);
        assert!(config.changelog.is_none());
    }
}
