//! Info command: package, configuration and resolved changelog settings.

use camino::Utf8Path;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use sdcd_core::config::{self, Config};
use sdcd_core::{ChangelogSettings, ReleaseSelection};

/// Arguments for the `info` subcommand.
#[derive(Args, Debug, Default)]
pub struct InfoArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct PackageInfo {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    license: &'static str,
}

impl PackageInfo {
    const fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
            license: env!("CARGO_PKG_LICENSE"),
        }
    }
}

#[derive(Serialize)]
struct ConfigInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    config_file: Option<String>,
    log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_dir: Option<String>,
}

impl ConfigInfo {
    fn from_config(config: &Config, cwd: &Utf8Path) -> Self {
        Self {
            config_file: config::find_project_config(cwd).map(|p| p.to_string()),
            log_level: config.log_level.as_str().to_string(),
            log_dir: config.log_dir.as_ref().map(|p| p.to_string()),
        }
    }
}

#[derive(Serialize)]
struct FullInfo {
    #[serde(flatten)]
    package: PackageInfo,
    config: ConfigInfo,
    changelog: ChangelogSettings,
}

/// Print package information and the settings `sdcd changelog` would use.
#[instrument(name = "cmd_info", skip_all, fields(json_output = global_json))]
pub fn cmd_info(
    _args: InfoArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!("executing info command");

    let info = FullInfo {
        package: PackageInfo::new(),
        config: ConfigInfo::from_config(config, cwd),
        changelog: ChangelogSettings::resolve(config, cwd),
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{} {}", info.package.name.bold(), info.package.version.green());
    if !info.package.description.is_empty() {
        println!("{}", info.package.description);
    }
    if !info.package.license.is_empty() {
        println!("{}: {}", "License".dimmed(), info.package.license);
    }

    println!();
    println!("{}", "Configuration".bold().underline());
    match info.config.config_file {
        Some(ref path) => println!("{}: {}", "Config file".dimmed(), path.cyan()),
        None => println!("{}: {}", "Config file".dimmed(), "none loaded".yellow()),
    }
    println!("{}: {}", "Log level".dimmed(), info.config.log_level);
    if let Some(ref dir) = info.config.log_dir {
        println!("{}: {}", "Log directory".dimmed(), dir);
    }

    let changelog = &info.changelog;
    println!();
    println!("{}", "Changelog".bold().underline());
    println!("{}: {}", "Fragment directory".dimmed(), changelog.fragment_dir.cyan());
    println!("{}: {}", "Releases".dimmed(), describe_selection(&changelog.releases));
    println!("{}: {}", "Version tags only".dimmed(), changelog.only_version_tags);
    println!("{}: {}", "Stable releases only".dimmed(), changelog.only_stable_releases);
    println!("{}: {}", "Version prefix".dimmed(), changelog.version_prefix);
    println!("{}: {}", "Output".dimmed(), changelog.output.cyan());
    match changelog.package_name {
        Some(ref name) => println!("{}: {}", "Package name".dimmed(), name.cyan()),
        None => println!("{}: {}", "Package name".dimmed(), "not detected".yellow()),
    }

    Ok(())
}

fn describe_selection(selection: &ReleaseSelection) -> String {
    match selection {
        ReleaseSelection::All => "all".to_string(),
        ReleaseSelection::Only(names) => names.iter().cloned().collect::<Vec<_>>().join(", "),
    }
}
