//! Doctor command: diagnose configuration, environment and tooling.

use camino::Utf8Path;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use sdcd_core::config;
use sdcd_core::detect::{self, MIN_GIT_VERSION, ToolVersionCheck};

/// Arguments for the `doctor` subcommand.
#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct DoctorReport {
    directories: DirectoryPaths,
    config: ConfigStatus,
    environment: EnvironmentInfo,
    tools: Vec<ToolStatus>,
}

#[derive(Serialize)]
struct DirectoryPaths {
    config: Option<String>,
    cache: Option<String>,
    data: Option<String>,
    data_local: Option<String>,
}

#[derive(Serialize)]
struct ConfigStatus {
    /// Path to the project config file, if any
    file: Option<String>,
    found: bool,
}

#[derive(Serialize)]
struct EnvironmentInfo {
    cwd: String,
    env_vars: Vec<EnvVar>,
}

#[derive(Serialize)]
struct EnvVar {
    name: &'static str,
    value: Option<String>,
    description: &'static str,
}

#[derive(Serialize)]
struct ToolStatus {
    name: &'static str,
    available: bool,
    version: Option<String>,
    minimum: String,
    /// Problem description when the tool is missing or too old.
    #[serde(skip_serializing_if = "Option::is_none")]
    problem: Option<String>,
}

impl ToolStatus {
    fn check(name: &'static str, minimum: &sdcd_core::semver::Version) -> Self {
        let available = detect::has_binary(name);
        let (version, problem) = if available {
            match detect::check_tool_version(name, minimum) {
                ToolVersionCheck::Ok(v) => (Some(v.to_string()), None),
                ToolVersionCheck::TooOld { found, minimum } => (
                    Some(found.to_string()),
                    Some(format!("{name} {found} is older than {minimum}")),
                ),
                ToolVersionCheck::Unknown(reason) => (None, Some(reason)),
            }
        } else {
            (None, Some(format!("{name} not found on PATH")))
        };

        Self {
            name,
            available,
            version,
            minimum: minimum.to_string(),
            problem,
        }
    }
}

const ENV_VARS: &[(&str, &str)] = &[
    ("XDG_CONFIG_HOME", "Override config directory"),
    ("XDG_DATA_HOME", "Override data directory"),
    ("RUST_LOG", "Log filter directive"),
    ("SDCD_LOG_PATH", "Explicit log file path"),
    ("SDCD_LOG_DIR", "Log directory"),
    (config::ENV_CHANGELOG_DIR, "Fragment directory"),
    (config::ENV_CHANGELOG_RELEASES, "Releases to render"),
    (config::ENV_ONLY_VERSION_TAGS, "Only version tags are releases"),
    (config::ENV_ONLY_STABLE_RELEASES, "Skip pre-release tags"),
    (config::ENV_CHANGELOG_FILENAME, "Output file"),
    (config::ENV_ARTIFACTS_DIR, "Pipeline artifacts directory"),
];

impl DoctorReport {
    fn gather(cwd: &Utf8Path) -> Self {
        let config_file = config::find_project_config(cwd);

        Self {
            directories: DirectoryPaths {
                config: config::user_config_dir().map(|p| p.to_string()),
                cache: config::user_cache_dir().map(|p| p.to_string()),
                data: config::user_data_dir().map(|p| p.to_string()),
                data_local: config::user_data_local_dir().map(|p| p.to_string()),
            },
            config: ConfigStatus {
                found: config_file.is_some(),
                file: config_file.map(|p| p.to_string()),
            },
            environment: EnvironmentInfo {
                cwd: cwd.to_string(),
                env_vars: ENV_VARS
                    .iter()
                    .map(|&(name, description)| EnvVar {
                        name,
                        value: std::env::var(name).ok(),
                        description,
                    })
                    .collect(),
            },
            tools: vec![ToolStatus::check("git", &MIN_GIT_VERSION)],
        }
    }
}

/// Run diagnostics and report configuration status.
#[instrument(name = "cmd_doctor", skip_all, fields(json_output = global_json))]
pub fn cmd_doctor(_args: DoctorArgs, global_json: bool, cwd: &Utf8Path) -> anyhow::Result<()> {
    debug!("executing doctor command");

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Gathering diagnostics...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    let report = DoctorReport::gather(cwd);
    spinner.finish_and_clear();

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Configuration".bold().underline());
    if report.config.found {
        println!(
            "  {} Config file: {}",
            "✓".green(),
            report.config.file.as_deref().unwrap_or("").cyan()
        );
    } else {
        println!("  {} No config file found", "○".yellow());
        offer_config_creation()?;
    }
    println!();

    println!("{}", "Tools".bold().underline());
    for tool in &report.tools {
        match (&tool.version, &tool.problem) {
            (Some(version), None) => {
                println!("  {} {} {}", "✓".green(), tool.name, version.cyan());
            }
            (_, Some(problem)) => println!("  {} {}", "✗".red(), problem.red()),
            (None, None) => println!("  {} {}", "○".yellow(), tool.name),
        }
    }
    println!();

    println!("{}", "Directories".bold().underline());
    print_dir("  Config", report.directories.config.as_deref());
    print_dir("  Cache", report.directories.cache.as_deref());
    print_dir("  Data", report.directories.data.as_deref());
    print_dir("  Data (local)", report.directories.data_local.as_deref());
    println!();

    println!("{}", "Environment".bold().underline());
    println!("  {}: {}", "Working directory".dimmed(), report.environment.cwd.cyan());
    let set_vars: Vec<_> = report
        .environment
        .env_vars
        .iter()
        .filter(|v| v.value.is_some())
        .collect();
    if set_vars.is_empty() {
        println!("  {} No overrides set", "○".dimmed());
    } else {
        for var in set_vars {
            println!(
                "  {}: {} {}",
                var.name.dimmed(),
                var.value.as_deref().unwrap_or("").cyan(),
                format!("({})", var.description).dimmed()
            );
        }
    }

    Ok(())
}

fn print_dir(label: &str, path: Option<&str>) {
    print!("{}: ", label.dimmed());
    match path {
        Some(p) => println!("{}", p.cyan()),
        None => println!("{}", "(unavailable)".yellow()),
    }
}

/// Offer to create a default user config file when none exists.
fn offer_config_creation() -> anyhow::Result<()> {
    let Some(config_dir) = config::user_config_dir() else {
        return Ok(());
    };
    let config_path = config_dir.join("config.yaml");

    if config_path.exists() || !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Ok(());
    }

    let create = Confirm::new("Create a default config file?")
        .with_default(false)
        .with_help_message(&format!("Will create {config_path}"))
        .prompt();

    // Declined or interrupted
    if !matches!(create, Ok(true)) {
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)?;
    let default_config = config::Config {
        changelog: Some(config::ChangelogConfig::default()),
        ..config::Config::default()
    };
    let yaml = serde_saphyr::to_string(&default_config)?;
    std::fs::write(&config_path, yaml)?;
    println!("  {} Created {}", "✓".green(), config_path.cyan());

    Ok(())
}
