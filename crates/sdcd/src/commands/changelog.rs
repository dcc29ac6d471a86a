//! Changelog command: generate the changelog document.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use sdcd_core::{ChangelogSettings, Config, ReleaseSelection, SystemGit, generate, write_changelog};

/// Arguments for the `changelog` subcommand.
///
/// Flags override configuration and pipeline environment variables.
#[derive(Args, Debug, Default)]
pub struct ChangelogArgs {
    /// Fragment directory, relative to the working directory
    #[arg(long, value_name = "DIR")]
    pub dir: Option<Utf8PathBuf>,

    /// Releases to render: `all` or a comma-separated list of tags
    #[arg(long, value_name = "RELEASES")]
    pub releases: Option<String>,

    /// Treat every tag as a release, not only version tags
    #[arg(long)]
    pub all_tags: bool,

    /// Skip pre-release tags such as v1.0.0rc1
    #[arg(long)]
    pub only_stable: bool,

    /// Output file (default: artifacts/reports/changelog/changelog.md)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<Utf8PathBuf>,

    /// Package name shown in release headings (detected when omitted)
    #[arg(long, value_name = "NAME")]
    pub package_name: Option<String>,

    /// Print the changelog instead of writing it
    #[arg(long)]
    pub stdout: bool,
}

impl ChangelogArgs {
    /// Apply command-line overrides on top of resolved settings.
    pub fn apply(&self, settings: &mut ChangelogSettings) {
        if let Some(ref dir) = self.dir {
            settings.fragment_dir = dir.clone();
        }
        if let Some(ref releases) = self.releases {
            settings.releases = releases.parse().unwrap_or(ReleaseSelection::All);
        }
        if self.all_tags {
            settings.only_version_tags = false;
        }
        if self.only_stable {
            settings.only_stable_releases = true;
        }
        if let Some(ref output) = self.output {
            settings.output = output.clone();
        }
        if let Some(ref name) = self.package_name {
            settings.package_name = Some(name.clone());
        }
    }
}

/// Generate the changelog and write it (or print it with `--stdout`).
///
/// With `--json` the full result, including the aggregated releases, is
/// printed as JSON.
#[instrument(name = "cmd_changelog", skip_all, fields(json_output = global_json))]
pub fn cmd_changelog(
    args: ChangelogArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    let mut settings = ChangelogSettings::resolve(config, cwd);
    args.apply(&mut settings);
    debug!(?settings, "resolved changelog settings");

    let git = SystemGit::open(cwd).context("changelog generation needs a git repository")?;
    let generated = generate(cwd, &settings, &git).context("failed to generate changelog")?;

    if !args.stdout {
        write_changelog(&generated.output, &generated.markdown)
            .context("failed to write changelog")?;
    }

    if global_json {
        println!("{}", serde_json::to_string_pretty(&generated)?);
    } else if args.stdout {
        print!("{}", generated.markdown);
    } else {
        let count = generated.changelog.releases.len();
        println!(
            "{} Wrote {} ({count} release{})",
            "✓".green(),
            generated.output.cyan(),
            if count == 1 { "" } else { "s" }
        );
    }

    Ok(())
}
