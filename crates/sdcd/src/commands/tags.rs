//! Tags command: show the tags the changelog is built from.

use anyhow::Context;
use camino::Utf8Path;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use sdcd_core::release::qualifying_tags;
use sdcd_core::{ChangelogSettings, Config, SystemGit, Tag, VcsClient};

/// Arguments for the `tags` subcommand.
#[derive(Args, Debug, Default)]
pub struct TagsArgs {
    /// Treat every tag as a release, not only version tags
    #[arg(long)]
    pub all_tags: bool,

    /// Skip pre-release tags
    #[arg(long)]
    pub only_stable: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct TagRow {
    name: String,
    date: String,
    timestamp: i64,
    /// Whether fragments can be attributed to this tag.
    release: bool,
}

/// Mark each tag (oldest first) as a release boundary or not.
fn tag_rows(tags: Vec<Tag>, settings: &ChangelogSettings) -> Vec<TagRow> {
    let releases: Vec<String> = qualifying_tags(tags.clone(), &settings.aggregate_options())
        .into_iter()
        .filter(|tag| !tag.is_baseline())
        .map(|tag| tag.name)
        .collect();

    tags.into_iter()
        .map(|tag| TagRow {
            release: releases.contains(&tag.name),
            date: tag.date(),
            timestamp: tag.timestamp,
            name: tag.name,
        })
        .collect()
}

/// List repository tags oldest first.
///
/// Read-only: the baseline tag is shown when present but never created.
#[instrument(name = "cmd_tags", skip_all, fields(json_output = global_json))]
pub fn cmd_tags(
    args: TagsArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    let mut settings = ChangelogSettings::resolve(config, cwd);
    if args.all_tags {
        settings.only_version_tags = false;
    }
    if args.only_stable {
        settings.only_stable_releases = true;
    }

    let git = SystemGit::open(cwd).context("listing tags needs a git repository")?;
    let mut tags = git.list_tags().context("failed to list tags")?;
    tags.sort_by_key(|tag| tag.timestamp);
    debug!(count = tags.len(), "tags listed");

    let rows = tag_rows(tags, &settings);

    if global_json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("  {} {}", "○".yellow(), "No tags found".yellow());
        return Ok(());
    }
    for row in &rows {
        if row.release {
            println!("  {} {} {}", "●".green(), row.name.bold(), row.date.dimmed());
        } else {
            println!("  {} {} {}", "○".dimmed(), row.name.dimmed(), row.date.dimmed());
        }
    }

    Ok(())
}
